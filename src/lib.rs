//! # strtem_vm
//!
//! Runtime execution core for a string-template rendering system: a
//! stack-based bytecode interpreter that consumes precompiled template
//! instructions and emits text to a character sink.
//!
//! The compiler, group loader, and writer implementations are external
//! collaborators; this crate consumes them through the [`group`] and
//! [`writer`] traits and drives rendering through [`Interpreter::exec`].

mod binder;
mod debug;
mod dispatcher;
mod error;
mod group;
mod map_engine;
mod opcode;
mod property;
mod render;
mod stack;
mod template;
mod value;
mod value_ops;
mod writer;

pub use binder::bind_defaults;
pub use debug::{DebugTap, DisasmTrace, InterpEvent};
pub use error::{CollectingErrorSink, ErrorKind, ErrorSink, NullErrorSink, ReportedError};
pub use group::{AttributeRenderer, GroupService, DEFAULT_KEY, DICT_KEY, NUM_OPTIONS};
pub use opcode::{OptionSlot, Opcode};
pub use property::PropertyHost;
pub use stack::OperandStack;
pub use template::{CompiledTemplate, FormalArgument, FormalArguments, TemplateHandle, TemplateInstance, TemplateRef};
pub use value::{MapValue, Value, ValueIter};
pub use writer::{AutoIndentWriter, WriterService};

pub use dispatcher::Interpreter;
