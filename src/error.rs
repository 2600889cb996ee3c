//! Diagnostic taxonomy reported by the interpreter.
//!
//! No runtime error ever escapes [`crate::Interpreter::exec`] as a Rust
//! `Err` (spec.md §7): lookup failures, type mismatches, and arity
//! mismatches are reported to an [`ErrorSink`] and execution continues with
//! a safe sentinel. Only a handful of compile-time-assumption violations
//! (unknown opcode, stack underflow) are internal errors; those still go
//! through the sink rather than unwinding, since a single interpreter
//! instance may be embedded inside a larger render that should not abort.

use std::fmt;

use crate::template::TemplateHandle;

/// One diagnosable condition the interpreter can report.
///
/// Mirrors the `ErrorSink` kinds enumerated in spec.md §6/§7 one-to-one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("no such template: {name}")]
    NoSuchTemplate { name: String },

    #[error("no imported template: {name}")]
    NoImportedTemplate { name: String },

    #[error("no such property '{property}': {reason}")]
    NoSuchProperty { property: String, reason: String },

    #[error("attribute '{name}' isn't defined")]
    NoAttributeDefinition { name: String },

    #[error("{opcode} expects a string operand")]
    ExpectingString { opcode: &'static str },

    #[error("template '{template}' has {formal_count} formal arguments, expected exactly 1")]
    ExpectingSingleArgument {
        template: String,
        formal_count: usize,
    },

    #[error("template '{template}' has no formal arguments to bind against")]
    MissingFormalArguments { template: String },

    #[error("parallel map: expected {expected} arguments, got {got}")]
    MapArgumentCountMismatch { expected: usize, got: usize },

    #[error("write failed: {0}")]
    WriteIoError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// A single reported diagnostic, carrying the frame it occurred in.
#[derive(Debug, Clone)]
pub struct ReportedError {
    /// Name of the template whose frame was executing when this was
    /// reported (best-effort; `"<unknown>"` if the frame has no name yet).
    pub template: String,
    /// Instruction pointer of the opcode that triggered the report.
    pub ip: usize,
    pub kind: ErrorKind,
}

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ip={}: {}", self.template, self.ip, self.kind)
    }
}

/// Receiver for interpreter diagnostics.
///
/// Implementations never cause `exec` to abort; they simply observe. The
/// crate ships [`CollectingErrorSink`] as an ambient, directly testable
/// implementation.
pub trait ErrorSink {
    fn report(&mut self, template: &TemplateHandle, ip: usize, kind: ErrorKind);
}

/// Reference `ErrorSink` that stores every report in order.
///
/// Used by this crate's own tests and suitable for embedders that want to
/// assert on diagnostics rather than wire up logging immediately.
#[derive(Debug, Default, Clone)]
pub struct CollectingErrorSink {
    pub errors: Vec<ReportedError>,
}

impl CollectingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ErrorKind> {
        self.errors.iter().map(|e| &e.kind)
    }
}

impl ErrorSink for CollectingErrorSink {
    fn report(&mut self, template: &TemplateHandle, ip: usize, kind: ErrorKind) {
        let name = template
            .upgrade()
            .map(|t| t.borrow().impl_.name.clone())
            .unwrap_or_else(|| "<unknown>".to_string());
        self.errors.push(ReportedError {
            template: name,
            ip,
            kind,
        });
    }
}

/// `ErrorSink` that discards every report. Useful when a caller genuinely
/// does not want diagnostics (e.g. benchmarking raw dispatch throughput).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullErrorSink;

impl ErrorSink for NullErrorSink {
    fn report(&mut self, _template: &TemplateHandle, _ip: usize, _kind: ErrorKind) {}
}
