//! Data model: compiled templates, formal arguments, and live instances.
//!
//! A [`CompiledTemplate`] is produced by the (out-of-scope) compiler and is
//! immutable for the lifetime of the process. A [`TemplateInstance`] is the
//! mutable, per-render "ST" object described in spec.md §3: it owns an
//! attribute table and a non-owning back reference to the template that
//! embedded it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::group::GroupService;
use crate::value::Value;

/// Owning reference to a live template instance.
pub type TemplateRef = Rc<RefCell<TemplateInstance>>;

/// Non-owning back reference (spec.md §3: `enclosingInstance` "weak; used
/// for scope walking, not ownership").
pub type TemplateHandle = Weak<RefCell<TemplateInstance>>;

/// A formal argument declaration: a name plus an optional default value.
///
/// The default, when present, is itself a compiled sub-template
/// (spec.md §3 `FormalArgument`). `default_value_text` is the raw source of
/// that default, retained only to let [`crate::binder`] detect the eager
/// `{<(...)>}` shape without re-disassembling the default's bytecode.
#[derive(Debug, Clone)]
pub struct FormalArgument {
    pub name: String,
    pub compiled_default_value: Option<Rc<CompiledTemplate>>,
    pub default_value_text: Option<String>,
}

impl FormalArgument {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compiled_default_value: None,
            default_value_text: None,
        }
    }

    pub fn with_default(
        name: impl Into<String>,
        compiled_default_value: Rc<CompiledTemplate>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            compiled_default_value: Some(compiled_default_value),
            default_value_text: Some(raw_text.into()),
        }
    }

    /// The eager-eval shape from spec.md §4.7: `{<(` ... `)>}`.
    pub fn is_eager_default(&self) -> bool {
        self.default_value_text
            .as_deref()
            .is_some_and(|t| t.starts_with("{<(") && t.ends_with(")>}"))
    }
}

/// Whether a [`CompiledTemplate`]'s formal-argument list was ever declared.
///
/// spec.md §4.8: "If the current template's formals were never declared
/// (sentinel UNKNOWN), skip the [null-against-formals] check." Distinct
/// from `Known(vec![])`, which means "declared, and declares zero formals".
#[derive(Debug, Clone, Default)]
pub enum FormalArguments {
    #[default]
    Unknown,
    Known(Vec<FormalArgument>),
}

impl FormalArguments {
    pub fn find(&self, name: &str) -> Option<&FormalArgument> {
        match self {
            FormalArguments::Unknown => None,
            FormalArguments::Known(args) => args.iter().find(|a| a.name == name),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        match self {
            FormalArguments::Unknown => 0,
            FormalArguments::Known(args) => args.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<&FormalArgument> {
        match self {
            FormalArguments::Unknown => None,
            FormalArguments::Known(args) => args.first(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormalArgument> {
        match self {
            FormalArguments::Unknown => [].iter(),
            FormalArguments::Known(args) => args.iter(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FormalArguments::Unknown)
    }
}

/// Immutable template bytecode plus its constant pool and formal-argument
/// table (spec.md §3 `CompiledTemplate`).
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub name: String,
    pub instrs: Vec<u8>,
    pub code_size: usize,
    pub strings: Vec<String>,
    pub formal_arguments: FormalArguments,
    /// The group where this template was defined; distinct from the
    /// render-time group, used by `SUPER_NEW` to resolve imports.
    pub native_group: String,
}

impl CompiledTemplate {
    /// An empty, anonymous template: zero instructions, zero formals. Used
    /// as the backing body for `GroupService::blank` and
    /// `GroupService::create_string_template`.
    pub fn blank() -> Rc<Self> {
        Rc::new(Self {
            name: "<blank>".to_string(),
            instrs: Vec::new(),
            code_size: 0,
            strings: Vec::new(),
            formal_arguments: FormalArguments::Known(Vec::new()),
            native_group: String::new(),
        })
    }
}

/// A live, per-render template instance ("ST" in spec.md §3).
pub struct TemplateInstance {
    pub impl_: Rc<CompiledTemplate>,
    pub attributes: HashMap<String, Value>,
    pub enclosing_instance: Option<TemplateHandle>,
    pub group: Rc<dyn GroupService>,
    pub pass_through_attributes: bool,
}

impl TemplateInstance {
    pub fn new(impl_: Rc<CompiledTemplate>, group: Rc<dyn GroupService>) -> TemplateRef {
        Rc::new(RefCell::new(Self {
            impl_,
            attributes: HashMap::new(),
            enclosing_instance: None,
            group,
            pass_through_attributes: false,
        }))
    }

    /// Local-only attribute lookup (no scope walk) — used by `LOAD_LOCAL`
    /// and by `PropertyAccessor` when the receiver is a template
    /// (spec.md §4.3: "return its attribute table lookup (no scope walk
    /// here)").
    pub fn local_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    pub fn raw_set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }
}
