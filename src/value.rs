//! The heterogeneous runtime [`Value`] type.
//!
//! spec.md §3: "a sum of {null, boolean, integer, floating-point, string,
//! template, iterator, sequence, mapping, generic-object}. The interpreter
//! never commits to a concrete type tag at the instruction level; decisions
//! are made per operation." Conversions between these live in
//! [`crate::value_ops`]; this module only owns the representation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::property::PropertyHost;
use crate::template::TemplateRef;

/// A boxed, shared, stateful iterator over values.
///
/// `Rc<RefCell<dyn Iterator>>` rather than a boxed trait object directly:
/// [`Value`] must be [`Clone`] (it lives on the [`crate::stack::OperandStack`]
/// and in attribute tables), and cloning an iterator value shares its
/// cursor rather than restarting it — the same aliasing behavior a Java
/// `Iterator` reference would have.
pub type ValueIter = Rc<RefCell<dyn Iterator<Item = Value>>>;

/// An associative mapping value, as produced by `LOAD_ATTR`-visible host
/// data or `NEW`'d dictionary-like attributes.
///
/// Keys are restricted to strings: every map key the core ever resolves
/// (`DICT_KEY`, `DEFAULT_KEY`, `keys`, `values`) arrives as template text,
/// so a `HashMap<String, Value>` covers every case spec.md §4.3 describes
/// without pulling in an ordered-map dependency the teacher's stack does
/// not carry.
#[derive(Debug, Default)]
pub struct MapValue {
    pub entries: std::collections::HashMap<String, Value>,
    /// Fallback value returned for an unknown key, set via the map's
    /// `DEFAULT_KEY` entry (spec.md §4.3).
    pub default: Option<Value>,
}

impl MapValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).or(self.default.as_ref())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }
}

/// The interpreter's runtime value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    Template(TemplateRef),
    Iter(ValueIter),
    Seq(Rc<Vec<Value>>),
    Map(Rc<MapValue>),
    /// A generic host object resolved through [`PropertyHost`] (spec.md
    /// §4.3's reflective `get<X>`/`is<X>`/field fallback, replaced here by
    /// an explicit capability per spec.md's Design Notes §9).
    Object(Rc<dyn PropertyHost>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Rc::new(s.into()))
    }

    pub fn seq(values: Vec<Value>) -> Self {
        Value::Seq(Rc::new(values))
    }

    pub fn iter_of(iter: impl Iterator<Item = Value> + 'static) -> Self {
        Value::Iter(Rc::new(RefCell::new(iter)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Template(t) => write!(f, "Template({:?})", t.borrow().impl_.name),
            Value::Iter(_) => write!(f, "Iter(..)"),
            Value::Seq(v) => write!(f, "Seq(len={})", v.len()),
            Value::Map(m) => write!(f, "Map(len={})", m.entries.len()),
            Value::Object(_) => write!(f, "Object(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::new(s))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
