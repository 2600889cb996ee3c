//! `ValueOps` (spec.md §4.6): conversions between the heterogeneous
//! [`Value`] representation and iterators, booleans, and strings.

use crate::template::TemplateRef;
use crate::value::{Value, ValueIter};

/// Lazily view `v` as a sequence of values, without materializing it.
///
/// spec.md §4.6 `normalizeToIterator`: a scalar normalizes to a
/// single-element iterator over itself; `Null` normalizes to an empty
/// iterator; a sequence/map/iterator normalizes to its own elements
/// (a map's elements are its values, matching `PropertyAccessor`'s
/// `values` resolution).
pub fn normalize_to_iterator(v: Value) -> ValueIter {
    use std::cell::RefCell;
    use std::rc::Rc;

    match v {
        Value::Null => Rc::new(RefCell::new(std::iter::empty())),
        Value::Seq(items) => Rc::new(RefCell::new((*items).clone().into_iter())),
        Value::Map(map) => {
            let values: Vec<Value> = map.entries.values().cloned().collect();
            Rc::new(RefCell::new(values.into_iter()))
        }
        Value::Iter(it) => it,
        other => Rc::new(RefCell::new(std::iter::once(other))),
    }
}

/// Eagerly materialize `v` into a `Vec` (spec.md §4.6 `forceIterator`).
/// `FIRST`/`LAST`/`REST`/`TRUNC`/`STRIP`/`REVERSE`/`LENGTH` all need
/// random access or reverse order, which a lazy iterator cannot give
/// without losing elements, so they force first.
pub fn force_iterator(v: Value) -> Vec<Value> {
    let it = normalize_to_iterator(v);
    let mut borrowed = it.borrow_mut();
    borrowed.by_ref().collect()
}

pub fn first(v: Value) -> Value {
    force_iterator(v).into_iter().next().unwrap_or(Value::Null)
}

pub fn last(v: Value) -> Value {
    force_iterator(v).into_iter().last().unwrap_or(Value::Null)
}

pub fn rest(v: Value) -> Value {
    let mut items = force_iterator(v);
    if items.len() <= 1 {
        return Value::Null;
    }
    items.remove(0);
    Value::seq(items)
}

pub fn trunc(v: Value) -> Value {
    let mut items = force_iterator(v);
    if items.len() <= 1 {
        return Value::Null;
    }
    items.pop();
    Value::seq(items)
}

/// Whether `v` normalizes to more than a singleton (spec.md §4.5
/// `rot_map`'s scalar-vs-iterable branch): a sequence, map, or iterator is
/// iterable; everything else (including `Null`, handled by the caller
/// before this is reached) is a scalar.
pub fn is_iterable(v: &Value) -> bool {
    matches!(v, Value::Seq(_) | Value::Map(_) | Value::Iter(_))
}

pub fn strip(v: Value) -> Value {
    let items = force_iterator(v)
        .into_iter()
        .filter(|i| !i.is_null())
        .collect();
    Value::seq(items)
}

pub fn reverse(v: Value) -> Value {
    let mut items = force_iterator(v);
    items.reverse();
    Value::seq(items)
}

pub fn length(v: Value) -> Value {
    Value::Int(force_iterator(v).len() as i64)
}

/// spec.md §4.6 truthiness: `Null` and `Bool(false)` are false; an empty
/// sequence/map is false; everything else — including every nonempty
/// string, including `"false"` — is true. Matches historical
/// StringTemplate semantics: truthiness is about type and emptiness, never
/// string content.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Seq(items) => !items.is_empty(),
        Value::Map(map) => !map.entries.is_empty(),
        _ => true,
    }
}

/// Render `v` to its string form (spec.md §4.6 `toString`). Template
/// values render through `render_template`, a caller-supplied callback
/// that performs a nested render into a string sink using a no-indent
/// writer (SPEC_FULL.md §10) — kept as a callback rather than a direct
/// dependency on the Dispatcher/RenderEngine to avoid a module cycle
/// (`render` already depends on `value_ops` for iteration).
pub fn to_string_value(v: &Value, render_template: &mut dyn FnMut(&TemplateRef) -> String) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => x.to_string(),
        Value::Str(s) => s.as_str().to_string(),
        Value::Template(t) => render_template(t),
        Value::Seq(items) => items
            .iter()
            .map(|i| to_string_value(i, render_template))
            .collect::<Vec<_>>()
            .join(""),
        Value::Iter(it) => {
            let mut borrowed = it.borrow_mut();
            let items: Vec<Value> = borrowed.by_ref().collect();
            drop(borrowed);
            items
                .iter()
                .map(|i| to_string_value(i, render_template))
                .collect::<Vec<_>>()
                .join("")
        }
        Value::Map(_) => String::new(),
        Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_last_on_sequence() {
        let v = Value::seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(first(v.clone()), Value::Int(1)));
        assert!(matches!(last(v), Value::Int(3)));
    }

    #[test]
    fn strip_removes_nulls() {
        let v = Value::seq(vec![Value::Int(1), Value::Null, Value::Int(2)]);
        let stripped = strip(v);
        assert!(matches!(stripped, Value::Seq(ref s) if s.len() == 2));
    }

    #[test]
    fn scalar_normalizes_to_singleton() {
        let v = Value::Int(42);
        assert_eq!(force_iterator(v).len(), 1);
    }

    #[test]
    fn truthiness_matches_spec() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&Value::Bool(false)));
        assert!(!truthy(&Value::seq(vec![])));
        assert!(truthy(&Value::str("false")));
        assert!(truthy(&Value::Int(0)));
    }

    #[test]
    fn rest_and_trunc_of_short_sequences_are_null_not_empty_seq() {
        assert!(matches!(rest(Value::seq(vec![])), Value::Null));
        assert!(matches!(rest(Value::seq(vec![Value::Int(1)])), Value::Null));
        assert!(matches!(trunc(Value::seq(vec![])), Value::Null));
        assert!(matches!(trunc(Value::seq(vec![Value::Int(1)])), Value::Null));
    }

    #[test]
    fn rest_and_trunc_of_longer_sequences_drop_one_element() {
        let v = Value::seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let Value::Seq(r) = rest(v.clone()) else { panic!("expected seq") };
        assert!(matches!(r.as_slice(), [Value::Int(2), Value::Int(3)]));
        let Value::Seq(t) = trunc(v) else { panic!("expected seq") };
        assert!(matches!(t.as_slice(), [Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn is_iterable_distinguishes_scalars_from_collections() {
        assert!(is_iterable(&Value::seq(vec![])));
        assert!(!is_iterable(&Value::Int(1)));
        assert!(!is_iterable(&Value::Null));
    }
}
