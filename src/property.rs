//! Dynamic property access (spec.md §4.3).
//!
//! The original algorithm falls back to reflection (`get<X>`/`is<X>`/bare
//! field access) for generic host objects. spec.md's Design Notes §9
//! resolve that Open Question for a statically typed host language: a
//! generic object instead implements [`PropertyHost::lookup`], an explicit
//! capability the Dispatcher calls instead of reflecting.

use crate::error::ErrorKind;
use crate::group::{DEFAULT_KEY, DICT_KEY};
use crate::value::Value;

/// A host object reachable from a template's attributes that exposes named
/// properties without reflection.
pub trait PropertyHost {
    /// Resolve `property` on this object. `None` means the property does
    /// not exist (the caller reports `NoSuchProperty`); it is distinct
    /// from the property existing and holding a null value.
    fn lookup(&self, property: &str) -> Option<Value>;
}

/// `PropertyAccessor` (spec.md §4.3): resolve `property` on `receiver`.
///
/// - `null` receiver or empty property name reports `NoSuchProperty` and
///   yields null (spec.md §4.3: "receiver == null -> NO_SUCH_PROPERTY
///   ('null object'), return null" / "property == null -> NO_SUCH_PROPERTY,
///   return null").
/// - A template receiver is looked up in its own local attribute table
///   only — no enclosing-scope walk (that walk is `LOAD_ATTR`'s job, not
///   property access).
/// - A map receiver resolves `key`/`keys`/`values`/`default` specially,
///   then falls through to a direct entry lookup; whatever the resolution
///   lands on, a value equal to the `DICT_KEY` sentinel is substituted
///   with the property name itself (spec.md §4.3's final map rule).
/// - Anything else must implement [`PropertyHost`]; `lookup` returning
///   `None` is reported as `ErrorKind::NoSuchProperty`.
pub fn access_property(receiver: &Value, property: &str) -> Result<Value, ErrorKind> {
    if receiver.is_null() {
        return Err(ErrorKind::NoSuchProperty {
            property: property.to_string(),
            reason: "null object".to_string(),
        });
    }
    if property.is_empty() {
        return Err(ErrorKind::NoSuchProperty {
            property: property.to_string(),
            reason: "null property".to_string(),
        });
    }

    match receiver {
        Value::Template(t) => Ok(t
            .borrow()
            .local_attribute(property)
            .unwrap_or(Value::Null)),

        Value::Map(map) => {
            if property == DICT_KEY {
                return Ok(Value::str(DICT_KEY));
            }
            let resolved = if property == "keys" {
                let keys: Vec<Value> = map.entries.keys().map(|k| Value::str(k.clone())).collect();
                Value::seq(keys)
            } else if property == "values" {
                let values: Vec<Value> = map.entries.values().cloned().collect();
                Value::seq(values)
            } else if property == DEFAULT_KEY {
                map.default.clone().unwrap_or(Value::Null)
            } else {
                map.get(property).cloned().unwrap_or(Value::Null)
            };
            match resolved.as_str() {
                Some(DICT_KEY) => Ok(Value::str(property)),
                _ => Ok(resolved),
            }
        }

        Value::Object(host) => host.lookup(property).ok_or_else(|| ErrorKind::NoSuchProperty {
            property: property.to_string(),
            reason: "no matching accessor".to_string(),
        }),

        other => Err(ErrorKind::NoSuchProperty {
            property: property.to_string(),
            reason: format!("{other:?} has no properties"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MapValue;
    use std::rc::Rc;

    #[test]
    fn null_receiver_reports_no_such_property() {
        let err = access_property(&Value::Null, "x").unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::NoSuchProperty { reason, .. } if reason == "null object"
        ));
    }

    #[test]
    fn map_resolved_dict_key_value_substitutes_property_name() {
        let mut map = MapValue::new();
        map.insert("a", Value::str(DICT_KEY));
        let v = access_property(&Value::Map(Rc::new(map)), "a").unwrap();
        assert_eq!(v.as_str(), Some("a"));
    }

    #[test]
    fn map_default_key_fallback() {
        let mut map = MapValue::new();
        map.insert("a", Value::Int(1));
        map.default = Some(Value::str("fallback"));
        let v = access_property(&Value::Map(Rc::new(map)), "missing").unwrap();
        assert_eq!(v.as_str(), Some("fallback"));
    }

    #[test]
    fn map_keys_and_values() {
        let mut map = MapValue::new();
        map.insert("a", Value::Int(1));
        let receiver = Value::Map(Rc::new(map));
        let keys = access_property(&receiver, "keys").unwrap();
        assert!(matches!(keys, Value::Seq(ref s) if s.len() == 1));
    }
}
