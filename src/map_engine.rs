//! `MapEngine` (spec.md §4.5): single-template map, rotating
//! multi-template map, and parallel zip-map.

use std::rc::Rc;

use crate::binder;
use crate::error::ErrorKind;
use crate::group::{self, GroupService};
use crate::template::TemplateRef;
use crate::value::Value;
use crate::value_ops;

fn instantiate_mapped(
    name: &str,
    group_ref: &Rc<dyn GroupService>,
    enclosing: &TemplateRef,
    report: &mut dyn FnMut(ErrorKind),
) -> Option<TemplateRef> {
    let instance = group::get_embedded_instance_of(group_ref, enclosing, name);
    if instance.is_none() {
        report(ErrorKind::NoSuchTemplate {
            name: name.to_string(),
        });
    }
    instance
}

/// `map(name, attribute)` (spec.md §4.5): sugar for `rot_map` with a
/// single name.
pub fn map(
    name: &str,
    attribute: Value,
    group_ref: &Rc<dyn GroupService>,
    enclosing: &TemplateRef,
    report: &mut dyn FnMut(ErrorKind),
) -> Value {
    rot_map(std::slice::from_ref(&name.to_string()), attribute, group_ref, enclosing, report)
}

/// `rot_map(names, attribute)` (spec.md §4.5): a scalar `attribute`
/// instantiates `names[0]` directly and pushes a single `Value::Template`
/// — not a one-element sequence, which would be observably different
/// under `RenderEngine::write_with_options` (a sequence writes through
/// `write_iterator`, a bare template writes through `write_object`). An
/// iterable `attribute` gets one instance per non-null element, bound as
/// that instance's sole argument, rotating through
/// `names[ti % names.len()]` where `ti` only advances for non-null
/// elements. Null elements pass through untouched so `RenderEngine`'s
/// separator/NULL-option handling still sees them. Each instance also
/// receives the conventional `i0`/`i` iteration indices (zero- and
/// one-based).
pub fn rot_map(
    names: &[String],
    attribute: Value,
    group_ref: &Rc<dyn GroupService>,
    enclosing: &TemplateRef,
    report: &mut dyn FnMut(ErrorKind),
) -> Value {
    if names.is_empty() || attribute.is_null() {
        return Value::Null;
    }

    if !value_ops::is_iterable(&attribute) {
        return match instantiate_mapped(&names[0], group_ref, enclosing, report) {
            Some(instance) => {
                binder::bind_sole_arg(&instance, attribute, report);
                instance.borrow_mut().raw_set_attribute("i0", Value::Int(0));
                instance.borrow_mut().raw_set_attribute("i", Value::Int(1));
                Value::Template(instance)
            }
            None => Value::Template(group_ref.blank()),
        };
    }

    let items = value_ops::force_iterator(attribute);
    let mut out = Vec::with_capacity(items.len());
    let mut ti: usize = 0;
    for (i0, item) in items.into_iter().enumerate() {
        if item.is_null() {
            out.push(Value::Null);
            continue;
        }
        let name = &names[ti % names.len()];
        ti += 1;
        match instantiate_mapped(name, group_ref, enclosing, report) {
            Some(instance) => {
                binder::bind_sole_arg(&instance, item, report);
                instance.borrow_mut().raw_set_attribute("i0", Value::Int(i0 as i64));
                instance
                    .borrow_mut()
                    .raw_set_attribute("i", Value::Int(i0 as i64 + 1));
                out.push(Value::Template(instance));
            }
            None => out.push(Value::Null),
        }
    }
    Value::seq(out)
}

/// `par_map(name, attributes)` (spec.md §4.5): zips `attributes.len()`
/// iterators together, positionally binding column `k`'s element into the
/// `k`-th not-yet-bound formal argument of one `name`-template instance
/// per row. A column whose iterator is exhausted before the longest one
/// simply contributes nothing for that row — the corresponding formal is
/// left unset, not set to null, matching spec.md §4.5. `name` must
/// resolve to a template declaring at least one formal argument
/// (`MISSING_FORMAL_ARGUMENTS` otherwise); a formal/expression count
/// mismatch is reported as `MAP_ARGUMENT_COUNT_MISMATCH` and truncated to
/// the smaller of the two.
pub fn par_map(
    name: &str,
    attributes: Vec<Value>,
    group_ref: &Rc<dyn GroupService>,
    enclosing: &TemplateRef,
    report: &mut dyn FnMut(ErrorKind),
) -> Value {
    if attributes.is_empty() || name.is_empty() {
        return Value::Null;
    }
    let Some(compiled) = group_ref.lookup_template(name) else {
        report(ErrorKind::NoSuchTemplate {
            name: name.to_string(),
        });
        return Value::Null;
    };
    if !group::declares_formals(&compiled.formal_arguments) {
        report(ErrorKind::MissingFormalArguments {
            template: name.to_string(),
        });
        return Value::Null;
    }

    let mut columns: Vec<Vec<Value>> = attributes.into_iter().map(value_ops::force_iterator).collect();
    let formal_count = compiled.formal_arguments.len();
    if formal_count != columns.len() {
        report(ErrorKind::MapArgumentCountMismatch {
            expected: formal_count,
            got: columns.len(),
        });
        columns.truncate(formal_count.min(columns.len()));
    }
    let max_len = columns.iter().map(|c| c.len()).max().unwrap_or(0);
    let mut out = Vec::with_capacity(max_len);
    for row in 0..max_len {
        let Some(instance) = instantiate_mapped(name, group_ref, enclosing, report) else {
            out.push(Value::Null);
            continue;
        };
        for column in &columns {
            if let Some(value) = column.get(row) {
                binder::bind_positional(&instance, value.clone());
            }
        }
        instance.borrow_mut().raw_set_attribute("i0", Value::Int(row as i64));
        instance
            .borrow_mut()
            .raw_set_attribute("i", Value::Int(row as i64 + 1));
        out.push(Value::Template(instance));
    }
    Value::seq(out)
}
