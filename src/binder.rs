//! `ArgumentBinder` (spec.md §4.7): sole-argument binding, positional
//! binding for parallel map, and default-argument injection. Also the
//! null-against-formals check from spec.md §4.8.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::group::GroupService;
use crate::template::{CompiledTemplate, TemplateRef};
use crate::value::Value;

/// Bind a single value as a template's sole positional argument (spec.md
/// §4.7). A template with no declared formals binds under the implicit
/// name `it`; otherwise it binds to the first declared formal. Reports
/// `EXPECTING_SINGLE_ARGUMENT` (binding still proceeds, against the first
/// formal) when the target declares more than one.
pub fn bind_sole_arg(instance: &TemplateRef, value: Value, report: &mut dyn FnMut(ErrorKind)) {
    let (name, formal_count) = {
        let borrowed = instance.borrow();
        let formals = &borrowed.impl_.formal_arguments;
        let name = match formals.first() {
            Some(formal) => formal.name.clone(),
            None => "it".to_string(),
        };
        (name, formals.len())
    };
    if formal_count > 1 {
        let template = instance.borrow().impl_.name.clone();
        report(ErrorKind::ExpectingSingleArgument {
            template,
            formal_count,
        });
    }
    instance.borrow_mut().raw_set_attribute(name, value);
}

/// Bind `value` into the next not-yet-bound formal argument, in
/// declaration order (spec.md §4.5 `par_map`: "leaving unset, not null,
/// when an iterator is exhausted early" implies the inverse — values
/// present bind to formals positionally, left to right). Extra values
/// beyond the last formal are silently dropped, matching the compiler's
/// own arity guarantee (spec.md §3: "the compiler guarantees this").
pub fn bind_positional(instance: &TemplateRef, value: Value) {
    let name = {
        let borrowed = instance.borrow();
        borrowed
            .impl_
            .formal_arguments
            .iter()
            .find(|f| !borrowed.attributes.contains_key(&f.name))
            .map(|f| f.name.clone())
    };
    if let Some(name) = name {
        instance.borrow_mut().raw_set_attribute(name, value);
    }
}

/// Fill in every formal argument that was not explicitly bound, from its
/// declared default (spec.md §4.7).
///
/// `eval_eager_default` evaluates a default's compiled body into a
/// `Value` right away — used for the `{<(...)>}` shape, which spec.md
/// §4.7 calls out as requiring immediate string evaluation rather than
/// lazy sub-template binding. It is a callback rather than a direct call
/// into `Interpreter::exec` to avoid a `binder` <-> `dispatcher` module
/// cycle (the Dispatcher already depends on `binder`).
pub fn bind_defaults(
    instance: &TemplateRef,
    group: &Rc<dyn GroupService>,
    eval_eager_default: &mut dyn FnMut(&Rc<CompiledTemplate>) -> Value,
) {
    let formals = instance.borrow().impl_.formal_arguments.clone();
    for formal in formals.iter() {
        let already_set = instance.borrow().attributes.contains_key(&formal.name);
        if already_set {
            continue;
        }
        let Some(default_compiled) = &formal.compiled_default_value else {
            continue;
        };
        let value = if formal.is_eager_default() {
            eval_eager_default(default_compiled)
        } else {
            Value::Template(crate::group::instantiate(group, Rc::clone(default_compiled)))
        };
        instance.borrow_mut().raw_set_attribute(formal.name.clone(), value);
    }
}

/// spec.md §4.8: after an attribute name resolves to null via the
/// enclosing-scope walk, confirm it was declared as a formal somewhere in
/// that same chain before reporting `NoAttributeDefinition`. A frame
/// whose formal-argument table is the `Unknown` sentinel is skipped
/// entirely rather than treated as "declares nothing" — the compiler
/// simply never recorded the information, which is not evidence of
/// anything.
pub fn declared_in_enclosing_chain(start: &TemplateRef, name: &str) -> bool {
    let mut current = Some(Rc::clone(start));
    while let Some(t) = current {
        let borrowed = t.borrow();
        let formals = &borrowed.impl_.formal_arguments;
        if formals.is_unknown() || formals.contains(name) {
            return true;
        }
        current = borrowed.enclosing_instance.as_ref().and_then(|w| w.upgrade());
    }
    false
}
