//! `RenderEngine` (spec.md §4.4): writes a [`Value`] through a
//! [`WriterService`], dispatching on whether it is a template, an
//! iterable, or a plain value, and honoring the options array produced by
//! `OPTIONS`/`STORE_OPTION`.

use std::io;
use std::rc::Rc;

use crate::group::{GroupService, NUM_OPTIONS};
use crate::opcode::OptionSlot;
use crate::template::TemplateRef;
use crate::value::Value;
use crate::value_ops;

/// Options array as produced by `OPTIONS`/`STORE_OPTION` (spec.md §3:
/// "positional, ANCHOR/FORMAT/NULL/SEPARATOR/WRAP").
pub type Options = [Option<Value>; NUM_OPTIONS];

pub fn empty_options() -> Options {
    [None, None, None, None, None]
}

fn slot(options: &Options, s: OptionSlot) -> Option<&Value> {
    options[s as usize].as_ref()
}

/// Callback the Dispatcher supplies to recurse into a template's own
/// instruction stream. Taking this as a parameter (rather than a direct
/// dependency on `Interpreter::exec`) avoids a `dispatcher` <-> `render`
/// module cycle — `Dispatcher` already depends on `RenderEngine`.
pub type RenderTemplate<'a> = dyn FnMut(&TemplateRef, &mut dyn crate::writer::WriterService) -> io::Result<usize> + 'a;

/// Write `value` with no options (spec.md §4.4 `writeNoOptions`).
pub fn write_no_options(
    value: &Value,
    enclosing: &TemplateRef,
    writer: &mut dyn crate::writer::WriterService,
    group: &Rc<dyn GroupService>,
    locale: &str,
    render_template: &mut RenderTemplate<'_>,
) -> io::Result<usize> {
    write_with_options(value, &empty_options(), enclosing, writer, group, locale, render_template)
}

/// Write `value` honoring `options` (spec.md §4.4 `writeWithOptions`).
pub fn write_with_options(
    value: &Value,
    options: &Options,
    enclosing: &TemplateRef,
    writer: &mut dyn crate::writer::WriterService,
    group: &Rc<dyn GroupService>,
    locale: &str,
    render_template: &mut RenderTemplate<'_>,
) -> io::Result<usize> {
    if value.is_null() {
        return match slot(options, OptionSlot::Null) {
            Some(sub) => write_with_options(sub, options, enclosing, writer, group, locale, render_template),
            None => Ok(0),
        };
    }

    match value {
        Value::Template(t) => write_object(t, enclosing, writer, render_template),
        Value::Seq(_) | Value::Iter(_) | Value::Map(_) => {
            write_iterator(value.clone(), options, enclosing, writer, group, locale, render_template)
        }
        _ => write_pojo(value, options, writer, group, locale, render_template),
    }
}

/// Write a single non-iterable, non-null value (spec.md §4.4
/// `writeObject`). A template instance is linked to `enclosing` and
/// rendered recursively; anything else is handed to `writePOJO`.
fn write_object(
    t: &TemplateRef,
    enclosing: &TemplateRef,
    writer: &mut dyn crate::writer::WriterService,
    render_template: &mut RenderTemplate<'_>,
) -> io::Result<usize> {
    t.borrow_mut().enclosing_instance = Some(Rc::downgrade(enclosing));
    render_template(t, writer)
}

/// Write every element of an iterable value, inserting the SEPARATOR
/// option's text between elements and honoring the NULL/WRAP options
/// (spec.md §4.4 `writeIterator`).
///
/// Separator rule (spec.md §4.4): a separator is emitted before an
/// element iff a previous element was actually written (i.e. this is not
/// the first surviving element) and the current element is non-null, or
/// is null but has a NULL-option substitution. A null element with no
/// substitution contributes nothing — no separator, no content.
fn write_iterator(
    value: Value,
    options: &Options,
    enclosing: &TemplateRef,
    writer: &mut dyn crate::writer::WriterService,
    group: &Rc<dyn GroupService>,
    locale: &str,
    render_template: &mut RenderTemplate<'_>,
) -> io::Result<usize> {
    let items = value_ops::force_iterator(value);
    let separator = slot(options, OptionSlot::Separator).and_then(|v| v.as_str());
    let wrap = slot(options, OptionSlot::Wrap).and_then(|v| v.as_str());
    let null_sub = slot(options, OptionSlot::Null);

    let mut total = 0;
    let mut wrote_any = false;
    for item in items {
        let effective: Option<&Value> = if item.is_null() { null_sub } else { Some(&item) };
        let Some(effective) = effective else {
            continue;
        };

        if wrote_any {
            if let Some(sep) = separator {
                total += writer.write_separator(sep)?;
            }
            if let Some(wrap) = wrap {
                total += writer.write_wrap(wrap)?;
            }
        }
        total += write_with_options(effective, options, enclosing, writer, group, locale, render_template)?;
        wrote_any = true;
    }
    Ok(total)
}

/// Write a scalar/generic value, consulting the group's attribute
/// renderer registry before falling back to `ValueOps::to_string`
/// (spec.md §4.4 `writePOJO`).
fn write_pojo(
    value: &Value,
    options: &Options,
    writer: &mut dyn crate::writer::WriterService,
    group: &Rc<dyn GroupService>,
    locale: &str,
    render_template: &mut RenderTemplate<'_>,
) -> io::Result<usize> {
    let format = slot(options, OptionSlot::Format).and_then(|v| v.as_str());
    let type_name = value_type_name(value);

    let text = match group.get_attribute_renderer(type_name) {
        Some(renderer) => renderer.render(value, format, locale),
        None => {
            let mut recurse = |t: &TemplateRef| -> String {
                let mut sink = String::new();
                let mut nested = crate::writer::AutoIndentWriter::new(string_sink(&mut sink));
                let _ = render_template(t, &mut nested);
                sink
            };
            value_ops::to_string_value(value, &mut recurse)
        }
    };
    writer.write(&text)
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Int(_) => "Integer",
        Value::Float(_) => "Float",
        Value::Str(_) => "String",
        Value::Template(_) => "Template",
        Value::Iter(_) => "Iterator",
        Value::Seq(_) => "List",
        Value::Map(_) => "Map",
        Value::Object(_) => "Object",
    }
}

/// A `std::io::Write` adapter over a `String`, used only for the nested
/// "render into a string sink" path `writePOJO`/`toString` needs (spec.md
/// §4.6).
fn string_sink(s: &mut String) -> StringSink<'_> {
    StringSink(s)
}

struct StringSink<'a>(&'a mut String);

impl io::Write for StringSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
