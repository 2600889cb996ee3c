//! `Dispatcher`: the instruction interpret loop (spec.md §4.1).
//!
//! `Interpreter` is the crate's single entry point. Each call to
//! [`Interpreter::exec`] runs one template's instruction stream against a
//! freshly allocated [`OperandStack`] — including recursive calls for
//! embedded templates, so each frame's stack is independent, matching a
//! conventional call-stack-per-frame VM rather than one shared stack
//! threaded through every nested render.

use std::io;
use std::rc::Rc;

use crate::binder;
use crate::debug::DebugTap;
use crate::error::{ErrorKind, ErrorSink};
use crate::group::{self, GroupService};
use crate::map_engine;
use crate::opcode::Opcode;
use crate::property;
use crate::render::{self, Options};
use crate::stack::{self, OperandStack};
use crate::template::{CompiledTemplate, TemplateRef};
use crate::value::Value;
use crate::value_ops;
use crate::writer::WriterService;

/// The stack-based bytecode interpreter (spec.md §2 "Dispatcher").
pub struct Interpreter {
    group: Rc<dyn GroupService>,
    locale: String,
    debug: DebugTap,
    stack_capacity: usize,
}

impl Interpreter {
    /// spec.md §3: stack capacity defaults to 100; debug tap disabled.
    pub fn new(group: Rc<dyn GroupService>, locale: impl Into<String>) -> Self {
        Self {
            group,
            locale: locale.into(),
            debug: DebugTap::new(false),
            stack_capacity: stack::DEFAULT_CAPACITY,
        }
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = DebugTap::new(enabled);
        self
    }

    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    pub fn debug_tap(&self) -> &DebugTap {
        &self.debug
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Render `template` into `writer`, reporting any diagnosable
    /// condition to `errors` and returning the number of characters
    /// written by this call (including everything written by embedded
    /// templates it recursed into).
    pub fn exec(
        &mut self,
        template: &TemplateRef,
        writer: &mut dyn WriterService,
        errors: &mut dyn ErrorSink,
    ) -> io::Result<usize> {
        let compiled: Rc<CompiledTemplate> = Rc::clone(&template.borrow().impl_);
        let group = Rc::clone(&self.group);
        let locale = self.locale.clone();
        self.debug.record_eval_template(&compiled.name, 0);

        {
            let mut eval_eager = |default: &Rc<CompiledTemplate>| -> Value {
                let sub = crate::group::instantiate(&group, Rc::clone(default));
                let mut sink = String::new();
                let mut nested = crate::writer::AutoIndentWriter::new(StringSink(&mut sink));
                let _ = self.exec(&sub, &mut nested, errors);
                Value::str(sink)
            };
            binder::bind_defaults(template, &group, &mut eval_eager);
        }

        let mut stack = OperandStack::new(self.stack_capacity);
        let instrs = &compiled.instrs;
        let strings = &compiled.strings;
        let mut ip: usize = 0;
        let mut written: usize = 0;
        let mut line_chars: usize = 0;
        let mut prev_opcode: Option<Opcode> = None;

        'run: while ip < instrs.len() {
            let op_ip = ip;
            let byte = instrs[ip];
            let opcode = match Opcode::try_from(byte) {
                Ok(op) => op,
                Err(bad) => {
                    errors.report(
                        &Rc::downgrade(template),
                        op_ip,
                        ErrorKind::InternalError(format!("unknown opcode byte {bad}")),
                    );
                    break 'run;
                }
            };
            let previous_opcode = prev_opcode;
            prev_opcode = Some(opcode);
            self.debug
                .record_instruction(|| format!("{op_ip:04}: {opcode}"));
            ip += 1;

            macro_rules! report {
                ($kind:expr) => {
                    errors.report(&Rc::downgrade(template), op_ip, $kind)
                };
            }
            macro_rules! pop {
                () => {
                    match stack.pop() {
                        Ok(v) => v,
                        Err(_) => {
                            report!(ErrorKind::InternalError("stack underflow".to_string()));
                            break 'run;
                        }
                    }
                };
            }
            macro_rules! push {
                ($v:expr) => {
                    if stack.push($v).is_err() {
                        report!(ErrorKind::InternalError("stack overflow".to_string()));
                        break 'run;
                    }
                };
            }

            match opcode {
                Opcode::LoadStr => {
                    let idx = read_u16(instrs, &mut ip);
                    push!(Value::str(strings[idx as usize].clone()));
                }
                Opcode::LoadAttr => {
                    let idx = read_u16(instrs, &mut ip);
                    let name = &strings[idx as usize];
                    let mut current = Some(Rc::clone(template));
                    let mut found = None;
                    while let Some(t) = current {
                        let b = t.borrow();
                        if let Some(v) = b.attributes.get(name) {
                            found = Some(v.clone());
                            break;
                        }
                        current = b.enclosing_instance.as_ref().and_then(|w| w.upgrade());
                    }
                    match found {
                        Some(v) => push!(v),
                        None => {
                            if !binder::declared_in_enclosing_chain(template, name) {
                                report!(ErrorKind::NoAttributeDefinition { name: name.clone() });
                            }
                            push!(Value::Null);
                        }
                    }
                }
                Opcode::LoadLocal => {
                    let idx = read_u16(instrs, &mut ip);
                    let name = &strings[idx as usize];
                    let v = template.borrow().local_attribute(name).unwrap_or(Value::Null);
                    push!(v);
                }
                Opcode::LoadProp => {
                    let idx = read_u16(instrs, &mut ip);
                    let name = strings[idx as usize].clone();
                    let receiver = pop!();
                    match property::access_property(&receiver, &name) {
                        Ok(v) => push!(v),
                        Err(kind) => {
                            report!(kind);
                            push!(Value::Null);
                        }
                    }
                }
                Opcode::LoadPropInd => {
                    let prop_val = pop!();
                    let receiver = pop!();
                    let Some(name) = prop_val.as_str() else {
                        report!(ErrorKind::ExpectingString {
                            opcode: "LOAD_PROP_IND"
                        });
                        push!(Value::Null);
                        continue;
                    };
                    match property::access_property(&receiver, name) {
                        Ok(v) => push!(v),
                        Err(kind) => {
                            report!(kind);
                            push!(Value::Null);
                        }
                    }
                }
                Opcode::New => {
                    let idx = read_u16(instrs, &mut ip);
                    let name = strings[idx as usize].clone();
                    match group::get_instance_of(&group, &name) {
                        Some(t) => push!(Value::Template(t)),
                        None => {
                            report!(ErrorKind::NoSuchTemplate { name });
                            push!(Value::Template(group.blank()));
                        }
                    }
                }
                Opcode::NewInd => {
                    let name_val = pop!();
                    let Some(name) = name_val.as_str().map(|s| s.to_string()) else {
                        report!(ErrorKind::ExpectingString { opcode: "NEW_IND" });
                        push!(Value::Template(group.blank()));
                        continue;
                    };
                    match group::get_instance_of(&group, &name) {
                        Some(t) => push!(Value::Template(t)),
                        None => {
                            report!(ErrorKind::NoSuchTemplate { name });
                            push!(Value::Template(group.blank()));
                        }
                    }
                }
                Opcode::SuperNew => {
                    let idx = read_u16(instrs, &mut ip);
                    let name = strings[idx as usize].clone();
                    match group::get_imported_instance_of(&group, &compiled.native_group, &name) {
                        Some(t) => push!(Value::Template(t)),
                        None => {
                            report!(ErrorKind::NoImportedTemplate { name });
                            push!(Value::Template(group.blank()));
                        }
                    }
                }
                Opcode::StoreAttr => {
                    let idx = read_u16(instrs, &mut ip);
                    let name = strings[idx as usize].clone();
                    let value = pop!();
                    let target = pop!();
                    if let Value::Template(t) = &target {
                        let (may_set, template_name) = {
                            let b = t.borrow();
                            let formals = &b.impl_.formal_arguments;
                            (
                                b.pass_through_attributes || formals.is_unknown() || formals.contains(&name),
                                b.impl_.name.clone(),
                            )
                        };
                        if may_set {
                            t.borrow_mut().raw_set_attribute(name, value);
                        } else {
                            report!(ErrorKind::MissingFormalArguments { template: template_name });
                        }
                    } else {
                        report!(ErrorKind::InternalError(
                            "STORE_ATTR target is not a template".to_string()
                        ));
                    }
                    push!(target);
                }
                Opcode::StoreSoleArg => {
                    let value = pop!();
                    let target = pop!();
                    if let Value::Template(t) = &target {
                        let mut report_fn = |kind: ErrorKind| errors.report(&Rc::downgrade(template), op_ip, kind);
                        binder::bind_sole_arg(t, value, &mut report_fn);
                    } else {
                        report!(ErrorKind::InternalError(
                            "STORE_SOLE_ARG target is not a template".to_string()
                        ));
                    }
                    push!(target);
                }
                Opcode::SetPassThru => {
                    let target = pop!();
                    if let Value::Template(t) = &target {
                        t.borrow_mut().pass_through_attributes = true;
                    }
                    push!(target);
                }
                Opcode::StoreOption => {
                    let idx = read_u16(instrs, &mut ip);
                    let value = pop!();
                    let options = pop!();
                    let Value::Seq(arr) = options else {
                        report!(ErrorKind::InternalError("STORE_OPTION: not an options array".to_string()));
                        continue;
                    };
                    let mut arr = (*arr).clone();
                    if (idx as usize) < arr.len() {
                        arr[idx as usize] = value;
                    }
                    push!(Value::seq(arr));
                }
                Opcode::Options => {
                    push!(Value::seq(vec![Value::Null; crate::group::NUM_OPTIONS]));
                }
                Opcode::List => {
                    push!(Value::seq(Vec::new()));
                }
                Opcode::Add => {
                    let value = pop!();
                    let list = pop!();
                    let Value::Seq(items) = list else {
                        report!(ErrorKind::InternalError("ADD: not a list".to_string()));
                        continue;
                    };
                    let mut items = (*items).clone();
                    items.push(value);
                    push!(Value::seq(items));
                }
                Opcode::Write => {
                    let value = pop!();
                    let mut render_child = |t: &TemplateRef, w: &mut dyn WriterService| self.exec(t, w, errors);
                    let n = render::write_no_options(
                        &value,
                        template,
                        writer,
                        &group,
                        &locale,
                        &mut render_child,
                    )?;
                    written += n;
                    line_chars += n;
                }
                Opcode::WriteOpt => {
                    let options_val = pop!();
                    let value = pop!();
                    let options = to_options_array(&options_val);
                    let mut render_child = |t: &TemplateRef, w: &mut dyn WriterService| self.exec(t, w, errors);
                    let n = render::write_with_options(
                        &value,
                        &options,
                        template,
                        writer,
                        &group,
                        &locale,
                        &mut render_child,
                    )?;
                    written += n;
                    line_chars += n;
                }
                Opcode::Map => {
                    let name_val = pop!();
                    let attribute = pop!();
                    let Some(name) = name_val.as_str().map(|s| s.to_string()) else {
                        report!(ErrorKind::ExpectingString { opcode: "MAP" });
                        push!(Value::Null);
                        continue;
                    };
                    let mut report_fn = |kind: ErrorKind| errors.report(&Rc::downgrade(template), op_ip, kind);
                    let result = map_engine::map(&name, attribute, &group, template, &mut report_fn);
                    push!(result);
                }
                Opcode::RotMap => {
                    let count = read_u16(instrs, &mut ip) as usize;
                    let mut raw_names = Vec::with_capacity(count);
                    for _ in 0..count {
                        raw_names.push(pop!());
                    }
                    raw_names.reverse();
                    let attribute = pop!();
                    let names: Option<Vec<String>> =
                        raw_names.iter().map(|v| v.as_str().map(|s| s.to_string())).collect();
                    let Some(names) = names else {
                        report!(ErrorKind::ExpectingString { opcode: "ROT_MAP" });
                        push!(Value::Null);
                        continue;
                    };
                    let mut report_fn = |kind: ErrorKind| errors.report(&Rc::downgrade(template), op_ip, kind);
                    let result = map_engine::rot_map(&names, attribute, &group, template, &mut report_fn);
                    push!(result);
                }
                Opcode::ParMap => {
                    let count = read_u16(instrs, &mut ip) as usize;
                    let name_val = pop!();
                    let mut attributes = Vec::with_capacity(count);
                    for _ in 0..count {
                        attributes.push(pop!());
                    }
                    attributes.reverse();
                    let Some(name) = name_val.as_str().map(|s| s.to_string()) else {
                        report!(ErrorKind::ExpectingString { opcode: "PAR_MAP" });
                        push!(Value::Null);
                        continue;
                    };
                    let mut report_fn = |kind: ErrorKind| errors.report(&Rc::downgrade(template), op_ip, kind);
                    let result = map_engine::par_map(&name, attributes, &group, template, &mut report_fn);
                    push!(result);
                }
                Opcode::Br => {
                    let target = read_u16(instrs, &mut ip) as usize;
                    ip = target;
                }
                Opcode::Brf => {
                    let target = read_u16(instrs, &mut ip) as usize;
                    let value = pop!();
                    if !value_ops::truthy(&value) {
                        ip = target;
                    }
                }
                Opcode::ToStr => {
                    let value = pop!();
                    let mut render_child = |t: &TemplateRef| -> String {
                        let mut sink = String::new();
                        let mut nested = crate::writer::AutoIndentWriter::new(StringSink(&mut sink));
                        let _ = self.exec(t, &mut nested, errors);
                        sink
                    };
                    let s = value_ops::to_string_value(&value, &mut render_child);
                    push!(Value::str(s));
                }
                Opcode::First => {
                    let value = pop!();
                    push!(value_ops::first(value));
                }
                Opcode::Last => {
                    let value = pop!();
                    push!(value_ops::last(value));
                }
                Opcode::Rest => {
                    let value = pop!();
                    push!(value_ops::rest(value));
                }
                Opcode::Trunc => {
                    let value = pop!();
                    push!(value_ops::trunc(value));
                }
                Opcode::Strip => {
                    let value = pop!();
                    push!(value_ops::strip(value));
                }
                Opcode::Reverse => {
                    let value = pop!();
                    push!(value_ops::reverse(value));
                }
                Opcode::Length => {
                    let value = pop!();
                    push!(value_ops::length(value));
                }
                Opcode::Trim => {
                    let value = pop!();
                    match value.as_str() {
                        Some(s) => push!(Value::str(s.trim().to_string())),
                        None => {
                            report!(ErrorKind::ExpectingString { opcode: "TRIM" });
                            push!(Value::Null);
                        }
                    }
                }
                Opcode::StrLen => {
                    let value = pop!();
                    match value.as_str() {
                        Some(s) => push!(Value::Int(s.chars().count() as i64)),
                        None => {
                            report!(ErrorKind::ExpectingString { opcode: "STRLEN" });
                            push!(Value::Int(0));
                        }
                    }
                }
                Opcode::Not => {
                    let value = pop!();
                    push!(Value::Bool(!value_ops::truthy(&value)));
                }
                Opcode::Or => {
                    let b = pop!();
                    let a = pop!();
                    push!(Value::Bool(value_ops::truthy(&a) || value_ops::truthy(&b)));
                }
                Opcode::And => {
                    let b = pop!();
                    let a = pop!();
                    push!(Value::Bool(value_ops::truthy(&a) && value_ops::truthy(&b)));
                }
                Opcode::Indent => {
                    let idx = read_u16(instrs, &mut ip);
                    writer.push_indentation(&strings[idx as usize]);
                }
                Opcode::Dedent => {
                    writer.pop_indentation();
                }
                Opcode::Newline => {
                    let should_emit = line_chars > 0
                        || matches!(previous_opcode, Some(Opcode::Newline) | Some(Opcode::Indent));
                    if should_emit {
                        written += writer.write("\n")?;
                    }
                    line_chars = 0;
                }
                Opcode::Noop => {}
                Opcode::Pop => {
                    let _ = pop!();
                }
            }
        }

        Ok(written)
    }
}

fn read_u16(instrs: &[u8], ip: &mut usize) -> u16 {
    let hi = instrs[*ip] as u16;
    let lo = instrs[*ip + 1] as u16;
    *ip += 2;
    (hi << 8) | lo
}

fn to_options_array(value: &Value) -> Options {
    let mut options = render::empty_options();
    if let Value::Seq(items) = value {
        for (i, slot) in options.iter_mut().enumerate() {
            if let Some(v) = items.get(i) {
                if !v.is_null() {
                    *slot = Some(v.clone());
                }
            }
        }
    }
    options
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
