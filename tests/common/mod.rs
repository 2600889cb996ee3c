//! Shared harness for the integration tests in this directory.
//!
//! The compiler is out of scope for this crate (spec.md §6), so there is no
//! way to go from template source text to bytecode here. [`BytecodeBuilder`]
//! stands in for it: a fluent hand-assembler that emits the same byte
//! encoding `Interpreter::exec` decodes, letting tests build
//! `CompiledTemplate`s directly. [`SimpleGroup`] and [`CollectingWriter`] are
//! minimal [`GroupService`]/[`WriterService`] test doubles.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use strtem_vm::{
    AttributeRenderer, CompiledTemplate, FormalArguments, GroupService, Opcode, OptionSlot,
    TemplateInstance, TemplateRef, Value, WriterService,
};

/// Fluent hand-assembler for one template's instruction stream.
///
/// Every `*_op` method mirrors the encoding documented on [`Opcode`]: a
/// one-byte opcode followed by zero or more big-endian `u16` operands.
/// String-pool indices are resolved lazily by [`BytecodeBuilder::intern`],
/// which deduplicates repeated literals the way a real compiler's constant
/// pool would.
pub struct BytecodeBuilder {
    instrs: Vec<u8>,
    strings: Vec<String>,
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self {
            instrs: Vec::new(),
            strings: Vec::new(),
        }
    }

    /// Current instruction offset, for computing branch targets.
    pub fn here(&self) -> u16 {
        self.instrs.len() as u16
    }

    fn intern(&mut self, s: &str) -> u16 {
        if let Some(idx) = self.strings.iter().position(|existing| existing == s) {
            return idx as u16;
        }
        self.strings.push(s.to_string());
        (self.strings.len() - 1) as u16
    }

    fn push_u16(&mut self, v: u16) {
        self.instrs.push((v >> 8) as u8);
        self.instrs.push((v & 0xff) as u8);
    }

    /// An opcode with no operand.
    pub fn op(&mut self, op: Opcode) -> &mut Self {
        self.instrs.push(op as u8);
        self
    }

    /// An opcode whose operand is a raw `u16` (branch targets, option
    /// slots, rotation counts).
    pub fn op_u16(&mut self, op: Opcode, operand: u16) -> &mut Self {
        self.instrs.push(op as u8);
        self.push_u16(operand);
        self
    }

    /// An opcode whose operand is a string-pool index for `text`.
    pub fn op_str(&mut self, op: Opcode, text: &str) -> &mut Self {
        let idx = self.intern(text);
        self.op_u16(op, idx)
    }

    pub fn load_str(&mut self, s: &str) -> &mut Self {
        self.op_str(Opcode::LoadStr, s)
    }

    pub fn load_attr(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::LoadAttr, name)
    }

    pub fn load_local(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::LoadLocal, name)
    }

    pub fn load_prop(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::LoadProp, name)
    }

    pub fn new_instance(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::New, name)
    }

    pub fn super_new(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::SuperNew, name)
    }

    pub fn store_attr(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::StoreAttr, name)
    }

    pub fn store_option(&mut self, slot: OptionSlot) -> &mut Self {
        self.op_u16(Opcode::StoreOption, slot as u16)
    }

    pub fn indent(&mut self, text: &str) -> &mut Self {
        self.op_str(Opcode::Indent, text)
    }

    pub fn br(&mut self, target: u16) -> &mut Self {
        self.op_u16(Opcode::Br, target)
    }

    pub fn brf(&mut self, target: u16) -> &mut Self {
        self.op_u16(Opcode::Brf, target)
    }

    /// Emit `BR` with a placeholder target, returning the operand's byte
    /// offset for [`BytecodeBuilder::patch_u16`] once the real target is
    /// known (forward branches can't be encoded in one pass).
    pub fn br_placeholder(&mut self) -> usize {
        self.instrs.push(Opcode::Br as u8);
        let pos = self.instrs.len();
        self.push_u16(0);
        pos
    }

    /// Like [`BytecodeBuilder::br_placeholder`], for `BRF`.
    pub fn brf_placeholder(&mut self) -> usize {
        self.instrs.push(Opcode::Brf as u8);
        let pos = self.instrs.len();
        self.push_u16(0);
        pos
    }

    /// Backpatch the placeholder operand at byte offset `pos` (as returned
    /// by [`BytecodeBuilder::br_placeholder`]/[`BytecodeBuilder::brf_placeholder`])
    /// with the now-known `target` offset.
    pub fn patch_u16(&mut self, pos: usize, target: u16) {
        self.instrs[pos] = (target >> 8) as u8;
        self.instrs[pos + 1] = (target & 0xff) as u8;
    }

    /// `MAP name` — the attribute must already be on the stack (e.g. via
    /// a preceding [`BytecodeBuilder::load_attr`]); this pushes `name`
    /// with `LOAD_STR` and emits the no-operand `MAP` opcode, which pops
    /// the name first and the attribute second (spec.md §4.1).
    pub fn map(&mut self, name: &str) -> &mut Self {
        self.load_str(name);
        self.op(Opcode::Map)
    }

    /// `ROT_MAP names` — the attribute must already be on the stack.
    /// Pushes each name with `LOAD_STR` (first name first, so the last
    /// name ends up on top) then emits `ROT_MAP` with the count operand;
    /// the opcode pops the names (top = last), then the attribute.
    pub fn rot_map(&mut self, names: &[&str]) -> &mut Self {
        for name in names {
            self.load_str(name);
        }
        self.op_u16(Opcode::RotMap, names.len() as u16)
    }

    /// `PAR_MAP name, count` — the `count` attribute columns must already
    /// be on the stack. Pushes `name` with `LOAD_STR` last (so it ends up
    /// on top) then emits `PAR_MAP` with the column-count operand; the
    /// opcode pops the name first, then the `count` attributes.
    pub fn par_map(&mut self, name: &str, count: u16) -> &mut Self {
        self.load_str(name);
        self.op_u16(Opcode::ParMap, count)
    }

    pub fn build(&self, name: &str) -> Rc<CompiledTemplate> {
        self.build_with_formals(name, FormalArguments::Known(Vec::new()))
    }

    pub fn build_with_formals(&self, name: &str, formal_arguments: FormalArguments) -> Rc<CompiledTemplate> {
        Rc::new(CompiledTemplate {
            name: name.to_string(),
            instrs: self.instrs.clone(),
            code_size: self.instrs.len(),
            strings: self.strings.clone(),
            formal_arguments,
            native_group: String::new(),
        })
    }

    /// Like [`BytecodeBuilder::build`], but also stamps the `nativeGroup`
    /// field `SUPER_NEW` resolves imports against.
    pub fn build_in_native_group(&self, name: &str, native_group: &str) -> Rc<CompiledTemplate> {
        Rc::new(CompiledTemplate {
            name: name.to_string(),
            instrs: self.instrs.clone(),
            code_size: self.instrs.len(),
            strings: self.strings.clone(),
            formal_arguments: FormalArguments::Known(Vec::new()),
            native_group: native_group.to_string(),
        })
    }
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory [`GroupService`] test double: a template registry plus an
/// optional attribute-renderer registry.
#[derive(Default)]
pub struct SimpleGroup {
    templates: RefCell<HashMap<String, Rc<CompiledTemplate>>>,
    imports: RefCell<HashMap<(String, String), Rc<CompiledTemplate>>>,
    renderers: RefCell<HashMap<String, Rc<dyn AttributeRenderer>>>,
    debug: bool,
}

impl SimpleGroup {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn with_debug() -> Rc<Self> {
        Rc::new(Self {
            debug: true,
            ..Self::default()
        })
    }

    pub fn register(&self, compiled: Rc<CompiledTemplate>) {
        self.templates.borrow_mut().insert(compiled.name.clone(), compiled);
    }

    pub fn register_import(&self, native_group: &str, name: &str, compiled: Rc<CompiledTemplate>) {
        self.imports
            .borrow_mut()
            .insert((native_group.to_string(), name.to_string()), compiled);
    }

    pub fn register_renderer(&self, type_name: &str, renderer: Rc<dyn AttributeRenderer>) {
        self.renderers.borrow_mut().insert(type_name.to_string(), renderer);
    }
}

impl GroupService for SimpleGroup {
    fn lookup_template(&self, name: &str) -> Option<Rc<CompiledTemplate>> {
        self.templates.borrow().get(name).cloned()
    }

    fn lookup_imported_template(&self, native_group: &str, name: &str) -> Option<Rc<CompiledTemplate>> {
        self.imports
            .borrow()
            .get(&(native_group.to_string(), name.to_string()))
            .cloned()
    }

    fn create_string_template(&self) -> TemplateRef {
        self.blank()
    }

    fn get_attribute_renderer(&self, type_name: &str) -> Option<Rc<dyn AttributeRenderer>> {
        self.renderers.borrow().get(type_name).cloned()
    }

    fn debug(&self) -> bool {
        self.debug
    }

    fn blank(&self) -> TemplateRef {
        TemplateInstance::new(CompiledTemplate::blank(), Rc::new(EmptyGroup))
    }
}

/// A group with no templates, used as the backing group for instances
/// `SimpleGroup::blank` hands back — it never needs to resolve anything
/// further itself.
struct EmptyGroup;

impl GroupService for EmptyGroup {
    fn lookup_template(&self, _name: &str) -> Option<Rc<CompiledTemplate>> {
        None
    }
    fn lookup_imported_template(&self, _native_group: &str, _name: &str) -> Option<Rc<CompiledTemplate>> {
        None
    }
    fn create_string_template(&self) -> TemplateRef {
        self.blank()
    }
    fn get_attribute_renderer(&self, _type_name: &str) -> Option<Rc<dyn AttributeRenderer>> {
        None
    }
    fn debug(&self) -> bool {
        false
    }
    fn blank(&self) -> TemplateRef {
        TemplateInstance::new(CompiledTemplate::blank(), Rc::new(EmptyGroup))
    }
}

/// Convenience: build a root instance of `compiled` against `group`.
pub fn root_instance(group: &Rc<SimpleGroup>, compiled: Rc<CompiledTemplate>) -> TemplateRef {
    TemplateInstance::new(compiled, group.clone() as Rc<dyn GroupService>)
}

/// A trivial `AttributeRenderer` test double: upper-cases strings, ignores
/// everything else.
pub struct UppercaseRenderer;

impl AttributeRenderer for UppercaseRenderer {
    fn render(&self, value: &Value, _format: Option<&str>, _locale: &str) -> String {
        match value.as_str() {
            Some(s) => s.to_uppercase(),
            None => String::new(),
        }
    }
}

/// [`WriterService`] test double: records every write into one string and
/// tracks indentation/anchor push-pop balance so a test can assert a render
/// left the writer's stacks empty.
#[derive(Default)]
pub struct CollectingWriter {
    out: String,
    indent_depth: i32,
    anchor_depth: i32,
}

impl CollectingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    pub fn is_balanced(&self) -> bool {
        self.indent_depth == 0 && self.anchor_depth == 0
    }
}

impl WriterService for CollectingWriter {
    fn index(&self) -> usize {
        self.out.chars().count()
    }

    fn write(&mut self, text: &str) -> io::Result<usize> {
        self.out.push_str(text);
        Ok(text.chars().count())
    }

    fn write_separator(&mut self, text: &str) -> io::Result<usize> {
        self.write(text)
    }

    fn write_wrap(&mut self, wrap: &str) -> io::Result<usize> {
        self.write(wrap)
    }

    fn push_indentation(&mut self, _indent: &str) {
        self.indent_depth += 1;
    }

    fn pop_indentation(&mut self) {
        self.indent_depth -= 1;
    }

    fn push_anchor_point(&mut self) {
        self.anchor_depth += 1;
    }

    fn pop_anchor_point(&mut self) {
        self.anchor_depth -= 1;
    }
}
