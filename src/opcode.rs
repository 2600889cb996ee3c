//! The instruction set (spec.md §4.1).
//!
//! Every opcode is one byte. Operands, when present, are 2-byte
//! big-endian unsigned shorts: string-pool indices, absolute branch
//! targets, option-slot indices, or counts. `MAP`/`ROT_MAP`/`PAR_MAP` take
//! template names off the operand stack rather than as inline operands —
//! the name(s) must be pushed with `LOAD_STR` beforehand; `ROT_MAP`'s and
//! `PAR_MAP`'s `u16` operand is only a count of how many stack entries to
//! pop, never a string-pool index itself.

use std::fmt;

/// A decoded opcode. `#[repr(u8)]` so the numeric value doubles as the
/// encoded byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Operand: u16 string-pool index. Stack: push constant string.
    LoadStr = 0,
    /// Operand: u16 string-pool index (attribute name). Stack: push value
    /// resolved via the enclosing-scope walk (spec.md §4.2).
    LoadAttr = 1,
    /// Operand: u16 string-pool index (attribute name). Stack: push value
    /// from the current instance's local attribute table only.
    LoadLocal = 2,
    /// Operand: u16 string-pool index (property name). Stack: pop
    /// receiver, push resolved property (spec.md §4.3).
    LoadProp = 3,
    /// No operand. Stack: pop property name, pop receiver, push resolved
    /// property.
    LoadPropInd = 4,
    /// Operand: u16 string-pool index (template name). Stack: push new
    /// template instance, or `BLANK` + report `NoSuchTemplate`.
    New = 5,
    /// No operand. Stack: pop template name, push new instance (or
    /// `BLANK` + report).
    NewInd = 6,
    /// Operand: u16 string-pool index (template name), resolved against
    /// the current template's native (defining) group. Stack: push new
    /// instance bound to the active render-time group.
    SuperNew = 7,
    /// Operand: u16 string-pool index (attribute name). Stack: pop value,
    /// pop template, store value under name on template, push template
    /// back.
    StoreAttr = 8,
    /// No operand. Stack: pop value, pop template, bind value as the sole
    /// positional argument (spec.md §4.7), push template back.
    StoreSoleArg = 9,
    /// No operand. Stack: pop template, set its `passThroughAttributes`
    /// flag, push it back.
    SetPassThru = 10,
    /// Operand: u16 option-slot index. Stack: pop value, pop options
    /// array, store value at the slot, push the array back.
    StoreOption = 11,
    /// No operand. Stack: push a fresh `NUM_OPTIONS`-length options array
    /// (all null).
    Options = 12,
    /// No operand. Stack: push a fresh empty list.
    List = 13,
    /// No operand. Stack: pop value, pop list, append, push list back.
    Add = 14,
    /// No operand. Stack: pop value, write it with no options.
    Write = 15,
    /// No operand. Stack: pop options array, pop value, write it honoring
    /// the options (spec.md §4.4 `writeWithOptions`).
    WriteOpt = 16,
    /// No operand. Stack: pop template name (string), pop attribute
    /// value; evaluate a single-template map via `MapEngine::map`
    /// (spec.md §4.5), push the result.
    Map = 17,
    /// Operand: u16 count N. Stack: pop N template names (the first pop
    /// is the last name pushed; reverse to recover declaration order),
    /// pop attribute, per `MapEngine::rot_map` (spec.md §4.5).
    RotMap = 18,
    /// Operand: u16 count N (number of expressions to zip). Stack: pop
    /// template name, then pop N attribute values (again first-popped is
    /// last-pushed), per `MapEngine::par_map` (spec.md §4.5) — zipped
    /// positionally into one template instance's formal arguments per
    /// row.
    ParMap = 19,
    /// Operand: u16 absolute instruction offset. Unconditional jump.
    Br = 20,
    /// Operand: u16 absolute instruction offset. Stack: pop value; jump
    /// if falsy (spec.md §4.6 truthiness).
    Brf = 21,
    /// No operand. Stack: pop value, push its rendered string form
    /// (spec.md §4.6 `toString`).
    ToStr = 22,
    /// No operand. Stack: pop iterable, push its first element (or null).
    First = 23,
    /// No operand. Stack: pop iterable, push its last element (or null).
    Last = 24,
    /// No operand. Stack: pop iterable, push all but the first element.
    Rest = 25,
    /// No operand. Stack: pop iterable, push all but the last element.
    Trunc = 26,
    /// No operand. Stack: pop iterable, push it with null elements
    /// removed.
    Strip = 27,
    /// No operand. Stack: pop iterable, push it in reverse order.
    Reverse = 28,
    /// No operand. Stack: pop iterable, push its element count as `Int`.
    Length = 29,
    /// No operand. Stack: pop string, push it with leading/trailing
    /// whitespace removed.
    Trim = 30,
    /// No operand. Stack: pop string, push its character count as `Int`.
    StrLen = 31,
    /// No operand. Stack: pop value, push its boolean negation.
    Not = 32,
    /// No operand. Stack: pop two values, push their boolean OR.
    Or = 33,
    /// No operand. Stack: pop two values, push their boolean AND.
    And = 34,
    /// Operand: u16 string-pool index (indent text). Push an indentation
    /// level onto the writer.
    Indent = 35,
    /// No operand. Pop the most recently pushed indentation level.
    Dedent = 36,
    /// No operand. Write a line break through the writer, unless the
    /// current line produced no characters and the previous opcode was
    /// neither `NEWLINE` nor `INDENT` — avoids blank lines left over from
    /// indentation-only template text.
    Newline = 37,
    /// No operand. No effect; used by the compiler as a branch-target
    /// placeholder.
    Noop = 38,
    /// No operand. Stack: discard the top value.
    Pop = 39,
}

/// Positional index into an options array created by `OPTIONS` (spec.md
/// §3: "ANCHOR, FORMAT, NULL, SEPARATOR, WRAP").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OptionSlot {
    Anchor = 0,
    Format = 1,
    Null = 2,
    Separator = 3,
    Wrap = 4,
}

impl OptionSlot {
    pub fn from_index(idx: u16) -> Option<Self> {
        match idx {
            0 => Some(OptionSlot::Anchor),
            1 => Some(OptionSlot::Format),
            2 => Some(OptionSlot::Null),
            3 => Some(OptionSlot::Separator),
            4 => Some(OptionSlot::Wrap),
            _ => None,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        use Opcode::*;
        Ok(match byte {
            0 => LoadStr,
            1 => LoadAttr,
            2 => LoadLocal,
            3 => LoadProp,
            4 => LoadPropInd,
            5 => New,
            6 => NewInd,
            7 => SuperNew,
            8 => StoreAttr,
            9 => StoreSoleArg,
            10 => SetPassThru,
            11 => StoreOption,
            12 => Options,
            13 => List,
            14 => Add,
            15 => Write,
            16 => WriteOpt,
            17 => Map,
            18 => RotMap,
            19 => ParMap,
            20 => Br,
            21 => Brf,
            22 => ToStr,
            23 => First,
            24 => Last,
            25 => Rest,
            26 => Trunc,
            27 => Strip,
            28 => Reverse,
            29 => Length,
            30 => Trim,
            31 => StrLen,
            32 => Not,
            33 => Or,
            34 => And,
            35 => Indent,
            36 => Dedent,
            37 => Newline,
            38 => Noop,
            39 => Pop,
            other => return Err(other),
        })
    }
}

impl Opcode {
    /// Byte width of the opcode's own fixed operand (0 or 2). `MAP` takes
    /// no operand at all; `ROT_MAP`/`PAR_MAP`'s 2-byte operand is only a
    /// count of stack entries to pop, never a string-pool index.
    pub fn operand_width(self) -> usize {
        use Opcode::*;
        match self {
            LoadStr | LoadAttr | LoadLocal | LoadProp | New | SuperNew | StoreAttr
            | StoreOption | RotMap | ParMap | Br | Brf | Indent => 2,
            LoadPropInd | NewInd | StoreSoleArg | SetPassThru | Options | List | Add | Write
            | WriteOpt | Map | ToStr | First | Last | Rest | Trunc | Strip | Reverse | Length
            | Trim | StrLen | Not | Or | And | Dedent | Newline | Noop | Pop => 0,
        }
    }
}
