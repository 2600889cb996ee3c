//! `DebugTap` (spec.md §4.9): optional event and instruction-trace
//! collection. Every recording method short-circuits on `enabled` so a
//! disabled tap costs one branch per call, never an allocation.

/// One template evaluation: recorded whenever `Interpreter::exec` is
/// entered, whether for the top-level render or a recursive embedded
/// template.
#[derive(Debug, Clone)]
pub struct InterpEvent {
    pub template: String,
    /// Instruction pointer in the *caller's* frame at the point the call
    /// was made (0 for the top-level render).
    pub call_site_ip: usize,
}

/// A per-instruction disassembly trace, collected only when enabled.
#[derive(Debug, Clone, Default)]
pub struct DisasmTrace {
    pub lines: Vec<String>,
}

/// Collects [`InterpEvent`]s and a [`DisasmTrace`] across one top-level
/// render. Mirrors the teacher's own `eprintln!`-based tracer in spirit —
/// a toggleable session object other code calls into — but stores
/// structured records instead of printing immediately, since this crate's
/// embedders may want to inspect events programmatically rather than
/// scrape a log stream.
#[derive(Debug, Default)]
pub struct DebugTap {
    enabled: bool,
    events: Vec<InterpEvent>,
    trace: DisasmTrace,
}

impl DebugTap {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Vec::new(),
            trace: DisasmTrace::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_eval_template(&mut self, template: &str, call_site_ip: usize) {
        if !self.enabled {
            return;
        }
        self.events.push(InterpEvent {
            template: template.to_string(),
            call_site_ip,
        });
    }

    pub fn record_instruction(&mut self, line: impl FnOnce() -> String) {
        if !self.enabled {
            return;
        }
        self.trace.lines.push(line());
    }

    pub fn events(&self) -> &[InterpEvent] {
        &self.events
    }

    pub fn trace(&self) -> &DisasmTrace {
        &self.trace
    }
}
