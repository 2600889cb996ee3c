//! `GroupService`: the out-of-scope collaborator that loads, caches, and
//! looks up templates (spec.md §6). The core only ever consumes this
//! narrow interface; loading, parsing, and caching are the host's problem.

use std::rc::Rc;

use crate::template::{CompiledTemplate, FormalArguments, TemplateInstance, TemplateRef};
use crate::value::Value;

/// Sentinel key used by `PropertyAccessor` to resolve a map's own key under
/// iteration (spec.md §4.3 "map DICT_KEY ... resolution").
pub const DICT_KEY: &str = "key";

/// Sentinel key a map uses for its fallback/"default" entry (spec.md §4.3).
pub const DEFAULT_KEY: &str = "default";

/// Name reported for a template instance whose `CompiledTemplate` could not
/// be resolved and was backfilled with `GroupService::blank`.
pub const BLANK_NAME: &str = "<blank>";

/// Name used in diagnostics when a template's identity is not yet known
/// (e.g. a frame that failed to instantiate).
pub const UNKNOWN_NAME: &str = "<unknown>";

/// Number of positional slots in an options array produced by `OPTIONS`
/// (spec.md §3: "ANCHOR, FORMAT, NULL, SEPARATOR, WRAP").
pub const NUM_OPTIONS: usize = 5;

/// Renders a generic ("POJO") value to text, optionally honoring a format
/// string (spec.md §4.4 `writePOJO`).
pub trait AttributeRenderer {
    fn render(&self, value: &Value, format: Option<&str>, locale: &str) -> String;
}

/// Group/namespace lookup, import resolution, and attribute-renderer
/// registry (spec.md §6). Loading, compiling, and caching templates is
/// entirely the implementor's concern; the core only calls these methods.
pub trait GroupService {
    /// Resolve a template by name within this group, returning its
    /// compiled body. `None` means `NO_SUCH_TEMPLATE` to the caller.
    fn lookup_template(&self, name: &str) -> Option<Rc<CompiledTemplate>>;

    /// Resolve a template by name in the group that originally defined the
    /// *current* template (used by `SUPER_NEW` to call an overridden
    /// template's parent definition). `None` means `NO_IMPORTED_TEMPLATE`.
    fn lookup_imported_template(&self, native_group: &str, name: &str) -> Option<Rc<CompiledTemplate>>;

    /// Factory for a fresh, anonymous instance with no declared formals
    /// (spec.md §6 `createStringTemplate`).
    fn create_string_template(&self) -> TemplateRef;

    /// Look up a renderer for values reported under `type_name` (spec.md
    /// §4.4 `writePOJO`). `None` falls back to `ValueOps::to_string`.
    fn get_attribute_renderer(&self, type_name: &str) -> Option<Rc<dyn AttributeRenderer>>;

    /// Whether this render should emit `DebugTap` events/trace lines.
    fn debug(&self) -> bool;

    /// A stand-in instance pushed in place of a template that failed to
    /// resolve, so rendering can continue after an error is reported
    /// (spec.md §6 `BLANK` sentinel).
    fn blank(&self) -> TemplateRef;
}

/// Look up and instantiate a template by name against `group` (spec.md §6
/// `getInstanceOf`).
///
/// A free function rather than a `GroupService` method: building a
/// `TemplateInstance` requires a shared handle to the group that created
/// it, and a trait method cannot recover `Rc<Self>` from `&self` without
/// requiring every implementor to store its own `Weak<Self>`. Taking the
/// already-owned `Rc<dyn GroupService>` from the call site sidesteps that
/// without weakening the trait's object safety.
pub fn get_instance_of(group: &Rc<dyn GroupService>, name: &str) -> Option<TemplateRef> {
    group
        .lookup_template(name)
        .map(|compiled| TemplateInstance::new(compiled, Rc::clone(group)))
}

/// Look up and instantiate a template by name in `native_group`'s defining
/// group, bound to `group` as its render-time group (spec.md §6 `SUPER_NEW`
/// resolution: "attach result to the active group for rendering").
pub fn get_imported_instance_of(
    group: &Rc<dyn GroupService>,
    native_group: &str,
    name: &str,
) -> Option<TemplateRef> {
    group
        .lookup_imported_template(native_group, name)
        .map(|compiled| TemplateInstance::new(compiled, Rc::clone(group)))
}

/// Instantiate a template and immediately link it to `caller` as its
/// enclosing instance (spec.md §6 `getEmbeddedInstanceOf`), for callers
/// (the `MapEngine`) that need scope-walk resolution to work before the
/// instance is ever passed to `RenderEngine::write_object`. `None` means
/// `name` did not resolve; the caller reports `NoSuchTemplate` and
/// substitutes its own sentinel.
pub fn get_embedded_instance_of(
    group: &Rc<dyn GroupService>,
    caller: &TemplateRef,
    name: &str,
) -> Option<TemplateRef> {
    let t = get_instance_of(group, name)?;
    t.borrow_mut().enclosing_instance = Some(Rc::downgrade(caller));
    Some(t)
}

/// Instantiate `compiled` directly (used by `SUPER_NEW`, whose compiled
/// body is already resolved via `lookup_imported_template`).
pub fn instantiate(group: &Rc<dyn GroupService>, compiled: Rc<CompiledTemplate>) -> TemplateRef {
    TemplateInstance::new(compiled, Rc::clone(group))
}

/// True when `args` declares exactly the formals needed for a sole
/// positional argument binding (spec.md §4.7: zero formals binds to the
/// implicit `it`, one or more bind to the first declared formal).
pub fn declares_formals(args: &FormalArguments) -> bool {
    !args.is_unknown() && !args.is_empty()
}
