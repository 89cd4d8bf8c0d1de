use objkit_core::decl::Code;
use objkit_core::error::Result;
use objkit_core::value::Value;

use crate::class::Class;
use crate::instance::Instance;
use crate::universe::Universe;
use crate::ObjRef;

/// What a body executes against: the declaring class's scope, the receiving
/// object (absent for class-scoped members), and the member being run.
#[derive(Clone)]
pub struct CallContext {
    /// The scope the body executes in (the member's declaring class).
    pub class: ObjRef<Class>,
    /// The receiving object, if any.
    pub object: Option<ObjRef<Instance>>,
    /// The full name of the member being executed.
    pub member: String,
}

/// The seam towards the embedding script host.
///
/// The runtime hands every method body, constructor, destructor and hook to
/// the host for execution and never inspects the body itself. The host may
/// re-enter the universe freely from within `eval`; the runtime's tables are
/// safe to mutate under it.
pub trait Host {
    /// Execute an opaque body in the given context.
    fn eval(
        &self,
        universe: &mut Universe,
        code: &Code,
        ctx: &CallContext,
        args: &[Value],
    ) -> Result<Value>;

    /// An instance's handle was unpublished. Fired exactly once per handle.
    fn handle_removed(&self, _path: &str) {}

    /// An instance's handle moved to a new path.
    fn handle_renamed(&self, _old: &str, _new: &str) {}
}

/// A host that executes every body as a successful no-op.
///
/// Useful for tests and for universes that only ever declare and introspect.
#[derive(Debug, Default)]
pub struct NullHost;

impl Host for NullHost {
    fn eval(
        &self,
        _universe: &mut Universe,
        _code: &Code,
        _ctx: &CallContext,
        _args: &[Value],
    ) -> Result<Value> {
        Ok(Value::Nil)
    }
}
