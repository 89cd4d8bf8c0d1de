use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use objkit_core::decl::Code;
use objkit_core::error::Result;
use objkit_core::value::Value;
use objkit_runtime::host::{CallContext, Host};
use objkit_runtime::universe::Universe;

pub type Action = Rc<dyn Fn(&mut Universe, &CallContext, &[Value]) -> Result<Value>>;

/// A scripted host: bodies are looked up by their source text and run the
/// registered closure; unscripted bodies just log the member and succeed.
#[derive(Default)]
pub struct TestHost {
    log: RefCell<Vec<String>>,
    actions: RefCell<HashMap<String, Action>>,
}

impl TestHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn on(
        &self,
        source: &str,
        action: impl Fn(&mut Universe, &CallContext, &[Value]) -> Result<Value> + 'static,
    ) {
        self.actions
            .borrow_mut()
            .insert(source.to_string(), Rc::new(action));
    }

    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl Host for TestHost {
    fn eval(
        &self,
        universe: &mut Universe,
        code: &Code,
        ctx: &CallContext,
        args: &[Value],
    ) -> Result<Value> {
        self.log.borrow_mut().push(ctx.member.clone());
        let action = self.actions.borrow().get(code.source()).cloned();
        match action {
            Some(action) => action(universe, ctx, args),
            None => Ok(Value::Nil),
        }
    }

    fn handle_removed(&self, path: &str) {
        self.log.borrow_mut().push(format!("removed {}", path));
    }

    fn handle_renamed(&self, old: &str, new: &str) {
        self.log.borrow_mut().push(format!("renamed {} {}", old, new));
    }
}

/// A universe driven by a fresh `TestHost`, handed back alongside it.
pub fn setup_universe() -> (Universe, Rc<TestHost>) {
    let host = TestHost::new();
    let universe = Universe::new(host.clone() as Rc<dyn Host>);
    (universe, host)
}
