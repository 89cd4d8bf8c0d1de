mod common;

use std::cell::RefCell;
use std::rc::Rc;

use objkit_core::decl::{ClassKind, Code, MethodDecl, VarDecl};
use objkit_core::error::ObjError;
use objkit_core::value::Value;

use common::setup_universe;

/// A `Task` class whose `run` method carries pre and post hook bodies, each
/// scripted to push a marker into the returned trace.
fn setup_task(
    universe: &mut objkit_runtime::universe::Universe,
    host: &common::TestHost,
) -> Rc<RefCell<Vec<&'static str>>> {
    let task = universe.create_class("Task", ClassKind::Plain).unwrap();
    let mut decl = MethodDecl::new("run", Code::new("task-body"));
    decl.pre = Some(Code::new("task-pre"));
    decl.post = Some(Code::new("task-post"));
    universe.define_method(&task, decl).unwrap();

    let trace: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    for (source, marker) in [
        ("task-pre", "pre"),
        ("task-body", "body"),
        ("task-post", "post"),
    ] {
        let trace = trace.clone();
        host.on(source, move |_, _, _| {
            trace.borrow_mut().push(marker);
            Ok(Value::Integer(1))
        });
    }
    trace
}

#[test]
fn pre_and_post_hooks_bracket_the_body() {
    let (mut universe, host) = setup_universe();
    let trace = setup_task(&mut universe, &host);
    universe.instantiate("Task", "t", &[]).unwrap();

    let out = universe.invoke("t", "run", &[]).unwrap();
    assert_eq!(*trace.borrow(), vec!["pre", "body", "post"]);
    // The call's value comes from the body, not from the post hook.
    assert_eq!(out, Value::Integer(1));
}

#[test]
fn failing_pre_hook_aborts_the_call() {
    let (mut universe, host) = setup_universe();
    let trace = setup_task(&mut universe, &host);
    host.on("task-pre", |_, _, _| Err(ObjError::Eval("vetoed".to_string())));
    universe.instantiate("Task", "t", &[]).unwrap();

    assert!(matches!(
        universe.invoke("t", "run", &[]),
        Err(ObjError::Eval(..))
    ));
    assert!(trace.borrow().is_empty());
}

#[test]
fn failing_post_hook_surfaces_after_the_body_ran() {
    let (mut universe, host) = setup_universe();
    let trace = setup_task(&mut universe, &host);
    host.on("task-post", |_, _, _| Err(ObjError::Eval("broke".to_string())));
    universe.instantiate("Task", "t", &[]).unwrap();

    assert!(matches!(
        universe.invoke("t", "run", &[]),
        Err(ObjError::Eval(..))
    ));
    assert_eq!(*trace.borrow(), vec!["pre", "body"]);
}

#[test]
fn update_hook_sees_every_written_value() {
    let (mut universe, host) = setup_universe();
    let counter = universe.create_class("Counter", ClassKind::Plain).unwrap();
    let mut decl = VarDecl::new("count");
    decl.update_hook = Some(Code::new("count-changed"));
    universe.define_variable(&counter, decl).unwrap();

    let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        host.on("count-changed", move |_, ctx, args| {
            assert_eq!(ctx.member, "::Counter::count");
            seen.borrow_mut().push(args[0].clone());
            Ok(Value::Nil)
        });
    }
    universe.instantiate("Counter", "c", &[]).unwrap();

    universe.set_variable("c", "count", Value::Integer(1)).unwrap();
    universe.set_variable("c", "count", Value::Integer(2)).unwrap();
    assert_eq!(*seen.borrow(), vec![Value::Integer(1), Value::Integer(2)]);
}

#[test]
fn update_hook_failure_propagates_after_the_store() {
    let (mut universe, host) = setup_universe();
    let counter = universe.create_class("Counter", ClassKind::Plain).unwrap();
    let mut decl = VarDecl::new("count");
    decl.update_hook = Some(Code::new("count-changed"));
    universe.define_variable(&counter, decl).unwrap();
    host.on("count-changed", |_, _, _| {
        Err(ObjError::Eval("trace failed".to_string()))
    });
    universe.instantiate("Counter", "c", &[]).unwrap();

    assert!(matches!(
        universe.set_variable("c", "count", Value::Integer(7)),
        Err(ObjError::Eval(..))
    ));
    // The write itself landed before the hook ran.
    assert_eq!(
        universe.get_variable("c", "count").unwrap(),
        Value::Integer(7)
    );
}
