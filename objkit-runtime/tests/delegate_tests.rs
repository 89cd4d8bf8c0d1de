mod common;

use std::cell::RefCell;
use std::rc::Rc;

use objkit_core::decl::{
    ClassKind, Code, ComponentDecl, DelegationDecl, MethodDecl, OptionDecl,
};
use objkit_core::error::ObjError;
use objkit_core::value::Value;

use common::setup_universe;

/// An `Engine` class with a recording `start` method, plus a `Car` class
/// carrying an `engine` component slot.
fn setup_car(
    universe: &mut objkit_runtime::universe::Universe,
    host: &common::TestHost,
) -> Rc<RefCell<Vec<Vec<Value>>>> {
    let engine = universe.create_class("Engine", ClassKind::Plain).unwrap();
    universe
        .define_method(&engine, MethodDecl::new("start", Code::new("engine-start")))
        .unwrap();
    let calls: Rc<RefCell<Vec<Vec<Value>>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = calls.clone();
    host.on("engine-start", move |_, _, args| {
        seen.borrow_mut().push(args.to_vec());
        Ok(Value::string("started"))
    });

    let car = universe.create_class("Car", ClassKind::Plain).unwrap();
    universe
        .define_component(
            &car,
            ComponentDecl {
                name: "engine".to_string(),
                inherit: true,
            },
        )
        .unwrap();
    calls
}

#[test]
fn exact_delegation_forwards_to_the_bound_component() {
    let (mut universe, host) = setup_universe();
    let calls = setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    universe
        .define_delegation(&car, DelegationDecl::method("start", "engine"))
        .unwrap();

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();
    universe.bind_component("car", "engine", Some("eng")).unwrap();

    let result = universe
        .invoke("car", "start", &[Value::Integer(2)])
        .unwrap();
    assert_eq!(result, Value::string("started"));
    assert_eq!(*calls.borrow(), vec![vec![Value::Integer(2)]]);
}

#[test]
fn forwarding_through_an_unbound_slot_fails() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    universe
        .define_delegation(&car, DelegationDecl::method("start", "engine"))
        .unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();

    assert!(matches!(
        universe.invoke("car", "start", &[]),
        Err(ObjError::UnboundComponent { .. })
    ));
}

#[test]
fn a_declared_method_beats_any_delegation() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    universe
        .define_delegation(&car, DelegationDecl::all_methods("engine", Vec::new()))
        .unwrap();
    universe
        .define_method(&car, MethodDecl::new("start", Code::new("car-start")))
        .unwrap();

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();
    universe.bind_component("car", "engine", Some("eng")).unwrap();

    universe.invoke("car", "start", &[]).unwrap();
    assert!(host.entries().iter().any(|entry| entry == "::Car::start"));
    assert!(!host.entries().iter().any(|entry| entry == "::Engine::start"));
}

#[test]
fn an_exact_rule_beats_a_wildcard_in_the_same_class() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    universe
        .define_component(
            &car,
            ComponentDecl {
                name: "backup".to_string(),
                inherit: true,
            },
        )
        .unwrap();
    universe
        .define_delegation(&car, DelegationDecl::all_methods("backup", Vec::new()))
        .unwrap();
    universe
        .define_delegation(&car, DelegationDecl::method("start", "engine"))
        .unwrap();

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Engine", "spare", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();
    universe.bind_component("car", "engine", Some("eng")).unwrap();
    universe
        .bind_component("car", "backup", Some("spare"))
        .unwrap();

    universe.invoke("car", "start", &[]).unwrap();
    // The wildcard's target never saw the call.
    let engine_runs = host
        .entries()
        .iter()
        .filter(|entry| entry.as_str() == "::Engine::start")
        .count();
    assert_eq!(engine_runs, 1);
}

#[test]
fn wildcard_exceptions_are_not_forwarded() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    let rule = DelegationDecl::all_methods("engine", vec!["ping".to_string()]);
    universe.define_delegation(&car, rule).unwrap();

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();
    universe.bind_component("car", "engine", Some("eng")).unwrap();

    universe.invoke("car", "start", &[]).unwrap();
    assert!(matches!(
        universe.invoke("car", "ping", &[]),
        Err(ObjError::NoSuchMember { .. })
    ));
}

#[test]
fn the_substitution_name_replaces_the_forwarded_name() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    let mut rule = DelegationDecl::method("go", "engine");
    rule.to_name = Some("start".to_string());
    universe.define_delegation(&car, rule).unwrap();

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();
    universe.bind_component("car", "engine", Some("eng")).unwrap();

    assert_eq!(
        universe.invoke("car", "go", &[]).unwrap(),
        Value::string("started")
    );
}

#[test]
fn templates_rewrite_the_outgoing_message() {
    let (mut universe, host) = setup_universe();
    let calls = setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    let mut rule = DelegationDecl::method("kick", "engine");
    rule.template = Some("start %n %c".to_string());
    universe.define_delegation(&car, rule).unwrap();

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();
    universe.bind_component("car", "engine", Some("eng")).unwrap();

    universe
        .invoke("car", "kick", &[Value::Integer(3)])
        .unwrap();
    // Template words lead, the original arguments trail.
    assert_eq!(
        *calls.borrow(),
        vec![vec![
            Value::string("car"),
            Value::string("::eng"),
            Value::Integer(3),
        ]]
    );
}

#[test]
fn bad_templates_fail_at_declaration_time() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let car = universe.find_class("Car").unwrap();
    let mut rule = DelegationDecl::method("kick", "engine");
    rule.template = Some("start %z".to_string());
    assert!(matches!(
        universe.define_delegation(&car, rule),
        Err(ObjError::InvalidTemplate { .. })
    ));
}

#[test]
fn delegating_through_an_undeclared_component_is_rejected() {
    let (mut universe, _host) = setup_universe();
    let car = universe.create_class("Car", ClassKind::Plain).unwrap();
    assert!(matches!(
        universe.define_delegation(&car, DelegationDecl::method("start", "missing")),
        Err(ObjError::NoSuchMember { .. })
    ));
}

#[test]
fn rebinding_redirects_future_forwards() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    let engine = universe.find_class("Engine").unwrap();
    universe
        .define_method(&engine, MethodDecl::new("id", Code::new("engine-id")))
        .unwrap();
    host.on("engine-id", |_, ctx, _| {
        Ok(Value::string(
            ctx.object.as_ref().unwrap().borrow().name.clone(),
        ))
    });
    let car = universe.find_class("Car").unwrap();
    universe
        .define_delegation(&car, DelegationDecl::method("id", "engine"))
        .unwrap();

    universe.instantiate("Engine", "eng1", &[]).unwrap();
    universe.instantiate("Engine", "eng2", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();

    universe.bind_component("car", "engine", Some("eng1")).unwrap();
    assert_eq!(
        universe.invoke("car", "id", &[]).unwrap(),
        Value::string("::eng1")
    );
    universe.bind_component("car", "engine", Some("eng2")).unwrap();
    assert_eq!(
        universe.invoke("car", "id", &[]).unwrap(),
        Value::string("::eng2")
    );
    universe.bind_component("car", "engine", None).unwrap();
    assert!(matches!(
        universe.invoke("car", "id", &[]),
        Err(ObjError::UnboundComponent { .. })
    ));
}

#[test]
fn private_slots_are_bindable_from_the_declaring_class_only() {
    let (mut universe, host) = setup_universe();
    universe.create_class("Engine", ClassKind::Plain).unwrap();
    let car = universe.create_class("Car", ClassKind::Plain).unwrap();
    universe
        .define_component(
            &car,
            ComponentDecl {
                name: "engine".to_string(),
                inherit: false,
            },
        )
        .unwrap();
    universe
        .define_method(&car, MethodDecl::new("install", Code::new("install")))
        .unwrap();
    host.on("install", |universe, ctx, args| {
        let handle = ctx.object.as_ref().unwrap().borrow().name.clone();
        let target = args[0].as_str().unwrap().to_string();
        universe.bind_component(&handle, "engine", Some(&target))?;
        Ok(Value::Nil)
    });

    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();

    assert!(matches!(
        universe.bind_component("car", "engine", Some("eng")),
        Err(ObjError::AccessDenied { .. })
    ));
    universe
        .invoke("car", "install", &[Value::string("eng")])
        .unwrap();
}

#[test]
fn local_options_configure_and_report() {
    let (mut universe, _host) = setup_universe();
    let widget = universe.create_class("Widget", ClassKind::Composite).unwrap();
    universe
        .define_option(
            &widget,
            OptionDecl::new("color", Some(Value::string("black"))),
        )
        .unwrap();
    universe
        .define_option(&widget, OptionDecl::new("width", None))
        .unwrap();

    universe.instantiate("Widget", "w", &[]).unwrap();
    assert_eq!(
        universe.cget("w", "color").unwrap(),
        Value::string("black")
    );
    universe
        .configure("w", "color", Value::string("red"))
        .unwrap();
    assert_eq!(universe.cget("w", "color").unwrap(), Value::string("red"));
    assert_eq!(
        universe.configure_report("w").unwrap(),
        vec![
            ("color".to_string(), Value::string("red")),
            ("width".to_string(), Value::Nil),
        ]
    );
}

#[test]
fn option_hooks_vet_and_react() {
    let (mut universe, host) = setup_universe();
    let widget = universe.create_class("Widget", ClassKind::Composite).unwrap();
    let mut option = OptionDecl::new("width", Some(Value::Integer(10)));
    option.validate_hook = Some(Code::new("vet-width"));
    option.config_hook = Some(Code::new("apply-width"));
    universe.define_option(&widget, option).unwrap();
    host.on("vet-width", |_, _, args| match &args[0] {
        Value::Integer(width) if *width > 0 => Ok(Value::Nil),
        _ => Err(ObjError::Eval("width must be positive".to_string())),
    });

    universe.instantiate("Widget", "w", &[]).unwrap();
    assert!(universe.configure("w", "width", Value::Integer(-3)).is_err());
    assert_eq!(universe.cget("w", "width").unwrap(), Value::Integer(10));

    universe.configure("w", "width", Value::Integer(25)).unwrap();
    assert_eq!(universe.cget("w", "width").unwrap(), Value::Integer(25));
    assert!(host
        .entries()
        .iter()
        .any(|entry| entry == "::Widget::width"));
}

#[test]
fn unknown_options_chase_delegation() {
    let (mut universe, _host) = setup_universe();
    let inner = universe.create_class("Inner", ClassKind::Composite).unwrap();
    universe
        .define_option(&inner, OptionDecl::new("depth", Some(Value::Integer(1))))
        .unwrap();
    let outer = universe.create_class("Outer", ClassKind::Composite).unwrap();
    universe
        .define_component(
            &outer,
            ComponentDecl {
                name: "core".to_string(),
                inherit: true,
            },
        )
        .unwrap();
    universe
        .define_delegation(&outer, DelegationDecl::option("depth", "core"))
        .unwrap();

    universe.instantiate("Inner", "in", &[]).unwrap();
    universe.instantiate("Outer", "out", &[]).unwrap();
    universe.bind_component("out", "core", Some("in")).unwrap();

    assert_eq!(universe.cget("out", "depth").unwrap(), Value::Integer(1));
    universe
        .configure("out", "depth", Value::Integer(4))
        .unwrap();
    assert_eq!(universe.cget("in", "depth").unwrap(), Value::Integer(4));
    assert!(matches!(
        universe.cget("out", "missing"),
        Err(ObjError::NoSuchMember { .. })
    ));
}

#[test]
fn binding_report_tracks_each_slot() {
    let (mut universe, host) = setup_universe();
    setup_car(&mut universe, &host);
    universe.instantiate("Engine", "eng", &[]).unwrap();
    universe.instantiate("Car", "car", &[]).unwrap();

    assert_eq!(
        universe.component_bindings("car").unwrap(),
        vec![("engine".to_string(), None)]
    );
    universe.bind_component("car", "engine", Some("eng")).unwrap();
    assert_eq!(
        universe.component_bindings("car").unwrap(),
        vec![("engine".to_string(), Some("::eng".to_string()))]
    );
    universe.bind_component("car", "engine", None).unwrap();
    assert_eq!(
        universe.component_bindings("car").unwrap(),
        vec![("engine".to_string(), None)]
    );
}

#[test]
fn mutually_delegating_objects_report_a_loop() {
    let (mut universe, _host) = setup_universe();
    let node = universe.create_class("Node", ClassKind::Plain).unwrap();
    universe
        .define_component(
            &node,
            ComponentDecl {
                name: "peer".to_string(),
                inherit: true,
            },
        )
        .unwrap();
    universe
        .define_delegation(&node, DelegationDecl::all_methods("peer", Vec::new()))
        .unwrap();

    universe.instantiate("Node", "n1", &[]).unwrap();
    universe.instantiate("Node", "n2", &[]).unwrap();
    universe.bind_component("n1", "peer", Some("n2")).unwrap();
    universe.bind_component("n2", "peer", Some("n1")).unwrap();

    assert!(matches!(
        universe.invoke("n1", "ping", &[]),
        Err(ObjError::DelegationLoop { .. })
    ));
    // The chase unwinds cleanly, so a terminating forward still works.
    universe.bind_component("n2", "peer", None).unwrap();
    assert!(matches!(
        universe.invoke("n1", "ping", &[]),
        Err(ObjError::UnboundComponent { .. })
    ));
}
