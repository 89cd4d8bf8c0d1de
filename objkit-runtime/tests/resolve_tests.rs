mod common;

use std::rc::Rc;

use objkit_core::decl::{ClassKind, Code, MethodDecl, VarDecl};
use objkit_runtime::resolve;

use common::setup_universe;

#[test]
fn spellings_grow_one_scope_at_a_time() {
    assert_eq!(
        resolve::spellings("::a::b::D::m"),
        vec!["m", "D::m", "b::D::m", "a::b::D::m", "::a::b::D::m"]
    );
    assert_eq!(resolve::spellings("::C::x"), vec!["x", "C::x", "::C::x"]);
}

#[test]
fn every_spelling_resolves_to_the_same_member() {
    let (mut universe, _host) = setup_universe();
    let class = universe
        .create_class("::geo::shapes::Circle", ClassKind::Plain)
        .unwrap();
    let method = universe
        .define_method(&class, MethodDecl::new("area", Code::new("area-body")))
        .unwrap();

    for spelling in [
        "area",
        "Circle::area",
        "shapes::Circle::area",
        "geo::shapes::Circle::area",
        "::geo::shapes::Circle::area",
    ] {
        let found = resolve::lookup_method(&class, spelling, universe.epoch())
            .unwrap_or_else(|| panic!("spelling '{}' did not resolve", spelling));
        assert!(Rc::ptr_eq(&found, &method));
    }
}

#[test]
fn nearer_declarations_shadow_on_short_spellings_only() {
    let (mut universe, _host) = setup_universe();
    let base = universe.create_class("A", ClassKind::Plain).unwrap();
    let derived = universe.create_class("B", ClassKind::Plain).unwrap();
    universe.add_base(&derived, &base).unwrap();
    let base_m = universe
        .define_method(&base, MethodDecl::new("m", Code::new("a-m")))
        .unwrap();
    let derived_m = universe
        .define_method(&derived, MethodDecl::new("m", Code::new("b-m")))
        .unwrap();

    let short = resolve::lookup_method(&derived, "m", universe.epoch()).unwrap();
    assert!(Rc::ptr_eq(&short, &derived_m));
    let qualified = resolve::lookup_method(&derived, "A::m", universe.epoch()).unwrap();
    assert!(Rc::ptr_eq(&qualified, &base_m));
    // Seen from the base itself, the short spelling is its own method.
    let from_base = resolve::lookup_method(&base, "m", universe.epoch()).unwrap();
    assert!(Rc::ptr_eq(&from_base, &base_m));
}

#[test]
fn canonical_names_are_least_qualified() {
    let (mut universe, _host) = setup_universe();
    let base = universe.create_class("A", ClassKind::Plain).unwrap();
    let derived = universe.create_class("B", ClassKind::Plain).unwrap();
    universe.add_base(&derived, &base).unwrap();
    universe
        .define_method(&base, MethodDecl::new("m", Code::new("a-m")))
        .unwrap();
    universe
        .define_method(&derived, MethodDecl::new("m", Code::new("b-m")))
        .unwrap();

    assert_eq!(universe.canonical_name("B", "m").unwrap(), "m");
    assert_eq!(universe.canonical_name("B", "::A::m").unwrap(), "A::m");
    assert_eq!(universe.canonical_name("B", "B::m").unwrap(), "m");
}

#[test]
fn diamond_ancestors_contribute_storage_once() {
    let (mut universe, _host) = setup_universe();
    let a = universe.create_class("A", ClassKind::Plain).unwrap();
    let b = universe.create_class("B", ClassKind::Plain).unwrap();
    let c = universe.create_class("C", ClassKind::Plain).unwrap();
    let d = universe.create_class("D", ClassKind::Plain).unwrap();
    universe.add_base(&b, &a).unwrap();
    universe.add_base(&c, &a).unwrap();
    universe.add_base(&d, &b).unwrap();
    universe.add_base(&d, &c).unwrap();
    universe.define_variable(&a, VarDecl::new("shared")).unwrap();

    let order = resolve::slot_order(&d, universe.epoch());
    let shared: Vec<_> = order
        .iter()
        .filter(|variable| variable.name == "shared")
        .collect();
    assert_eq!(shared.len(), 1);

    // Every spelling reads and writes the same slot.
    let (_, short) = resolve::lookup_variable(&d, "shared", universe.epoch()).unwrap();
    let (_, qualified) = resolve::lookup_variable(&d, "A::shared", universe.epoch()).unwrap();
    assert_eq!(short, qualified);
    assert!(short.is_some());
}

#[test]
fn self_reference_occupies_slot_zero() {
    let (mut universe, _host) = setup_universe();
    let base = universe.create_class("A", ClassKind::Composite).unwrap();
    let derived = universe.create_class("B", ClassKind::Plain).unwrap();
    universe.add_base(&derived, &base).unwrap();

    let (_, this_slot) = resolve::lookup_variable(&derived, "this", universe.epoch()).unwrap();
    assert_eq!(this_slot, Some(0));
    let (_, bag_slot) = resolve::lookup_variable(&derived, "options", universe.epoch()).unwrap();
    assert_eq!(bag_slot, Some(1));
    // The derived class's own `this` aliases the same slot.
    let (_, derived_this) =
        resolve::lookup_variable(&derived, "B::this", universe.epoch()).unwrap();
    assert_eq!(derived_this, Some(0));
}

#[test]
fn structure_changes_invalidate_cached_tables() {
    let (mut universe, _host) = setup_universe();
    let base = universe.create_class("A", ClassKind::Plain).unwrap();
    let derived = universe.create_class("B", ClassKind::Plain).unwrap();
    universe.add_base(&derived, &base).unwrap();
    assert!(resolve::lookup_method(&derived, "m", universe.epoch()).is_none());

    universe
        .define_method(&base, MethodDecl::new("m", Code::new("a-m")))
        .unwrap();
    assert!(resolve::lookup_method(&derived, "m", universe.epoch()).is_some());
}

#[test]
fn constructors_never_dispatch_by_name() {
    let (mut universe, _host) = setup_universe();
    let class = universe.create_class("A", ClassKind::Plain).unwrap();
    universe
        .define_method(&class, MethodDecl::constructor(Code::new("a-ctor")))
        .unwrap();
    universe
        .define_method(&class, MethodDecl::destructor(Code::new("a-dtor")))
        .unwrap();
    assert!(resolve::lookup_method(&class, "constructor", universe.epoch()).is_none());
    assert!(resolve::lookup_method(&class, "destructor", universe.epoch()).is_none());
}
