use objkit_runtime::hold::Claims;

#[test]
fn entity_survives_while_claims_are_outstanding() {
    let claims = Claims::new();
    claims.preserve();
    claims.preserve();
    assert!(!claims.mark_eventually_free());
    assert!(!claims.release());
    assert!(!claims.is_disposed());
    assert!(claims.release());
    assert!(claims.is_disposed());
}

#[test]
fn release_without_teardown_mark_never_disposes() {
    let claims = Claims::new();
    claims.preserve();
    assert!(!claims.release());
    assert!(!claims.is_disposed());
    assert_eq!(claims.count(), 0);
}

#[test]
fn marking_with_no_claims_disposes_immediately() {
    let claims = Claims::new();
    assert!(claims.mark_eventually_free());
    assert!(claims.is_disposed());
}

#[test]
fn marking_is_idempotent() {
    let claims = Claims::new();
    claims.preserve();
    assert!(!claims.mark_eventually_free());
    assert!(!claims.mark_eventually_free());
    assert!(claims.is_doomed());
    assert!(claims.release());
}

#[test]
fn disposal_triggers_exactly_once() {
    let claims = Claims::new();
    assert!(claims.mark_eventually_free());
    assert!(!claims.mark_eventually_free());
}

#[test]
#[should_panic(expected = "released an entity with no outstanding claims")]
fn releasing_more_than_preserved_panics() {
    let claims = Claims::new();
    claims.release();
}
