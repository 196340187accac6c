use spark_bindables::{Bindable, BindableError};
use std::cell::Cell;
use std::rc::Rc;

fn original() -> Bindable<i32> {
    Bindable::new(1)
}

#[test]
fn test_lease_and_return() {
    for revert in [false, true] {
        let original = original();
        let leased = original.begin_lease(revert).unwrap();
        assert_eq!(original.value(), leased.value());

        leased.set_value(2).unwrap();
        assert_eq!(original.value(), 2);
        assert_eq!(leased.value(), 2);

        leased.return_bindable().unwrap();
        assert_eq!(original.value(), if revert { 1 } else { 2 });
    }
}

#[test]
fn test_lease_returned_on_unbind_all() {
    for revert in [false, true] {
        let original = original();
        let leased = original.begin_lease(revert).unwrap();
        leased.set_value(2).unwrap();

        original.unbind_all().unwrap();

        assert_eq!(original.value(), if revert { 1 } else { 2 });
        assert!(leased.is_returned());
        assert!(!original.is_leased());
    }
}

#[test]
fn test_consecutive_leases() {
    let original = original();
    let first = original.begin_lease(false).unwrap();
    first.return_bindable().unwrap();
    let second = original.begin_lease(false).unwrap();
    second.return_bindable().unwrap();
}

#[test]
fn test_modify_after_return_fails() {
    let original = original();
    let leased = original.begin_lease(false).unwrap();
    leased.return_bindable().unwrap();

    assert_eq!(leased.set_value(2), Err(BindableError::LeaseExpired));
    assert_eq!(leased.set_disabled(true), Err(BindableError::LeaseExpired));
    assert!(matches!(
        leased.return_bindable(),
        Err(BindableError::InvalidLeaseState(_))
    ));
}

#[test]
fn test_double_lease_fails() {
    let original = original();
    let _leased = original.begin_lease(false).unwrap();
    assert!(matches!(
        original.begin_lease(false),
        Err(BindableError::AlreadyLeased)
    ));
}

#[test]
fn test_disabled_state_during_lease() {
    let original = original();
    assert!(!original.disabled());

    let leased = original.begin_lease(true).unwrap();
    assert!(original.disabled());
    assert!(leased.disabled());

    assert_eq!(
        original.set_disabled(false),
        Err(BindableError::MutationOnLeased)
    );

    leased.set_disabled(false).unwrap();
    assert!(!leased.disabled());
    assert!(!original.disabled());

    // The origin stays locked for direct writes even once the handle has
    // re-enabled it; values go through the handle.
    assert_eq!(original.set_value(2), Err(BindableError::MutationOnLeased));
    leased.set_value(2).unwrap();
    assert_eq!(original.value(), 2);

    assert_eq!(
        original.set_disabled(true),
        Err(BindableError::MutationOnLeased)
    );
    assert!(!original.disabled());

    leased.set_disabled(true).unwrap();
    assert!(original.disabled());

    leased.return_bindable().unwrap();
    assert!(!original.disabled());
    assert_eq!(original.value(), 1);
}

#[test]
fn test_disabled_change_via_bindings() {
    let original = original();
    let _leased = original.begin_lease(true).unwrap();
    let bound = original.get_bound_copy();

    assert_eq!(
        bound.set_disabled(false),
        Err(BindableError::MutationOnLeased)
    );
    assert!(original.disabled());
}

#[test]
fn test_disabled_change_via_bindings_to_leased() {
    let original = original();
    let changed_state = Rc::new(Cell::new(None));
    let _sub = original.on_disabled_changed({
        let changed_state = changed_state.clone();
        move |disabled| changed_state.set(Some(*disabled))
    });

    let leased = original.begin_lease(true).unwrap();
    let bound = leased.get_bound_copy();

    bound.set_disabled(false).unwrap();

    assert_eq!(changed_state.get(), Some(false));
    assert!(!original.disabled());
}

#[test]
fn test_value_change_via_bindings() {
    let original = original();
    let _leased = original.begin_lease(true).unwrap();
    let bound = original.get_bound_copy();

    assert!(bound.set_value(2).is_err());
    assert_eq!(original.value(), 1);
}

#[test]
fn test_disabled_reverted_after_lease() {
    for revert in [false, true] {
        let original = original();
        original.set_disabled(true).unwrap();

        let fired = Rc::new(Cell::new(false));
        let _sub = original.on_disabled_changed({
            let fired = fired.clone();
            move |_| fired.set(true)
        });

        let leased = original.begin_lease(revert).unwrap();
        leased.return_bindable().unwrap();

        assert!(original.disabled());
        assert!(!fired.get());
    }
}

#[test]
fn test_lease_from_bound_bindable() {
    let original = original();
    let copy = original.get_bound_copy();

    let leased = copy.begin_lease(true).unwrap();

    assert!(matches!(
        original.begin_lease(false),
        Err(BindableError::AlreadyLeased)
    ));
    assert!(matches!(
        copy.begin_lease(false),
        Err(BindableError::AlreadyLeased)
    ));

    leased.set_value(2).unwrap();
    assert_eq!(original.value(), 2);
    assert_eq!(leased.value(), 2);
    assert_eq!(copy.value(), 2);

    let leased_copy = leased.get_bound_copy();
    leased_copy.set_value(3).unwrap();
    assert_eq!(original.value(), 3);
    assert_eq!(leased.value(), 3);
    assert_eq!(copy.value(), 3);

    leased_copy.set_disabled(false).unwrap();
    leased_copy.set_disabled(true).unwrap();

    leased.return_bindable().unwrap();

    original.set_value(1).unwrap();
    assert_eq!(original.value(), 1);
    assert_eq!(copy.value(), 1);
    assert!(!original.disabled());
}

#[test]
fn test_cannot_lease_from_lease() {
    let original = original();
    let leased = original.begin_lease(false).unwrap();
    assert!(matches!(
        leased.begin_lease(false),
        Err(BindableError::AlreadyLeased)
    ));
}

#[test]
fn test_copy_of_lease_cannot_return() {
    let original = original();
    let leased = original.begin_lease(true).unwrap();
    let copy = leased.get_bound_copy();

    assert!(matches!(
        copy.return_bindable(),
        Err(BindableError::InvalidLeaseState(_))
    ));
    assert!(original.is_leased());
}

#[test]
fn test_unbind_all_returns_lease() {
    let original = original();
    let leased = original.begin_lease(true).unwrap();
    leased.unbind_all().unwrap();
    leased.unbind_all().unwrap();

    assert!(!original.is_leased());
    assert!(!original.disabled());
}

#[test]
fn test_lease_survives_dropped_origin() {
    let leased = {
        let original = original();
        original.begin_lease(true).unwrap()
    };

    leased.set_value(5).unwrap();
    leased.return_bindable().unwrap();
    assert!(leased.is_returned());
}

#[test]
fn test_numeric_lease_keeps_range() {
    use spark_bindables::{BindableNumber, NumberOptions};

    let number = BindableNumber::with_options(0i32, NumberOptions::new().min(-5).max(5)).unwrap();
    let leased = number.begin_lease(false).unwrap();

    leased.set_value(50).unwrap();
    assert_eq!(number.value(), 5);
    leased.return_bindable().unwrap();
}
