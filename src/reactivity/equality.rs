// ============================================================================
// spark-bindables - Equality Functions
// Comparisons usable as a bindable's `EqualsFn`
// ============================================================================
//
// Settlement compares a field with the value it was just set to. Under IEEE
// 754 a NaN never equals itself, so a NaN write would never fire and every
// repeated NaN write would fan out again. Float bindables use the NaN-safe
// forms below instead of `==`.
// ============================================================================

/// Plain `PartialEq` equality, the default for every bindable.
///
/// # Example
/// ```
/// use spark_bindables::reactivity::equality::equals;
///
/// assert!(equals(&42, &42));
/// assert!(!equals(&"left", &"right"));
/// ```
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

macro_rules! nan_safe {
    ($name:ident, $t:ty) => {
        /// Equality where NaN equals NaN. Signed zeroes compare equal.
        pub fn $name(a: &$t, b: &$t) -> bool {
            a == b || (a.is_nan() && b.is_nan())
        }
    };
}

nan_safe!(safe_equals_f64, f64);
nan_safe!(safe_equals_f32, f32);

/// NaN-safe equality for nullable floats.
///
/// ```
/// use spark_bindables::{Bindable, BindableOptions, safe_equals_option_f64};
///
/// let gain = Bindable::with_options(
///     Some(f64::NAN),
///     BindableOptions::new().equals(safe_equals_option_f64),
/// );
/// let changes = std::rc::Rc::new(std::cell::Cell::new(0));
/// let counted = changes.clone();
/// let _sub = gain.on_value_changed(move |_| counted.set(counted.get() + 1));
///
/// gain.set_value(Some(f64::NAN)).unwrap();
/// assert_eq!(changes.get(), 0);
/// ```
pub fn safe_equals_option_f64(a: &Option<f64>, b: &Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => safe_equals_f64(a, b),
        (a, b) => a.is_none() && b.is_none(),
    }
}
