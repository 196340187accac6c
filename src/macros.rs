// ============================================================================
// spark-bindables - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// Saves the `let x = x.clone();` preamble when a listener needs handles to
/// other bindables.
///
/// # Usage
///
/// ```rust
/// use spark_bindables::{cloned, Bindable, ValueChangedEvent};
///
/// let celsius = Bindable::new(0.0);
/// let fahrenheit = Bindable::new(32.0);
///
/// let _sub = celsius.on_value_changed(cloned!(fahrenheit => move |e: &ValueChangedEvent<f64>| {
///     fahrenheit.set_value(e.new_value * 9.0 / 5.0 + 32.0).unwrap();
/// }));
///
/// celsius.set_value(100.0).unwrap();
/// assert_eq!(fahrenheit.value(), 212.0);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Bind every following bindable to the first one, stopping at the first
/// error.
///
/// Evaluates to a `spark_bindables::Result<()>`.
///
/// # Usage
///
/// ```rust
/// use spark_bindables::{bind_all, Bindable};
///
/// let master = Bindable::new(1);
/// let a = Bindable::new(0);
/// let b = Bindable::new(0);
///
/// bind_all!(master => a, b).unwrap();
/// master.set_value(9).unwrap();
/// assert_eq!((a.value(), b.value()), (9, 9));
/// ```
#[macro_export]
macro_rules! bind_all {
    ($first:expr => $($rest:expr),+ $(,)?) => {
        {
            let first = &$first;
            let mut result: $crate::Result<()> = Ok(());
            $(
                if result.is_ok() {
                    result = $rest.bind_to(first);
                }
            )+
            result
        }
    };
}
