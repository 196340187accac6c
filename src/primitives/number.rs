// ============================================================================
// spark-bindables - Numeric Bindables
// Range, precision and merge policy layered over Bindable<T>
// ============================================================================
//
// A BindableNumber is a plain Bindable whose node carries a NumericConstraint.
// Public writes are clamped to [min, max] and, when a precision other than the
// type's default is set, rounded to the nearest multiple of it. Writes that
// arrive from peers are taken as-is.
//
// min, max and precision each settle exactly like the value does, but only
// numeric peers take part in their fan-out.
// ============================================================================

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::str::FromStr;

use crate::core::error::{BindableError, Result};
use crate::core::event::{Event, Subscription};
use crate::core::types::{BindableOptions, from_str_parser};
use crate::primitives::bindable::{Bindable, Constraint, Node};
use crate::reactivity::equality::{safe_equals_f32, safe_equals_f64};
use crate::reactivity::settle::Settlement;

// =============================================================================
// NUMBER
// =============================================================================

/// Primitive numeric types a [`BindableNumber`] can hold.
pub trait Number: Copy + PartialOrd + fmt::Debug + fmt::Display + FromStr + Default + 'static {
    const ZERO: Self;
    const MIN: Self;
    const MAX: Self;
    /// The finest step representable; values are not rounded at this
    /// precision.
    const DEFAULT_PRECISION: Self;

    fn to_f64(self) -> f64;

    /// Convert, saturating at the type's bounds (NaN becomes zero for
    /// integers).
    fn from_f64(value: f64) -> Self;

    /// Addition that saturates for integers.
    fn plus(self, other: Self) -> Self;

    /// Round to the nearest multiple of a positive `step`, halves away from
    /// zero. Integers round exactly and saturate at the type's bounds.
    fn round_to(self, step: Self) -> Self;

    /// Equality used for settlement. NaN equals NaN.
    fn equals(a: &Self, b: &Self) -> bool;
}

macro_rules! impl_integer {
    ($($t:ty),* $(,)?) => {$(
        impl Number for $t {
            const ZERO: Self = 0;
            const MIN: Self = <$t>::MIN;
            const MAX: Self = <$t>::MAX;
            const DEFAULT_PRECISION: Self = 1;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn plus(self, other: Self) -> Self {
                self.saturating_add(other)
            }

            fn round_to(self, step: Self) -> Self {
                let (value, step) = (self as i128, step as i128);
                let mut quotient = value / step;
                let remainder = value % step;
                if 2 * remainder.abs() >= step {
                    quotient += value.signum();
                }
                let rounded = quotient * step;
                <$t>::try_from(rounded).unwrap_or(if rounded < 0 { <$t>::MIN } else { <$t>::MAX })
            }

            fn equals(a: &Self, b: &Self) -> bool {
                a == b
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($t:ty => $eq:path),* $(,)?) => {$(
        impl Number for $t {
            const ZERO: Self = 0.0;
            const MIN: Self = -<$t>::MAX;
            const MAX: Self = <$t>::MAX;
            const DEFAULT_PRECISION: Self = <$t>::from_bits(1);

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn plus(self, other: Self) -> Self {
                self + other
            }

            fn round_to(self, step: Self) -> Self {
                let step = step as f64;
                ((self as f64 / step).round() * step) as $t
            }

            fn equals(a: &Self, b: &Self) -> bool {
                $eq(a, b)
            }
        }
    )*};
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_float!(f32 => safe_equals_f32, f64 => safe_equals_f64);

fn larger<T: Number>(a: T, b: T) -> T {
    if a > b { a } else { b }
}

fn smaller<T: Number>(a: T, b: T) -> T {
    if a < b { a } else { b }
}

fn format_range<T: Number>(min: T, max: T) -> String {
    format!("{min} - {max}")
}

// =============================================================================
// NUMERIC CONSTRAINT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeField {
    Min,
    Max,
    Precision,
}

pub(crate) struct NumericConstraint<T: Number> {
    min: Cell<T>,
    max: Cell<T>,
    precision: Cell<T>,
    min_changed: Event<T>,
    max_changed: Event<T>,
    precision_changed: Event<T>,
}

impl<T: Number> NumericConstraint<T> {
    fn new(min: T, max: T, precision: T) -> Self {
        Self {
            min: Cell::new(min),
            max: Cell::new(max),
            precision: Cell::new(precision),
            min_changed: Event::new(),
            max_changed: Event::new(),
            precision_changed: Event::new(),
        }
    }

    fn copy(&self) -> Self {
        Self::new(self.min.get(), self.max.get(), self.precision.get())
    }

    fn cell(&self, field: RangeField) -> &Cell<T> {
        match field {
            RangeField::Min => &self.min,
            RangeField::Max => &self.max,
            RangeField::Precision => &self.precision,
        }
    }

    fn event(&self, field: RangeField) -> &Event<T> {
        match field {
            RangeField::Min => &self.min_changed,
            RangeField::Max => &self.max_changed,
            RangeField::Precision => &self.precision_changed,
        }
    }

    fn range(&self) -> String {
        format_range(self.min.get(), self.max.get())
    }
}

impl<T: Number> Constraint<T> for NumericConstraint<T> {
    fn constrain(&self, value: T) -> T {
        let clamped = larger(self.min.get(), smaller(self.max.get(), value));
        let precision = self.precision.get();
        if T::equals(&precision, &T::DEFAULT_PRECISION) {
            return clamped;
        }
        clamped.round_to(precision)
    }

    fn duplicate(&self) -> Rc<dyn Constraint<T>> {
        Rc::new(self.copy())
    }

    fn merge_from(&self, node: &Rc<Node<T>>, other: &dyn Constraint<T>) -> Result<()> {
        let Some(theirs) = other.as_any().downcast_ref::<NumericConstraint<T>>() else {
            return Ok(());
        };

        let precision = larger(self.precision.get(), theirs.precision.get());
        let min = larger(self.min.get(), theirs.min.get());
        let max = smaller(self.max.get(), theirs.max.get());
        if min > max {
            return Err(BindableError::IncompatibleRange {
                ours: self.range(),
                theirs: theirs.range(),
            });
        }

        assign_field(node, RangeField::Precision, precision, None)?;
        assign_field(node, RangeField::Min, min, None)?;
        assign_field(node, RangeField::Max, max, None)
    }

    fn trigger_change(&self) {
        for field in [RangeField::Precision, RangeField::Min, RangeField::Max] {
            self.event(field).emit(&self.cell(field).get());
        }
    }

    fn clear_listeners(&self) {
        self.min_changed.clear();
        self.max_changed.clear();
        self.precision_changed.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn numeric_of<T: Number>(node: &Node<T>) -> Option<&NumericConstraint<T>> {
    node.constraint
        .as_deref()?
        .as_any()
        .downcast_ref::<NumericConstraint<T>>()
}

/// Set one range field on `node` and settle it across numeric peers. Peers
/// without a numeric constraint are skipped.
fn assign_field<T: Number>(
    node: &Rc<Node<T>>,
    field: RangeField,
    value: T,
    source: Option<&Rc<Node<T>>>,
) -> Result<()> {
    let Some(numeric) = numeric_of(node) else {
        return Ok(());
    };
    let cell = numeric.cell(field);
    if T::equals(&cell.get(), &value) {
        return Ok(());
    }
    cell.set(value);

    Settlement::new(&node.peers, source, value).run(
        |peer, value| assign_field(peer, field, *value, Some(node)),
        || cell.get(),
        T::equals,
        |settled| numeric.event(field).emit(&settled),
    )
}

// =============================================================================
// NUMBER OPTIONS
// =============================================================================

/// Options for creating a [`BindableNumber`]. Unset fields fall back to the
/// type's full range, its default precision and a default value of zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberOptions<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub precision: Option<T>,
    pub default: Option<T>,
}

impl<T: Number> NumberOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: T) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: T) -> Self {
        self.max = Some(max);
        self
    }

    pub fn precision(mut self, precision: T) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn default_value(mut self, default: T) -> Self {
        self.default = Some(default);
        self
    }
}

// =============================================================================
// BINDABLE NUMBER
// =============================================================================

/// A numeric bindable with a range and a precision.
///
/// Derefs to [`Bindable`], so `value`, `set_value`, `bind_to`, leasing and the
/// event API all work directly. Binding one number to another narrows the
/// bound side to the intersection of both ranges.
///
/// # Example
///
/// ```
/// use spark_bindables::{BindableNumber, NumberOptions};
///
/// let opacity = BindableNumber::with_options(
///     1.0,
///     NumberOptions::new().min(0.0).max(1.0).precision(0.25),
/// )
/// .unwrap();
///
/// opacity.set_value(0.6).unwrap();
/// assert_eq!(opacity.value(), 0.5);
///
/// opacity.set_value(7.0).unwrap();
/// assert_eq!(opacity.value(), 1.0);
/// ```
pub struct BindableNumber<T: Number> {
    bindable: Bindable<T>,
    numeric: Rc<NumericConstraint<T>>,
}

impl<T: Number> BindableNumber<T> {
    /// Create a number with the full range of `T` and default precision.
    pub fn new(value: T) -> Self {
        let numeric = Rc::new(NumericConstraint::new(T::MIN, T::MAX, T::DEFAULT_PRECISION));
        Self::build(value, T::ZERO, numeric)
    }

    /// Create a number with a configured range, precision or default.
    ///
    /// Fails with `InvalidPrecision` for a non-positive precision and
    /// `IncompatibleRange` when `min > max`.
    pub fn with_options(value: T, options: NumberOptions<T>) -> Result<Self> {
        let min = options.min.unwrap_or(T::MIN);
        let max = options.max.unwrap_or(T::MAX);
        let precision = options.precision.unwrap_or(T::DEFAULT_PRECISION);

        check_precision(precision)?;
        if min > max {
            return Err(BindableError::IncompatibleRange {
                ours: format_range(min, max),
                theirs: format_range(T::MIN, T::MAX),
            });
        }

        let numeric = Rc::new(NumericConstraint::new(min, max, precision));
        Ok(Self::build(value, options.default.unwrap_or(T::ZERO), numeric))
    }

    fn build(value: T, default: T, numeric: Rc<NumericConstraint<T>>) -> Self {
        let options = BindableOptions::new()
            .default_value(default)
            .equals(T::equals)
            .parser(from_str_parser::<T>);
        let constraint: Rc<dyn Constraint<T>> = numeric.clone();
        let node = Node::new(value, options, Some(constraint), None);
        Self {
            bindable: Bindable::from_node(node),
            numeric,
        }
    }

    pub fn as_bindable(&self) -> &Bindable<T> {
        &self.bindable
    }

    // =========================================================================
    // VALUE HELPERS
    // =========================================================================

    /// Set the value from an `f64`, converting with saturation.
    pub fn set_from_f64(&self, value: f64) -> Result<()> {
        self.bindable.set_value(T::from_f64(value))
    }

    /// Add `delta` to the current value.
    pub fn add(&self, delta: T) -> Result<()> {
        self.bindable.set_value(self.value().plus(delta))
    }

    /// Set the value to `min + (max - min) * fraction`, optionally snapped to a
    /// multiple of `snap` (ignored when not positive).
    pub fn set_proportional(&self, fraction: f64, snap: f64) -> Result<()> {
        let min = self.min_value().to_f64();
        let max = self.max_value().to_f64();
        let mut value = min + (max - min) * fraction;
        if snap > 0.0 {
            value = (value / snap).round() * snap;
        }
        self.set_from_f64(value)
    }

    // =========================================================================
    // RANGE AND PRECISION
    // =========================================================================

    pub fn min_value(&self) -> T {
        self.numeric.min.get()
    }

    pub fn max_value(&self) -> T {
        self.numeric.max.get()
    }

    pub fn precision(&self) -> T {
        self.numeric.precision.get()
    }

    /// Set the lower bound and propagate it to numeric peers. The current
    /// value is not re-clamped.
    pub fn set_min_value(&self, min: T) -> Result<()> {
        if min > self.max_value() {
            return Err(BindableError::IncompatibleRange {
                ours: self.numeric.range(),
                theirs: format_range(min, self.max_value()),
            });
        }
        assign_field(&self.bindable.inner, RangeField::Min, min, None)
    }

    /// Set the upper bound and propagate it to numeric peers.
    pub fn set_max_value(&self, max: T) -> Result<()> {
        if max < self.min_value() {
            return Err(BindableError::IncompatibleRange {
                ours: self.numeric.range(),
                theirs: format_range(self.min_value(), max),
            });
        }
        assign_field(&self.bindable.inner, RangeField::Max, max, None)
    }

    /// Set the rounding step and propagate it to numeric peers.
    pub fn set_precision(&self, precision: T) -> Result<()> {
        if T::equals(&precision, &self.precision()) {
            return Ok(());
        }
        check_precision(precision)?;
        assign_field(&self.bindable.inner, RangeField::Precision, precision, None)
    }

    pub fn on_min_value_changed(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.numeric.min_changed.subscribe(listener)
    }

    pub fn on_max_value_changed(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.numeric.max_changed.subscribe(listener)
    }

    pub fn on_precision_changed(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.numeric.precision_changed.subscribe(listener)
    }

    /// True if the range is narrower than the full range of `T`.
    pub fn has_defined_range(&self) -> bool {
        !T::equals(&self.min_value(), &T::MIN) || !T::equals(&self.max_value(), &T::MAX)
    }

    /// True if the precision is a whole number.
    pub fn is_integer(&self) -> bool {
        self.precision().to_f64().fract() == 0.0
    }

    // =========================================================================
    // COPIES
    // =========================================================================

    /// A new number with the same range and precision, bound to this one.
    pub fn get_bound_copy(&self) -> BindableNumber<T> {
        let copy = self.get_unbound_copy();
        copy.bindable.inner.link(&self.bindable.inner);
        copy
    }

    /// A new number with the same state, bound to nothing.
    pub fn get_unbound_copy(&self) -> BindableNumber<T> {
        let numeric = Rc::new(self.numeric.copy());
        let constraint: Rc<dyn Constraint<T>> = numeric.clone();
        BindableNumber {
            bindable: Bindable::from_node(self.bindable.inner.copy(Some(constraint))),
            numeric,
        }
    }
}

fn check_precision<T: Number>(precision: T) -> Result<()> {
    if precision.to_f64() <= 0.0 {
        return Err(BindableError::InvalidPrecision(precision.to_string()));
    }
    Ok(())
}

impl<T: Number> Deref for BindableNumber<T> {
    type Target = Bindable<T>;

    fn deref(&self) -> &Self::Target {
        &self.bindable
    }
}

impl<T: Number> Clone for BindableNumber<T> {
    fn clone(&self) -> Self {
        Self {
            bindable: self.bindable.clone(),
            numeric: self.numeric.clone(),
        }
    }
}

impl<T: Number> Default for BindableNumber<T> {
    fn default() -> Self {
        Self::new(T::ZERO)
    }
}

impl<T: Number> fmt::Debug for BindableNumber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindableNumber")
            .field("value", &self.value())
            .field("min", &self.min_value())
            .field("max", &self.max_value())
            .field("precision", &self.precision())
            .field("disabled", &self.disabled())
            .finish()
    }
}

impl<T: Number> fmt::Display for BindableNumber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value(), f)
    }
}
