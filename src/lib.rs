// ============================================================================
// spark-bindables - Bindable Values for Rust
// ============================================================================
//
// Values that stay synchronized with every value they are bound to, with
// change events, disabled propagation, numeric ranges, exclusive leases and
// bound lists. Single-threaded: every type here is !Send.
// ============================================================================

pub mod collections;
pub mod core;
pub mod primitives;
pub mod reactivity;

mod macros;

// Re-export core items at crate root for ergonomic access
pub use crate::core::error::{BindableError, Result};
pub use crate::core::event::{Event, Subscription, ValueChangedEvent};
pub use crate::core::types::{
    BindableOptions, EqualsFn, ParseFn, default_equals, from_str_parser, parse_flag,
};

// Re-export primitives at crate root
pub use primitives::bindable::Bindable;
pub use primitives::lease::LeasedBindable;
pub use primitives::number::{BindableNumber, Number, NumberOptions};

// Re-export reactivity helpers
pub use reactivity::WeakBindingSet;
pub use reactivity::equality::{equals, safe_equals_f32, safe_equals_f64, safe_equals_option_f64};

// Re-export collections
pub use collections::BindableList;

// =============================================================================
// TESTS
// =============================================================================
