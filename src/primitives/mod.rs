// ============================================================================
// spark-bindables - Primitives Module
// Bindable values: the plain node, numeric policy and leasing
// ============================================================================

pub mod bindable;
pub mod lease;
pub mod number;

// Re-export for convenience
pub use bindable::Bindable;
pub use lease::LeasedBindable;
pub use number::{BindableNumber, Number, NumberOptions};
