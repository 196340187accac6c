// ============================================================================
// spark-bindables - Core Module
// Errors, events and shared types
// ============================================================================

pub mod error;
pub mod event;
pub mod types;

// Re-export commonly used items
pub use error::{BindableError, Result};
pub use event::{Event, Subscription, ValueChangedEvent};
pub use types::{
    BindableOptions, EqualsFn, ParseFn, default_equals, from_str_parser, parse_flag,
};
