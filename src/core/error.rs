// ============================================================================
// spark-bindables - Errors
// Contract violations raised synchronously by bindables, leases and lists
// ============================================================================

use thiserror::Error;

/// Everything a bindable operation can refuse to do.
///
/// All variants are local and non-retryable. An error raised partway through
/// a fan-out leaves the peers already visited updated and the rest untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindableError {
    /// The value was written while the bindable is disabled.
    #[error("cannot set the value of a disabled bindable")]
    MutationOnDisabled,

    /// A direct write reached a bindable whose graph is under lease.
    #[error("cannot mutate a bindable that is currently leased")]
    MutationOnLeased,

    /// A lease was requested on a graph that already has one.
    #[error("attempted to lease a bindable that is already in a leased state")]
    AlreadyLeased,

    /// A lease was returned twice, by the wrong handle, or never begun.
    #[error("invalid lease state: {0}")]
    InvalidLeaseState(&'static str),

    /// A lease handle was used after it was returned.
    #[error("cannot operate on a leased bindable that has been returned")]
    LeaseExpired,

    /// Two numeric ranges have no overlap.
    #[error("cannot bind numeric ranges with no overlap: [{ours}] and [{theirs}]")]
    IncompatibleRange { ours: String, theirs: String },

    /// A node was bound to itself.
    #[error("a bindable cannot be bound to itself")]
    SelfBinding,

    /// The input is neither the value type nor a string the parser accepts.
    #[error("could not parse {input} into {target}")]
    ParseError { input: String, target: &'static str },

    /// Precision must be strictly positive.
    #[error("precision must be greater than 0, got {0}")]
    InvalidPrecision(String),

    /// A list index is past the end.
    #[error("index {index} is out of bounds for a list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// `reset_to_default` was called before any default was set.
    #[error("no default value has been set")]
    NoDefault,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BindableError>;
