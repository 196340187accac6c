// ============================================================================
// spark-bindables - Reactivity Module
// Peer registry, settlement and equality used by every bindable
// ============================================================================

pub mod equality;
pub(crate) mod settle;
pub mod weak_set;

pub use weak_set::WeakBindingSet;
