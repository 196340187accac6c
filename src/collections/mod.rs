// ============================================================================
// spark-bindables - Bindable Collections
// Lists whose structural edits are replayed across bound peers
// ============================================================================
//
// Scalar bindables settle values; a bound list replays operations instead.
// Every insert, removal or replacement reaches each node of the connected
// graph once, and each node fires its own item events afterwards.
// ============================================================================

mod list;

pub use list::BindableList;
