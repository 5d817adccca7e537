// HTTP adapter around the ledger core
//
// Routing, JSON encoding and status codes live here; all algorithmic and
// concurrency content stays in the blockchain module.

pub mod handlers;
pub mod routes;

// Re-export main components for easier access
pub use routes::configure_routes;
