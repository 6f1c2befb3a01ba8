//! Server module
//!
//! TLS listener, per-connection handling and the HTTP routes.

mod handler;
mod routes;
#[allow(clippy::module_inception)]
mod server;

pub use handler::{handle_capture_connection, handle_connection};
pub use routes::{create_router, AUDIT_PATH, RESULTS_PATH};
pub use server::AuditServer;
