//! Cross-layer correlation
//!
//! Pairs the ClientHello captured during the TLS handshake with the
//! user-agent of a later HTTP request from the same client address.

mod engine;
mod message;
mod store;

pub use engine::{CorrelationEngine, DEFAULT_EVENT_BUFFER};
pub use message::CorrelationMessage;
pub use store::{CorrelationStore, InsertOutcome, StoreLimits};
