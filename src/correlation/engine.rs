//! Correlation engine
//!
//! A single task owns the [`CorrelationStore`] and processes
//! [`CorrelationMessage`]s in arrival order. Handshake events are offered
//! without waiting; audit requests wait for their answer. Because both travel
//! through the same FIFO channel, a handshake recorded before a request is
//! always visible to it.

use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use super::message::CorrelationMessage;
use super::store::{CorrelationStore, InsertOutcome, StoreLimits};
use crate::common::{AuditError, Result};
use crate::fingerprint::{AuditRecord, ClientAddress, HandshakeFingerprint};
use crate::tls::HandshakeSink;

/// Default channel capacity
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

const MIN_PRUNE_INTERVAL: Duration = Duration::from_secs(1);
const MAX_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Correlation engine handle
///
/// Cheap to clone; every clone talks to the same engine task.
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    sender: mpsc::Sender<CorrelationMessage>,
}

impl CorrelationEngine {
    /// Start a correlation engine on the current tokio runtime
    ///
    /// # Parameters
    ///
    /// * `buffer` - Channel capacity; handshakes arriving while it is full are lost
    /// * `limits` - Expiry and size bounds of the store
    pub fn new(buffer: usize, limits: StoreLimits) -> Self {
        let (sender, receiver) = mpsc::channel(buffer.max(1));

        tokio::spawn(Self::run(receiver, CorrelationStore::new(limits)));

        if let Some(ttl) = limits.ttl {
            let interval = (ttl / 2).clamp(MIN_PRUNE_INTERVAL, MAX_PRUNE_INTERVAL);
            tokio::spawn(Self::prune_ticker(sender.clone(), interval));
        }

        info!(
            "Correlation engine started (buffer {}, ttl {:?}, capacity {:?})",
            buffer, limits.ttl, limits.capacity
        );
        Self { sender }
    }

    /// Run the engine task
    async fn run(mut receiver: mpsc::Receiver<CorrelationMessage>, mut store: CorrelationStore) {
        while let Some(msg) = receiver.recv().await {
            match msg {
                CorrelationMessage::RecordHandshake { address, fingerprint } => {
                    match store.insert(address, fingerprint, Instant::now()) {
                        InsertOutcome::Inserted => debug!("Stored fingerprint for {}", address),
                        InsertOutcome::Kept => {
                            debug!("Fingerprint for {} already stored, keeping the first", address)
                        }
                    }
                }

                CorrelationMessage::RequestAudit { address, user_agent, response } => {
                    let record = store.get(&address, Instant::now()).map(|fingerprint| AuditRecord {
                        user_agent,
                        fingerprint: (*fingerprint).clone(),
                    });
                    if record.is_none() {
                        debug!("No fingerprint stored for {}", address);
                    }
                    let _ = response.send(record);
                }

                CorrelationMessage::Prune => {
                    store.prune(Instant::now());
                }

                CorrelationMessage::Shutdown => {
                    debug!("Correlation engine shutting down");
                    break;
                }
            }
        }

        debug!("Correlation engine stopped");
    }

    async fn prune_ticker(sender: mpsc::Sender<CorrelationMessage>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sender.try_send(CorrelationMessage::Prune) {
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => break,
            }
        }
    }

    /// Offer a captured handshake without waiting
    ///
    /// # Returns
    ///
    /// `false` when the event was lost because the buffer was full or the
    /// engine has stopped
    pub fn record_handshake(&self, address: ClientAddress, fingerprint: HandshakeFingerprint) -> bool {
        match self.sender.try_send(CorrelationMessage::RecordHandshake { address, fingerprint }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Correlation buffer full, handshake from {} lost", address);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Correlation engine stopped, handshake from {} lost", address);
                false
            }
        }
    }

    /// Pair the stored fingerprint for an address with a user-agent
    ///
    /// # Returns
    ///
    /// `None` when no live fingerprint exists for the address
    pub async fn request_audit(&self, address: ClientAddress, user_agent: String) -> Result<Option<AuditRecord>> {
        let (sender, receiver) = oneshot::channel();

        if let Err(e) = self
            .sender
            .send(CorrelationMessage::RequestAudit { address, user_agent, response: sender })
            .await
        {
            warn!("Failed to send RequestAudit message: {}", e);
            return Err(AuditError::ChannelClosed(format!("Failed to send message: {}", e)));
        }

        receiver.await.map_err(|e| {
            warn!("Failed to receive audit result: {}", e);
            AuditError::ChannelClosed(format!("Failed to receive response: {}", e))
        })
    }

    /// Stop the engine task
    pub async fn shutdown(&self) {
        if let Err(e) = self.sender.send(CorrelationMessage::Shutdown).await {
            warn!("Failed to send Shutdown message: {}", e);
        }
    }
}

impl HandshakeSink for CorrelationEngine {
    fn record_handshake(&self, address: ClientAddress, fingerprint: HandshakeFingerprint) -> bool {
        CorrelationEngine::record_handshake(self, address, fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> ClientAddress {
        "203.0.113.5:51000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_record_then_request() {
        let engine = CorrelationEngine::new(16, StoreLimits::default());
        let fingerprint = HandshakeFingerprint {
            cipher_suites: vec![0x1301],
            ..Default::default()
        };

        assert!(engine.record_handshake(addr(), fingerprint.clone()));
        let record = engine.request_audit(addr(), "UA".to_string()).await.unwrap().unwrap();
        assert_eq!(record.user_agent, "UA");
        assert_eq!(record.fingerprint, fingerprint);
    }

    #[tokio::test]
    async fn test_request_without_handshake() {
        let engine = CorrelationEngine::new(16, StoreLimits::default());
        let record = engine.request_audit(addr(), "UA".to_string()).await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_closes_engine() {
        let engine = CorrelationEngine::new(16, StoreLimits::default());
        engine.shutdown().await;

        // The engine task may need a moment to drop the receiver
        let mut result = engine.request_audit(addr(), "UA".to_string()).await;
        for _ in 0..10 {
            if result.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            result = engine.request_audit(addr(), "UA".to_string()).await;
        }
        assert!(matches!(result, Err(AuditError::ChannelClosed(_))));
        assert!(!engine.record_handshake(addr(), HandshakeFingerprint::default()));
    }
}
