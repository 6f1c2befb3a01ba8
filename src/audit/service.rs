//! Audit service
//!
//! Ties the correlation engine, the enricher, the classifier and the
//! persisted log together behind the two audit operations.

use log::{debug, info};
use std::sync::Arc;

use super::log::{AuditLog, MAX_RESULTS};
use crate::agent::AgentClassifier;
use crate::common::{AuditError, Result};
use crate::correlation::CorrelationEngine;
use crate::fingerprint::{enrich_record, AuditRecord, ClientAddress, EnrichedAuditRecord, ProtocolNameTables};

/// Audit operations shared by all HTTP handlers
#[derive(Clone)]
pub struct AuditService {
    engine: CorrelationEngine,
    log: Arc<AuditLog>,
    tables: &'static ProtocolNameTables,
    classifier: Arc<dyn AgentClassifier>,
    results_limit: usize,
}

impl AuditService {
    /// Create a service using the standard name tables
    pub fn new(engine: CorrelationEngine, log: Arc<AuditLog>, classifier: Arc<dyn AgentClassifier>) -> Self {
        Self {
            engine,
            log,
            tables: ProtocolNameTables::standard(),
            classifier,
            results_limit: MAX_RESULTS,
        }
    }

    /// Cap applied by [`AuditService::list_results`] when called from the HTTP layer
    pub fn with_results_limit(mut self, limit: usize) -> Self {
        self.results_limit = limit.min(MAX_RESULTS);
        self
    }

    /// Configured result cap
    pub fn results_limit(&self) -> usize {
        self.results_limit
    }

    fn enrich(&self, record: AuditRecord) -> EnrichedAuditRecord {
        let client = self.classifier.classify(&record.user_agent);
        enrich_record(record, self.tables, client)
    }

    /// Correlate a request with its handshake, persist and enrich the result
    ///
    /// # Parameters
    ///
    /// * `address` - Client address of the connection the request arrived on
    /// * `user_agent` - The request's `User-Agent` header, empty if absent
    ///
    /// # Returns
    ///
    /// `None` when no handshake is known for the address; nothing is
    /// persisted in that case
    pub async fn submit_audit(&self, address: ClientAddress, user_agent: String) -> Result<Option<EnrichedAuditRecord>> {
        let record = match self.engine.request_audit(address, user_agent).await? {
            Some(record) => record,
            None => {
                debug!("Audit request from {} without a captured handshake", address);
                return Ok(None);
            }
        };

        let log = Arc::clone(&self.log);
        let persisted = record.clone();
        tokio::task::spawn_blocking(move || log.append(&persisted))
            .await
            .map_err(|e| AuditError::Other(format!("audit log task failed: {}", e)))??;

        info!("Recorded audit for {} ({:?})", address, record.user_agent);
        Ok(Some(self.enrich(record)))
    }

    /// Stored records, oldest first, enriched with the current tables
    ///
    /// # Parameters
    ///
    /// * `limit` - Maximum number of records, clamped to 5000
    pub async fn list_results(&self, limit: usize) -> Result<Vec<EnrichedAuditRecord>> {
        let log = Arc::clone(&self.log);
        let records = tokio::task::spawn_blocking(move || log.read_records(limit))
            .await
            .map_err(|e| AuditError::Other(format!("audit log task failed: {}", e)))??;

        Ok(records.into_iter().map(|record| self.enrich(record)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::UserAgentClassifier;
    use crate::correlation::StoreLimits;
    use crate::fingerprint::HandshakeFingerprint;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_submit_without_handshake_appends_nothing() {
        let dir = tempdir().unwrap();
        let log = Arc::new(AuditLog::open(dir.path()).unwrap());
        let engine = CorrelationEngine::new(16, StoreLimits::default());
        let service = AuditService::new(engine, log.clone(), Arc::new(UserAgentClassifier));

        let addr: ClientAddress = "198.51.100.7:40000".parse().unwrap();
        assert!(service.submit_audit(addr, "UA".to_string()).await.unwrap().is_none());
        assert!(!log.path().exists());
    }

    #[tokio::test]
    async fn test_results_limit_is_clamped() {
        let dir = tempdir().unwrap();
        let log = Arc::new(AuditLog::open(dir.path()).unwrap());
        let engine = CorrelationEngine::new(16, StoreLimits::default());
        let service = AuditService::new(engine, log, Arc::new(UserAgentClassifier)).with_results_limit(10_000);
        assert_eq!(service.results_limit(), MAX_RESULTS);
    }

    #[tokio::test]
    async fn test_list_results_reenriches() {
        let dir = tempdir().unwrap();
        let log = Arc::new(AuditLog::open(dir.path()).unwrap());
        log.append(&AuditRecord {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:63.0) Gecko/20100101 Firefox/63.0".to_string(),
            fingerprint: HandshakeFingerprint {
                cipher_suites: vec![0x1301, 0x9999],
                ..Default::default()
            },
        })
        .unwrap();

        let engine = CorrelationEngine::new(16, StoreLimits::default());
        let service = AuditService::new(engine, log, Arc::new(UserAgentClassifier));
        let results = service.list_results(10).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].names.cipher_suites, vec!["TLS_AES_128_GCM_SHA256", "0x9999"]);
        assert_eq!(results[0].client.as_ref().map(|c| c.browser.as_str()), Some("Firefox"));
    }
}
