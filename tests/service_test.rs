//! Audit service tests
//!
//! Drive the service the way the HTTP handlers do, with a handshake
//! recorded through the sink the TLS observer uses.

use browser_tls_audit::agent::UserAgentClassifier;
use browser_tls_audit::audit::{AuditLog, AuditService, MAX_RESULTS};
use browser_tls_audit::correlation::{CorrelationEngine, StoreLimits};
use browser_tls_audit::fingerprint::{ClientAddress, HandshakeFingerprint};
use browser_tls_audit::tls::HandshakeSink;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const FIREFOX_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:63.0) Gecko/20100101 Firefox/63.0";

fn setup() -> (TempDir, Arc<AuditLog>, CorrelationEngine, AuditService) {
    let dir = tempdir().unwrap();
    let log = Arc::new(AuditLog::open(dir.path()).unwrap());
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    let service = AuditService::new(engine.clone(), Arc::clone(&log), Arc::new(UserAgentClassifier));
    (dir, log, engine, service)
}

fn firefox_hello() -> HandshakeFingerprint {
    HandshakeFingerprint {
        supported_versions: vec![0x0304, 0x0303],
        cipher_suites: vec![0x1301, 0x1303, 0x1302, 0xc02b],
        supported_curves: vec![0x001d, 0x0017, 0x0018],
        supported_points: vec![0x00],
        signature_schemes: vec![0x0403, 0x0503],
        server_name: Some("localhost".to_string()),
        supported_protos: vec!["h2".to_string(), "http/1.1".to_string()],
    }
}

#[tokio::test]
async fn test_audit_after_handshake() {
    let (_dir, log, engine, service) = setup();
    let addr: ClientAddress = "203.0.113.5:51000".parse().unwrap();

    assert!(HandshakeSink::record_handshake(&engine, addr, firefox_hello()));

    let enriched = service
        .submit_audit(addr, FIREFOX_UA.to_string())
        .await
        .unwrap()
        .expect("handshake was recorded");

    assert_eq!(enriched.user_agent, FIREFOX_UA);
    assert_eq!(enriched.fingerprint, firefox_hello());
    assert_eq!(
        enriched.names.cipher_suites,
        vec![
            "TLS_AES_128_GCM_SHA256",
            "TLS_CHACHA20_POLY1305_SHA256",
            "TLS_AES_256_GCM_SHA384",
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        ]
    );
    assert_eq!(enriched.names.supported_versions, vec!["TLS 1.3", "TLS 1.2"]);

    let client = enriched.client.expect("firefox user agent is classified");
    assert_eq!(client.browser, "Firefox");
    assert_eq!(client.browser_version, "63.0");

    // Persisted in raw form
    let stored = log.read_records(MAX_RESULTS).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_agent, FIREFOX_UA);
    assert_eq!(stored[0].fingerprint, firefox_hello());
}

#[tokio::test]
async fn test_request_racing_handshake_records_nothing() {
    let (_dir, log, engine, service) = setup();
    let addr: ClientAddress = "203.0.113.5:51000".parse().unwrap();

    assert!(service.submit_audit(addr, FIREFOX_UA.to_string()).await.unwrap().is_none());
    assert!(log.read_records(MAX_RESULTS).unwrap().is_empty());

    // A later handshake is picked up by a later request
    engine.record_handshake(addr, firefox_hello());
    assert!(service.submit_audit(addr, FIREFOX_UA.to_string()).await.unwrap().is_some());
    assert_eq!(log.read_records(MAX_RESULTS).unwrap().len(), 1);
}

#[tokio::test]
async fn test_each_request_appends() {
    let (_dir, _log, engine, service) = setup();
    let addr: ClientAddress = "198.51.100.1:443".parse().unwrap();
    engine.record_handshake(addr, firefox_hello());

    for agent in ["a", "b", "c"] {
        service.submit_audit(addr, agent.to_string()).await.unwrap();
    }

    let results = service.list_results(MAX_RESULTS).await.unwrap();
    let agents: Vec<_> = results.iter().map(|r| r.user_agent.as_str()).collect();
    assert_eq!(agents, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_empty_user_agent_is_recorded() {
    let (_dir, _log, engine, service) = setup();
    let addr: ClientAddress = "198.51.100.1:50000".parse().unwrap();
    engine.record_handshake(addr, firefox_hello());

    let enriched = service.submit_audit(addr, String::new()).await.unwrap().unwrap();
    assert_eq!(enriched.user_agent, "");
    assert!(enriched.client.is_none());
}

#[tokio::test]
async fn test_list_results_respects_limit() {
    let (_dir, _log, engine, service) = setup();
    let addr: ClientAddress = "198.51.100.1:50000".parse().unwrap();
    engine.record_handshake(addr, firefox_hello());

    for i in 0..5 {
        service.submit_audit(addr, format!("agent-{}", i)).await.unwrap();
    }

    assert_eq!(service.list_results(2).await.unwrap().len(), 2);
    assert!(service.list_results(0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_stopped_is_an_error() {
    let (_dir, _log, engine, service) = setup();
    engine.shutdown().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let addr: ClientAddress = "198.51.100.1:50000".parse().unwrap();
    assert!(service.submit_audit(addr, "ua".to_string()).await.is_err());
}
