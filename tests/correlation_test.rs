//! Correlation engine tests
//!
//! Exercise the engine through its public handle the way the TLS observer
//! and the HTTP handlers use it.

use browser_tls_audit::correlation::{CorrelationEngine, StoreLimits};
use browser_tls_audit::fingerprint::{ClientAddress, HandshakeFingerprint};
use browser_tls_audit::tls::HandshakeSink;
use std::sync::Arc;
use std::time::Duration;

fn fingerprint(cipher: u16) -> HandshakeFingerprint {
    HandshakeFingerprint {
        supported_versions: vec![0x0304, 0x0303],
        cipher_suites: vec![cipher],
        ..Default::default()
    }
}

fn address(port: u16) -> ClientAddress {
    ClientAddress::from(([203, 0, 113, 5], port))
}

#[tokio::test]
async fn test_handshake_visible_to_following_request() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());

    for port in 40000..40050 {
        assert!(engine.record_handshake(address(port), fingerprint(port)));
        let record = engine
            .request_audit(address(port), format!("agent-{}", port))
            .await
            .unwrap()
            .expect("handshake recorded before the request must be found");
        assert_eq!(record.user_agent, format!("agent-{}", port));
        assert_eq!(record.fingerprint.cipher_suites, vec![port]);
    }
}

#[tokio::test]
async fn test_no_correlation_before_handshake() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    let addr = address(51000);

    assert!(engine.request_audit(addr, "early".to_string()).await.unwrap().is_none());

    engine.record_handshake(addr, fingerprint(0x1301));
    let record = engine.request_audit(addr, "late".to_string()).await.unwrap().unwrap();
    assert_eq!(record.user_agent, "late");
}

#[tokio::test]
async fn test_same_ip_different_port_does_not_match() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    engine.record_handshake(address(51000), fingerprint(0x1301));

    assert!(engine.request_audit(address(51001), "other".to_string()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_hello_wins() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    let addr = address(51000);

    engine.record_handshake(addr, fingerprint(0x1301));
    engine.record_handshake(addr, fingerprint(0x1302));

    let record = engine.request_audit(addr, "ua".to_string()).await.unwrap().unwrap();
    assert_eq!(record.fingerprint.cipher_suites, vec![0x1301]);
}

#[tokio::test]
async fn test_lookup_is_repeatable() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    let addr = address(51000);
    engine.record_handshake(addr, fingerprint(0x1301));

    // Keep-alive: several requests on one connection
    for agent in ["first", "second"] {
        let record = engine.request_audit(addr, agent.to_string()).await.unwrap().unwrap();
        assert_eq!(record.user_agent, agent);
    }
}

#[tokio::test]
async fn test_sink_trait_object() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    let sink: Arc<dyn HandshakeSink> = Arc::new(engine.clone());

    assert!(sink.record_handshake(address(51000), fingerprint(0x1303)));
    assert!(engine.request_audit(address(51000), "ua".to_string()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_clients() {
    let engine = CorrelationEngine::new(1024, StoreLimits::default());

    let mut tasks = Vec::new();
    for port in 50000..50100u16 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            engine.record_handshake(address(port), fingerprint(port));
            engine.request_audit(address(port), port.to_string()).await.unwrap()
        }));
    }

    for (task, port) in tasks.into_iter().zip(50000..50100u16) {
        let record = task.await.unwrap().unwrap();
        assert_eq!(record.fingerprint.cipher_suites, vec![port]);
        assert_eq!(record.user_agent, port.to_string());
    }
}

#[tokio::test]
async fn test_capacity_bound_through_engine() {
    let limits = StoreLimits { ttl: None, capacity: Some(2) };
    let engine = CorrelationEngine::new(64, limits);

    engine.record_handshake(address(1), fingerprint(1));
    engine.record_handshake(address(2), fingerprint(2));
    engine.record_handshake(address(3), fingerprint(3));

    assert!(engine.request_audit(address(1), "a".to_string()).await.unwrap().is_none());
    assert!(engine.request_audit(address(2), "b".to_string()).await.unwrap().is_some());
    assert!(engine.request_audit(address(3), "c".to_string()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_shutdown_fails_later_requests() {
    let engine = CorrelationEngine::new(64, StoreLimits::default());
    engine.shutdown().await;

    // Give the engine task a moment to stop
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.request_audit(address(1), "ua".to_string()).await.is_err());
    assert!(!engine.record_handshake(address(1), fingerprint(1)));
}
