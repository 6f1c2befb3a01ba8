//! HTTP routes
//!
//! `GET /browserAudit` correlates the request with the handshake of its
//! connection, `GET /browserTLSResults` lists the persisted records.

use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::header::USER_AGENT;
use http::{HeaderMap, StatusCode};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use crate::audit::{AuditService, EnrichedAuditRecordJson};
use crate::common::AuditError;

/// Audit path
pub const AUDIT_PATH: &str = "/browserAudit";

/// Results path
pub const RESULTS_PATH: &str = "/browserTLSResults";

/// Build the router serving both audit endpoints
pub fn create_router(service: AuditService) -> Router {
    Router::new()
        .route(AUDIT_PATH, get(browser_audit))
        .route(RESULTS_PATH, get(browser_tls_results))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// `User-Agent` header value, empty when absent
fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

async fn browser_audit(
    State(service): State<AuditService>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, AuditError> {
    match service.submit_audit(client_addr, user_agent(&headers)).await? {
        Some(record) => Ok(Json(EnrichedAuditRecordJson::from(&record)).into_response()),
        // No handshake for this connection: success with an empty body
        None => Ok(StatusCode::OK.into_response()),
    }
}

async fn browser_tls_results(State(service): State<AuditService>) -> Result<Json<Vec<EnrichedAuditRecordJson>>, AuditError> {
    let records = service.list_results(service.results_limit()).await?;
    Ok(Json(records.iter().map(EnrichedAuditRecordJson::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::UserAgentClassifier;
    use crate::audit::AuditLog;
    use crate::correlation::{CorrelationEngine, StoreLimits};
    use crate::fingerprint::HandshakeFingerprint;
    use axum::body::{to_bytes, Body};
    use http::Request;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn request(path: &str, peer: SocketAddr, agent: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(path);
        if let Some(agent) = agent {
            builder = builder.header(USER_AGENT, agent);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn test_user_agent_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_agent(&headers), "");
        headers.insert(USER_AGENT, "TestAgent/1.0".parse().unwrap());
        assert_eq!(user_agent(&headers), "TestAgent/1.0");
    }

    #[tokio::test]
    async fn test_audit_routes() {
        let dir = tempdir().unwrap();
        let log = Arc::new(AuditLog::open(dir.path()).unwrap());
        let engine = CorrelationEngine::new(16, StoreLimits::default());
        let router = create_router(AuditService::new(engine.clone(), log, Arc::new(UserAgentClassifier)));

        let peer: SocketAddr = "203.0.113.5:51000".parse().unwrap();

        // Nothing captured yet
        let response = router.clone().oneshot(request(AUDIT_PATH, peer, Some("UA"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(to_bytes(response.into_body(), usize::MAX).await.unwrap().is_empty());

        assert!(engine.record_handshake(
            peer,
            HandshakeFingerprint { cipher_suites: vec![0x1301], ..Default::default() },
        ));

        let response = router.clone().oneshot(request(AUDIT_PATH, peer, Some("UA"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["Agent"], "UA");
        assert_eq!(json["HelloInfo"]["CipherSuites"][0], "0x1301");
        assert_eq!(json["HelloInfo"]["CipherSuiteNames"][0], "TLS_AES_128_GCM_SHA256");

        let response = router.oneshot(request(RESULTS_PATH, peer, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(1));
    }
}
