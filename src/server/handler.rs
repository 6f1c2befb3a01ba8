//! Connection handler module
//!
//! This module handles individual client connections: the TLS handshake
//! (during which the ClientHello is captured) followed by HTTP/1.1 on the
//! same stream.

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use log::debug;
use openssl::ssl::{Ssl, SslAcceptor};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tower::ServiceExt;

use crate::common::{AuditError, Result};
use crate::tls::bind_peer;

/// Upper bound for a TLS handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Complete the TLS handshake on an accepted connection
async fn accept_tls(
    client_stream: TcpStream,
    peer: SocketAddr,
    tls_acceptor: &SslAcceptor,
) -> Result<Pin<Box<SslStream<TcpStream>>>> {
    let mut ssl = Ssl::new(tls_acceptor.context())?;
    bind_peer(&mut ssl, peer)?;
    let stream = SslStream::new(ssl, client_stream)?;

    let mut stream = Box::pin(stream);
    match timeout(HANDSHAKE_TIMEOUT, stream.as_mut().accept()).await {
        Ok(Ok(())) => {
            debug!("TLS handshake with {} successful", peer);
            Ok(stream)
        }
        Ok(Err(e)) => Err(AuditError::TlsHandshake(format!("{}: {}", peer, e))),
        Err(_) => Err(AuditError::TlsHandshake(format!("{}: handshake timed out", peer))),
    }
}

/// Handle a single client connection
///
/// # Parameters
///
/// * `client_stream` - Client TCP stream
/// * `peer` - Client address, the correlation key for this connection
/// * `tls_acceptor` - TLS acceptor with the handshake observer installed
/// * `router` - HTTP routes served over the TLS stream
///
/// # Returns
///
/// Returns `Ok(())` when the client closes the connection normally.
pub async fn handle_connection(
    client_stream: TcpStream,
    peer: SocketAddr,
    tls_acceptor: Arc<SslAcceptor>,
    router: Router,
) -> Result<()> {
    let stream = accept_tls(client_stream, peer, &tls_acceptor).await?;

    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
        .map_err(|e| AuditError::Other(format!("HTTP error on connection from {}: {}", peer, e)))
}

/// Handle a connection on the capture-only listener
///
/// Completes the handshake so the ClientHello is recorded, then closes the
/// connection without reading application data.
pub async fn handle_capture_connection(
    client_stream: TcpStream,
    peer: SocketAddr,
    tls_acceptor: Arc<SslAcceptor>,
) -> Result<()> {
    let mut stream = accept_tls(client_stream, peer, &tls_acceptor).await?;
    if let Err(e) = stream.shutdown().await {
        debug!("Capture connection from {} closed uncleanly: {}", peer, e);
    }
    Ok(())
}
