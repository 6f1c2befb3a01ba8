//! Audit server module
//!
//! Accepts TCP connections and hands each one to its own task, which runs
//! the TLS handshake and then serves HTTP on the same stream.

use axum::Router;
use log::{debug, error, info};
use openssl::ssl::SslAcceptor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use super::handler::{handle_capture_connection, handle_connection};
use crate::common::{AuditError, Result};

/// Audit server structure
///
/// Owns the bound listeners, so `local_addr` is known before `run` is
/// called (binding port 0 picks a free port).
pub struct AuditServer {
    /// HTTPS listener
    listener: TcpListener,
    /// Optional capture-only listener
    capture_listener: Option<TcpListener>,
    /// TLS acceptor with the handshake observer installed
    tls_acceptor: Arc<SslAcceptor>,
    /// Audit routes
    router: Router,
}

impl AuditServer {
    /// Bind the HTTPS listener
    ///
    /// # Parameters
    ///
    /// * `listen_addr` - Listen address
    /// * `tls_acceptor` - TLS acceptor
    /// * `router` - Routes served on every connection
    ///
    /// # Errors
    ///
    /// Returns an error if it cannot bind to the listen address.
    pub async fn bind(listen_addr: SocketAddr, tls_acceptor: SslAcceptor, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(listen_addr).await.map_err(AuditError::Io)?;
        Ok(Self {
            listener,
            capture_listener: None,
            tls_acceptor: Arc::new(tls_acceptor),
            router,
        })
    }

    /// Also bind the capture-only listener
    ///
    /// Connections there complete the handshake, which records the
    /// ClientHello, and are closed without serving HTTP.
    pub async fn with_capture_listener(mut self, capture_addr: SocketAddr) -> Result<Self> {
        self.capture_listener = Some(TcpListener::bind(capture_addr).await.map_err(AuditError::Io)?);
        Ok(self)
    }

    /// Bound HTTPS address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Bound capture-only address, if any
    pub fn capture_addr(&self) -> Option<SocketAddr> {
        self.capture_listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Run the server
    ///
    /// Accepts connections until the task is cancelled. Per-connection
    /// failures are logged and never stop the loop.
    pub async fn run(self) -> Result<()> {
        let mut tasks = JoinSet::new();

        if let Some(capture_listener) = self.capture_listener {
            let tls_acceptor = Arc::clone(&self.tls_acceptor);
            info!("Capture listener started on {}", capture_listener.local_addr()?);
            tasks.spawn(run_capture_listener(capture_listener, tls_acceptor));
        }

        info!("Audit server started, listening on {}", self.listener.local_addr()?);

        loop {
            // Reap finished connections
            while let Some(result) = tasks.try_join_next() {
                match result {
                    Ok(Err(e)) => debug!("Connection ended with error: {}", e),
                    Err(e) => error!("Task error: {}", e),
                    Ok(Ok(())) => {}
                }
            }

            match self.listener.accept().await {
                Ok((client_stream, client_addr)) => {
                    debug!("Accepted connection from {}", client_addr);

                    let tls_acceptor = Arc::clone(&self.tls_acceptor);
                    let router = self.router.clone();

                    tasks.spawn(async move {
                        let result = handle_connection(client_stream, client_addr, tls_acceptor, router).await;
                        if let Err(AuditError::TlsHandshake(e)) = &result {
                            info!("TLS handshake failed: {}", e);
                        }
                        result
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Accept loop of the capture-only listener
async fn run_capture_listener(listener: TcpListener, tls_acceptor: Arc<SslAcceptor>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((client_stream, client_addr)) => {
                debug!("Accepted capture connection from {}", client_addr);
                let tls_acceptor = Arc::clone(&tls_acceptor);
                tokio::spawn(async move {
                    if let Err(e) = handle_capture_connection(client_stream, client_addr, tls_acceptor).await {
                        debug!("Capture connection from {} failed: {}", client_addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting capture connection: {}", e);
            }
        }
    }
}
