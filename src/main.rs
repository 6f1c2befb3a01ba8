//! Browser TLS Audit command line tool
//!
//! This binary runs the audit server.

use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use browser_tls_audit::agent::UserAgentClassifier;
use browser_tls_audit::audit::{AuditLog, AuditService};
use browser_tls_audit::common::{init_logger, Result};
use browser_tls_audit::config::{load_config, ConfigOverrides};
use browser_tls_audit::correlation::CorrelationEngine;
use browser_tls_audit::server::{create_router, AuditServer};
use browser_tls_audit::tls::HandshakeObserver;
use browser_tls_audit::{create_tls_acceptor, APP_NAME, VERSION};

/// Browser TLS Audit: record ClientHello capabilities per User-Agent
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Comma separated domain names to serve
    #[clap(long)]
    domain: Option<String>,

    /// HTTPS port
    #[clap(long)]
    port: Option<u16>,

    /// Server certificate path (PEM)
    #[clap(long)]
    cert: Option<PathBuf>,

    /// Server private key path (PEM)
    #[clap(long)]
    key: Option<PathBuf>,

    /// Directory for the audit log
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[clap(long)]
    log_level: Option<String>,

    /// Also capture handshakes on port - 1 (deprecated split mode)
    #[clap(long)]
    capture_listener: bool,

    /// Load configuration from a JSON file
    #[clap(long)]
    config_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            domain: self.domain.clone(),
            port: self.port,
            cert: self.cert.clone(),
            key: self.key.clone(),
            data_dir: self.data_dir.clone(),
            log_level: self.log_level.clone(),
            capture_listener: self.capture_listener.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config_file.as_deref(), args.overrides())?;

    init_logger(&config.log_level);

    info!("Starting {} v{}", APP_NAME, VERSION);

    let engine = CorrelationEngine::new(config.event_buffer, config.store_limits());
    let observer = Arc::new(HandshakeObserver::new(Arc::new(engine.clone()), config.domains()));

    let tls_acceptor = create_tls_acceptor(&config.certificate_source(), Some(observer))?;

    let log = Arc::new(AuditLog::open(&config.data_dir)?);
    info!("Audit log: {}", log.path().display());

    let service = AuditService::new(engine.clone(), log, Arc::new(UserAgentClassifier))
        .with_results_limit(config.results_limit);

    let mut server = AuditServer::bind(config.listen_addr(), tls_acceptor, create_router(service)).await?;
    if let Some(capture_addr) = config.capture_addr() {
        warn!("Capture listener enabled on {}; correlation is only reliable on the main listener", capture_addr);
        server = server.with_capture_listener(capture_addr).await?;
    }

    info!("Audit service ready, press Ctrl+C to stop");

    let result = tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    };

    engine.shutdown().await;
    result
}
