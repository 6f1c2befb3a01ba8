//! Network utility functions
//!
//! Listener address helpers.

use std::net::{IpAddr, SocketAddr};

/// Build the socket address a listener binds to
pub fn listen_addr(bind: IpAddr, port: u16) -> SocketAddr {
    SocketAddr::new(bind, port)
}

/// Port of the deprecated capture-only listener, one below the HTTPS port
pub fn capture_port(https_port: u16) -> Option<u16> {
    https_port.checked_sub(1).filter(|p| *p > 0)
}
