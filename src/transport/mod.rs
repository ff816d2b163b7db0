//! Transport layer for the DNS server.
//!
//! Receives query datagrams from clients and sends responses back. Only UDP
//! is served.

pub mod udp;

pub use udp::{ListenerHandle, UdpListener};

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Receive buffer size. Longer datagrams are truncated by the socket.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Default port the server listens on.
pub const DEFAULT_PORT: u16 = 8053;

/// Configuration for a listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Local address to bind (e.g., 0.0.0.0:8053)
    pub bind_addr: SocketAddr,
    /// Maximum datagrams handled at once. `None` spawns a task for every
    /// datagram without limit.
    pub max_in_flight: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_in_flight: None,
        }
    }
}

/// Errors from starting or running the server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
