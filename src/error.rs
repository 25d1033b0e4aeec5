//! Host-level errors: everything that can go wrong setting up the runtime
//! (binding sockets, parsing addresses, putting file descriptors in
//! non-blocking mode). The core connection state machine never returns a
//! `Result` of its own; malformed input is discarded silently per §7.

use std::net::AddrParseError;

/// Errors surfaced by `crate::host` and `main` during setup or the runtime loop.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("invalid socket address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to configure non-blocking I/O: {0}")]
    NonBlocking(#[from] nix::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
