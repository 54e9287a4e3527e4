//! Typed errors for the fatal, startup-time failures of §7. Per-message protocol
//! failures are not represented here: handlers drop and log them directly instead
//! of propagating a `Result` across the handler boundary.

use thiserror::Error;

/// Fatal errors that can occur while bringing up a replica or the client.
#[derive(Debug, Error)]
pub enum ReplicaError {
    /// The positional CLI argument did not name `client` or a roster id.
    #[error("unknown node id '{0}', expected 'client' or a roster id")]
    UnknownNodeId(String),

    /// A key file was missing or unreadable.
    #[error("failed to load key material for '{id}': {source}")]
    KeyLoad {
        /// Roster id the key belongs to.
        id: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// A PEM blob did not parse as an RSA key.
    #[error("failed to parse key material for '{id}': {source}")]
    KeyParse {
        /// Roster id the key belongs to.
        id: String,
        /// Underlying OpenSSL failure.
        source: openssl::error::ErrorStack,
    },

    /// RSA keypair generation failed.
    #[error("failed to generate RSA keypair: {0}")]
    KeyGen(#[source] openssl::error::ErrorStack),

    /// The TCP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Logging subsystem could not be initialised.
    #[error("failed to initialize logging: {0}")]
    LogInit(String),
}
