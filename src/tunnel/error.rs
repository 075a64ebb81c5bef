//! Error taxonomy for the forwarder.
//!
//! Every failure the forwarder can hit maps to one [`ForwardError`] variant. The
//! variants fall into two groups:
//!
//! 1. **Run-fatal**: the key file cannot be read or parsed, or the local listener
//!    cannot be bound. Without credentials or a listening socket there is nothing
//!    left to do, so the run aborts.
//!
//! 2. **Unit-scoped**: dial, authentication, channel-open and copy failures. These
//!    end the one forwarding unit they happened in and are only logged. Accept
//!    failures are also non-fatal: the accept loop logs them and keeps going.
//!
//! [`ForwardError::is_fatal`] encodes this policy.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading identities, establishing tunnels and relaying.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The private key file could not be read.
    #[error("Failed to read key file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The key material could not be parsed into a signing identity.
    #[error("Invalid key material in {path:?}: {reason}")]
    KeyFormat { path: PathBuf, reason: String },

    /// A signing request named an identity index that does not exist.
    #[error("Identity index {index} out of range ({len} identities loaded)")]
    OutOfRange { index: usize, len: usize },

    /// The identity exists but failed to produce a signature.
    #[error("Identity {index} failed to sign: {reason}")]
    Sign { index: usize, reason: String },

    /// The TCP connection or transport handshake to the SSH server failed.
    #[error("Failed to connect to SSH server {address}: {reason}")]
    Dial { address: String, reason: String },

    /// None of the offered identities was accepted.
    #[error("Authentication failed for {username}@{address}: {reason}")]
    Auth {
        username: String,
        address: String,
        reason: String,
    },

    /// The server refused or could not open a direct-tcpip channel.
    #[error("Failed to open direct-tcpip channel to {destination}: {reason}")]
    ChannelOpen { destination: String, reason: String },

    /// One relay direction failed while reading or writing.
    #[error("Copy {direction} failed: {source}")]
    Copy {
        direction: &'static str,
        #[source]
        source: io::Error,
    },

    /// The local listener could not be bound.
    #[error("Failed to bind local listener on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: io::Error,
    },

    /// A single accept call on the listener failed.
    #[error("Error accepting connection: {0}")]
    Accept(#[source] io::Error),
}

impl ForwardError {
    /// Whether this error ends the whole forwarding run.
    ///
    /// Only identity loading and listener binding are fatal. Everything else is
    /// scoped to a single forwarding unit or a single accept call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ForwardError::Io { .. } | ForwardError::KeyFormat { .. } | ForwardError::Listen { .. }
        )
    }
}
