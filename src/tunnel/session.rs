//! Authenticated SSH sessions owned by forwarding units.
//!
//! # Architecture
//!
//! - `SshClientHandler`: A russh client handler that accepts all host keys (similar to
//!   `StrictHostKeyChecking=no` in OpenSSH).
//! - `Session`: One authenticated connection to the SSH server. Each forwarding unit
//!   establishes its own session and is the only owner of it; sessions are never
//!   shared or pooled across local connections.

use russh::{Disconnect, client, keys};
use tracing::debug;

/// Client handler for russh that accepts all host keys.
///
/// # Security Note
///
/// Server keys are not verified against a known_hosts file.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An authenticated SSH connection to the remote server.
pub struct Session {
    handle: client::Handle<SshClientHandler>,
    server_address: String,
}

impl Session {
    pub(crate) fn new(handle: client::Handle<SshClientHandler>, server_address: &str) -> Self {
        Self {
            handle,
            server_address: server_address.to_string(),
        }
    }

    /// Address of the SSH server this session is connected to.
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub(crate) fn handle(&self) -> &client::Handle<SshClientHandler> {
        &self.handle
    }

    pub(crate) fn handle_mut(&mut self) -> &mut client::Handle<SshClientHandler> {
        &mut self.handle
    }

    /// Disconnect from the server and release the connection.
    ///
    /// Consumes the session; any channel opened on it must already be dropped.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "forwarding finished", "en")
            .await
        {
            // The server may already have gone away; the connection is dropped anyway.
            debug!("Disconnect from {} failed: {}", self.server_address, e);
        } else {
            debug!("Disconnected from {}", self.server_address);
        }
    }
}
