//! SSH session establishment.
//!
//! ## Connection Lifecycle
//!
//! 1. **Address Parsing**: Parse the server address into host and port components.
//!    Supports `host:port` format with default port 22 if not specified.
//!
//! 2. **Client Configuration**: Build the russh client configuration with keepalive
//!    and compression settings. No inactivity timeout is set: a forwarded
//!    connection may legitimately stay idle for as long as the local client wants.
//!
//! 3. **Dial**: Open the TCP connection to the SSH server and run the transport
//!    handshake over it.
//!
//! 4. **Authentication**: Offer the keychain identities in index order via
//!    [`KeychainAuth`].
//!
//! Nothing is retried. A failed dial or authentication is reported to the caller,
//! which ends the forwarding unit that asked for the session.

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use tokio::net::TcpStream;
use tracing::debug;

use crate::tunnel::auth::KeychainAuth;
use crate::tunnel::error::ForwardError;
use crate::tunnel::keychain::IdentityProvider;
use crate::tunnel::session::{Session, SshClientHandler};

/// Default SSH port used when the server address has none.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Keepalive interval for SSH sessions.
pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Number of unanswered keepalives before the transport gives up.
pub(crate) const KEEPALIVE_MAX: usize = 3;

/// Build russh client configuration with the specified settings.
///
/// Creates an `Arc<client::Config>` with:
/// - No inactivity timeout
/// - Keepalive interval of 30 seconds with max 3 keepalives
/// - Compression preference based on `compress` flag (ZLIB if enabled, NONE if disabled)
pub fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: KEEPALIVE_MAX,
        preferred,
        ..Default::default()
    })
}

/// Parse address string into host and port components.
///
/// Supports the following formats:
/// - `host:port` - Returns the specified host and port
/// - `host` - Returns the host with `default_port`, or an error if there is none
///
/// Uses `rsplit_once` so bracketed IPv6 addresses (`[::1]:22`) split on the last
/// colon; the brackets are stripped from the returned host.
///
/// # Examples
///
/// ```ignore
/// let (host, port) = parse_address("example.com:2222", Some(22))?;
/// assert_eq!(host, "example.com");
/// assert_eq!(port, 2222);
///
/// let (host, port) = parse_address("192.168.1.1", Some(22))?;
/// assert_eq!(port, 22); // Default port
/// ```
pub fn parse_address(address: &str, default_port: Option<u16>) -> Result<(String, u16), String> {
    match address.rsplit_once(':') {
        Some((host, port_str)) if !host.ends_with(':') => {
            let port = port_str
                .parse::<u16>()
                .map_err(|e| format!("Invalid port number: {}", e))?;
            Ok((strip_brackets(host).to_string(), port))
        }
        _ => match default_port {
            Some(port) => Ok((strip_brackets(address).to_string(), port)),
            None => Err(format!("Missing port in address {}", address)),
        },
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// Establish an authenticated SSH session.
///
/// Dials `server_address`, runs the transport handshake and authenticates as
/// `username` with the identities of `identities`, offered in index order.
///
/// # Errors
///
/// * [`ForwardError::Dial`] - the address is malformed, the TCP connection cannot
///   be opened, or the transport handshake fails
/// * [`ForwardError::Auth`] - no offered identity was accepted
///
/// On failure the transport connection is closed before returning.
pub async fn establish_session(
    server_address: &str,
    username: &str,
    identities: Arc<dyn IdentityProvider>,
    config: Arc<client::Config>,
) -> Result<Session, ForwardError> {
    let dial_error = |reason: String| ForwardError::Dial {
        address: server_address.to_string(),
        reason,
    };

    let (host, port) = parse_address(server_address, Some(DEFAULT_SSH_PORT)).map_err(dial_error)?;

    let stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| dial_error(format!("Failed to connect: {}", e)))?;
    stream.set_nodelay(true).ok();

    let handle = client::connect_stream(config, stream, SshClientHandler)
        .await
        .map_err(|e| dial_error(format!("SSH handshake failed: {}", e)))?;
    debug!("Transport established with {}", server_address);

    let mut session = Session::new(handle, server_address);
    let auth = KeychainAuth::new(identities);

    let outcome = auth.authenticate(session.handle_mut(), username).await;
    let rejection = match outcome {
        Ok(()) => {
            debug!("Session to {}@{} ready", username, server_address);
            return Ok(session);
        }
        Err(e) => e,
    };

    session.close().await;
    Err(ForwardError::Auth {
        username: username.to_string(),
        address: server_address.to_string(),
        reason: rejection.to_string(),
    })
}
