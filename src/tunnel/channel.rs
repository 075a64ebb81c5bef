//! `direct-tcpip` channel opening (RFC 4254, section 7.2).
//!
//! The channel is a remote dial: the SSH server connects to the destination and
//! relays bytes over the session. The forwarder itself never touches the
//! destination's network.

use std::net::SocketAddr;

use russh::{Channel, client};
use tracing::debug;

use crate::tunnel::client::parse_address;
use crate::tunnel::error::ForwardError;
use crate::tunnel::session::Session;

/// Open a `direct-tcpip` channel through `session` to `destination` (`host:port`).
///
/// `originator` is the address of the local peer the channel is opened for; it is
/// reported to the server as the connection's origin.
///
/// Fails with [`ForwardError::ChannelOpen`] if `destination` has no valid port or the
/// server refuses or cannot reach it.
pub async fn open_channel(
    session: &Session,
    destination: &str,
    originator: SocketAddr,
) -> Result<Channel<client::Msg>, ForwardError> {
    let (host, port) = parse_address(destination, None).map_err(|reason| ForwardError::ChannelOpen {
        destination: destination.to_string(),
        reason,
    })?;

    let channel = session
        .handle()
        .channel_open_direct_tcpip(
            host,
            u32::from(port),
            originator.ip().to_string(),
            u32::from(originator.port()),
        )
        .await
        .map_err(|e| ForwardError::ChannelOpen {
            destination: destination.to_string(),
            reason: e.to_string(),
        })?;

    debug!(
        "Opened direct-tcpip channel to {} via {}",
        destination,
        session.server_address()
    );
    Ok(channel)
}
