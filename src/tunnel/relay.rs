//! Bidirectional byte relay between two streams.
//!
//! [`relay`] splits both endpoints and runs two copy loops concurrently:
//!
//! - **outbound**: `a` -> `b`
//! - **inbound**: `b` -> `a`
//!
//! When a loop's source reaches end-of-stream it shuts down its sink, so the other
//! side sees the half-close, and ends. The other loop keeps running: a close or a
//! failure in one direction never cancels the opposite one. The relay returns only
//! once both loops have finished, and both endpoints are dropped at that point.
//!
//! Copy failures are logged and returned in the [`RelayReport`]; they never go
//! further than the forwarding unit that owns the relay.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::tunnel::error::ForwardError;

/// Label of the `a` -> `b` direction in logs and errors.
pub const OUTBOUND: &str = "local -> remote";

/// Label of the `b` -> `a` direction in logs and errors.
pub const INBOUND: &str = "remote -> local";

/// Outcome of both relay directions.
#[derive(Debug)]
pub struct RelayReport {
    /// Bytes copied from `a` to `b`, or the error that ended that direction.
    pub outbound: Result<u64, ForwardError>,
    /// Bytes copied from `b` to `a`, or the error that ended that direction.
    pub inbound: Result<u64, ForwardError>,
}

impl RelayReport {
    /// Whether both directions ended cleanly.
    pub fn is_clean(&self) -> bool {
        self.outbound.is_ok() && self.inbound.is_ok()
    }

    /// Bytes copied in each direction, counting a failed direction as zero.
    pub fn byte_counts(&self) -> (u64, u64) {
        (
            *self.outbound.as_ref().unwrap_or(&0),
            *self.inbound.as_ref().unwrap_or(&0),
        )
    }
}

/// Relay bytes between `a` and `b` until both directions have finished.
pub async fn relay<A, B>(a: A, b: B) -> RelayReport
where
    A: AsyncRead + AsyncWrite,
    B: AsyncRead + AsyncWrite,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let (outbound, inbound) = tokio::join!(
        copy_direction(&mut a_read, &mut b_write, OUTBOUND),
        copy_direction(&mut b_read, &mut a_write, INBOUND),
    );

    RelayReport { outbound, inbound }
}

async fn copy_direction<R, W>(
    reader: &mut R,
    writer: &mut W,
    direction: &'static str,
) -> Result<u64, ForwardError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = tokio::io::copy(reader, writer).await;

    // Propagate end-of-stream to the peer even if the copy failed.
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown after {} copy failed: {}", direction, e);
    }

    match result {
        Ok(bytes) => {
            debug!("{} copy ended after {} bytes", direction, bytes);
            Ok(bytes)
        }
        Err(source) => {
            warn!("{} copy ended: {}", direction, source);
            Err(ForwardError::Copy { direction, source })
        }
    }
}
