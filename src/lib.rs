#![deny(clippy::unwrap_used)]

//! Single-hop SSH tunnel: expose a remote-only service on a local port by
//! forwarding every local connection through its own SSH session.

pub mod tunnel;
