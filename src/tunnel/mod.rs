//! SSH local port forwarding.
//!
//! This module is organized into the following submodules:
//!
//! - `keychain`: Signing identities and the `IdentityProvider` capability
//! - `auth`: Public key authentication over an identity provider
//! - `session`: Client handler and the authenticated session type
//! - `client`: Session establishment (dial, handshake, authentication)
//! - `channel`: `direct-tcpip` channel opening
//! - `relay`: Bidirectional byte copying between two streams
//! - `forward`: The local listener and per-connection forwarding units
//! - `config`: Forwarding configuration with environment variable support
//! - `error`: Error taxonomy and fatality policy

pub mod auth;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod forward;
pub mod keychain;
pub mod relay;
pub mod session;

pub use config::{ConfigOverrides, ForwardConfig};
pub use error::ForwardError;
pub use forward::{Forwarder, Listening};
pub use keychain::{IdentityProvider, Keychain};
