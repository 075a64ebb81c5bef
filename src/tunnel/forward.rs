//! Local port forwarding acceptor.
//!
//! This module accepts local TCP connections and tunnels each one through its own
//! SSH session using the `direct-tcpip` channel type defined in RFC 4254.
//!
//! # Architecture
//!
//! 1. **Startup**: The keychain is loaded from the configured key file, then the
//!    local listener is bound. Both steps are fatal: without an identity or a
//!    listening socket the run aborts before any connection is accepted.
//!
//! 2. **Accept loop**: Every accepted connection is handed to a new task (a
//!    *forwarding unit*) and the loop goes straight back to accepting. Accept errors
//!    are logged and the loop continues after a short pause.
//!
//! 3. **Forwarding unit**: Establishes a session, opens a channel to the
//!    destination, then relays bytes until both directions have finished:
//!    - Local client -> SSH channel -> Remote destination
//!    - Remote destination -> SSH channel -> Local client
//!
//!    The unit is the only owner of its local connection, session and channel and
//!    closes all three on every exit path. Its failures are logged inside the unit
//!    and never reach the acceptor or other units.
//!
//! # Lifecycle
//!
//! `Idle -> Listening -> Accepting -> Stopped`. A run stops only when its shutdown
//! token is cancelled; units that are already running keep going after that.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::tunnel::channel::open_channel;
use crate::tunnel::client::{build_client_config, establish_session};
use crate::tunnel::config::ForwardConfig;
use crate::tunnel::error::ForwardError;
use crate::tunnel::keychain::{IdentityProvider, Keychain};
use crate::tunnel::relay::{RelayReport, relay};

/// Pause after a failed accept before trying again.
pub const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Everything a forwarding unit needs, shared read-only by all units of a run.
struct Target {
    username: String,
    server_address: String,
    remote_address: String,
    identities: Arc<dyn IdentityProvider>,
    client_config: Arc<client::Config>,
}

/// A forwarder with its identities loaded, not yet listening.
pub struct Forwarder {
    config: ForwardConfig,
    keychain: Arc<Keychain>,
}

impl Forwarder {
    /// Load the keychain from `config.private_key_path`.
    ///
    /// Fails with [`ForwardError::Io`] or [`ForwardError::KeyFormat`]; nothing is
    /// bound in that case.
    pub fn new(config: ForwardConfig) -> Result<Self, ForwardError> {
        let mut keychain = Keychain::new();
        keychain.load_from_key_file(&config.private_key_path)?;
        info!(
            "Loaded {} identity from {:?}",
            keychain.len(),
            config.private_key_path
        );
        Ok(Self::with_keychain(config, keychain))
    }

    /// Use an already populated keychain instead of reading the key file.
    pub fn with_keychain(config: ForwardConfig, keychain: Keychain) -> Self {
        Self {
            config,
            keychain: Arc::new(keychain),
        }
    }

    /// Load identities and bind the local listener.
    pub async fn start(config: ForwardConfig) -> Result<Listening, ForwardError> {
        Self::new(config)?.bind().await
    }

    /// Bind the local listener on `config.local_address`.
    ///
    /// Fails with [`ForwardError::Listen`], most commonly because the address is
    /// already in use.
    pub async fn bind(self) -> Result<Listening, ForwardError> {
        let listener = TcpListener::bind(&self.config.local_address)
            .await
            .map_err(|source| ForwardError::Listen {
                address: self.config.local_address.clone(),
                source,
            })?;

        let local_addr = listener.local_addr().map_err(|source| ForwardError::Listen {
            address: self.config.local_address.clone(),
            source,
        })?;

        let target = Target {
            username: self.config.username,
            server_address: self.config.server_address,
            remote_address: self.config.remote_address,
            identities: self.keychain,
            client_config: build_client_config(self.config.compression),
        };

        Ok(Listening {
            listener,
            local_addr,
            target: Arc::new(target),
        })
    }
}

/// A bound forwarder, ready to accept connections.
pub struct Listening {
    listener: TcpListener,
    local_addr: SocketAddr,
    target: Arc<Target>,
}

impl Listening {
    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Each connection is forwarded by its own task. Cancelling `shutdown` closes
    /// the listener but leaves running forwarding units untouched.
    pub async fn serve(self, shutdown: CancellationToken) {
        info!(
            "Port forwarding active on {} -> {} via {}@{}",
            self.local_addr,
            self.target.remote_address,
            self.target.username,
            self.target.server_address
        );

        accept_loop(&self.listener, self.local_addr, self.target, shutdown).await;
    }
}

/// Source of connections for the accept loop.
trait Acceptor: Sync {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

async fn accept_loop<A: Acceptor>(
    listener: &A,
    local_addr: SocketAddr,
    target: Arc<Target>,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Stopped accepting connections on {}", local_addr);
                break;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((local_stream, peer)) => {
                spawn_forwarding_unit(local_stream, peer, target.clone());
            }
            Err(e) => {
                error!("{}", ForwardError::Accept(e));
                // Persistent errors such as EMFILE leave the listener ready.
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(ACCEPT_ERROR_PAUSE) => {}
                }
            }
        }
    }
}

/// Run the forwarder until the process is stopped.
///
/// Only returns on a fatal startup error (key loading or listener binding).
pub async fn run(config: ForwardConfig) -> Result<(), ForwardError> {
    run_until(config, CancellationToken::new()).await
}

/// Run the forwarder until `shutdown` is cancelled.
pub async fn run_until(config: ForwardConfig, shutdown: CancellationToken) -> Result<(), ForwardError> {
    let listening = match Forwarder::start(config).await {
        Ok(listening) => listening,
        Err(e) => {
            error!("Port forwarding aborted: {}", e);
            return Err(e);
        }
    };

    listening.serve(shutdown).await;
    Ok(())
}

/// Spawn the forwarding unit for one accepted connection.
fn spawn_forwarding_unit(
    local_stream: TcpStream,
    peer: SocketAddr,
    target: Arc<Target>,
) {
    let span = info_span!("unit", id = %Uuid::new_v4(), peer = %peer);

    tokio::spawn(
        async move {
            debug!("New connection from {} to forwarded port", peer);
            match forward_connection(local_stream, peer, &target).await {
                Ok(report) => {
                    let (sent, received) = report.byte_counts();
                    debug!(
                        "Port forwarding connection closed ({} bytes sent, {} bytes received)",
                        sent, received
                    );
                }
                Err(e) => {
                    warn!("Port forwarding connection failed: {}", e);
                }
            }
        }
        .instrument(span),
    );
}

/// Drive one forwarding unit: establish, open, relay, then close everything.
///
/// The local stream is dropped on return, whichever way the unit ends.
async fn forward_connection(
    local_stream: TcpStream,
    peer: SocketAddr,
    target: &Target,
) -> Result<RelayReport, ForwardError> {
    local_stream.set_nodelay(true).ok();

    let session = establish_session(
        &target.server_address,
        &target.username,
        target.identities.clone(),
        target.client_config.clone(),
    )
    .await?;

    let channel = match open_channel(&session, &target.remote_address, peer).await {
        Ok(channel) => channel,
        Err(e) => {
            session.close().await;
            return Err(e);
        }
    };

    let report = relay(local_stream, channel.into_stream()).await;
    session.close().await;

    Ok(report)
}
