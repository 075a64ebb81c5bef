//! Public key authentication backed by an identity provider.
//!
//! Identities are offered in the order [`IdentityProvider::list_identities`]
//! returns them. When the server accepts an offered key it sends the
//! session-bound data to sign, and [`IdentitySigner`] answers through
//! [`IdentityProvider::sign_at`] with the position of that key. The private key
//! itself is never handed to the transport.

use std::future::Future;
use std::sync::Arc;

use russh::keys::ssh_encoding::{self, Encode};
use russh::keys::ssh_key::{HashAlg, PublicKey};
use russh::{CryptoVec, SendError, client};
use thiserror::Error;
use tracing::{debug, info};

use crate::tunnel::error::ForwardError;
use crate::tunnel::keychain::IdentityProvider;
use crate::tunnel::session::SshClientHandler;

/// Why public key authentication did not succeed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No identities available to offer")]
    NoIdentities,

    #[error("No offered identity was accepted")]
    Rejected,

    #[error("Identity could not sign: {0}")]
    Sign(#[from] ForwardError),

    #[error("Signature encoding failed: {0}")]
    Encoding(#[from] ssh_encoding::Error),

    #[error(transparent)]
    Transport(#[from] SendError),
}

/// Answers the server's signing request with the identity at one position.
pub struct IdentitySigner<'a> {
    identities: &'a dyn IdentityProvider,
    index: usize,
}

impl<'a> IdentitySigner<'a> {
    pub fn new(identities: &'a dyn IdentityProvider, index: usize) -> Self {
        Self { identities, index }
    }

    /// Append the SSH signature blob over `to_sign` to `to_sign`.
    fn sign(&self, hash_alg: Option<HashAlg>, mut to_sign: CryptoVec) -> Result<CryptoVec, AuthError> {
        let signature = self.identities.sign_at(self.index, &to_sign, hash_alg)?;

        let mut blob = Vec::new();
        signature.encode(&mut blob)?;
        blob.encode(&mut to_sign)?;

        Ok(to_sign)
    }
}

impl russh::Signer for IdentitySigner<'_> {
    type Error = AuthError;

    fn auth_publickey_sign(
        &mut self,
        _key: &PublicKey,
        hash_alg: Option<HashAlg>,
        to_sign: CryptoVec,
    ) -> impl Future<Output = Result<CryptoVec, Self::Error>> + Send {
        let signed = self.sign(hash_alg, to_sign);
        async move { signed }
    }
}

/// Public key authentication over a shared identity provider.
pub struct KeychainAuth {
    identities: Arc<dyn IdentityProvider>,
}

impl KeychainAuth {
    /// Create an authenticator offering the identities of `identities`.
    pub fn new(identities: Arc<dyn IdentityProvider>) -> Self {
        Self { identities }
    }

    /// Offer every identity in order until the server accepts one.
    ///
    /// A signing failure on one identity does not stop the search. If no identity
    /// is accepted, the last signing failure is returned, or
    /// [`AuthError::Rejected`] when there was none.
    pub async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<(), AuthError> {
        let offered = self.identities.list_identities();
        if offered.is_empty() {
            return Err(AuthError::NoIdentities);
        }

        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm: {:?}", hash_alg);

        let mut last_error = None;

        for (index, public_key) in offered.into_iter().enumerate() {
            debug!(
                "Offering identity {} ({})",
                index,
                public_key.fingerprint(HashAlg::Sha256)
            );

            let mut signer = IdentitySigner::new(self.identities.as_ref(), index);
            match handle
                .authenticate_publickey_with(username, public_key, hash_alg, &mut signer)
                .await
            {
                Ok(result) if result.success() => {
                    info!("Authenticated as {} with identity {}", username, index);
                    return Ok(());
                }
                Ok(_) => {
                    debug!("Identity {} not accepted, trying next...", index);
                }
                Err(e) => {
                    debug!("Identity {} authentication error: {}, trying next...", index, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(AuthError::Rejected))
    }
}
