//! Signing identities used for public key authentication.
//!
//! The [`Keychain`] holds an ordered list of private keys. It is populated once at
//! startup, then shared read-only (behind an `Arc`) by every forwarding unit, so no
//! locking is needed.
//!
//! Authentication code does not talk to the keychain directly; it goes through the
//! [`IdentityProvider`] capability, which exposes identities by position only:
//!
//! - `list_identities()` returns the public keys in offer order
//! - `sign_at(index, bytes, hash_alg)` signs with the identity at `index`
//!
//! Private keys never leave the provider.

use std::fs;
use std::path::Path;

use russh::keys::ssh_key::private::KeypairData;
use russh::keys::ssh_key::{HashAlg, PublicKey, Signature};
use russh::keys::{self, PrivateKey};
use signature::Signer;
use tracing::debug;

use super::error::ForwardError;

/// Position-addressed source of signing identities.
///
/// Implementations must be thread-safe (`Send + Sync`): one provider is shared by
/// all concurrently running forwarding units.
pub trait IdentityProvider: Send + Sync {
    /// Public keys of all identities, in the order they should be offered.
    fn list_identities(&self) -> Vec<PublicKey>;

    /// Sign `data` with the identity at `index`.
    ///
    /// `hash_alg` selects the digest for RSA identities (`None` is SHA-1) and is
    /// ignored by every other key type.
    fn sign_at(
        &self,
        index: usize,
        data: &[u8],
        hash_alg: Option<HashAlg>,
    ) -> Result<Signature, ForwardError>;
}

/// Ordered collection of private keys.
#[derive(Clone, Default)]
pub struct Keychain {
    identities: Vec<PrivateKey>,
}

impl Keychain {
    /// Create an empty keychain.
    pub fn new() -> Self {
        Self {
            identities: Vec::new(),
        }
    }

    /// Append a signing identity.
    pub fn add(&mut self, identity: PrivateKey) {
        self.identities.push(identity);
    }

    /// Number of loaded identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Whether no identity has been loaded.
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Public key of the identity at `index`.
    ///
    /// Returns `None` when `index` is out of bounds. Callers probing identities
    /// sequentially treat `None` as "nothing more to offer".
    pub fn public_key_at(&self, index: usize) -> Option<PublicKey> {
        self.identities
            .get(index)
            .map(|identity| identity.public_key().clone())
    }

    /// Sign `challenge` with the identity at `index`, using the key type's default
    /// digest (SHA-512 for RSA).
    ///
    /// Unlike [`Keychain::public_key_at`], an invalid index is an error: callers
    /// only sign with an index they already resolved.
    pub fn sign_with_index(&self, index: usize, challenge: &[u8]) -> Result<Signature, ForwardError> {
        self.sign_with_hash(index, challenge, Some(HashAlg::Sha512))
    }

    /// Sign `challenge` with the identity at `index` and an explicit RSA digest.
    pub fn sign_with_hash(
        &self,
        index: usize,
        challenge: &[u8],
        hash_alg: Option<HashAlg>,
    ) -> Result<Signature, ForwardError> {
        let identity = self.identities.get(index).ok_or(ForwardError::OutOfRange {
            index,
            len: self.identities.len(),
        })?;

        let signed = match identity.key_data() {
            KeypairData::Rsa(keypair) => Signer::<Signature>::try_sign(&(keypair, hash_alg), challenge),
            keypair => Signer::<Signature>::try_sign(keypair, challenge),
        };

        signed.map_err(|e| ForwardError::Sign {
            index,
            reason: e.to_string(),
        })
    }

    /// Read a private key file and append the identity it contains.
    ///
    /// Fails with [`ForwardError::Io`] if the file cannot be read and with
    /// [`ForwardError::KeyFormat`] if its content is not a usable, unencrypted
    /// private key.
    pub fn load_from_key_file(&mut self, path: impl AsRef<Path>) -> Result<(), ForwardError> {
        let path = path.as_ref();

        let raw = fs::read(path).map_err(|source| ForwardError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let text = String::from_utf8(raw).map_err(|e| ForwardError::KeyFormat {
            path: path.to_path_buf(),
            reason: format!("key file is not valid UTF-8: {}", e),
        })?;

        let identity = keys::decode_secret_key(&text, None).map_err(|e| ForwardError::KeyFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            "Loaded {} identity from {:?}",
            identity.algorithm().as_str(),
            path
        );
        self.add(identity);
        Ok(())
    }
}

impl IdentityProvider for Keychain {
    fn list_identities(&self) -> Vec<PublicKey> {
        self.identities
            .iter()
            .map(|identity| identity.public_key().clone())
            .collect()
    }

    fn sign_at(
        &self,
        index: usize,
        data: &[u8],
        hash_alg: Option<HashAlg>,
    ) -> Result<Signature, ForwardError> {
        self.sign_with_hash(index, data, hash_alg)
    }
}
