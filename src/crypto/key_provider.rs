//! Recipient key management for session decryption.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no key exists under alias '{0}'")]
    KeyUnavailable(String),
    #[error("key agreement produced a non-contributory shared secret")]
    NonContributory,
}

/// Holds the verifier's long-lived X25519 session keys behind an alias,
/// exposing only the operations the engine needs. Private scalars never
/// leave the provider.
pub trait KeyProvider: Send + Sync {
    /// Create the key under `alias` if it does not already exist.
    fn ensure_key(&self, alias: &str) -> Result<(), Error>;

    /// Raw public key bytes for `alias`, suitable for engagement payloads.
    fn public_key(&self, alias: &str) -> Result<[u8; 32], Error>;

    /// X25519 agreement between the key under `alias` and a peer public key.
    fn key_agreement(&self, alias: &str, peer_public: &[u8; 32])
        -> Result<Zeroizing<[u8; 32]>, Error>;
}

/// In-process provider backed by process memory. Hardware-backed stores
/// implement the same trait on their own terms.
#[derive(Default)]
pub struct SoftwareKeyProvider {
    keys: Mutex<HashMap<String, StaticSecret>>,
}

impl SoftwareKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyProvider for SoftwareKeyProvider {
    fn ensure_key(&self, alias: &str) -> Result<(), Error> {
        let mut keys = self.keys.lock().expect("key store lock");
        keys.entry(alias.to_string())
            .or_insert_with(|| StaticSecret::random_from_rng(OsRng));
        Ok(())
    }

    fn public_key(&self, alias: &str) -> Result<[u8; 32], Error> {
        let keys = self.keys.lock().expect("key store lock");
        let secret = keys
            .get(alias)
            .ok_or_else(|| Error::KeyUnavailable(alias.to_string()))?;
        Ok(PublicKey::from(secret).to_bytes())
    }

    fn key_agreement(
        &self,
        alias: &str,
        peer_public: &[u8; 32],
    ) -> Result<Zeroizing<[u8; 32]>, Error> {
        let keys = self.keys.lock().expect("key store lock");
        let secret = keys
            .get(alias)
            .ok_or_else(|| Error::KeyUnavailable(alias.to_string()))?;
        let shared = secret.diffie_hellman(&PublicKey::from(*peer_public));
        if !shared.was_contributory() {
            return Err(Error::NonContributory);
        }
        Ok(Zeroizing::new(shared.to_bytes()))
    }
}
