//! HPKE base-mode session encryption (RFC 9180 profile).
//!
//! The wallet contract fixes the ciphersuite to DHKEM(X25519) with
//! HKDF-SHA256 and AES-256-GCM, feeds the raw X25519 shared secret into the
//! key schedule, and encrypts a single message under the base nonce with the
//! session transcript as external AAD. [`open`] is the recipient side used
//! by the verifier; [`seal`] exists so wallet simulators can produce valid
//! envelopes.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use crate::definitions::HpkeEnvelope;

use super::key_provider::{self, KeyProvider};

const HPKE_VERSION: &[u8] = b"HPKE-v1";

/// suite_id = "HPKE" || kem_id(0x0020) || kdf_id(0x0001) || aead_id(0x0002)
const SUITE_ID: &[u8] = &[
    b'H', b'P', b'K', b'E', 0x00, 0x20, 0x00, 0x01, 0x00, 0x02,
];

/// Application info string, fixed for the engagement contract.
pub const HPKE_INFO: &[u8] = b"mdoc-engagement-v1";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("encapsulated key must be 32 bytes, got {0}")]
    EncapsulatedKeyLength(usize),
    #[error(transparent)]
    Key(#[from] key_provider::Error),
    #[error("key schedule derivation failed")]
    Derive,
    #[error("ciphertext failed to authenticate")]
    Open,
    #[error("encryption failed")]
    Seal,
}

fn labeled_ikm(label: &[u8], ikm: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HPKE_VERSION.len() + SUITE_ID.len() + label.len() + ikm.len());
    out.extend_from_slice(HPKE_VERSION);
    out.extend_from_slice(SUITE_ID);
    out.extend_from_slice(label);
    out.extend_from_slice(ikm);
    out
}

fn labeled_extract(salt: &[u8], label: &[u8], ikm: &[u8]) -> [u8; 32] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), &labeled_ikm(label, ikm));
    prk.into()
}

fn labeled_expand(prk: &[u8; 32], label: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), Error> {
    let mut labeled_info = Vec::with_capacity(2 + HPKE_VERSION.len() + SUITE_ID.len() + label.len() + info.len());
    labeled_info.extend_from_slice(&(out.len() as u16).to_be_bytes());
    labeled_info.extend_from_slice(HPKE_VERSION);
    labeled_info.extend_from_slice(SUITE_ID);
    labeled_info.extend_from_slice(label);
    labeled_info.extend_from_slice(info);
    Hkdf::<Sha256>::from_prk(prk)
        .map_err(|_| Error::Derive)?
        .expand(&labeled_info, out)
        .map_err(|_| Error::Derive)
}

/// Base-mode key schedule over the raw shared secret. Returns the AEAD key
/// and base nonce; a single message is encrypted so no sequence counter is
/// mixed into the nonce.
fn key_schedule(
    shared_secret: &[u8; 32],
    info: &[u8],
) -> Result<(Zeroizing<[u8; KEY_LEN]>, [u8; NONCE_LEN]), Error> {
    let psk_id_hash = labeled_extract(&[], b"psk_id_hash", &[]);
    let info_hash = labeled_extract(&[], b"info_hash", info);

    // mode_base = 0x00
    let mut context = Vec::with_capacity(1 + 32 + 32);
    context.push(0x00);
    context.extend_from_slice(&psk_id_hash);
    context.extend_from_slice(&info_hash);

    let secret = Zeroizing::new(labeled_extract(shared_secret, b"secret", &[]));

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    labeled_expand(&secret, b"key", &context, key.as_mut())?;
    let mut base_nonce = [0u8; NONCE_LEN];
    labeled_expand(&secret, b"base_nonce", &context, &mut base_nonce)?;
    Ok((key, base_nonce))
}

/// Decrypt an envelope addressed to the key under `alias`, authenticating
/// `aad` (the session transcript). Any failure, from a malformed
/// encapsulated key to an AEAD tag mismatch, rejects the envelope.
pub fn open(
    provider: &dyn KeyProvider,
    alias: &str,
    envelope: &HpkeEnvelope,
    aad: &[u8],
) -> Result<Vec<u8>, Error> {
    let enc: [u8; 32] = envelope
        .encapsulated_key
        .as_slice()
        .try_into()
        .map_err(|_| Error::EncapsulatedKeyLength(envelope.encapsulated_key.len()))?;
    let shared = provider.key_agreement(alias, &enc)?;
    let (key, base_nonce) = key_schedule(&shared, HPKE_INFO)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    cipher
        .decrypt(
            Nonce::from_slice(&base_nonce),
            Payload {
                msg: &envelope.ciphertext,
                aad,
            },
        )
        .map_err(|_| Error::Open)
}

/// Sender side of the same profile, producing an envelope for
/// `recipient_public`. Used by wallet simulators and tests.
pub fn seal(recipient_public: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<HpkeEnvelope, Error> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let encapsulated = PublicKey::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient_public));
    let (key, base_nonce) = key_schedule(&shared.to_bytes(), HPKE_INFO)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&base_nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| Error::Seal)?;

    Ok(HpkeEnvelope {
        encapsulated_key: encapsulated.to_vec(),
        ciphertext,
    })
}
