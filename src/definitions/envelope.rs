//! Wire framing for wallet-originated HPKE ciphertexts.
//!
//! The envelope is a 2-byte big-endian length prefix for the encapsulated
//! key, followed by the encapsulated key itself, followed by the AEAD
//! ciphertext: `uint16 encLen || encapsulatedKey[encLen] || ciphertext`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpkeEnvelope {
    pub encapsulated_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HPKE envelope too small: {0} bytes")]
    TooSmall(usize),
    #[error("missing encapsulated key")]
    MissingEncapsulatedKey,
    #[error("encapsulated key length {0} exceeds remaining {1} bytes")]
    Truncated(usize, usize),
}

impl HpkeEnvelope {
    pub fn new(encapsulated_key: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self {
            encapsulated_key,
            ciphertext,
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < 4 {
            return Err(Error::TooSmall(raw.len()));
        }
        let enc_len = u16::from_be_bytes([raw[0], raw[1]]) as usize;
        if enc_len == 0 {
            return Err(Error::MissingEncapsulatedKey);
        }
        let rest = &raw[2..];
        if enc_len > rest.len() {
            return Err(Error::Truncated(enc_len, rest.len()));
        }
        Ok(Self {
            encapsulated_key: rest[..enc_len].to_vec(),
            ciphertext: rest[enc_len..].to_vec(),
        })
    }

    pub fn to_byte_array(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.encapsulated_key.len() + self.ciphertext.len());
        out.extend_from_slice(&(self.encapsulated_key.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.encapsulated_key);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}
