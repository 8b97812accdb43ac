//! Session engagement records and the wallet-facing engagement payload.

use serde::{Deserialize, Serialize};

use super::request::VerificationRequest;

/// The engagement produced by a transport on `start`.
///
/// The transcript is the authoritative session-binding context: the exact
/// byte sequence here is later used both as HPKE associated data and as the
/// device-signature binding input. It is fixed at creation for the QR/web
/// transport and grows by tag payload for NFC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementSession {
    pub session_id: String,
    pub transcript: Vec<u8>,
    pub peer_info: Option<Vec<u8>>,
}

impl EngagementSession {
    pub fn new(session_id: impl Into<String>, transcript: Vec<u8>) -> Self {
        Self {
            session_id: session_id.into(),
            transcript,
            peer_info: None,
        }
    }
}

/// The structured payload encoded into the QR code and consumed by
/// third-party wallets. Field names and base64 encoding are the stable wire
/// contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementPayload {
    pub session_id: String,
    pub doc_type: String,
    pub elements: Vec<String>,
    /// Base64-encoded 32-byte session nonce.
    pub nonce: String,
    /// Base64-encoded X25519 public key of the verifier.
    #[serde(rename = "verifierKey")]
    pub verifier_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("engagement payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("engagement payload field is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl EngagementPayload {
    pub fn new(session_id: &str, request: &VerificationRequest) -> Self {
        Self {
            session_id: session_id.to_string(),
            doc_type: request.doc_type.clone(),
            elements: request.elements.clone(),
            nonce: base64::encode(request.nonce),
            verifier_key: base64::encode(&request.verifier_public_key),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn nonce_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(base64::decode(&self.nonce)?)
    }

    pub fn verifier_key_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(base64::decode(&self.verifier_key)?)
    }
}
