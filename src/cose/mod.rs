//! COSE_Sign1 verification for issuer-signed data and device binding.

use std::collections::BTreeMap;

use coset::{CborSerializable, CoseSign1, Label, SignatureContext};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::Signature;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::cbor;
use crate::trust::x5chain::{X5Chain, X5CHAIN_COSE_HEADER_LABEL};
use crate::trust::{validate_chain, CertificateWithDer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to decode COSE_Sign1: {0}")]
    Decode(String),
    #[error("no x5chain header present")]
    MissingX5Chain,
    #[error("malformed x5chain header: {0}")]
    MalformedX5Chain(String),
    #[error("COSE_Sign1 carries no payload")]
    MissingPayload,
    #[error("no trust anchors are available")]
    NoTrustAnchors,
    #[error("issuer certificate chain is untrusted: {0}")]
    UntrustedIssuer(String),
    #[error("issuer signature is invalid")]
    SignatureInvalid,
    #[error("issuer payload is not a map of element identifiers")]
    MalformedClaims,
}

/// Outcome of issuer verification: the validated signer certificate, and
/// the full claim map it vouched for. Minimization happens later, against
/// the request.
#[derive(Debug, Clone)]
pub struct VerifiedIssuer {
    pub signer_certificate: CertificateWithDer,
    pub claims: BTreeMap<String, cbor::Value>,
}

impl VerifiedIssuer {
    pub fn signer_common_name(&self) -> &str {
        self.signer_certificate.common_name()
    }
}

fn x5chain_from_headers(sign1: &CoseSign1) -> Result<X5Chain, Error> {
    let label = Label::Int(X5CHAIN_COSE_HEADER_LABEL);
    let value = sign1
        .protected
        .header
        .rest
        .iter()
        .chain(sign1.unprotected.rest.iter())
        .find_map(|(l, v)| (*l == label).then_some(v))
        .ok_or(Error::MissingX5Chain)?;
    X5Chain::from_cbor(value).map_err(|e| Error::MalformedX5Chain(e.to_string()))
}

/// Verify an issuer-signed COSE_Sign1 end to end: decode, extract and
/// validate the x5chain against the trust anchors at `at`, check the ES256
/// signature with the leaf key, and decode the claim map from the payload.
///
/// When `require_trust` is false the chain validation step is skipped. That
/// path exists for development profiles only; production callers always
/// require trust.
pub fn verify_issuer_signed(
    bytes: &[u8],
    anchors: &[CertificateWithDer],
    at: OffsetDateTime,
    require_trust: bool,
) -> Result<VerifiedIssuer, Error> {
    if require_trust && anchors.is_empty() {
        return Err(Error::NoTrustAnchors);
    }

    let sign1 = CoseSign1::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))?;
    let chain = x5chain_from_headers(&sign1)?;

    if require_trust {
        let outcome = validate_chain(&chain, anchors, at);
        if !outcome.success() {
            let reasons = outcome.errors.join("; ");
            tracing::error!("issuer chain rejected: {reasons}");
            return Err(Error::UntrustedIssuer(reasons));
        }
    } else {
        tracing::warn!("issuer chain validation bypassed for development profile");
    }

    let payload = sign1.payload.as_deref().ok_or(Error::MissingPayload)?;
    let tbs = coset::sig_structure_data(
        SignatureContext::CoseSign1,
        sign1.protected.clone(),
        None,
        &[],
        payload,
    );
    let key = chain
        .end_entity_public_key()
        .map_err(|e| Error::MalformedX5Chain(e.to_string()))?;
    let signature =
        Signature::from_slice(&sign1.signature).map_err(|_| Error::SignatureInvalid)?;
    key.verify(&tbs, &signature)
        .map_err(|_| Error::SignatureInvalid)?;

    let claims = decode_claims(payload)?;
    Ok(VerifiedIssuer {
        signer_certificate: chain.end_entity_certificate().clone(),
        claims,
    })
}

fn decode_claims(payload: &[u8]) -> Result<BTreeMap<String, cbor::Value>, Error> {
    let value: ciborium::Value = cbor::from_slice(payload).map_err(|_| Error::MalformedClaims)?;
    let ciborium::Value::Map(entries) = value else {
        return Err(Error::MalformedClaims);
    };
    entries
        .into_iter()
        .map(|(k, v)| match k {
            ciborium::Value::Text(k) => Ok((k, cbor::Value(v))),
            _ => Err(Error::MalformedClaims),
        })
        .collect()
}

/// Check the holder's device signature over the session transcript.
///
/// The wallet signs a detached COSE_Sign1 whose external AAD is the SHA-256
/// digest of the transcript, using the device key from the leaf of
/// `device_chain`. Returns false on any structural or cryptographic failure;
/// callers treat false as a terminal rejection, not a retryable error.
pub fn verify_device_signature(bytes: &[u8], transcript: &[u8], device_chain: &X5Chain) -> bool {
    let sign1 = match CoseSign1::from_slice(bytes) {
        Ok(sign1) => sign1,
        Err(e) => {
            tracing::error!("failed to decode device COSE_Sign1: {e}");
            return false;
        }
    };
    let key = match device_chain.end_entity_public_key() {
        Ok(key) => key,
        Err(e) => {
            tracing::error!("device certificate has no usable P-256 key: {e}");
            return false;
        }
    };
    let digest = Sha256::digest(transcript);
    let tbs = coset::sig_structure_data(
        SignatureContext::CoseSign1,
        sign1.protected.clone(),
        None,
        &digest,
        sign1.payload.as_deref().unwrap_or(&[]),
    );
    let Ok(signature) = Signature::from_slice(&sign1.signature) else {
        return false;
    };
    key.verify(&tbs, &signature).is_ok()
}
