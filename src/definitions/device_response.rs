//! The decrypted device response returned by the wallet.

use serde::{Deserialize, Serialize};

use crate::cbor::{self, CborError};
use crate::definitions::helpers::NonEmptyVec;
use crate::trust::x5chain::CertificateWithDer;

/// Plaintext shape of the wallet response after HPKE decryption: a CBOR map
/// carrying the issuer-signed MSO, the device-binding signature, and the
/// device certificate chain as DER.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceResponseBytes {
    #[serde(with = "serde_bytes")]
    issuer_signed: Vec<u8>,
    #[serde(with = "serde_bytes")]
    device_signature: Vec<u8>,
    device_certificates: Vec<serde_bytes::ByteBuf>,
}

#[derive(Debug, Clone)]
pub struct DeviceResponse {
    pub issuer_signed: Vec<u8>,
    pub device_signature: Vec<u8>,
    pub device_certificates: Vec<CertificateWithDer>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("device response is not a well-formed CBOR map: {0}")]
    Cbor(#[from] CborError),
    #[error("device certificate could not be parsed: {0}")]
    Certificate(String),
}

impl DeviceResponse {
    pub fn parse(plaintext: &[u8]) -> Result<Self, Error> {
        let raw: DeviceResponseBytes = cbor::from_slice(plaintext)?;
        let device_certificates = raw
            .device_certificates
            .iter()
            .map(|der| {
                CertificateWithDer::from_der(der).map_err(|e| Error::Certificate(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            issuer_signed: raw.issuer_signed,
            device_signature: raw.device_signature,
            device_certificates,
        })
    }

    /// The device chain as a non-empty list, or `None` when the wallet sent
    /// no certificates (device binding then cannot be checked).
    pub fn device_chain(&self) -> Option<NonEmptyVec<CertificateWithDer>> {
        NonEmptyVec::maybe_new(self.device_certificates.clone())
    }
}

/// Builds the wire map for a device response. Used by wallet simulators.
pub fn to_wire(
    issuer_signed: Vec<u8>,
    device_signature: Vec<u8>,
    device_certificates: Vec<Vec<u8>>,
) -> Result<Vec<u8>, CborError> {
    cbor::to_vec(&DeviceResponseBytes {
        issuer_signed,
        device_signature,
        device_certificates: device_certificates
            .into_iter()
            .map(serde_bytes::ByteBuf::from)
            .collect(),
    })
}
