//! X.509 certificate chains as carried in the COSE x5chain header and the
//! device response.

use anyhow::{anyhow, bail, Context, Error, Result};
use ciborium::Value as CborValue;
use p256::ecdsa::VerifyingKey;
use x509_cert::{
    certificate::Certificate,
    der::{Decode, Encode},
};

use crate::definitions::helpers::NonEmptyVec;

use super::util::{common_name_or_unknown, public_key};

/// See: <https://www.iana.org/assignments/cose/cose.xhtml#header-parameters>
pub const X5CHAIN_COSE_HEADER_LABEL: i64 = 0x21;

/// X.509 certificate with the DER representation held in memory for ease of
/// serialization and identity comparison.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CertificateWithDer {
    pub inner: Certificate,
    der: Vec<u8>,
}

impl CertificateWithDer {
    pub fn from_pem(bytes: &[u8]) -> Result<Self> {
        let bytes = pem_rfc7468::decode_vec(bytes)
            .map_err(|e| anyhow!("unable to parse certificate from PEM encoding: {e}"))?
            .1;
        CertificateWithDer::from_der(&bytes)
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let inner = Certificate::from_der(bytes)
            .context("unable to parse certificate from DER encoding")?;
        Ok(Self {
            inner,
            der: bytes.to_vec(),
        })
    }

    pub fn from_cert(certificate: Certificate) -> Result<Self> {
        let der = certificate.to_der()?;
        Ok(Self {
            inner: certificate,
            der,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject common name, or "Unknown" when the subject carries none.
    pub fn common_name(&self) -> &str {
        common_name_or_unknown(&self.inner)
    }
}

#[derive(Debug, Clone)]
pub struct X5Chain(NonEmptyVec<CertificateWithDer>);

impl From<NonEmptyVec<CertificateWithDer>> for X5Chain {
    fn from(v: NonEmptyVec<CertificateWithDer>) -> Self {
        Self(v)
    }
}

impl X5Chain {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn into_cbor(&self) -> CborValue {
        match self.0.as_ref() {
            [cert] => CborValue::Bytes(cert.der.clone()),
            certs => CborValue::Array(
                certs
                    .iter()
                    .map(|x509| x509.der.clone())
                    .map(CborValue::Bytes)
                    .collect::<Vec<CborValue>>(),
            ),
        }
    }

    pub fn from_cbor(cbor: &CborValue) -> Result<Self, Error> {
        match cbor {
            CborValue::Bytes(bytes) => Self::builder().with_der_certificate(bytes)?.build(),
            CborValue::Array(x509s) => {
                x509s.iter()
                    .try_fold(Self::builder(), |builder, x509| match x509 {
                        CborValue::Bytes(bytes) => builder.with_der_certificate(bytes),
                        _ => bail!("expected x509 certificate in the x5chain to be a cbor encoded bytestring, but received: {x509:?}")
                    })?
                    .build()
            }
            _ => bail!("expected x5chain to be a cbor encoded bytestring or array, but received: {cbor:?}"),
        }
    }

    /// Retrieve the end-entity certificate.
    pub fn end_entity_certificate(&self) -> &CertificateWithDer {
        self.0.first()
    }

    /// Retrieve the ES256 verifying key of the end-entity certificate.
    pub fn end_entity_public_key(&self) -> Result<VerifyingKey, Error> {
        public_key(&self.end_entity_certificate().inner)
    }

    pub fn end_entity_common_name(&self) -> &str {
        self.end_entity_certificate().common_name()
    }

    /// Retrieve the certificate closest to the trust anchor.
    pub fn root_entity_certificate(&self) -> &CertificateWithDer {
        self.0.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CertificateWithDer> {
        self.0.iter()
    }

    /// Always at least 1: a chain is built over a [`NonEmptyVec`] and an
    /// empty chain cannot be constructed.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Default, Debug, Clone)]
pub struct Builder {
    certs: Vec<CertificateWithDer>,
}

impl Builder {
    pub fn with_certificate(mut self, cert: Certificate) -> Result<Builder> {
        let x509 = CertificateWithDer::from_cert(cert)?;
        self.certs.push(x509);
        Ok(self)
    }

    pub fn with_certificate_and_der(mut self, x509: CertificateWithDer) -> Builder {
        self.certs.push(x509);
        self
    }

    pub fn with_pem_certificate(mut self, data: &[u8]) -> Result<Builder> {
        let x509 = CertificateWithDer::from_pem(data)?;
        self.certs.push(x509);
        Ok(self)
    }

    pub fn with_der_certificate(mut self, data: &[u8]) -> Result<Builder> {
        let x509 = CertificateWithDer::from_der(data)?;
        self.certs.push(x509);
        Ok(self)
    }

    pub fn build(self) -> Result<X5Chain> {
        Ok(X5Chain(self.certs.try_into().context(
            "at least one certificate must be given to the builder",
        )?))
    }
}

#[cfg(test)]
mod test {
    use p256::ecdsa::SigningKey;

    use crate::trust::test::{issued_by, self_signed};

    use super::*;

    fn chain() -> X5Chain {
        let root_key = SigningKey::random(&mut rand::rngs::OsRng);
        let signer_key = SigningKey::random(&mut rand::rngs::OsRng);
        let root = self_signed(&root_key, "CN=root,C=US");
        let signer = issued_by(&signer_key, "CN=signer,C=US", &root_key, "CN=root,C=US");
        X5Chain::builder()
            .with_certificate(signer)
            .unwrap()
            .with_certificate(root)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn empty_chain_cannot_be_built() {
        assert!(X5Chain::builder().build().is_err());
    }

    #[test]
    fn single_certificate_encodes_as_bytes() {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let cert = self_signed(&key, "CN=solo,C=US");
        let chain = X5Chain::builder()
            .with_certificate(cert)
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(chain.into_cbor(), CborValue::Bytes(_)));
    }

    #[test]
    fn cbor_round_trip_preserves_order() {
        let chain = chain();
        assert!(matches!(chain.into_cbor(), CborValue::Array(_)));
        let decoded = X5Chain::from_cbor(&chain.into_cbor()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded.end_entity_certificate().der(),
            chain.end_entity_certificate().der()
        );
        assert_eq!(decoded.end_entity_common_name(), "signer");
    }

    #[test]
    fn non_bytes_chain_entry_is_rejected() {
        let cbor = CborValue::Array(vec![CborValue::Integer(7.into())]);
        assert!(X5Chain::from_cbor(&cbor).is_err());
    }
}
