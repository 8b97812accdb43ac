//! IACA trust anchors and certificate chain validation.

pub mod bootstrap;
pub mod provider;
mod util;
pub mod validation;
pub mod x5chain;

pub use bootstrap::{StatusSink, TrustBootstrap, TrustState, TrustStatus};
pub use provider::{DirectoryTrustProvider, StaticTrustProvider, TrustProvider};
pub use validation::{validate_chain, ValidationOutcome};
pub use x5chain::{CertificateWithDer, X5Chain, X5CHAIN_COSE_HEADER_LABEL};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("trust anchor source failed: {0}")]
    Provider(String),
    #[error("no trust anchors are available")]
    AnchorsUnavailable,
}

#[cfg(test)]
pub(crate) mod test {
    use std::time::Duration;

    use p256::ecdsa::{Signature, SigningKey};
    use signature::Signer;
    use x509_cert::{
        builder::{Builder, CertificateBuilder, Profile},
        name::Name,
        spki::{SignatureBitStringEncoding, SubjectPublicKeyInfoOwned},
        time::Validity,
        Certificate,
    };

    pub(crate) fn self_signed(key: &SigningKey, subject: &str) -> Certificate {
        build(key, subject, None, key)
    }

    pub(crate) fn issued_by(
        subject_key: &SigningKey,
        subject: &str,
        issuer_key: &SigningKey,
        issuer: &str,
    ) -> Certificate {
        build(subject_key, subject, Some(issuer), issuer_key)
    }

    fn build(
        subject_key: &SigningKey,
        subject: &str,
        issuer: Option<&str>,
        issuer_key: &SigningKey,
    ) -> Certificate {
        let spki =
            SubjectPublicKeyInfoOwned::from_key(subject_key.verifying_key().to_owned()).unwrap();
        let issuer: Option<Name> = issuer.map(|name| name.parse().unwrap());
        let subject: Name = subject.parse().unwrap();
        let mut builder = CertificateBuilder::new(
            Profile::Manual { issuer },
            rand::random::<u64>().into(),
            Validity::from_now(Duration::from_secs(600)).unwrap(),
            subject,
            spki,
            issuer_key,
        )
        .unwrap();
        let signature: Signature = issuer_key.sign(&builder.finalize().unwrap());
        builder
            .assemble(signature.to_der().to_bitstring().unwrap())
            .unwrap()
    }
}
