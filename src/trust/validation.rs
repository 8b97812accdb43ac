//! Standards-style certificate path validation against the anchor set.
//!
//! Revocation checking is deliberately absent: the kiosk is offline-first and
//! consumes refreshed anchor bundles instead of CRLs.

use der::Encode;
use ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use time::OffsetDateTime;
use x509_cert::Certificate;

use super::util::{common_name_or_unknown, public_key};
use super::x5chain::{CertificateWithDer, X5Chain};

/// Accumulated result of a chain validation. Empty errors means success.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that the issuer certificate signed the subject certificate.
pub fn issuer_signed_subject(subject: &Certificate, issuer: &Certificate) -> bool {
    let issuer_public_key: VerifyingKey = match public_key(issuer) {
        Ok(pk) => pk,
        Err(e) => {
            tracing::error!("failed to decode issuer public key: {e:?}");
            return false;
        }
    };

    let sig: Signature = match Signature::from_der(subject.signature.raw_bytes()) {
        Ok(sig) => sig,
        Err(e) => {
            tracing::error!("failed to parse subject signature: {e:?}");
            return false;
        }
    };

    let tbs = match subject.tbs_certificate.to_der() {
        Ok(tbs) => tbs,
        Err(e) => {
            tracing::error!("failed to encode subject tbs: {e:?}");
            return false;
        }
    };

    match issuer_public_key.verify(&tbs, &sig) {
        Ok(()) => true,
        Err(e) => {
            tracing::info!("subject certificate signature could not be validated: {e:?}");
            false
        }
    }
}

/// Check certificate validity period against a specific time.
pub fn check_validity_period_at(certificate: &Certificate, at: OffsetDateTime) -> Vec<String> {
    let validity = certificate.tbs_certificate.validity;
    let mut errors = vec![];

    let not_after = OffsetDateTime::from(validity.not_after.to_system_time());
    let not_before = OffsetDateTime::from(validity.not_before.to_system_time());

    if not_after < at {
        errors.push(format!(
            "certificate '{}' expired at {not_after}",
            common_name_or_unknown(certificate)
        ));
    }
    if not_before > at {
        errors.push(format!(
            "certificate '{}' not valid until {not_before}",
            common_name_or_unknown(certificate)
        ));
    }

    errors
}

/// Validate an x5chain against the anchor set at the given instant.
///
/// Each certificate must be signed by its successor in the chain, names must
/// chain (subject of the issuer equals issuer of the subject), every
/// certificate must be within its validity window, and the last certificate
/// must be issued by one of the anchors. An empty anchor set fails every
/// chain; permitting it is the caller's decision, not this function's.
pub fn validate_chain(
    x5chain: &X5Chain,
    anchors: &[CertificateWithDer],
    at: OffsetDateTime,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    if anchors.is_empty() {
        outcome
            .errors
            .push("no trust anchors available to terminate the chain".to_string());
        return outcome;
    }

    let certs: Vec<&CertificateWithDer> = x5chain.iter().collect();
    for pair in certs.windows(2) {
        let (subject, issuer) = (&pair[0].inner, &pair[1].inner);
        if subject.tbs_certificate.issuer != issuer.tbs_certificate.subject {
            outcome.errors.push(format!(
                "certificate '{}' does not name '{}' as its issuer",
                common_name_or_unknown(subject),
                common_name_or_unknown(issuer),
            ));
        }
        if !issuer_signed_subject(subject, issuer) {
            outcome.errors.push(format!(
                "certificate '{}' was not signed by '{}'",
                common_name_or_unknown(subject),
                common_name_or_unknown(issuer),
            ));
        }
    }

    for cert in &certs {
        outcome
            .errors
            .append(&mut check_validity_period_at(&cert.inner, at));
    }

    let last = &x5chain.root_entity_certificate().inner;
    let anchor = anchors
        .iter()
        .find(|anchor| anchor.inner.tbs_certificate.subject == last.tbs_certificate.issuer);
    match anchor {
        Some(anchor) => {
            if !issuer_signed_subject(last, &anchor.inner) {
                outcome.errors.push(format!(
                    "chain terminates at anchor '{}' but the signature does not verify",
                    common_name_or_unknown(&anchor.inner),
                ));
            }
            outcome
                .errors
                .append(&mut check_validity_period_at(&anchor.inner, at));
        }
        None => {
            outcome.errors.push(format!(
                "issuer of '{}' does not match any trust anchor",
                common_name_or_unknown(last),
            ));
        }
    }

    outcome
}

#[cfg(test)]
mod test {
    use p256::ecdsa::SigningKey;

    use crate::trust::test::{issued_by, self_signed};
    use crate::trust::X5Chain;

    use super::*;

    struct Fixture {
        anchor: CertificateWithDer,
        chain: X5Chain,
    }

    fn fixture() -> Fixture {
        let root_key = SigningKey::random(&mut rand::rngs::OsRng);
        let signer_key = SigningKey::random(&mut rand::rngs::OsRng);
        let root = self_signed(&root_key, "CN=root,C=US");
        let signer = issued_by(&signer_key, "CN=signer,C=US", &root_key, "CN=root,C=US");
        Fixture {
            anchor: CertificateWithDer::from_cert(root).unwrap(),
            chain: X5Chain::builder()
                .with_certificate(signer)
                .unwrap()
                .build()
                .unwrap(),
        }
    }

    #[test]
    fn chain_terminating_at_anchor_validates() {
        let f = fixture();
        let outcome = validate_chain(&f.chain, &[f.anchor], OffsetDateTime::now_utc());
        assert!(outcome.success(), "{outcome:?}");
    }

    #[test]
    fn empty_anchor_set_fails_every_chain() {
        let f = fixture();
        let outcome = validate_chain(&f.chain, &[], OffsetDateTime::now_utc());
        assert!(!outcome.success());
    }

    #[test]
    fn unrelated_anchor_is_rejected() {
        let f = fixture();
        let other_key = SigningKey::random(&mut rand::rngs::OsRng);
        let other =
            CertificateWithDer::from_cert(self_signed(&other_key, "CN=other,C=US")).unwrap();
        let outcome = validate_chain(&f.chain, &[other], OffsetDateTime::now_utc());
        assert!(!outcome.success());
    }

    #[test]
    fn matching_name_with_wrong_key_is_rejected() {
        let f = fixture();
        // Same subject name as the real root, different key.
        let impostor_key = SigningKey::random(&mut rand::rngs::OsRng);
        let impostor =
            CertificateWithDer::from_cert(self_signed(&impostor_key, "CN=root,C=US")).unwrap();
        let outcome = validate_chain(&f.chain, &[impostor], OffsetDateTime::now_utc());
        assert!(!outcome.success());
    }

    #[test]
    fn validity_window_is_checked_at_the_given_instant() {
        let f = fixture();
        let too_late = OffsetDateTime::now_utc() + time::Duration::hours(2);
        let outcome = validate_chain(&f.chain, &[f.anchor], too_late);
        assert!(!outcome.success());

        let too_early = OffsetDateTime::now_utc() - time::Duration::hours(2);
        let f = fixture();
        let outcome = validate_chain(&f.chain, &[f.anchor], too_early);
        assert!(!outcome.success());
    }
}
