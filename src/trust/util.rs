use anyhow::{Context, Error};
use const_oid::db::rfc4519::COMMON_NAME;
use der::{
    asn1::{Ia5StringRef, PrintableStringRef, TeletexStringRef, Utf8StringRef},
    referenced::OwnedToRef,
    Tag, Tagged,
};
use p256::{ecdsa::VerifyingKey, PublicKey};
use x509_cert::{attr::AttributeValue, Certificate};

/// Get the ES256 public key from a certificate for verification.
///
/// The kiosk profile fixes the issuing infrastructure to P-256; certificates
/// on other curves are rejected here rather than silently skipped.
pub fn public_key(certificate: &Certificate) -> Result<VerifyingKey, Error> {
    certificate
        .tbs_certificate
        .subject_public_key_info
        .owned_to_ref()
        .try_into()
        .map(|key: PublicKey| key.into())
        .context("could not parse P-256 public key from SPKI")
}

/// Get the first CommonName of the X.509 certificate, or return "Unknown".
pub fn common_name_or_unknown(certificate: &Certificate) -> &str {
    common_name(certificate).unwrap_or("Unknown")
}

fn common_name(certificate: &Certificate) -> Option<&str> {
    certificate
        .tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter_map(|attribute| {
            if attribute.oid == COMMON_NAME {
                attribute_value_to_str(&attribute.value)
            } else {
                None
            }
        })
        .next()
}

fn attribute_value_to_str(av: &AttributeValue) -> Option<&str> {
    match av.tag() {
        Tag::PrintableString => PrintableStringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Utf8String => Utf8StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::Ia5String => Ia5StringRef::try_from(av).ok().map(|s| s.as_str()),
        Tag::TeletexString => TeletexStringRef::try_from(av).ok().map(|s| s.as_str()),
        _ => None,
    }
}
