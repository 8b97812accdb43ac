use rand::{rngs::OsRng, RngCore};

/// Number of random bytes in the per-session nonce.
pub const NONCE_LEN: usize = 32;

/// The verifier's request for a presentation, staged once per session.
///
/// The nonce is freshly drawn from the OS CSPRNG for every session and is
/// part of the replay defense: two sessions never share a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub doc_type: String,
    pub elements: Vec<String>,
    pub nonce: [u8; NONCE_LEN],
    pub verifier_public_key: Vec<u8>,
}

impl VerificationRequest {
    pub fn new(
        doc_type: impl Into<String>,
        elements: Vec<String>,
        verifier_public_key: Vec<u8>,
    ) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        Self {
            doc_type: doc_type.into(),
            elements,
            nonce,
            verifier_public_key,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nonce_is_unique_per_request() {
        let a = VerificationRequest::new("org.iso.18013.5.1.mDL", vec![], vec![]);
        let b = VerificationRequest::new("org.iso.18013.5.1.mDL", vec![], vec![]);
        assert_ne!(a.nonce, b.nonce);
    }
}
