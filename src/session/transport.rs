//! Engagement transports for presenting the session payload to a wallet.

use std::sync::Mutex;

use crate::definitions::{EngagementPayload, EngagementSession};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport failed to start: {0}")]
    Start(String),
    #[error("transport timed out awaiting engagement")]
    Timeout,
}

/// Engagement transports a kiosk can offer. One is chosen per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Qr,
    Nfc,
}

/// Carries the engagement payload to the wallet and produces the engagement
/// session whose transcript the verification binds to.
///
/// `stop` is infallible and idempotent, and must be safe to call before
/// `start` so teardown paths never have to track transport state.
pub trait EngagementTransport: Send + Sync {
    fn start(&self, payload: &EngagementPayload) -> Result<EngagementSession, Error>;
    fn stop(&self);

    /// Current transcript for transports whose transcript grows after
    /// `start`. `None` means the transcript was fixed at `start`.
    fn current_transcript(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Presents the engagement payload as a QR code; the transcript is the
/// encoded payload, fixed at `start`. The transport only holds the encoded
/// text; rendering belongs to the UI layer, which polls
/// [`current_code`](QrEngagementTransport::current_code).
#[derive(Default)]
pub struct QrEngagementTransport {
    current: Mutex<Option<String>>,
}

impl QrEngagementTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_code(&self) -> Option<String> {
        self.current.lock().expect("qr transport lock").clone()
    }
}

impl EngagementTransport for QrEngagementTransport {
    fn start(&self, payload: &EngagementPayload) -> Result<EngagementSession, Error> {
        let encoded = payload.encode().map_err(|e| Error::Start(e.to_string()))?;
        let text =
            String::from_utf8(encoded.clone()).map_err(|e| Error::Start(e.to_string()))?;
        *self.current.lock().expect("qr transport lock") = Some(text);
        Ok(EngagementSession::new(payload.session_id.clone(), encoded))
    }

    fn stop(&self) {
        *self.current.lock().expect("qr transport lock") = None;
    }
}

/// NFC reader-mode transport. The transcript starts as the encoded payload
/// and grows as the host feeds observed NDEF payloads in via
/// [`push_tag`](NfcEngagementTransport::push_tag); consecutive duplicates
/// are ignored since a tag held in the field is read repeatedly.
#[derive(Default)]
pub struct NfcEngagementTransport {
    state: Mutex<NfcState>,
}

#[derive(Default)]
struct NfcState {
    active: bool,
    transcript: Vec<u8>,
    last_tag: Option<Vec<u8>>,
}

impl NfcEngagementTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tag(&self, payload: &[u8]) {
        let mut state = self.state.lock().expect("nfc transport lock");
        if !state.active {
            tracing::debug!(len = payload.len(), "dropping tag outside active session");
            return;
        }
        if state.last_tag.as_deref() == Some(payload) {
            tracing::debug!("ignoring redelivered tag");
            return;
        }
        tracing::debug!(len = payload.len(), "appending tag payload to transcript");
        state.transcript.extend_from_slice(payload);
        state.last_tag = Some(payload.to_vec());
    }
}

impl EngagementTransport for NfcEngagementTransport {
    fn start(&self, payload: &EngagementPayload) -> Result<EngagementSession, Error> {
        let encoded = payload.encode().map_err(|e| Error::Start(e.to_string()))?;
        let mut state = self.state.lock().expect("nfc transport lock");
        state.active = true;
        state.transcript = encoded.clone();
        state.last_tag = None;
        tracing::debug!(session_id = %payload.session_id, "nfc transport armed");
        Ok(EngagementSession::new(payload.session_id.clone(), encoded))
    }

    fn stop(&self) {
        let mut state = self.state.lock().expect("nfc transport lock");
        state.active = false;
        state.transcript.clear();
        state.last_tag = None;
    }

    fn current_transcript(&self) -> Option<Vec<u8>> {
        let state = self.state.lock().expect("nfc transport lock");
        state.active.then(|| state.transcript.clone())
    }
}

#[cfg(test)]
mod test {
    use crate::definitions::VerificationRequest;

    use super::*;

    fn payload() -> EngagementPayload {
        let request = VerificationRequest::new(
            "org.iso.18013.5.1.mDL",
            vec!["age_over_21".to_string()],
            vec![0u8; 32],
        );
        EngagementPayload::new("session-1", &request)
    }

    #[test]
    fn qr_exposes_payload_until_stopped() {
        let transport = QrEngagementTransport::new();
        assert_eq!(transport.current_code(), None);
        let session = transport.start(&payload()).unwrap();
        assert_eq!(
            transport.current_code().unwrap().as_bytes(),
            session.transcript.as_slice()
        );
        assert_eq!(transport.current_transcript(), None);
        transport.stop();
        assert_eq!(transport.current_code(), None);
    }

    #[test]
    fn stop_before_start_is_harmless() {
        let transport = NfcEngagementTransport::new();
        transport.stop();
        transport.stop();
        assert_eq!(transport.current_transcript(), None);
    }

    #[test]
    fn nfc_transcript_grows_per_distinct_tag() {
        let transport = NfcEngagementTransport::new();
        let session = transport.start(&payload()).unwrap();
        transport.push_tag(b"aa");
        transport.push_tag(b"aa");
        transport.push_tag(b"bb");
        transport.push_tag(b"aa");
        let mut expected = session.transcript.clone();
        expected.extend_from_slice(b"aabbaa");
        assert_eq!(transport.current_transcript(), Some(expected));
    }

    #[test]
    fn nfc_ignores_tags_outside_a_session() {
        let transport = NfcEngagementTransport::new();
        transport.push_tag(b"aa");
        let session = transport.start(&payload()).unwrap();
        transport.stop();
        transport.push_tag(b"bb");
        assert_eq!(transport.current_transcript(), None);
        drop(session);
    }
}
