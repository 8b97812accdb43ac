//! Session orchestration: engagement, decryption, verification, teardown.

pub mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::VerifierConfig;
use crate::cose;
use crate::crypto::hpke;
use crate::crypto::{key_provider, KeyProvider};
use crate::definitions::{
    device_response, envelope, DeviceResponse, EngagementPayload, EngagementSession, HpkeEnvelope,
    VerificationRequest,
};
use crate::presentation;
use crate::trust::{self, TrustBootstrap, X5Chain};

use transport::{EngagementTransport, TransportKind};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no session is active")]
    NoActiveSession,
    #[error("session token is stale")]
    StaleSession,
    #[error("no {0:?} transport is registered")]
    TransportUnavailable(TransportKind),
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Key(#[from] key_provider::Error),
    #[error(transparent)]
    Trust(#[from] trust::Error),
    #[error(transparent)]
    Envelope(#[from] envelope::Error),
    #[error(transparent)]
    Decrypt(#[from] hpke::Error),
    #[error(transparent)]
    Response(#[from] device_response::Error),
    #[error(transparent)]
    Issuer(#[from] cose::Error),
}

/// Opaque identity of one engagement session. Comparing tokens, not
/// references, decides whether a response belongs to the live session, so a
/// stale copy cannot be replayed against current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(u64);

/// Everything the host needs to drive one session: the token for later
/// calls and the payload for whichever transport renders it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub token: SessionToken,
    pub session_id: String,
    pub payload: EngagementPayload,
}

/// Consumes verification results for audit persistence. The engine never
/// stores results itself.
pub trait AuditSink: Send + Sync {
    fn record(&self, result: &VerificationResult);
}

impl<T: AuditSink + ?Sized> AuditSink for std::sync::Arc<T> {
    fn record(&self, result: &VerificationResult) {
        (**self).record(result)
    }
}

/// Default sink logs the verdict and drops it.
impl AuditSink for () {
    fn record(&self, result: &VerificationResult) {
        tracing::info!(
            is_success = result.is_success,
            audit = ?result.audit,
            "verification completed"
        );
    }
}

/// The only externally consumable record of a verification. The audit
/// lines carry coarse categories only; raw claim values and error detail
/// never appear there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub is_success: bool,
    pub minimal_claims: serde_json::Map<String, JsonValue>,
    pub portrait: Option<Vec<u8>>,
    pub audit: Vec<String>,
}

struct ActiveSession {
    token: SessionToken,
    transport: TransportKind,
    engagement: EngagementSession,
    request: VerificationRequest,
}

/// Owns the session lifecycle. One session is live at a time; a terminal
/// verdict or an explicit cancel retires it and stops the transport, while
/// transient failures leave it active so the wallet can retry.
///
/// All three operations run to completion under the session lock, so two
/// verification attempts can never interleave.
pub struct SessionManager {
    config: VerifierConfig,
    keys: Box<dyn KeyProvider>,
    trust: TrustBootstrap,
    transports: HashMap<TransportKind, Box<dyn EngagementTransport>>,
    audit: Box<dyn AuditSink>,
    generation: AtomicU64,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(config: VerifierConfig, keys: Box<dyn KeyProvider>, trust: TrustBootstrap) -> Self {
        Self {
            config,
            keys,
            trust,
            transports: HashMap::new(),
            audit: Box::new(()),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Register the transport offered for `kind`. A kiosk typically
    /// registers both QR and NFC and picks one per session.
    pub fn with_transport(
        mut self,
        kind: TransportKind,
        transport: Box<dyn EngagementTransport>,
    ) -> Self {
        self.transports.insert(kind, transport);
        self
    }

    pub fn with_audit_sink(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    fn stop_transport(&self, kind: TransportKind) {
        if let Some(transport) = self.transports.get(&kind) {
            transport.stop();
        }
    }

    pub fn trust(&self) -> &TrustBootstrap {
        &self.trust
    }

    /// Stage a new session on the `preferred` transport: fresh nonce,
    /// engagement payload bound to the verifier key, transport started.
    ///
    /// Any previously active session is retired before anything else, so a
    /// failure later in staging leaves no session behind: its token fails
    /// with `NoActiveSession` rather than pointing at a stopped transport.
    pub fn create_session(&self, preferred: TransportKind) -> Result<SessionHandle, Error> {
        let mut active = self.active.lock().expect("session lock");

        if let Some(prior) = active.take() {
            self.stop_transport(prior.transport);
        }

        let transport = self
            .transports
            .get(&preferred)
            .ok_or(Error::TransportUnavailable(preferred))?;

        self.keys.ensure_key(&self.config.key_alias)?;
        let public_key = self.keys.public_key(&self.config.key_alias)?;

        let request = VerificationRequest::new(
            self.config.doc_type.clone(),
            presentation::requested_elements(),
            public_key.to_vec(),
        );
        let session_id = Uuid::new_v4().to_string();
        let payload = EngagementPayload::new(&session_id, &request);

        let engagement = transport.start(&payload)?;

        let token = SessionToken(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
        *active = Some(ActiveSession {
            token,
            transport: preferred,
            engagement,
            request,
        });

        tracing::info!(%session_id, transport = ?preferred, "session staged");
        Ok(SessionHandle {
            token,
            session_id,
            payload,
        })
    }

    /// Decrypt a wallet envelope and verify the response against the
    /// session named by `token`.
    ///
    /// A returned `Ok` is a verdict and retires the session, whether the
    /// verdict is acceptance or a device-binding rejection. A returned
    /// `Err` is not a verdict: the session stays live and the caller may
    /// retry or cancel.
    pub fn decrypt_and_verify(
        &self,
        token: SessionToken,
        envelope_bytes: &[u8],
    ) -> Result<VerificationResult, Error> {
        let mut active = self.active.lock().expect("session lock");
        let session = active.as_ref().ok_or(Error::NoActiveSession)?;
        if session.token != token {
            return Err(Error::StaleSession);
        }
        let transport = self
            .transports
            .get(&session.transport)
            .ok_or(Error::TransportUnavailable(session.transport))?;
        // NFC transcripts grow during engagement; snapshot once here so the
        // HPKE associated data and the device-signature input are the same
        // bytes.
        let transcript = transport
            .current_transcript()
            .unwrap_or_else(|| session.engagement.transcript.clone());

        let now = OffsetDateTime::now_utc();
        let require_trust = !self.config.flags.dev_profile;
        let anchors = if require_trust {
            self.trust.load_iaca_roots()?.into_inner()
        } else {
            self.trust.anchors()
        };

        let envelope = HpkeEnvelope::parse(envelope_bytes)?;
        let plaintext = hpke::open(
            self.keys.as_ref(),
            &self.config.key_alias,
            &envelope,
            &transcript,
        )?;
        let response = DeviceResponse::parse(&plaintext)?;

        let issuer =
            cose::verify_issuer_signed(&response.issuer_signed, &anchors, now, require_trust)?;

        let binding_valid = match response.device_chain() {
            Some(chain) => {
                let chain = X5Chain::from(chain);
                cose::verify_device_signature(&response.device_signature, &transcript, &chain)
            }
            None => {
                tracing::error!("device response carries no certificate chain");
                false
            }
        };

        let minimized = if binding_valid {
            presentation::minimize(&session.request.elements, &issuer.claims)
        } else {
            presentation::MinimizedClaims::default()
        };

        let session_id = session.engagement.session_id.clone();
        let result = VerificationResult {
            is_success: binding_valid,
            audit: vec![
                format!("session={session_id}"),
                format!("issuer={}", issuer.signer_common_name()),
                format!("deviceSignatureValid={binding_valid}"),
                format!(
                    "elementsReleased={}",
                    minimized
                        .claims
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            ],
            minimal_claims: minimized.claims,
            portrait: minimized.portrait,
        };
        self.audit.record(&result);

        // Terminal verdict: the session is single-use.
        let kind = session.transport;
        *active = None;
        drop(active);
        self.stop_transport(kind);

        Ok(result)
    }

    /// Abandon the session named by `token`. Safe to call repeatedly and
    /// with stale tokens; only the live session is affected.
    pub fn cancel(&self, token: SessionToken) {
        let mut active = self.active.lock().expect("session lock");
        if active.as_ref().is_some_and(|s| s.token == token) {
            if let Some(session) = active.take() {
                drop(active);
                self.stop_transport(session.transport);
            }
        }
    }
}
