//! Trust-anchor bootstrap and health reporting.

use std::sync::Mutex;

use time::OffsetDateTime;

use crate::definitions::helpers::NonEmptyVec;

use super::provider::TrustProvider;
use super::x5chain::CertificateWithDer;
use super::Error;

/// Snapshot of the verifier trust state surfaced to the UI collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStatus {
    pub anchors: usize,
    pub degraded: bool,
    pub last_updated: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustState {
    Nominal,
    Degraded,
}

/// Consumes trust degradation state for display. The engine only produces
/// into this sink; presentation is someone else's problem.
pub trait StatusSink: Send + Sync {
    fn trust_status(&self, status: &TrustStatus);
}

/// No-op sink for deployments without a status surface.
impl StatusSink for () {
    fn trust_status(&self, _status: &TrustStatus) {}
}

struct State {
    anchors: Vec<CertificateWithDer>,
    status: TrustStatus,
}

/// Coordinates loading trust anchors at start-up and exposes health state.
///
/// The primary source is the bundled production anchor set. A development
/// source may be merged in, but only when the caller explicitly opted into a
/// dev profile; health is always judged by the primary source alone.
pub struct TrustBootstrap {
    primary: Box<dyn TrustProvider>,
    development: Option<Box<dyn TrustProvider>>,
    sink: Box<dyn StatusSink>,
    state: Mutex<State>,
}

impl TrustBootstrap {
    pub fn new(primary: Box<dyn TrustProvider>) -> Self {
        Self {
            primary,
            development: None,
            sink: Box::new(()),
            state: Mutex::new(State {
                anchors: vec![],
                status: TrustStatus {
                    anchors: 0,
                    degraded: true,
                    last_updated: None,
                },
            }),
        }
    }

    /// Merge anchors from a development source on every refresh. Must never
    /// be wired up in a production configuration; see
    /// [`VerifierFlags::dev_profile`](crate::config::VerifierFlags).
    pub fn with_development_provider(mut self, provider: Box<dyn TrustProvider>) -> Self {
        self.development = Some(provider);
        self
    }

    pub fn with_status_sink(mut self, sink: Box<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn status(&self) -> TrustStatus {
        self.state.lock().expect("trust state lock").status.clone()
    }

    pub fn state(&self) -> TrustState {
        if self.status().degraded {
            TrustState::Degraded
        } else {
            TrustState::Nominal
        }
    }

    pub fn anchors(&self) -> Vec<CertificateWithDer> {
        self.state.lock().expect("trust state lock").anchors.clone()
    }

    /// Reload anchors from all configured sources, de-duplicated by encoded
    /// identity. Failure of a source degrades health rather than erroring:
    /// the kiosk keeps running and surfaces the condition.
    pub fn refresh_anchors(&self) -> Vec<CertificateWithDer> {
        let primary = match self.primary.load_anchors() {
            Ok(anchors) => anchors,
            Err(e) => {
                tracing::error!("failed to load primary trust anchors: {e}");
                vec![]
            }
        };
        let development = match &self.development {
            Some(provider) => match provider.load_anchors() {
                Ok(anchors) => anchors,
                Err(e) => {
                    tracing::warn!("failed to load dev trust anchors: {e}");
                    vec![]
                }
            },
            None => vec![],
        };

        let degraded = primary.is_empty();
        let mut combined = primary;
        for anchor in development {
            if !combined.iter().any(|a| a.der() == anchor.der()) {
                combined.push(anchor);
            }
        }

        let mut state = self.state.lock().expect("trust state lock");
        state.status = TrustStatus {
            anchors: combined.len(),
            degraded,
            last_updated: (!combined.is_empty()).then(OffsetDateTime::now_utc),
        };
        state.anchors = combined.clone();
        let status = state.status.clone();
        drop(state);

        tracing::info!(
            anchors = combined.len(),
            degraded,
            "trust bootstrap refresh completed"
        );
        self.sink.trust_status(&status);
        combined
    }

    /// Boolean chain check against an anchor set, for callers that do not
    /// need the per-certificate failure reasons.
    pub fn verify_chain(
        &self,
        chain: &super::X5Chain,
        anchors: &[CertificateWithDer],
        at: OffsetDateTime,
    ) -> bool {
        super::validate_chain(chain, anchors, at).success()
    }

    /// Production-facing accessor: returns the current anchors, refreshing
    /// once if the cache is empty, and fails with a distinct condition when
    /// no anchors exist so "no anchors" can never read as "nothing trusted".
    pub fn load_iaca_roots(&self) -> Result<NonEmptyVec<CertificateWithDer>, Error> {
        let cached = self.anchors();
        let anchors = if cached.is_empty() {
            self.refresh_anchors()
        } else {
            cached
        };
        NonEmptyVec::maybe_new(anchors).ok_or(Error::AnchorsUnavailable)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use super::super::provider::StaticTrustProvider;
    use super::*;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<TrustStatus>>);

    impl StatusSink for Arc<RecordingSink> {
        fn trust_status(&self, status: &TrustStatus) {
            self.0.lock().unwrap().push(status.clone());
        }
    }

    #[test]
    fn empty_primary_source_is_degraded_and_roots_unavailable() {
        let bootstrap = TrustBootstrap::new(Box::new(StaticTrustProvider::default()));
        assert!(bootstrap.refresh_anchors().is_empty());
        assert_eq!(bootstrap.state(), TrustState::Degraded);
        assert!(matches!(
            bootstrap.load_iaca_roots(),
            Err(Error::AnchorsUnavailable)
        ));
    }

    #[test]
    fn verify_chain_is_false_without_anchors() {
        let root_key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let signer_key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let root = crate::trust::test::self_signed(&root_key, "CN=root,C=US");
        let signer =
            crate::trust::test::issued_by(&signer_key, "CN=signer,C=US", &root_key, "CN=root,C=US");
        let chain = crate::trust::X5Chain::builder()
            .with_certificate(signer)
            .unwrap()
            .build()
            .unwrap();
        let anchor = crate::trust::CertificateWithDer::from_cert(root).unwrap();

        let bootstrap = TrustBootstrap::new(Box::new(StaticTrustProvider::default()));
        let now = OffsetDateTime::now_utc();
        assert!(!bootstrap.verify_chain(&chain, &[], now));
        assert!(bootstrap.verify_chain(&chain, &[anchor], now));
    }

    #[test]
    fn status_sink_observes_refresh() {
        let sink = Arc::new(RecordingSink::default());
        let bootstrap = TrustBootstrap::new(Box::new(StaticTrustProvider::default()))
            .with_status_sink(Box::new(sink.clone()));
        bootstrap.refresh_anchors();
        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].degraded);
        assert_eq!(seen[0].anchors, 0);
        assert_eq!(seen[0].last_updated, None);
    }
}
