//! ISO/IEC 18013-5 mDL verification engine for kiosk verifiers.
//!
//! The engine stages one engagement session at a time, hands the host an
//! engagement payload to present over QR or NFC, and verifies the encrypted
//! device response end to end: HPKE decryption bound to the session
//! transcript, issuer COSE_Sign1 and certificate chain validation against
//! the IACA trust anchors, device-binding signature over the transcript,
//! and minimization of the released claims to exactly what was requested.
//!
//! [`session::SessionManager`] is the entry point; the host supplies a
//! [`crypto::KeyProvider`], a [`trust::TrustBootstrap`] and one
//! [`session::transport::EngagementTransport`] per transport kind it
//! offers, choosing a kind per session.

pub mod cbor;
pub mod config;
pub mod cose;
pub mod crypto;
pub mod definitions;
pub mod presentation;
pub mod session;
pub mod trust;

pub use config::{VerifierConfig, VerifierFlags};
pub use session::{SessionManager, VerificationResult};
