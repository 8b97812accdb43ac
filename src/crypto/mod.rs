//! Session-layer cryptography.

pub mod hpke;
pub mod key_provider;

pub use key_provider::{KeyProvider, SoftwareKeyProvider};
