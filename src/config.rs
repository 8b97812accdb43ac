//! Verifier deployment configuration.

use time::Duration;

/// Feature flags. Everything here defaults to off; flipping a flag is an
/// explicit deployment decision, never a runtime fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifierFlags {
    /// Accepts issuer chains without anchor validation and merges the
    /// development anchor bundle. Must never be set on a production kiosk.
    pub dev_profile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Alias of the X25519 session key in the key provider.
    pub key_alias: String,
    /// Doc type requested in engagement payloads.
    pub doc_type: String,
    /// How often the trust bootstrap refreshes its anchor set.
    pub anchor_refresh_interval: Duration,
    /// Optional override for the anchor distribution endpoint, passed
    /// through to whichever provider fetches remotely.
    pub trust_endpoint_override: Option<String>,
    pub flags: VerifierFlags,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            key_alias: "mdl-session-key".to_string(),
            doc_type: crate::presentation::DEFAULT_DOC_TYPE.to_string(),
            anchor_refresh_interval: Duration::hours(24),
            trust_endpoint_override: None,
            flags: VerifierFlags::default(),
        }
    }
}
