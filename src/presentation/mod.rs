//! Presentation requests and claim minimization.

use std::collections::BTreeMap;

use ciborium::Value as CborValue;
use serde_json::{json, Value as JsonValue};

use crate::cbor;

pub const DEFAULT_DOC_TYPE: &str = "org.iso.18013.5.1.mDL";

pub const AGE_OVER_21: &str = "age_over_21";
pub const GIVEN_NAME: &str = "given_name";
pub const FAMILY_NAME: &str = "family_name";
pub const PORTRAIT: &str = "portrait";

/// Elements the kiosk asks for. The portrait rides along for on-screen
/// comparison by the attendant; everything else is the minimal identity set.
pub fn requested_elements() -> Vec<String> {
    [AGE_OVER_21, GIVEN_NAME, FAMILY_NAME, PORTRAIT]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Claims surviving minimization. The portrait is kept as raw bytes rather
/// than passing through JSON so the UI can render it directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinimizedClaims {
    pub claims: serde_json::Map<String, JsonValue>,
    pub portrait: Option<Vec<u8>>,
}

/// Cut a verified claim map down to the intersection of what was requested
/// and what the issuer vouched for. Unrequested elements never leave this
/// function, even when disclosed.
pub fn minimize(
    requested: &[String],
    verified: &BTreeMap<String, cbor::Value>,
) -> MinimizedClaims {
    let mut minimized = MinimizedClaims::default();
    for element in requested {
        let Some(value) = verified.get(element) else {
            continue;
        };
        if element == PORTRAIT {
            if let CborValue::Bytes(bytes) = &value.0 {
                minimized.portrait = Some(bytes.clone());
                continue;
            }
        }
        minimized
            .claims
            .insert(element.clone(), claim_to_json(&value.0));
    }
    minimized
}

fn claim_to_json(value: &CborValue) -> JsonValue {
    match value {
        CborValue::Text(s) => JsonValue::String(s.clone()),
        CborValue::Bool(b) => json!(b),
        CborValue::Integer(i) => {
            let i = i128::from(*i);
            i64::try_from(i)
                .map(|i| json!(i))
                .or_else(|_| u64::try_from(i).map(|i| json!(i)))
                .unwrap_or(JsonValue::Null)
        }
        CborValue::Bytes(b) => JsonValue::String(base64::encode(b)),
        CborValue::Tag(_, inner) => claim_to_json(inner),
        CborValue::Array(items) => JsonValue::Array(items.iter().map(claim_to_json).collect()),
        CborValue::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                if let CborValue::Text(key) = key {
                    object.insert(key.clone(), claim_to_json(value));
                }
            }
            JsonValue::Object(object)
        }
        _ => JsonValue::Null,
    }
}
