use std::io::Cursor;

use coset::{cbor, CoseError, EndOfFile};
use serde::{de, Deserialize, Serialize};
use thiserror::Error;

/// Wraps [ciborium::Value] and implements [PartialEq], [Eq], [PartialOrd] and [Ord],
/// so it can be used in maps and sets.
#[derive(Debug, Clone)]
pub struct Value(pub ciborium::Value);

#[derive(Debug, Error)]
pub enum CborError {
    /// CBOR decoding failure.
    #[error("CBOR decoding failure: {0}")]
    DecodeFailed(cbor::de::Error<EndOfFile>),
    /// Duplicate map key detected.
    #[error("duplicate map key")]
    DuplicateMapKey,
    /// CBOR encoding failure.
    #[error("CBOR encoding failure")]
    EncodeFailed,
    /// CBOR input had extra data.
    #[error("extraneous data")]
    ExtraneousData,
    /// Integer value on the wire is outside the range of integers representable in this crate.
    /// See <https://crates.io/crates/coset/#integer-ranges>.
    #[error("integer value out of range")]
    OutOfRangeIntegerValue,
    /// Unexpected CBOR item encountered (got, want).
    #[error("unexpected item: {0}, want {1}")]
    UnexpectedItem(&'static str, &'static str),
    /// Unrecognized value in IANA-controlled range (with no private range).
    #[error("unregistered IANA value")]
    UnregisteredIanaValue,
    /// Unrecognized value in neither IANA-controlled range nor private range.
    #[error("unregistered non-private IANA value")]
    UnregisteredIanaNonPrivateValue,
}

impl From<CoseError> for CborError {
    fn from(e: CoseError) -> Self {
        match e {
            CoseError::DecodeFailed(e) => CborError::DecodeFailed(e),
            CoseError::DuplicateMapKey => CborError::DuplicateMapKey,
            CoseError::EncodeFailed => CborError::EncodeFailed,
            CoseError::ExtraneousData => CborError::ExtraneousData,
            CoseError::OutOfRangeIntegerValue => CborError::OutOfRangeIntegerValue,
            CoseError::UnexpectedItem(s, s2) => CborError::UnexpectedItem(s, s2),
            CoseError::UnregisteredIanaValue => CborError::UnregisteredIanaValue,
            CoseError::UnregisteredIanaNonPrivateValue => CborError::UnregisteredIanaNonPrivateValue,
        }
    }
}

pub fn to_vec<T>(value: &T) -> Result<Vec<u8>, CborError>
where
    T: Serialize,
{
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(coset::CoseError::from)
        .map_err(CborError::from)?;
    Ok(buf)
}

pub fn from_slice<T>(slice: &[u8]) -> Result<T, CborError>
where
    T: de::DeserializeOwned,
{
    ciborium::from_reader(Cursor::new(&slice))
        .map_err(|e| CoseError::DecodeFailed(ciborium::de::Error::Semantic(None, e.to_string())))
        .map_err(CborError::from)
}

impl std::ops::Deref for Value {
    type Target = ciborium::Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // ciborium::Value is only unordered across distinct NaN floats, which
        // cannot appear as claim keys.
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl From<ciborium::Value> for Value {
    fn from(value: ciborium::Value) -> Self {
        Self(value)
    }
}

impl From<Value> for ciborium::Value {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl AsRef<ciborium::Value> for Value {
    fn as_ref(&self) -> &ciborium::Value {
        &self.0
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        ciborium::Value::deserialize(deserializer).map(Value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let input = ciborium::Value::Map(vec![(
            ciborium::Value::Text("age_over_21".to_string()),
            ciborium::Value::Bool(true),
        )]);
        let bytes = to_vec(&input).unwrap();
        let output: ciborium::Value = from_slice(&bytes).unwrap();
        assert_eq!(input, output);
    }
}
