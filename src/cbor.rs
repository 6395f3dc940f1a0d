//! Boundary to the CBOR codec.
//!
//! Everything that encodes or decodes CBOR goes through here, so the rest of the
//! crate only sees [ciborium::Value] and serde types.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use coset::{cbor, CoseError, EndOfFile};
use serde::{de, Serialize};
use std::io::Cursor;
use thiserror::Error;

pub use ciborium::Value;

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
            CoseError::UnregisteredIanaNonPrivateValue => {
                CborError::UnregisteredIanaNonPrivateValue
            }
        }
    }
}

fn semantic(message: String) -> CborError {
    CborError::DecodeFailed(ciborium::de::Error::Semantic(None, message))
}

/// Encode a value with definite lengths and shortest-form integers.
pub fn to_vec<T>(value: &T) -> Result<Vec<u8>, CborError>
where
    T: Serialize,
{
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|_| CborError::EncodeFailed)?;
    Ok(buf)
}

/// Decode exactly one data item; trailing bytes are rejected.
pub fn from_slice<T>(slice: &[u8]) -> Result<T, CborError>
where
    T: de::DeserializeOwned,
{
    let mut cursor = Cursor::new(slice);
    let value = ciborium::from_reader(&mut cursor).map_err(|e| semantic(e.to_string()))?;
    if (cursor.position() as usize) < slice.len() {
        return Err(CborError::ExtraneousData);
    }
    Ok(value)
}

/// Convert a [Value] into a type `T`.
#[allow(clippy::needless_pass_by_value)]
pub fn from_value<T>(value: Value) -> Result<T, CborError>
where
    T: de::DeserializeOwned,
{
    value
        .deserialized()
        .map_err(|e: ciborium::value::Error| semantic(e.to_string()))
}

pub fn into_value<S>(v: S) -> Result<Value, CborError>
where
    S: Serialize,
{
    Value::serialized(&v).map_err(|_| CborError::EncodeFailed)
}

/// Look up a text key in a CBOR map.
pub(crate) fn map_get<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Text(t) if t == key))
        .map(|(_, v)| v)
}

/// Render a CBOR value as JSON for callers that consume claims as JSON.
///
/// Byte strings become base64url text, tags are dropped in favour of their content and
/// non-text map keys are rendered as text.
pub fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Text(s) => Json::String(s.clone()),
        Value::Integer(i) => {
            let i = i128::from(*i);
            if let Ok(i) = i64::try_from(i) {
                Json::from(i)
            } else if let Ok(u) = u64::try_from(i) {
                Json::from(u)
            } else {
                Json::String(i.to_string())
            }
        }
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Bytes(b) => Json::String(URL_SAFE_NO_PAD.encode(b)),
        Value::Tag(_, inner) => to_json(inner),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::Text(t) => t.clone(),
                        other => match to_json(other) {
                            Json::String(s) => s,
                            json => json.to_string(),
                        },
                    };
                    (key, to_json(v))
                })
                .collect(),
        ),
        _ => Json::Null,
    }
}
