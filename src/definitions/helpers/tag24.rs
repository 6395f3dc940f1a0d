//! Support for embedded
//! [CBOR Data Items](https://www.ietf.org/rfc/rfc8949.html#name-encoded-cbor-data-item),
//! also known as a tagged data item with tag number 24.

use ciborium::Value;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

use crate::cbor::{self, CborError};

pub const TAG_24: u64 = 24;

/// A wrapper for a value that is encoded as a CBOR tagged item with tag number 24.
///
/// When created by decoding, the original byte representation is kept so that digests
/// and signatures are computed over exactly what was received.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag24<T> {
    inner: T,
    pub inner_bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected a CBOR byte string inside tag 24, received: '{0:?}'")]
    InvalidTag24(Box<Value>),
    #[error("expected a CBOR tagged data item with tag number 24, received: '{0:?}'")]
    NotATag24(Value),
    #[error("unable to encode value as CBOR: {0}")]
    UnableToEncode(CborError),
    #[error("unable to decode bytes to inner type: {0}")]
    UnableToDecode(CborError),
}

impl<T> Tag24<T> {
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The tagged item itself, `24(bstr)`.
    pub fn to_value(&self) -> Value {
        Value::Tag(TAG_24, Box::new(Value::Bytes(self.inner_bytes.clone())))
    }

    /// CBOR encoding of the tagged item, as hashed for value digests.
    pub fn to_tagged_bytes(&self) -> Result<Vec<u8>, Error> {
        cbor::to_vec(&self.to_value()).map_err(Error::UnableToEncode)
    }
}

impl<T: Serialize + DeserializeOwned> Tag24<T> {
    pub fn new(inner: T) -> Result<Tag24<T>, Error> {
        let inner_bytes = cbor::to_vec(&inner).map_err(Error::UnableToEncode)?;
        Ok(Self { inner, inner_bytes })
    }
}

impl<T: DeserializeOwned> Tag24<T> {
    pub fn from_bytes(inner_bytes: Vec<u8>) -> Result<Tag24<T>, Error> {
        let inner = cbor::from_slice(&inner_bytes).map_err(Error::UnableToDecode)?;
        Ok(Self { inner, inner_bytes })
    }
}

impl<T: DeserializeOwned> TryFrom<Value> for Tag24<T> {
    type Error = Error;

    fn try_from(v: Value) -> Result<Tag24<T>, Error> {
        match v {
            Value::Tag(TAG_24, inner_value) => match *inner_value {
                Value::Bytes(inner_bytes) => Tag24::from_bytes(inner_bytes),
                other => Err(Error::InvalidTag24(Box::new(other))),
            },
            _ => Err(Error::NotATag24(v)),
        }
    }
}

impl<T> From<Tag24<T>> for Value {
    fn from(Tag24 { inner_bytes, .. }: Tag24<T>) -> Value {
        Value::Tag(TAG_24, Box::new(Value::Bytes(inner_bytes)))
    }
}

impl<T> AsRef<T> for Tag24<T> {
    fn as_ref(&self) -> &T {
        &self.inner
    }
}

impl<T> Serialize for Tag24<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Tag24<T> {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(d)?
            .try_into()
            .map_err(serde::de::Error::custom)
    }
}
