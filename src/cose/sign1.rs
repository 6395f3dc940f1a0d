use ciborium::Value;
use coset::{AsCborValue, CborSerializable, Label, RegisteredLabelWithPrivate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::algorithm::{Algorithm, HeaderLabel};
use super::key::KeyError;
use crate::cbor::{self, CborError};

/// CBOR tag number of a tagged COSE_Sign1 structure.
const COSE_SIGN1_TAG: u64 = 18;

/// A COSE_Sign1 message, accepted with or without its CBOR tag.
#[derive(Clone, Debug, Default)]
pub struct CoseSign1(pub(crate) coset::CoseSign1);

impl CoseSign1 {
    pub fn new(inner: coset::CoseSign1) -> Self {
        Self(inner)
    }

    pub fn inner(&self) -> &coset::CoseSign1 {
        &self.0
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.0.payload.as_deref()
    }

    pub fn signature(&self) -> &[u8] {
        &self.0.signature
    }

    /// The serialized protected header exactly as it was received.
    pub fn protected_bytes(&self) -> Result<Vec<u8>, CborError> {
        if let Some(original) = &self.0.protected.original_data {
            return Ok(original.clone());
        }
        if self.0.protected.header.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.0.protected.header.clone().to_vec()?)
    }

    /// Build the to-be-signed `Sig_structure`:
    /// `["Signature1", protected, h'', payload]`.
    ///
    /// `detached_payload` replaces the embedded payload, as used by device signatures.
    pub fn signature_payload(&self, detached_payload: Option<&[u8]>) -> Result<Vec<u8>, CborError> {
        let payload = detached_payload
            .or(self.payload())
            .unwrap_or_default()
            .to_vec();
        let structure = Value::Array(vec![
            Value::Text("Signature1".to_string()),
            Value::Bytes(self.protected_bytes()?),
            Value::Bytes(Vec::new()),
            Value::Bytes(payload),
        ]);
        cbor::to_vec(&structure)
    }

    /// The `alg` parameter of the protected header, if present.
    pub fn protected_algorithm(&self) -> Result<Option<Algorithm>, KeyError> {
        match &self.0.protected.header.alg {
            None => Ok(None),
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => {
                Algorithm::from_i64(*alg as i64).map(Some)
            }
            Some(RegisteredLabelWithPrivate::PrivateUse(alg)) => {
                Err(KeyError::UnsupportedAlgorithm(*alg))
            }
            Some(RegisteredLabelWithPrivate::Text(_)) => Err(KeyError::InvalidParameter("alg")),
        }
    }

    /// Look up an integer-labelled parameter, unprotected header first.
    pub fn header_param(&self, label: HeaderLabel) -> Option<&Value> {
        let wanted = Label::Int(label.value());
        self.0
            .unprotected
            .rest
            .iter()
            .chain(self.0.protected.header.rest.iter())
            .find(|(l, _)| *l == wanted)
            .map(|(_, v)| v)
    }

    /// The `x5chain` header parameter carrying the signer's certificates.
    pub fn x5chain(&self) -> Option<&Value> {
        self.header_param(HeaderLabel::X5Chain)
    }
}

impl Serialize for CoseSign1 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0
            .clone()
            .to_cbor_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoseSign1 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Value::deserialize(deserializer)? {
            Value::Tag(COSE_SIGN1_TAG, inner) => *inner,
            other => other,
        };
        let inner = coset::CoseSign1::from_cbor_value(value).map_err(serde::de::Error::custom)?;
        Ok(CoseSign1(inner))
    }
}
