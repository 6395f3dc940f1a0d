//! Session transcripts for presentations requested through the Digital Credentials API.
//!
//! Both the device and the verifier build
//! `[null, null, ["OpenID4VPDCAPIHandover", sha256(cbor([origin, identifier, nonce]))]]`.
//! Two encodings of `identifier` exist in the wild; which one is used is configuration,
//! never inferred from the presentation.

use ciborium::Value;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cbor::{self, CborError};

pub const DC_API_HANDOVER_IDENTIFIER: &str = "OpenID4VPDCAPIHandover";

/// The encoding of the second element of the handover info array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverVersion {
    /// Earlier drafts: the verifier's client identifier as text.
    ClientId,
    /// Current drafts: the JWK thumbprint of the response encryption key, or null when
    /// the response is not encrypted.
    #[default]
    JwkThumbprint,
}

impl HandoverVersion {
    /// The client identifier a verifier without a registered one presents as.
    pub fn effective_client_id(self, origin: &str, configured: Option<&str>) -> String {
        if let Some(client_id) = configured {
            return client_id.to_string();
        }
        match self {
            HandoverVersion::ClientId => format!("web-origin:{origin}"),
            HandoverVersion::JwkThumbprint => format!("origin:{origin}"),
        }
    }

    pub fn identifier(
        self,
        origin: &str,
        configured_client_id: Option<&str>,
        jwk_thumbprint: Option<&[u8]>,
    ) -> HandoverIdentifier {
        match self {
            HandoverVersion::ClientId => HandoverIdentifier::ClientId(
                self.effective_client_id(origin, configured_client_id),
            ),
            HandoverVersion::JwkThumbprint => {
                HandoverIdentifier::JwkThumbprint(jwk_thumbprint.map(<[u8]>::to_vec))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoverIdentifier {
    ClientId(String),
    JwkThumbprint(Option<Vec<u8>>),
}

impl HandoverIdentifier {
    fn to_value(&self) -> Value {
        match self {
            HandoverIdentifier::ClientId(id) => Value::Text(id.clone()),
            HandoverIdentifier::JwkThumbprint(Some(thumbprint)) => Value::Bytes(thumbprint.clone()),
            HandoverIdentifier::JwkThumbprint(None) => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionTranscript(Value);

impl SessionTranscript {
    pub fn dc_api(
        origin: &str,
        nonce: &str,
        identifier: &HandoverIdentifier,
    ) -> Result<Self, CborError> {
        let handover_info = Value::Array(vec![
            Value::Text(origin.to_string()),
            identifier.to_value(),
            Value::Text(nonce.to_string()),
        ]);
        let handover_info_hash = Sha256::digest(cbor::to_vec(&handover_info)?).to_vec();
        Ok(Self(Value::Array(vec![
            Value::Null,
            Value::Null,
            Value::Array(vec![
                Value::Text(DC_API_HANDOVER_IDENTIFIER.to_string()),
                Value::Bytes(handover_info_hash),
            ]),
        ])))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CborError> {
        cbor::to_vec(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ORIGIN: &str = "https://digital-credentials.dev";

    fn client_id(id: &str) -> HandoverIdentifier {
        HandoverIdentifier::ClientId(id.to_string())
    }

    #[test]
    fn transcript_is_deterministic() {
        let a = SessionTranscript::dc_api(ORIGIN, "nonce", &client_id("web-origin:x"))
            .unwrap()
            .to_bytes()
            .unwrap();
        let b = SessionTranscript::dc_api(ORIGIN, "nonce", &client_id("web-origin:x"))
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn every_input_changes_the_transcript() {
        let base = SessionTranscript::dc_api(ORIGIN, "nonce", &client_id("id")).unwrap();
        let other_origin =
            SessionTranscript::dc_api("https://example.com", "nonce", &client_id("id")).unwrap();
        let other_nonce = SessionTranscript::dc_api(ORIGIN, "nonce2", &client_id("id")).unwrap();
        let other_id = SessionTranscript::dc_api(ORIGIN, "nonce", &client_id("id2")).unwrap();
        let thumbprint = SessionTranscript::dc_api(
            ORIGIN,
            "nonce",
            &HandoverIdentifier::JwkThumbprint(None),
        )
        .unwrap();
        for other in [other_origin, other_nonce, other_id, thumbprint] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn handover_hash_covers_the_info_array() {
        let transcript = SessionTranscript::dc_api(ORIGIN, "n", &client_id("c")).unwrap();
        let expected = Sha256::digest(
            cbor::to_vec(&Value::Array(vec![
                Value::Text(ORIGIN.into()),
                Value::Text("c".into()),
                Value::Text("n".into()),
            ]))
            .unwrap(),
        )
        .to_vec();
        let Value::Array(parts) = transcript.as_value() else {
            panic!("expected an array");
        };
        assert_eq!(parts[0], Value::Null);
        assert_eq!(
            parts[2],
            Value::Array(vec![
                Value::Text(DC_API_HANDOVER_IDENTIFIER.into()),
                Value::Bytes(expected)
            ])
        );
    }

    #[test]
    fn effective_client_id_follows_version() {
        assert_eq!(
            HandoverVersion::ClientId.effective_client_id(ORIGIN, None),
            "web-origin:https://digital-credentials.dev"
        );
        assert_eq!(
            HandoverVersion::JwkThumbprint.effective_client_id(ORIGIN, None),
            "origin:https://digital-credentials.dev"
        );
        assert_eq!(
            HandoverVersion::JwkThumbprint.effective_client_id(ORIGIN, Some("verifier")),
            "verifier"
        );
        assert_eq!(
            HandoverVersion::JwkThumbprint.identifier(ORIGIN, Some("verifier"), Some(&[1, 2])),
            HandoverIdentifier::JwkThumbprint(Some(vec![1, 2]))
        );
    }
}
