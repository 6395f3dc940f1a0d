use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use crate::definitions::HandoverVersion;

/// The request-bound inputs shared by both credential formats.
#[derive(Debug, Clone)]
pub struct VerificationContext<'a> {
    /// The nonce string exactly as it was sent in the request.
    pub nonce: &'a str,
    /// Origins the request may have been made from, tried in order.
    pub expected_origins: &'a [String],
    pub handover: HandoverVersion,
    pub client_id: Option<&'a str>,
    /// RFC 7638 thumbprint of the response encryption key, if the response was encrypted.
    pub jwk_thumbprint: Option<&'a [u8]>,
    pub now: OffsetDateTime,
}

/// Claims that passed every check, with what is known about their issuance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCredential {
    pub claims: BTreeMap<String, serde_json::Value>,
    pub issuer_meta: IssuerMeta,
    pub credential_meta: CredentialMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerMeta {
    #[serde(with = "time::serde::rfc3339::option")]
    pub issued_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub valid_from: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_on: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMeta {
    /// The origin the presentation was proven to be bound to, when the format binds one.
    pub verified_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
}
