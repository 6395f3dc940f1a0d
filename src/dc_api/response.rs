//! Verification of the object the Digital Credentials API hands back to the page.
//!
//! Shape failures, a bad nonce or an undecryptable JWE reject the whole response.
//! Once every entry of `vp_token` has been recognised, each credential is verified on
//! its own and a failure only affects that credential.

use std::collections::BTreeMap;
use std::sync::Arc;

use josekit::{jwe::ECDH_ES, jwk::Jwk};
use serde_json::{Map, Value};

use super::credential::{VerificationContext, VerifiedCredential};
use super::request::{CredentialFormat, DcqlQuery};
use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::nonce::{NonceCodec, ResponseEncryptionKeys};
use crate::presentation::verify_mdoc;
use crate::providers::{Clock, SystemClock};
use crate::sd_jwt::{verify_sd_jwt_vc, SdJwtEngine, StandardEngine};

/// Per-credential results of one response.
#[derive(Debug, Default)]
pub struct VerificationOutcome {
    pub credentials: BTreeMap<String, VerifiedCredential>,
    pub failures: BTreeMap<String, Error>,
}

impl VerificationOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All credentials, or the failure of the first credential id that failed.
    pub fn into_result(self) -> Result<BTreeMap<String, VerifiedCredential>> {
        match self.failures.into_iter().next() {
            Some((id, error)) => {
                tracing::debug!(%id, "credential failed verification");
                Err(error)
            }
            None => Ok(self.credentials),
        }
    }
}

/// Verifies responses. The server secret is passed to every [Verifier::verify] call and
/// never stored.
pub struct Verifier {
    config: VerifierConfig,
    clock: Arc<dyn Clock>,
    engine: Arc<dyn SdJwtEngine>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            engine: Arc::new(StandardEngine),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn SdJwtEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify a response against the nonce of the request that produced it, opening the
    /// nonce with `server_secret`.
    ///
    /// `raw` is the response object, or a string holding its JSON. When `query` is the
    /// DCQL query of that request, only the credentials it asked for are verified and
    /// each one is held to its query's format, `doctype_value` and `vct_values`.
    pub fn verify(
        &self,
        raw: &Value,
        nonce: &str,
        server_secret: &[u8],
        query: Option<&DcqlQuery>,
    ) -> Result<VerificationOutcome> {
        if self.config.expected_origins.is_empty() {
            return Err(Error::invalid_response("no expected origins are configured"));
        }
        let envelope = parse_envelope(raw)?;

        let payload = NonceCodec::new(server_secret)?.open(nonce)?;
        let now = self.clock.now();
        if payload.is_expired(now) {
            return Err(Error::invalid_response(format!(
                "nonce expired at {}",
                payload.expires_on
            )));
        }

        let (body, thumbprint) = match &payload.response_encryption_keys {
            Some(keys) => (decrypt_response(&envelope, keys)?, Some(keys.thumbprint()?)),
            None => (envelope, None),
        };

        let presentations = vp_token(&body)?;

        let ctx = VerificationContext {
            nonce,
            expected_origins: &self.config.expected_origins,
            handover: self.config.handover,
            client_id: self.config.client_id.as_deref(),
            jwk_thumbprint: thumbprint.as_deref(),
            now,
        };

        let mut outcome = VerificationOutcome::default();
        match query {
            Some(query) => {
                for id in presentations.keys() {
                    if !query.credentials.iter().any(|c| c.id == *id) {
                        tracing::warn!(%id, "vp_token entry was not requested, skipping");
                    }
                }
                for credential in &query.credentials {
                    let Some((format, presentation)) = presentations.get(&credential.id) else {
                        tracing::warn!(id = %credential.id, "no presentation for requested credential, skipping");
                        continue;
                    };
                    let result = CredentialFormat::parse(&credential.format)
                        .map_err(|e| e.rebrand(crate::error::ErrorKind::InvalidDcApiResponse))
                        .and_then(|requested| {
                            if requested != *format {
                                return Err(Error::invalid_response(format!(
                                    "credential '{}' was requested as {} but presented as {}",
                                    credential.id,
                                    requested.as_dcql(),
                                    format.as_dcql()
                                )));
                            }
                            self.verify_one(
                                *format,
                                presentation,
                                &ctx,
                                credential.doctype_value(),
                                credential.vct_values(),
                            )
                        });
                    outcome.record(&credential.id, result);
                }
            }
            None => {
                for (id, (format, presentation)) in &presentations {
                    let result = self.verify_one(*format, presentation, &ctx, None, None);
                    outcome.record(id, result);
                }
            }
        }
        Ok(outcome)
    }

    fn verify_one(
        &self,
        format: CredentialFormat,
        presentation: &str,
        ctx: &VerificationContext<'_>,
        doc_type: Option<&str>,
        vct_values: Option<&[String]>,
    ) -> Result<VerifiedCredential> {
        match format {
            CredentialFormat::MsoMdoc => verify_mdoc(presentation, ctx, doc_type),
            CredentialFormat::DcSdJwt => {
                verify_sd_jwt_vc(presentation, ctx, vct_values, self.engine.as_ref())
            }
        }
    }
}

impl VerificationOutcome {
    fn record(&mut self, id: &str, result: Result<VerifiedCredential>) {
        match result {
            Ok(credential) => {
                tracing::debug!(%id, "credential verified");
                self.credentials.insert(id.to_string(), credential);
            }
            Err(error) => {
                tracing::warn!(%id, kind = %error.kind(), %error, "credential rejected");
                self.failures.insert(id.to_string(), error);
            }
        }
    }
}

/// Verify a response with default settings, failing if any credential fails.
pub fn verify_response(
    raw: &Value,
    nonce: &str,
    expected_origins: &[String],
    server_secret: &[u8],
) -> Result<BTreeMap<String, VerifiedCredential>> {
    let config = VerifierConfig {
        expected_origins: expected_origins.to_vec(),
        ..Default::default()
    };
    Verifier::new(config)
        .verify(raw, nonce, server_secret, None)?
        .into_result()
}

fn parse_envelope(raw: &Value) -> Result<Map<String, Value>> {
    let parsed;
    let raw = match raw {
        Value::String(json) => {
            parsed = serde_json::from_str::<Value>(json)
                .map_err(|e| Error::invalid_response("response is not valid JSON").with_source(e))?;
            &parsed
        }
        other => other,
    };
    match raw {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(Error::invalid_response("response is not a JSON object")),
    }
}

fn decrypt_response(
    envelope: &Map<String, Value>,
    keys: &ResponseEncryptionKeys,
) -> Result<Map<String, Value>> {
    let jwe = envelope
        .get("response")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_response("encrypted response has no 'response' JWE"))?;
    if jwe.split('.').count() != 5 {
        return Err(Error::invalid_response(
            "'response' is not a compact JWE with five segments",
        ));
    }

    let jwk = serde_json::to_vec(&keys.private_key_jwk)
        .map_err(|e| Error::crypto("unable to serialize decryption key").with_source(e))?;
    let jwk = Jwk::from_bytes(&jwk)
        .map_err(|e| Error::crypto("unable to import decryption key").with_source(e))?;
    let decrypter = ECDH_ES
        .decrypter_from_jwk(&jwk)
        .map_err(|e| Error::crypto("unable to create ECDH-ES decrypter").with_source(e))?;
    let (payload, header) = josekit::jwe::deserialize_compact(jwe, &decrypter)
        .map_err(|e| Error::invalid_response("unable to decrypt response JWE").with_source(e))?;
    tracing::debug!(enc = ?header.content_encryption(), "decrypted response JWE");

    match serde_json::from_slice(&payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::invalid_response("decrypted response is not a JSON object")),
        Err(e) => Err(Error::invalid_response("decrypted response is not JSON").with_source(e)),
    }
}

/// Every `vp_token` entry with its sniffed format. Arrays are accepted when they hold
/// exactly one presentation.
fn vp_token(body: &Map<String, Value>) -> Result<BTreeMap<String, (CredentialFormat, String)>> {
    let Some(Value::Object(token)) = body.get("vp_token") else {
        return Err(Error::invalid_response("response has no vp_token object"));
    };
    let mut presentations = BTreeMap::new();
    for (id, entry) in token {
        let presentation = match entry {
            Value::String(p) => p.as_str(),
            Value::Array(items) => match items.as_slice() {
                [Value::String(p)] => p.as_str(),
                _ => {
                    return Err(Error::invalid_response(format!(
                        "vp_token entry '{id}' must hold exactly one presentation string"
                    )))
                }
            },
            _ => {
                return Err(Error::invalid_response(format!(
                    "vp_token entry '{id}' is not a string"
                )))
            }
        };
        let format = sniff_format(presentation).ok_or_else(|| {
            Error::invalid_response(format!(
                "vp_token entry '{id}' is neither an mdoc nor an SD-JWT"
            ))
        })?;
        presentations.insert(id.clone(), (format, presentation.to_string()));
    }
    Ok(presentations)
}

/// Bare base64url is a DeviceResponse; at least two `.` and one `~` is an SD-JWT.
pub fn sniff_format(presentation: &str) -> Option<CredentialFormat> {
    let base64url = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !presentation.is_empty() && presentation.trim_end_matches('=').chars().all(base64url) {
        return Some(CredentialFormat::MsoMdoc);
    }
    let dots = presentation.matches('.').count();
    let tildes = presentation.matches('~').count();
    (dots >= 2 && tildes >= 1).then_some(CredentialFormat::DcSdJwt)
}
