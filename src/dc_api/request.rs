//! OpenID4VP requests for the Digital Credentials API.
//!
//! A request is generated together with its nonce. The nonce carries the expiry and,
//! when the response is to be encrypted, the ephemeral decryption key, so nothing needs
//! to be stored between issuing the request and verifying the response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::Duration;

use crate::config::VerifierConfig;
use crate::error::{Error, Result};
use crate::nonce::NonceCodec;
use crate::providers::{
    Clock, KeyPairGenerator, OsRandom, P256KeyPairGenerator, RandomSource, SystemClock,
};

pub const PROTOCOL_OPENID4VP: &str = "openid4vp";
pub const FORMAT_MSO_MDOC: &str = "mso_mdoc";
pub const FORMAT_DC_SD_JWT: &str = "dc+sd-jwt";
pub const DEFAULT_DOCTYPE: &str = "org.iso.18013.5.1.mDL";
pub const DEFAULT_NAMESPACE: &str = "org.iso.18013.5.1";
pub const DEFAULT_CREDENTIAL_ID: &str = "cred1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFormat {
    MsoMdoc,
    DcSdJwt,
}

impl CredentialFormat {
    /// Accepts the short names `mdl` and `sd-jwt-vc` as well as the DCQL identifiers.
    pub fn parse(format: &str) -> Result<Self> {
        match format {
            "mdl" | FORMAT_MSO_MDOC => Ok(Self::MsoMdoc),
            "sd-jwt-vc" | FORMAT_DC_SD_JWT => Ok(Self::DcSdJwt),
            other => Err(Error::presentation_options(format!(
                "unsupported credential format '{other}'"
            ))),
        }
    }

    pub fn as_dcql(self) -> &'static str {
        match self {
            Self::MsoMdoc => FORMAT_MSO_MDOC,
            Self::DcSdJwt => FORMAT_DC_SD_JWT,
        }
    }
}

/// What the relying party wants to ask for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationOptions {
    pub format: String,
    pub desired_claims: Vec<String>,
    pub request_origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vct_values: Option<Vec<String>>,
    #[serde(default)]
    pub encrypt_response: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// `{digital: {requests: [...]}}`, the argument of `navigator.credentials.get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcApiRequest {
    pub digital: DigitalRequests,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalRequests {
    pub requests: Vec<ProtocolRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolRequest {
    pub protocol: String,
    pub data: OpenId4VpRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenId4VpRequest {
    pub response_type: String,
    pub response_mode: String,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub dcql_query: DcqlQuery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcqlQuery {
    pub credentials: Vec<CredentialQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialQuery {
    pub id: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CredentialQueryMeta>,
    #[serde(default)]
    pub claims: Vec<ClaimQuery>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialQueryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctype_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vct_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimQuery {
    pub path: Vec<String>,
}

impl CredentialQuery {
    pub fn doctype_value(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.doctype_value.as_deref())
    }

    pub fn vct_values(&self) -> Option<&[String]> {
        self.meta.as_ref().and_then(|m| m.vct_values.as_deref())
    }
}

impl DcApiRequest {
    /// The OpenID4VP payload of the first request.
    pub fn openid4vp(&self) -> Option<&OpenId4VpRequest> {
        self.digital
            .requests
            .iter()
            .find(|r| r.protocol == PROTOCOL_OPENID4VP)
            .map(|r| &r.data)
    }
}

/// A request ready to hand to the browser and the nonce inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRequest {
    pub request: DcApiRequest,
    pub nonce: String,
    pub origin: String,
}

/// Builds requests. The server secret is passed to every [RequestBuilder::build] call and
/// never stored.
pub struct RequestBuilder {
    config: VerifierConfig,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    key_pairs: Arc<dyn KeyPairGenerator>,
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub fn new(config: VerifierConfig) -> Self {
        Self::with_providers(
            config,
            Arc::new(SystemClock),
            Arc::new(OsRandom),
            Arc::new(P256KeyPairGenerator),
        )
    }

    pub fn with_providers(
        config: VerifierConfig,
        clock: Arc<dyn Clock>,
        random: Arc<dyn RandomSource>,
        key_pairs: Arc<dyn KeyPairGenerator>,
    ) -> Self {
        Self {
            config,
            clock,
            random,
            key_pairs,
        }
    }

    /// Build a request and seal its nonce under `server_secret`.
    pub fn build(
        &self,
        options: &PresentationOptions,
        server_secret: &[u8],
    ) -> Result<GeneratedRequest> {
        let codec = NonceCodec::with_random(server_secret, self.random.clone())
            .map_err(|e| e.rebrand(crate::error::ErrorKind::InvalidPresentationOptions))?;
        let format = CredentialFormat::parse(&options.format)?;
        if options.desired_claims.is_empty() {
            return Err(Error::presentation_options("no claims requested"));
        }
        if options.desired_claims.iter().any(String::is_empty) {
            return Err(Error::presentation_options("claim names must not be empty"));
        }
        if options.request_origin.trim().is_empty() {
            return Err(Error::presentation_options("request origin is required"));
        }

        let query = credential_query(format, options);

        let lifetime = Duration::seconds(
            i64::try_from(self.config.nonce_lifetime_secs)
                .map_err(|_| Error::presentation_options("nonce lifetime is out of range"))?,
        );
        let expires_on = self.clock.now() + lifetime;
        let keys = options.encrypt_response.then(|| self.key_pairs.generate());

        let mut client_metadata = serde_json::Map::new();
        if format == CredentialFormat::DcSdJwt {
            client_metadata.insert(
                "vp_formats".into(),
                json!({
                    FORMAT_DC_SD_JWT: {
                        "sd-jwt_alg_values": ["ES256"],
                        "kb-jwt_alg_values": ["ES256"],
                    }
                }),
            );
        }
        if let Some(keys) = &keys {
            let mut jwk = serde_json::to_value(&keys.public_key_jwk).map_err(|e| {
                Error::presentation_options("unable to encode encryption key").with_source(e)
            })?;
            if let Value::Object(members) = &mut jwk {
                members.insert("use".into(), json!("enc"));
                members.insert("alg".into(), json!("ECDH-ES"));
            }
            client_metadata.insert("jwks".into(), json!({ "keys": [jwk] }));
            client_metadata.insert(
                "encrypted_response_enc_values_supported".into(),
                json!(["A128GCM", "A256GCM"]),
            );
        }

        let nonce = codec
            .seal(expires_on, keys)
            .map_err(|e| e.rebrand(crate::error::ErrorKind::InvalidPresentationOptions))?;

        let data = OpenId4VpRequest {
            response_type: "vp_token".into(),
            response_mode: if options.encrypt_response {
                "dc_api.jwt".into()
            } else {
                "dc_api".into()
            },
            nonce: nonce.clone(),
            client_id: options.client_id.clone(),
            dcql_query: DcqlQuery {
                credentials: vec![query],
            },
            client_metadata: (!client_metadata.is_empty()).then_some(Value::Object(client_metadata)),
        };
        tracing::debug!(format = format.as_dcql(), encrypted = options.encrypt_response, "generated request");

        Ok(GeneratedRequest {
            request: DcApiRequest {
                digital: DigitalRequests {
                    requests: vec![ProtocolRequest {
                        protocol: PROTOCOL_OPENID4VP.into(),
                        data,
                    }],
                },
            },
            nonce,
            origin: options.request_origin.clone(),
        })
    }
}

fn credential_query(format: CredentialFormat, options: &PresentationOptions) -> CredentialQuery {
    match format {
        CredentialFormat::MsoMdoc => {
            let namespace = options.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
            CredentialQuery {
                id: DEFAULT_CREDENTIAL_ID.into(),
                format: FORMAT_MSO_MDOC.into(),
                meta: Some(CredentialQueryMeta {
                    doctype_value: Some(
                        options
                            .doctype
                            .clone()
                            .unwrap_or_else(|| DEFAULT_DOCTYPE.to_string()),
                    ),
                    vct_values: None,
                }),
                claims: options
                    .desired_claims
                    .iter()
                    .map(|claim| ClaimQuery {
                        path: vec![namespace.to_string(), claim.clone()],
                    })
                    .collect(),
            }
        }
        CredentialFormat::DcSdJwt => CredentialQuery {
            id: DEFAULT_CREDENTIAL_ID.into(),
            format: FORMAT_DC_SD_JWT.into(),
            meta: options.vct_values.as_ref().map(|vct_values| CredentialQueryMeta {
                doctype_value: None,
                vct_values: Some(vct_values.clone()),
            }),
            claims: options
                .desired_claims
                .iter()
                .map(|claim| ClaimQuery {
                    path: vec![claim.clone()],
                })
                .collect(),
        },
    }
}
