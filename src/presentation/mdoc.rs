//! Verification of an `mso_mdoc` presentation as a sequence of states:
//! [Decoded] → [IssuerVerified] → [DeviceVerified] → [NamespacesVerified] →
//! [VerifiedCredential]. Each transition consumes the previous state, so a later check
//! cannot run on a document that skipped an earlier one.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ciborium::Value;

use super::mdoc_auth;
use crate::cbor;
use crate::cose::HashAlgorithm;
use crate::dc_api::{CredentialMeta, IssuerMeta, VerificationContext, VerifiedCredential};
use crate::definitions::{DeviceResponse, Document, Mso, SessionTranscript};
use crate::error::{Error, Result};

/// The first document of a decoded DeviceResponse.
#[derive(Debug, Clone)]
pub struct Decoded {
    document: Document,
}

#[derive(Debug, Clone)]
pub struct IssuerVerified {
    document: Document,
    mso: Mso,
    issuer_hash: Option<HashAlgorithm>,
}

#[derive(Debug, Clone)]
pub struct DeviceVerified {
    document: Document,
    mso: Mso,
    origin: String,
}

#[derive(Debug, Clone)]
pub struct NamespacesVerified {
    mso: Mso,
    origin: String,
    elements: BTreeMap<String, Value>,
}

impl Decoded {
    /// Decode a base64url DeviceResponse.
    pub fn decode(presentation: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(presentation.trim_end_matches('='))
            .map_err(|e| Error::mdoc("presentation is not base64url").with_source(e))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let response: DeviceResponse = cbor::from_slice(bytes)
            .map_err(|e| Error::mdoc("unable to decode DeviceResponse").with_source(e))?;
        let document = response
            .documents
            .and_then(|docs| docs.into_iter().next())
            .ok_or_else(|| Error::mdoc("DeviceResponse contains no document"))?;
        tracing::debug!(doc_type = %document.doc_type, "decoded mdoc");
        Ok(Self { document })
    }

    pub fn doc_type(&self) -> &str {
        &self.document.doc_type
    }

    pub fn verify_issuer(self) -> Result<IssuerVerified> {
        let (mso, issuer_hash) = mdoc_auth::issuer_authentication(&self.document)?;
        tracing::debug!("issuer signature verified");
        Ok(IssuerVerified {
            document: self.document,
            mso,
            issuer_hash,
        })
    }
}

impl IssuerVerified {
    pub fn mso(&self) -> &Mso {
        &self.mso
    }

    /// Check the validity window and docType, then search the expected origins for the
    /// one the device signed over.
    pub fn verify_device(self, ctx: &VerificationContext<'_>) -> Result<DeviceVerified> {
        let validity = &self.mso.validity_info;
        if !validity.is_valid_at(ctx.now) {
            return Err(Error::mdoc(format!(
                "mdoc is not valid at {}: valid from {} until {}",
                ctx.now, validity.valid_from, validity.valid_until
            )));
        }
        if self.mso.doc_type != self.document.doc_type {
            return Err(Error::mdoc(format!(
                "MSO docType '{}' does not match document docType '{}'",
                self.mso.doc_type, self.document.doc_type
            )));
        }

        let device_key = mdoc_auth::device_key(&self.mso)?;
        for origin in ctx.expected_origins {
            let identifier = ctx
                .handover
                .identifier(origin, ctx.client_id, ctx.jwk_thumbprint);
            let transcript = SessionTranscript::dc_api(origin, ctx.nonce, &identifier)
                .map_err(|e| Error::mdoc("unable to encode session transcript").with_source(e))?;
            if mdoc_auth::device_authentication(
                &self.document,
                &device_key,
                self.issuer_hash,
                &transcript,
            )? {
                tracing::debug!(%origin, "device signature verified");
                return Ok(DeviceVerified {
                    document: self.document,
                    mso: self.mso,
                    origin: origin.clone(),
                });
            }
            tracing::debug!(%origin, "device signature does not match origin");
        }
        Err(Error::mdoc(
            "device signature does not verify for any expected origin",
        ))
    }
}

impl DeviceVerified {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn verify_namespaces(self) -> Result<NamespacesVerified> {
        let elements = mdoc_auth::verified_elements(&self.document, &self.mso)?;
        tracing::debug!(elements = elements.len(), "namespace digests verified");
        Ok(NamespacesVerified {
            mso: self.mso,
            origin: self.origin,
            elements,
        })
    }
}

impl NamespacesVerified {
    pub fn finish(self) -> VerifiedCredential {
        let validity = self.mso.validity_info;
        VerifiedCredential {
            claims: self
                .elements
                .iter()
                .map(|(name, value)| (name.clone(), cbor::to_json(value)))
                .collect(),
            issuer_meta: IssuerMeta {
                issued_at: Some(validity.signed),
                valid_from: Some(validity.valid_from),
                expires_on: Some(validity.valid_until),
            },
            credential_meta: CredentialMeta {
                verified_origin: Some(self.origin),
                vct: None,
                doc_type: Some(self.mso.doc_type),
            },
        }
    }
}

/// Run every state of the machine over one presentation.
///
/// `expected_doc_type` is the `doctype_value` of the credential query, if any.
pub fn verify_mdoc(
    presentation: &str,
    ctx: &VerificationContext<'_>,
    expected_doc_type: Option<&str>,
) -> Result<VerifiedCredential> {
    let decoded = Decoded::decode(presentation)?;
    if let Some(expected) = expected_doc_type {
        if decoded.doc_type() != expected {
            return Err(Error::mdoc(format!(
                "requested docType '{expected}' but received '{}'",
                decoded.doc_type()
            )));
        }
    }
    Ok(decoded
        .verify_issuer()?
        .verify_device(ctx)?
        .verify_namespaces()?
        .finish())
}
