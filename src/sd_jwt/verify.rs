//! SD-JWT VC presentation verification.
//!
//! The issuer key comes from the leaf of the `x5c` header and the holder key from
//! `cnf.jwk`. Disclosure matching is left to the configured [SdJwtEngine]; this module
//! asserts the VC and key-binding claims on its output.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;
use time::OffsetDateTime;

use super::engine::{JwtVerifier, SdJwtEngine, SdJwtPresentation, Sha2Hasher};
use super::jwt::{numeric_date, CompactJwt};
use crate::cose::{verify_ec2, Curve, Ec2Key, Ec2Y, HashAlgorithm};
use crate::dc_api::{CredentialMeta, IssuerMeta, VerificationContext, VerifiedCredential};
use crate::definitions::x509::X5Chain;
use crate::error::{Error, ErrorKind, Result};

/// Verify one `dc+sd-jwt` presentation.
///
/// `vct_values`, when given, restricts the accepted credential types.
pub fn verify_sd_jwt_vc(
    presentation: &str,
    ctx: &VerificationContext<'_>,
    vct_values: Option<&[String]>,
    engine: &dyn SdJwtEngine,
) -> Result<VerifiedCredential> {
    let parsed = SdJwtPresentation::parse(presentation)?;
    let issuer_jwt = CompactJwt::parse(&parsed.issuer_jwt)?;

    let chain = X5Chain::from_der_chain(issuer_jwt.x5c()?).map_err(|e| {
        let message = if e.is_unsupported_key() {
            format!("unsupported key type: {e}")
        } else {
            format!("invalid x5c certificate chain: {e}")
        };
        Error::sd_jwt(message).with_source(e)
    })?;
    let issuer_key = chain.end_entity_ec2_key().map_err(|e| {
        Error::sd_jwt(format!("unsupported key type: {e}")).with_source(e)
    })?;
    tracing::debug!(
        issuer = chain.end_entity_common_name(),
        "resolved issuer key from x5c"
    );
    let issuer = es256_verifier(issuer_key, "issuer");

    let holder = match &parsed.key_binding_jwt {
        Some(_) => Some(es256_verifier(holder_key(&issuer_jwt)?, "key binding")),
        None => None,
    };

    let processed = engine.process(
        &parsed,
        &issuer,
        holder.as_ref().map(|h| h as &dyn JwtVerifier),
        &Sha2Hasher,
    )?;

    let now = ctx.now.unix_timestamp();
    let issued_at = numeric_date(&processed.claims, "iat")?;
    let valid_from = numeric_date(&processed.claims, "nbf")?;
    let expires_on = numeric_date(&processed.claims, "exp")?;
    if let Some(exp) = expires_on {
        if exp <= now {
            return Err(Error::sd_jwt("credential has expired"));
        }
    }

    let vct = processed
        .claims
        .get("vct")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::sd_jwt("credential has no vct claim"))?
        .to_string();
    if let Some(allowed) = vct_values {
        if !allowed.iter().any(|v| *v == vct) {
            return Err(Error::sd_jwt(format!(
                "vct '{vct}' is not one of the requested vct_values"
            )));
        }
    }

    let verified_origin = match &processed.key_binding {
        Some(kb) => Some(assert_key_binding(kb, ctx, now)?),
        None => {
            tracing::debug!("presentation carries no key binding JWT");
            None
        }
    };

    // Top-level disclosures first; a nested one never replaces a name already taken.
    let (top_level, nested): (Vec<_>, Vec<_>) = processed
        .disclosed
        .into_iter()
        .partition(|(name, value)| processed.claims.get(name) == Some(value));
    let mut claims = BTreeMap::new();
    for (name, value) in top_level.into_iter().chain(nested) {
        if claims.contains_key(&name) {
            tracing::debug!(%name, "duplicate disclosed claim name ignored");
            continue;
        }
        claims.insert(name, value);
    }

    Ok(VerifiedCredential {
        claims,
        issuer_meta: IssuerMeta {
            issued_at: issued_at.map(timestamp).transpose()?,
            valid_from: valid_from.map(timestamp).transpose()?,
            expires_on: expires_on.map(timestamp).transpose()?,
        },
        credential_meta: CredentialMeta {
            verified_origin,
            vct: Some(vct),
            doc_type: None,
        },
    })
}

/// Checks `iat`, `nonce` and `aud`, returning the origin the audience was derived from.
fn assert_key_binding(
    kb: &CompactJwt,
    ctx: &VerificationContext<'_>,
    now: i64,
) -> Result<String> {
    let iat = kb
        .numeric_date("iat")?
        .ok_or_else(|| Error::sd_jwt("key binding JWT has no iat"))?;
    if iat > now {
        return Err(Error::sd_jwt("key binding JWT iat is in the future"));
    }

    match kb.claim("nonce").and_then(Value::as_str) {
        Some(nonce) if nonce == ctx.nonce => {}
        _ => return Err(Error::sd_jwt("key binding JWT nonce mismatch")),
    }

    let audiences: Vec<&str> = match kb.claim("aud") {
        Some(Value::String(aud)) => vec![aud.as_str()],
        Some(Value::Array(auds)) => auds.iter().filter_map(Value::as_str).collect(),
        _ => return Err(Error::sd_jwt("key binding JWT has no aud")),
    };

    let matched = ctx.expected_origins.iter().find(|origin| {
        let expected = ctx.handover.effective_client_id(origin, ctx.client_id);
        audiences.contains(&expected.as_str())
    });
    match matched {
        Some(origin) => Ok(origin.clone()),
        None => Err(Error::sd_jwt(format!(
            "key binding JWT audience mismatch: got {audiences:?}"
        ))),
    }
}

/// The holder key from `cnf.jwk`, which must be an EC P-256 public key.
fn holder_key(issuer_jwt: &CompactJwt) -> Result<Ec2Key> {
    let jwk = issuer_jwt
        .claim("cnf")
        .and_then(|cnf| cnf.get("jwk"))
        .ok_or_else(|| Error::sd_jwt("issuer JWT has no cnf.jwk holder key"))?;
    let member = |name: &str| jwk.get(name).and_then(Value::as_str);
    if member("kty") != Some("EC") || member("crv") != Some("P-256") {
        return Err(Error::sd_jwt(
            "unsupported key type: cnf.jwk must be an EC P-256 key",
        ));
    }
    let coordinate = |name: &str| {
        member(name)
            .ok_or_else(|| Error::sd_jwt(format!("cnf.jwk has no '{name}'")))
            .and_then(|c| {
                URL_SAFE_NO_PAD
                    .decode(c)
                    .map_err(|e| Error::sd_jwt(format!("cnf.jwk '{name}' is not base64url")).with_source(e))
            })
    };
    Ok(Ec2Key {
        alg: None,
        crv: Curve::P256,
        x: coordinate("x")?,
        y: Ec2Y::Value(coordinate("y")?),
    })
}

/// An ES256 signature check bound to `key`.
fn es256_verifier(key: Ec2Key, role: &'static str) -> impl Fn(&CompactJwt) -> Result<()> {
    move |jwt: &CompactJwt| {
        match jwt.alg() {
            Some("ES256") => {}
            other => {
                return Err(Error::sd_jwt(format!(
                    "{role} JWT alg {other:?} is not supported, expected ES256"
                )))
            }
        }
        let verified = verify_ec2(
            &key,
            jwt.signing_input.as_bytes(),
            &jwt.signature,
            Some(HashAlgorithm::Sha256),
        )
        .map_err(|e| e.into_error(ErrorKind::SdJwtVerification))?;
        if verified {
            Ok(())
        } else {
            Err(Error::sd_jwt(format!("{role} JWT signature verification failed")))
        }
    }
}

fn timestamp(seconds: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|e| Error::sd_jwt("timestamp out of range").with_source(e))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::definitions::HandoverVersion;
    use crate::sd_jwt::StandardEngine;
    use crate::test_support::{self, SdJwtOptions, ORIGIN};
    use serde_json::json;

    const NONCE: &str = "sd-jwt-nonce";

    fn verify(options: &SdJwtOptions, vct_values: Option<&[String]>) -> Result<VerifiedCredential> {
        let origins = vec!["https://other.example".to_string(), ORIGIN.to_string()];
        let ctx = VerificationContext {
            nonce: NONCE,
            expected_origins: &origins,
            handover: HandoverVersion::JwkThumbprint,
            client_id: None,
            jwk_thumbprint: None,
            now: test_support::now(),
        };
        let presentation = test_support::sd_jwt_presentation(options);
        verify_sd_jwt_vc(&presentation, &ctx, vct_values, &StandardEngine)
    }

    fn options() -> SdJwtOptions {
        SdJwtOptions {
            nonce: NONCE.into(),
            ..Default::default()
        }
    }

    #[test]
    fn disclosed_claims_are_returned() {
        let verified = verify(&options(), None).unwrap();
        assert_eq!(verified.claims["given_name"], json!("Erika"));
        assert_eq!(verified.claims["family_name"], json!("Mustermann"));
        assert!(!verified.claims.contains_key("iss"));
        assert_eq!(verified.credential_meta.vct.as_deref(), Some("urn:eudi:pid:1"));
        assert_eq!(verified.credential_meta.verified_origin.as_deref(), Some(ORIGIN));
        assert!(verified.issuer_meta.issued_at.is_some());
    }

    #[test]
    fn nested_disclosure_does_not_replace_a_top_level_claim() {
        let verified = verify(
            &SdJwtOptions {
                nested_given_name: Some("Nested".into()),
                ..options()
            },
            None,
        )
        .unwrap();
        assert_eq!(verified.claims["given_name"], json!("Erika"));
        assert_eq!(verified.claims["address"], json!({ "given_name": "Nested" }));
    }

    #[test]
    fn vct_outside_requested_values_fails() {
        let allowed = vec!["urn:eudi:pid:de:1".to_string()];
        let err = verify(&options(), Some(&allowed)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SdJwtVerification);
        assert!(err.message().contains("vct"));

        let allowed = vec!["urn:eudi:pid:1".to_string()];
        assert!(verify(&options(), Some(&allowed)).is_ok());
    }

    #[test]
    fn audience_mismatch_fails() {
        let err = verify(
            &SdJwtOptions {
                audience: "web-origin:https://digital-credentials.dev".into(),
                ..options()
            },
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SdJwtVerification);
        assert!(err.message().contains("audience mismatch"));
    }

    #[test]
    fn key_binding_assertions() {
        let cases = [
            SdJwtOptions {
                nonce: "other".into(),
                ..options()
            },
            SdJwtOptions {
                kb_issued_at: (test_support::now() + time::Duration::minutes(1)).unix_timestamp(),
                ..options()
            },
            SdJwtOptions {
                kb_typ: "JWT".into(),
                ..options()
            },
            SdJwtOptions {
                expires_on: Some((test_support::now() - time::Duration::days(1)).unix_timestamp()),
                ..options()
            },
        ];
        for case in cases {
            assert_eq!(
                verify(&case, None).unwrap_err().kind(),
                ErrorKind::SdJwtVerification
            );
        }
    }

    #[test]
    fn presentation_without_key_binding_has_no_origin() {
        let verified = verify(
            &SdJwtOptions {
                key_binding: false,
                ..options()
            },
            None,
        )
        .unwrap();
        assert!(verified.credential_meta.verified_origin.is_none());
    }

    #[test]
    fn tampered_issuer_signature_fails() {
        let origins = vec![ORIGIN.to_string()];
        let ctx = VerificationContext {
            nonce: NONCE,
            expected_origins: &origins,
            handover: HandoverVersion::JwkThumbprint,
            client_id: None,
            jwk_thumbprint: None,
            now: test_support::now(),
        };
        let presentation = test_support::sd_jwt_presentation(&options());
        let (jwt, rest) = presentation.split_once('~').unwrap();
        let (signing_input, _) = jwt.rsplit_once('.').unwrap();
        let forged = format!("{signing_input}.{}~{rest}", URL_SAFE_NO_PAD.encode([7u8; 64]));
        let err = verify_sd_jwt_vc(&forged, &ctx, None, &StandardEngine).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SdJwtVerification);
    }

    #[test]
    fn holder_key_must_be_p256() {
        let jwt = |cnf: serde_json::Value| CompactJwt {
            header: Default::default(),
            payload: json!({ "cnf": cnf }).as_object().unwrap().clone(),
            signing_input: String::new(),
            signature: Vec::new(),
        };
        assert!(holder_key(&jwt(json!({ "jwk": { "kty": "OKP", "crv": "Ed25519", "x": "AA" } })))
            .unwrap_err()
            .message()
            .contains("unsupported key type"));
        assert!(holder_key(&jwt(json!({}))).is_err());
    }
}
