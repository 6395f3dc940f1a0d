use std::sync::Arc;

use dc_verifier::{
    dc_api::{PresentationOptions, RequestBuilder, Verifier},
    nonce::NonceCodec,
    providers::{FixedClock, OsRandom, P256KeyPairGenerator},
    ErrorKind, VerifierConfig,
};
use serde_json::json;
use time::macros::datetime;

const ORIGIN: &str = "https://digital-credentials.dev";
const SECRET: [u8; 32] = [3u8; 32];

fn config() -> VerifierConfig {
    VerifierConfig::default().with_expected_origin(ORIGIN)
}

fn mdl_options() -> PresentationOptions {
    PresentationOptions {
        format: "mdl".into(),
        desired_claims: vec!["family_name".into(), "given_name".into()],
        request_origin: ORIGIN.into(),
        ..Default::default()
    }
}

fn builder() -> RequestBuilder {
    RequestBuilder::with_providers(
        config(),
        Arc::new(FixedClock(datetime!(2025-03-01 09:00 UTC))),
        Arc::new(OsRandom),
        Arc::new(P256KeyPairGenerator),
    )
}

fn verifier_at(now: time::OffsetDateTime) -> Verifier {
    Verifier::new(config()).with_clock(Arc::new(FixedClock(now)))
}

#[test]
fn nonce_sealed_by_the_builder_opens_with_the_same_secret() {
    let generated = builder().build(&mdl_options(), &SECRET).unwrap();
    let payload = NonceCodec::new(&SECRET).unwrap().open(&generated.nonce).unwrap();
    assert_eq!(payload.expires_on, datetime!(2025-03-01 09:05 UTC));
    assert_eq!(generated.origin, ORIGIN);
}

#[test]
fn nonce_from_a_different_secret_is_rejected() {
    let generated = builder().build(&mdl_options(), &SECRET).unwrap();
    let err = verifier_at(datetime!(2025-03-01 09:01 UTC))
        .verify(
            &json!({ "vp_token": { "cred1": "omd2ZXJzaW9uYzEuMA" } }),
            &generated.nonce,
            &[4u8; 32],
            None,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDcApiResponse);
}

#[test]
fn nonce_past_its_expiry_is_rejected() {
    let generated = builder().build(&mdl_options(), &SECRET).unwrap();
    let err = verifier_at(datetime!(2025-03-01 09:05:01 UTC))
        .verify(&json!({ "vp_token": {} }), &generated.nonce, &SECRET, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDcApiResponse);
}

#[test]
fn request_for_encrypted_response_requires_a_jwe() {
    let options = PresentationOptions {
        encrypt_response: true,
        ..mdl_options()
    };
    let generated = builder().build(&options, &SECRET).unwrap();
    let request = serde_json::to_value(&generated.request).unwrap();
    assert_eq!(
        request["digital"]["requests"][0]["data"]["response_mode"],
        "dc_api.jwt"
    );

    let err = verifier_at(datetime!(2025-03-01 09:01 UTC))
        .verify(
            &json!({ "vp_token": { "cred1": "oA" } }),
            &generated.nonce,
            &SECRET,
            None,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDcApiResponse);
}

#[test]
fn malformed_presentation_is_a_per_credential_failure() {
    let generated = builder().build(&mdl_options(), &SECRET).unwrap();
    let query = generated.request.openid4vp().unwrap().dcql_query.clone();
    let outcome = verifier_at(datetime!(2025-03-01 09:01 UTC))
        .verify(
            &json!({ "vp_token": { "cred1": "oA" } }),
            &generated.nonce,
            &SECRET,
            Some(&query),
        )
        .unwrap();
    assert!(outcome.credentials.is_empty());
    assert_eq!(outcome.failures["cred1"].kind(), ErrorKind::MdocVerification);
}

#[test]
fn unsupported_format_is_rejected_at_request_time() {
    let err = builder()
        .build(
            &PresentationOptions {
                format: "ldp_vc".into(),
                ..mdl_options()
            },
            &SECRET,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPresentationOptions);
}
