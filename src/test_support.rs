//! Fixture builders minting signed mdocs and SD-JWT VCs for unit tests.

use std::collections::BTreeMap;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use ciborium::Value;
use coset::{iana, CoseSign1Builder, HeaderBuilder};
use p256::ecdsa::{
    signature::{hazmat::PrehashSigner, Signer},
    Signature, SigningKey,
};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde_bytes::ByteBuf;
use serde_json::json;
use sha2::{Digest, Sha256, Sha384};
use time::{macros::datetime, Duration, OffsetDateTime};
use x509_cert::der::Encode;

use crate::cbor;
use crate::config::VerifierConfig;
use crate::cose::{CoseKey, CoseSign1, Curve, Ec2Key, Ec2Y, HeaderLabel};
use crate::definitions::{
    device_signed::device_authentication_bytes, helpers::Tag24, x509::test::self_signed_p256,
    DeviceAuth, DeviceKeyInfo, DeviceNamespaces, DeviceResponse, DeviceSigned, DigestAlgorithm,
    Document, HandoverVersion, IssuerSigned, IssuerSignedItem, Mso, SessionTranscript,
    ValidityInfo,
};
use crate::nonce::{NonceCodec, ResponseEncryptionKeys};

pub(crate) const ORIGIN: &str = "https://digital-credentials.dev";
pub(crate) const SECRET: [u8; 32] = [0x5a; 32];
pub(crate) const MDL_DOCTYPE: &str = "org.iso.18013.5.1.mDL";
pub(crate) const MDL_NAMESPACE: &str = "org.iso.18013.5.1";

pub(crate) fn now() -> OffsetDateTime {
    datetime!(2025-06-01 12:00 UTC)
}

pub(crate) fn config() -> VerifierConfig {
    VerifierConfig::default().with_expected_origin(ORIGIN)
}

/// A nonce sealed under [SECRET] that expires five minutes after [now].
pub(crate) fn nonce(keys: Option<ResponseEncryptionKeys>) -> String {
    NonceCodec::new(&SECRET)
        .unwrap()
        .seal(now() + Duration::minutes(5), keys)
        .unwrap()
}

fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let signature: Signature = key.sign(message);
    signature.to_bytes().to_vec()
}

/// ECDSA P-256 over the digest paired with `alg`.
fn sign_with(key: &SigningKey, alg: iana::Algorithm, message: &[u8]) -> Vec<u8> {
    let signature: Signature = match alg {
        iana::Algorithm::ES384 => key.sign_prehash(&Sha384::digest(message)).unwrap(),
        _ => key.sign_prehash(&Sha256::digest(message)).unwrap(),
    };
    signature.to_bytes().to_vec()
}

fn issuer_certificate(key: &SigningKey, common_name: &str) -> Vec<u8> {
    self_signed_p256(key, common_name).to_der().unwrap()
}

pub(crate) struct MdocOptions {
    pub doc_type: String,
    /// docType written into the MSO; `doc_type` when `None`.
    pub mso_doc_type: Option<String>,
    pub elements: Vec<(String, String, Value)>,
    /// Element whose value is replaced after its digest was taken.
    pub tamper: Option<String>,
    pub break_issuer_signature: bool,
    pub valid_from: OffsetDateTime,
    pub valid_until: OffsetDateTime,
    /// Protected `alg` of issuerAuth; also picks the issuer's digest.
    pub issuer_alg: iana::Algorithm,
    /// Protected `alg` of the device signature, omitted when `None`.
    pub device_header_alg: Option<iana::Algorithm>,
    /// Digest the device signs with.
    pub device_digest_alg: iana::Algorithm,
}

impl Default for MdocOptions {
    fn default() -> Self {
        let element = |id: &str, value: &str| {
            (
                MDL_NAMESPACE.to_string(),
                id.to_string(),
                Value::Text(value.to_string()),
            )
        };
        Self {
            doc_type: MDL_DOCTYPE.to_string(),
            mso_doc_type: None,
            elements: vec![element("family_name", "Smith"), element("given_name", "Jon")],
            tamper: None,
            break_issuer_signature: false,
            valid_from: now() - Duration::days(1),
            valid_until: now() + Duration::days(365),
            issuer_alg: iana::Algorithm::ES256,
            device_header_alg: Some(iana::Algorithm::ES256),
            device_digest_alg: iana::Algorithm::ES256,
        }
    }
}

/// An issuer-signed document awaiting a device signature over some session transcript.
pub(crate) struct MdocFixture {
    doc_type: String,
    issuer_signed: IssuerSigned,
    device_key: SigningKey,
    device_header_alg: Option<iana::Algorithm>,
    device_digest_alg: iana::Algorithm,
}

pub(crate) fn mdoc_presentation(options: &MdocOptions) -> MdocFixture {
    let issuer_key = SigningKey::from_slice(&[0x22; 32]).unwrap();
    let device_key = SigningKey::from_slice(&[0x11; 32]).unwrap();

    let mut namespaces: BTreeMap<String, Vec<Tag24<IssuerSignedItem>>> = BTreeMap::new();
    let mut value_digests: BTreeMap<String, BTreeMap<u64, ByteBuf>> = BTreeMap::new();
    for (digest_id, (namespace, identifier, value)) in options.elements.iter().enumerate() {
        let digest_id = digest_id as u64;
        let item = |element_value: Value| IssuerSignedItem {
            digest_id,
            random: ByteBuf::from(vec![digest_id as u8; 16]),
            element_identifier: identifier.clone(),
            element_value,
        };
        let mut signed = Tag24::new(item(value.clone())).unwrap();
        let digest = Sha256::digest(signed.to_tagged_bytes().unwrap()).to_vec();
        if options.tamper.as_deref() == Some(identifier.as_str()) {
            signed = Tag24::new(item(Value::Text("Tampered".into()))).unwrap();
        }
        namespaces.entry(namespace.clone()).or_default().push(signed);
        value_digests
            .entry(namespace.clone())
            .or_default()
            .insert(digest_id, ByteBuf::from(digest));
    }

    let point = device_key.verifying_key().to_encoded_point(false);
    let device_cose_key = CoseKey::Ec2(Ec2Key {
        alg: None,
        crv: Curve::P256,
        x: point.x().unwrap().to_vec(),
        y: Ec2Y::Value(point.y().unwrap().to_vec()),
    });

    let mso = Mso {
        version: "1.0".into(),
        digest_algorithm: DigestAlgorithm::SHA256,
        value_digests,
        device_key_info: DeviceKeyInfo {
            device_key: device_cose_key.to_cbor(),
        },
        doc_type: options
            .mso_doc_type
            .clone()
            .unwrap_or_else(|| options.doc_type.clone()),
        validity_info: ValidityInfo {
            signed: options.valid_from,
            valid_from: options.valid_from,
            valid_until: options.valid_until,
            expected_update: None,
        },
    };
    let mso_bytes = cbor::to_vec(&Tag24::new(mso).unwrap()).unwrap();

    let mut issuer_auth = CoseSign1Builder::new()
        .protected(HeaderBuilder::new().algorithm(options.issuer_alg).build())
        .unprotected(
            HeaderBuilder::new()
                .value(
                    HeaderLabel::X5Chain.value(),
                    Value::Bytes(issuer_certificate(&issuer_key, "Test Issuer")),
                )
                .build(),
        )
        .payload(mso_bytes)
        .create_signature(b"", |tbs| sign_with(&issuer_key, options.issuer_alg, tbs))
        .build();
    if options.break_issuer_signature {
        issuer_auth.signature[0] ^= 0xff;
    }

    MdocFixture {
        doc_type: options.doc_type.clone(),
        issuer_signed: IssuerSigned {
            namespaces: Some(namespaces),
            issuer_auth: CoseSign1::new(issuer_auth),
        },
        device_key,
        device_header_alg: options.device_header_alg,
        device_digest_alg: options.device_digest_alg,
    }
}

impl MdocFixture {
    /// A base64url DeviceResponse signed over the transcript of `origin` under the
    /// default handover.
    pub(crate) fn response_for(
        &self,
        origin: &str,
        nonce: &str,
        jwk_thumbprint: Option<&[u8]>,
    ) -> String {
        let identifier = HandoverVersion::default().identifier(origin, None, jwk_thumbprint);
        let transcript = SessionTranscript::dc_api(origin, nonce, &identifier).unwrap();
        self.response_with_transcript(&transcript)
    }

    pub(crate) fn response_with_transcript(&self, transcript: &SessionTranscript) -> String {
        let device_namespaces = Tag24::new(DeviceNamespaces::new()).unwrap();
        let device_authentication =
            device_authentication_bytes(transcript.as_value(), &self.doc_type, &device_namespaces)
                .unwrap();
        let mut protected = HeaderBuilder::new();
        if let Some(alg) = self.device_header_alg {
            protected = protected.algorithm(alg);
        }
        let device_signature = CoseSign1Builder::new()
            .protected(protected.build())
            .create_detached_signature(&device_authentication, b"", |tbs| {
                sign_with(&self.device_key, self.device_digest_alg, tbs)
            })
            .build();

        let response = DeviceResponse {
            version: DeviceResponse::VERSION.into(),
            documents: Some(vec![Document {
                doc_type: self.doc_type.clone(),
                issuer_signed: self.issuer_signed.clone(),
                device_signed: DeviceSigned {
                    namespaces: device_namespaces,
                    device_auth: DeviceAuth {
                        device_signature: Some(CoseSign1::new(device_signature)),
                        device_mac: None,
                    },
                },
            }]),
            status: DeviceResponse::STATUS_OK,
        };
        URL_SAFE_NO_PAD.encode(cbor::to_vec(&response).unwrap())
    }
}

pub(crate) struct SdJwtOptions {
    pub vct: String,
    pub nonce: String,
    pub audience: String,
    pub key_binding: bool,
    pub expires_on: Option<i64>,
    pub kb_issued_at: i64,
    pub kb_typ: String,
    /// Also disclose an `address` object holding its own `given_name` with this value.
    pub nested_given_name: Option<String>,
}

impl Default for SdJwtOptions {
    fn default() -> Self {
        Self {
            vct: "urn:eudi:pid:1".into(),
            nonce: String::new(),
            audience: format!("origin:{ORIGIN}"),
            key_binding: true,
            expires_on: Some((now() + Duration::days(3650)).unix_timestamp()),
            kb_issued_at: (now() - Duration::seconds(10)).unix_timestamp(),
            kb_typ: "kb+jwt".into(),
            nested_given_name: None,
        }
    }
}

fn signed_jwt(key: &SigningKey, header: &serde_json::Value, payload: &serde_json::Value) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    );
    let signature = URL_SAFE_NO_PAD.encode(sign(key, signing_input.as_bytes()));
    format!("{signing_input}.{signature}")
}

/// An SD-JWT VC disclosing `given_name` and `family_name`, with a key-binding JWT
/// unless disabled.
pub(crate) fn sd_jwt_presentation(options: &SdJwtOptions) -> String {
    let issuer_key = SigningKey::from_slice(&[0x33; 32]).unwrap();
    let holder_secret = p256::SecretKey::from_slice(&[0x44; 32]).unwrap();
    let holder_key = SigningKey::from(&holder_secret);

    let encode = |d: serde_json::Value| URL_SAFE_NO_PAD.encode(d.to_string());
    let digest = |d: &str| URL_SAFE_NO_PAD.encode(Sha256::digest(d.as_bytes()));

    let mut disclosures = vec![
        encode(json!(["c2FsdC1vbmU", "given_name", "Erika"])),
        encode(json!(["c2FsdC10d28", "family_name", "Mustermann"])),
    ];
    let mut digests: Vec<String> = disclosures.iter().map(|d| digest(d)).collect();
    if let Some(nested) = &options.nested_given_name {
        // Referenced from inside the address only, and expanded after the top level.
        let inner = encode(json!(["c2FsdC10aHJlZQ", "given_name", nested]));
        let address = encode(json!(["c2FsdC1mb3Vy", "address", { "_sd": [digest(&inner)] }]));
        digests.push(digest(&address));
        disclosures.push(inner);
        disclosures.push(address);
    }

    let mut payload = json!({
        "iss": "https://issuer.example",
        "iat": (now() - Duration::days(1)).unix_timestamp(),
        "vct": options.vct,
        "_sd_alg": "sha-256",
        "_sd": digests,
        "cnf": { "jwk": holder_secret.public_key().to_jwk() },
    });
    if let Some(exp) = options.expires_on {
        payload["exp"] = json!(exp);
    }
    let header = json!({
        "alg": "ES256",
        "typ": "dc+sd-jwt",
        "x5c": [STANDARD.encode(issuer_certificate(&issuer_key, "Test PID Issuer"))],
    });

    let mut presentation = signed_jwt(&issuer_key, &header, &payload);
    for disclosure in &disclosures {
        presentation.push('~');
        presentation.push_str(disclosure);
    }
    presentation.push('~');

    if options.key_binding {
        let sd_hash = URL_SAFE_NO_PAD.encode(Sha256::digest(presentation.as_bytes()));
        let kb = signed_jwt(
            &holder_key,
            &json!({ "alg": "ES256", "typ": options.kb_typ }),
            &json!({
                "iat": options.kb_issued_at,
                "aud": options.audience,
                "nonce": options.nonce,
                "sd_hash": sd_hash,
            }),
        );
        presentation.push_str(&kb);
    }
    presentation
}

/// Encrypt a response object to the public half of `keys` with ECDH-ES and A128GCM.
pub(crate) fn encrypt_response(keys: &ResponseEncryptionKeys, response: &serde_json::Value) -> String {
    use josekit::jwe::{JweHeader, ECDH_ES};

    let jwk = josekit::jwk::Jwk::from_bytes(serde_json::to_vec(&keys.public_key_jwk).unwrap())
        .unwrap();
    let encrypter = ECDH_ES.encrypter_from_jwk(&jwk).unwrap();
    let mut header = JweHeader::new();
    header.set_algorithm("ECDH-ES");
    header.set_content_encryption("A128GCM");
    josekit::jwe::serialize_compact(response.to_string().as_bytes(), &header, &encrypter).unwrap()
}
