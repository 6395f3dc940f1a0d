//! Signature and digest checks over a single mdoc [Document].

use std::collections::BTreeMap;

use ciborium::Value;

use crate::cbor;
use crate::cose::{verify_ec2, CoseKey, CoseSign1, Ec2Key, HashAlgorithm};
use crate::definitions::{
    device_signed::device_authentication_bytes, helpers::Tag24, x509::X5Chain, Document,
    IssuerSignedItem, Mso, SessionTranscript,
};
use crate::error::{Error, ErrorKind, Result};

/// Verify `issuerAuth` against the leaf of its own `x5chain`.
///
/// Returns the MSO it signs and the digest named by its protected `alg`, if any.
pub fn issuer_authentication(document: &Document) -> Result<(Mso, Option<HashAlgorithm>)> {
    let issuer_auth = &document.issuer_signed.issuer_auth;
    let x5chain = issuer_auth
        .x5chain()
        .ok_or_else(|| Error::mdoc("issuerAuth has no x5chain header"))?;
    let x5chain = X5Chain::from_cbor(x5chain)
        .map_err(|e| Error::mdoc(format!("invalid issuer x5chain: {e}")).with_source(e))?;
    let issuer_key = x5chain
        .end_entity_ec2_key()
        .map_err(|e| Error::mdoc(format!("unsupported key type: {e}")).with_source(e))?;
    tracing::debug!(
        issuer = x5chain.end_entity_common_name(),
        "resolved issuer key from x5chain"
    );

    let issuer_hash = protected_hash(issuer_auth)?;
    if !verify_sign1(issuer_auth, &issuer_key, None, issuer_hash)? {
        return Err(Error::mdoc("issuer signature verification failed"));
    }

    let payload = issuer_auth
        .payload()
        .ok_or_else(|| Error::mdoc("issuerAuth has a detached payload"))?;
    let mso: Tag24<Mso> = cbor::from_slice(payload)
        .map_err(|e| Error::mdoc("unable to decode the mobile security object").with_source(e))?;
    Ok((mso.into_inner(), issuer_hash))
}

/// The device key bound into the MSO.
pub fn device_key(mso: &Mso) -> Result<Ec2Key> {
    CoseKey::from_cbor(&mso.device_key_info.device_key)
        .and_then(CoseKey::into_ec2)
        .map_err(|e| Error::mdoc(format!("unsupported key type: {e}")).with_source(e))
}

/// Check the device signature against one candidate session transcript.
///
/// The digest is `issuer_hash` when the issuer header named one, otherwise the one paired
/// with the device key's `alg`.
pub fn device_authentication(
    document: &Document,
    device_key: &Ec2Key,
    issuer_hash: Option<HashAlgorithm>,
    session_transcript: &SessionTranscript,
) -> Result<bool> {
    let device_signature = document
        .device_signed
        .device_auth
        .device_signature
        .as_ref()
        .ok_or_else(|| Error::mdoc("only device signatures are supported, found a device MAC"))?;
    let device_authentication = device_authentication_bytes(
        session_transcript.as_value(),
        &document.doc_type,
        &document.device_signed.namespaces,
    )
    .map_err(|e| Error::mdoc("unable to encode DeviceAuthentication").with_source(e))?;
    verify_sign1(
        device_signature,
        device_key,
        Some(&device_authentication),
        issuer_hash,
    )
}

fn protected_hash(sign1: &CoseSign1) -> Result<Option<HashAlgorithm>> {
    Ok(sign1
        .protected_algorithm()
        .map_err(|e| Error::mdoc(format!("unsupported key type: {e}")).with_source(e))?
        .and_then(|alg| alg.hash()))
}

/// Verify a COSE_Sign1 with `hash_override`, or the key's own algorithm when it is `None`.
fn verify_sign1(
    sign1: &CoseSign1,
    key: &Ec2Key,
    detached_payload: Option<&[u8]>,
    hash_override: Option<HashAlgorithm>,
) -> Result<bool> {
    let to_be_signed = sign1
        .signature_payload(detached_payload)
        .map_err(|e| Error::mdoc("unable to encode Sig_structure").with_source(e))?;
    verify_ec2(key, &to_be_signed, sign1.signature(), hash_override)
        .map_err(|e| e.into_error(ErrorKind::MdocVerification))
}

/// Elements whose digest matches the MSO, keyed by element identifier. Anything else
/// is dropped. On an identifier shared by two namespaces the one whose name sorts first
/// wins, whatever the order on the wire.
pub fn verified_elements(document: &Document, mso: &Mso) -> Result<BTreeMap<String, Value>> {
    let hash = HashAlgorithm::from(mso.digest_algorithm);
    let mut elements = BTreeMap::new();
    let Some(namespaces) = &document.issuer_signed.namespaces else {
        return Ok(elements);
    };
    for (namespace, items) in namespaces {
        for item in items {
            let IssuerSignedItem {
                digest_id,
                element_identifier,
                element_value,
                ..
            } = item.as_ref();
            let Some(expected) = mso.digest_for(namespace, *digest_id) else {
                tracing::warn!(%namespace, %element_identifier, "no digest in MSO, dropping");
                continue;
            };
            let tagged = item
                .to_tagged_bytes()
                .map_err(|e| Error::mdoc("unable to encode issuer signed item").with_source(e))?;
            let actual = hash
                .digest(&tagged)
                .map_err(|e| Error::mdoc(e.to_string()).with_source(e))?;
            if actual != expected {
                tracing::warn!(%namespace, %element_identifier, "digest mismatch, dropping");
                continue;
            }
            if elements.contains_key(element_identifier) {
                tracing::debug!(%namespace, %element_identifier, "duplicate identifier ignored");
                continue;
            }
            elements.insert(element_identifier.clone(), element_value.clone());
        }
    }
    Ok(elements)
}
