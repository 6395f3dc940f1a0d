//! ECDSA verification over COSE EC2 keys.
//!
//! Callers build the exact to-be-signed bytes; this module only pairs the curve with
//! the digest and runs the primitive. There is no retry with another curve or hash.

use signature::hazmat::PrehashVerifier;

use super::algorithm::HashAlgorithm;
use super::key::{Curve, Ec2Key, KeyError};
use crate::error::{Error, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    UnsupportedKey(#[from] KeyError),
    #[error("unable to import public key: {0}")]
    KeyImport(String),
}

impl VerifyError {
    /// Map into the public taxonomy. Import failures are primitive failures; an
    /// unsupported key belongs to whichever pipeline presented it.
    pub fn into_error(self, kind: ErrorKind) -> Error {
        match self {
            VerifyError::KeyImport(message) => Error::crypto(message),
            VerifyError::UnsupportedKey(e) => {
                Error::crypto(format!("unsupported key type: {e}"))
                    .with_source(e)
                    .rebrand(kind)
            }
        }
    }
}

/// Verify a raw `r || s` ECDSA signature over `message`.
///
/// The digest is `hash_override` when given, otherwise the one paired with the key's
/// own algorithm (ES256 when the key omits `alg`).
pub fn verify_ec2(
    key: &Ec2Key,
    message: &[u8],
    signature: &[u8],
    hash_override: Option<HashAlgorithm>,
) -> Result<bool, VerifyError> {
    let hash = match hash_override {
        Some(hash) => hash,
        None => key
            .algorithm()
            .hash()
            .ok_or(KeyError::UnsupportedAlgorithm(key.algorithm().to_i64()))?,
    };
    let digest = hash.digest(message)?;
    let sec1 = key.to_sec1_uncompressed()?;

    let verified = match key.crv {
        Curve::P256 => {
            let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map_err(|e| VerifyError::KeyImport(e.to_string()))?;
            let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                tracing::debug!("signature is not a valid P-256 r||s encoding");
                return Ok(false);
            };
            verifying_key.verify_prehash(&digest, &signature).is_ok()
        }
        Curve::P384 => {
            let verifying_key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&sec1)
                .map_err(|e| VerifyError::KeyImport(e.to_string()))?;
            let Ok(signature) = p384::ecdsa::Signature::from_slice(signature) else {
                tracing::debug!("signature is not a valid P-384 r||s encoding");
                return Ok(false);
            };
            verifying_key.verify_prehash(&digest, &signature).is_ok()
        }
        other => return Err(KeyError::UnsupportedCurve(other.to_i64()).into()),
    };
    Ok(verified)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cose::algorithm::Algorithm;
    use crate::cose::key::Ec2Y;
    use elliptic_curve::sec1::ToEncodedPoint;
    use p256::ecdsa::{signature::hazmat::PrehashSigner, signature::Signer, Signature, SigningKey};

    fn key_for(signing: &SigningKey, alg: Option<Algorithm>) -> Ec2Key {
        let point = signing.verifying_key().to_encoded_point(false);
        Ec2Key {
            alg,
            crv: Curve::P256,
            x: point.x().unwrap().to_vec(),
            y: Ec2Y::Value(point.y().unwrap().to_vec()),
        }
    }

    #[test]
    fn verifies_es256() {
        let signing = SigningKey::from_slice(&[3u8; 32]).unwrap();
        let signature: Signature = signing.sign(b"message");
        let key = key_for(&signing, Some(Algorithm::ES256));
        assert!(verify_ec2(&key, b"message", &signature.to_bytes(), None).unwrap());
        assert!(!verify_ec2(&key, b"massage", &signature.to_bytes(), None).unwrap());
    }

    #[test]
    fn hash_override_wins_over_key_alg() {
        let signing = SigningKey::from_slice(&[4u8; 32]).unwrap();
        let digest = HashAlgorithm::Sha384.digest(b"message").unwrap();
        let signature: Signature = signing.sign_prehash(&digest).unwrap();
        let key = key_for(&signing, None);
        assert!(!verify_ec2(&key, b"message", &signature.to_bytes(), None).unwrap());
        assert!(verify_ec2(
            &key,
            b"message",
            &signature.to_bytes(),
            Some(HashAlgorithm::Sha384)
        )
        .unwrap());
    }

    #[test]
    fn malformed_signature_is_a_failed_check() {
        let signing = SigningKey::from_slice(&[5u8; 32]).unwrap();
        let key = key_for(&signing, None);
        assert!(!verify_ec2(&key, b"message", &[0u8; 12], None).unwrap());
    }

    #[test]
    fn unsupported_curve_fails_closed() {
        let key = Ec2Key {
            alg: None,
            crv: Curve::Secp256k1,
            x: vec![1; 32],
            y: Ec2Y::Value(vec![2; 32]),
        };
        let err = verify_ec2(&key, b"m", &[0; 64], None).unwrap_err();
        assert!(matches!(err, VerifyError::UnsupportedKey(_)));
        assert_eq!(
            err.into_error(ErrorKind::MdocVerification).kind(),
            ErrorKind::MdocVerification
        );
    }

    #[test]
    fn off_curve_point_is_an_import_failure() {
        let key = Ec2Key {
            alg: None,
            crv: Curve::P256,
            x: vec![1; 32],
            y: Ec2Y::Value(vec![2; 32]),
        };
        let err = verify_ec2(&key, b"m", &[0; 64], None).unwrap_err();
        assert_eq!(
            err.into_error(ErrorKind::SdJwtVerification).kind(),
            ErrorKind::SubtleCrypto
        );
    }
}
