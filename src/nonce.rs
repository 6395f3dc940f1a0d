//! Stateless request nonces.
//!
//! Everything the verifier needs to remember between issuing a request and checking
//! the response travels inside the nonce, sealed with AES-256-GCM under a server
//! secret: the expiry and, for encrypted responses, the ephemeral decryption key.
//! The wire form is `base64url(ciphertext || tag) "." base64url(iv)`.

use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::elliptic_curve::JwkEcKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::providers::{OsRandom, RandomSource};

pub const SECRET_LEN: usize = 32;
const IV_LEN: usize = 12;

/// The ephemeral key pair a response is encrypted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEncryptionKeys {
    #[serde(rename = "publicKeyJWK")]
    pub public_key_jwk: JwkEcKey,
    #[serde(rename = "privateKeyJWK")]
    pub private_key_jwk: JwkEcKey,
}

impl ResponseEncryptionKeys {
    pub fn from_secret_key(secret: &p256::SecretKey) -> Self {
        Self {
            public_key_jwk: secret.public_key().to_jwk(),
            private_key_jwk: secret.to_jwk(),
        }
    }

    /// RFC 7638 SHA-256 thumbprint of the public key.
    pub fn thumbprint(&self) -> Result<Vec<u8>> {
        jwk_thumbprint(&self.public_key_jwk)
    }
}

/// RFC 7638 thumbprint of an EC JWK: SHA-256 over `{"crv","kty","x","y"}` in
/// lexicographic order without whitespace.
pub fn jwk_thumbprint(jwk: &JwkEcKey) -> Result<Vec<u8>> {
    let value = serde_json::to_value(jwk)
        .map_err(|e| Error::crypto("unable to serialize JWK").with_source(e))?;
    let member = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::crypto(format!("JWK is missing member '{name}'")))
    };
    // serde_json keeps a BTreeMap ordering without the preserve_order feature.
    let canonical = serde_json::json!({
        "crv": member("crv")?,
        "kty": member("kty")?,
        "x": member("x")?,
        "y": member("y")?,
    });
    Ok(Sha256::digest(canonical.to_string().as_bytes()).to_vec())
}

/// Decrypted contents of a nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoncePayload {
    #[serde(with = "time::serde::rfc3339")]
    pub expires_on: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_encryption_keys: Option<ResponseEncryptionKeys>,
}

impl NoncePayload {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_on < now
    }
}

/// Seals and opens nonces under one server secret.
pub struct NonceCodec {
    secret: Zeroizing<[u8; SECRET_LEN]>,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for NonceCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceCodec").finish_non_exhaustive()
    }
}

impl NonceCodec {
    pub fn new(secret: &[u8]) -> Result<Self> {
        Self::with_random(secret, Arc::new(OsRandom))
    }

    pub fn with_random(secret: &[u8], random: Arc<dyn RandomSource>) -> Result<Self> {
        let secret: [u8; SECRET_LEN] = secret.try_into().map_err(|_| {
            Error::invalid_response(format!(
                "server secret must be {SECRET_LEN} bytes, got {}",
                secret.len()
            ))
        })?;
        Ok(Self {
            secret: Zeroizing::new(secret),
            random,
        })
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(self.secret.as_slice())
            .map_err(|e| Error::crypto(format!("unable to import nonce secret: {e}")))
    }

    pub fn seal(
        &self,
        expires_on: OffsetDateTime,
        response_encryption_keys: Option<ResponseEncryptionKeys>,
    ) -> Result<String> {
        let payload = NoncePayload {
            expires_on,
            response_encryption_keys,
        };
        let plaintext = Zeroizing::new(
            serde_json::to_vec(&payload)
                .map_err(|e| Error::crypto("unable to serialize nonce").with_source(e))?,
        );
        let mut iv = [0u8; IV_LEN];
        self.random.fill(&mut iv);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|e| Error::crypto(format!("unable to seal nonce: {e}")))?;
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(iv)
        ))
    }

    /// Decrypt and authenticate a nonce. Expiry is not checked here.
    pub fn open(&self, nonce: &str) -> Result<NoncePayload> {
        let (ciphertext, iv) = match nonce.split('.').collect::<Vec<_>>().as_slice() {
            [ciphertext, iv] => (*ciphertext, *iv),
            _ => return Err(Error::invalid_response("nonce is not in the expected format")),
        };
        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|e| Error::invalid_response("nonce ciphertext is not base64url").with_source(e))?;
        let iv = URL_SAFE_NO_PAD
            .decode(iv)
            .map_err(|e| Error::invalid_response("nonce iv is not base64url").with_source(e))?;
        if iv.len() != IV_LEN {
            return Err(Error::invalid_response("nonce iv has the wrong length"));
        }
        let plaintext = Zeroizing::new(
            self.cipher()?
                .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
                .map_err(|_| Error::invalid_response("nonce failed to decrypt"))?,
        );
        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::invalid_response("nonce payload is malformed").with_source(e))
    }
}
