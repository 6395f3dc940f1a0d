//! IANA COSE registries restricted to the values this crate recognizes.
//!
//! See: <https://www.iana.org/assignments/cose/cose.xhtml>

use strum_macros::{AsRefStr, EnumIter};

use super::key::KeyError;

/// Signature algorithms recognized in COSE headers and keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum Algorithm {
    ES256,
    ES384,
    ES512,
    EdDSA,
    PS256,
    PS384,
    PS512,
    RS256,
    RS384,
    RS512,
    RS1,
    ES256K,
}

impl Algorithm {
    pub fn to_i64(self) -> i64 {
        match self {
            Algorithm::ES256 => -7,
            Algorithm::ES384 => -35,
            Algorithm::ES512 => -36,
            Algorithm::EdDSA => -8,
            Algorithm::PS256 => -37,
            Algorithm::PS384 => -38,
            Algorithm::PS512 => -39,
            Algorithm::RS256 => -257,
            Algorithm::RS384 => -258,
            Algorithm::RS512 => -259,
            Algorithm::RS1 => -65535,
            Algorithm::ES256K => -47,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, KeyError> {
        Ok(match value {
            -7 => Algorithm::ES256,
            -35 => Algorithm::ES384,
            -36 => Algorithm::ES512,
            -8 => Algorithm::EdDSA,
            -37 => Algorithm::PS256,
            -38 => Algorithm::PS384,
            -39 => Algorithm::PS512,
            -257 => Algorithm::RS256,
            -258 => Algorithm::RS384,
            -259 => Algorithm::RS512,
            -65535 => Algorithm::RS1,
            -47 => Algorithm::ES256K,
            other => return Err(KeyError::UnsupportedAlgorithm(other)),
        })
    }

    /// The digest paired with this algorithm. EdDSA hashes internally.
    pub fn hash(self) -> Option<HashAlgorithm> {
        match self {
            Algorithm::ES256 | Algorithm::PS256 | Algorithm::RS256 | Algorithm::ES256K => {
                Some(HashAlgorithm::Sha256)
            }
            Algorithm::ES384 | Algorithm::PS384 | Algorithm::RS384 => Some(HashAlgorithm::Sha384),
            Algorithm::ES512 | Algorithm::PS512 | Algorithm::RS512 => Some(HashAlgorithm::Sha512),
            Algorithm::RS1 => Some(HashAlgorithm::Sha1),
            Algorithm::EdDSA => None,
        }
    }
}

/// Digests named by algorithms, MSO `digestAlgorithm` and SD-JWT `_sd_alg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        use sha2::Digest;
        match self {
            HashAlgorithm::Sha256 => Ok(sha2::Sha256::digest(data).to_vec()),
            HashAlgorithm::Sha384 => Ok(sha2::Sha384::digest(data).to_vec()),
            HashAlgorithm::Sha512 => Ok(sha2::Sha512::digest(data).to_vec()),
            HashAlgorithm::Sha1 => Err(KeyError::UnsupportedHash("SHA-1")),
        }
    }

    /// Parse the names used by `digestAlgorithm` ("SHA-256") and `_sd_alg` ("sha-256").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SHA-256" => Some(HashAlgorithm::Sha256),
            "SHA-384" => Some(HashAlgorithm::Sha384),
            "SHA-512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }
}

/// Header parameter labels read by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLabel {
    Alg,
    Crit,
    ContentType,
    Kid,
    X5Chain,
}

impl HeaderLabel {
    pub const fn value(self) -> i64 {
        match self {
            HeaderLabel::Alg => 1,
            HeaderLabel::Crit => 2,
            HeaderLabel::ContentType => 3,
            HeaderLabel::Kid => 4,
            HeaderLabel::X5Chain => 33,
        }
    }
}
