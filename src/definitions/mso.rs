use std::collections::BTreeMap;

use ciborium::Value;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::cose::HashAlgorithm;
use crate::definitions::ValidityInfo;

pub type DigestId = u64;
pub type DigestIds = BTreeMap<DigestId, ByteBuf>;

/// The Mobile Security Object carried as the payload of `issuerAuth`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mso {
    pub version: String,
    pub digest_algorithm: DigestAlgorithm,
    pub value_digests: BTreeMap<String, DigestIds>,
    pub device_key_info: DeviceKeyInfo,
    pub doc_type: String,
    pub validity_info: ValidityInfo,
}

/// Only the device key is needed to verify a presentation; key authorizations and
/// key info are ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceKeyInfo {
    pub device_key: Value,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DigestAlgorithm {
    #[serde(rename = "SHA-256")]
    SHA256,
    #[serde(rename = "SHA-384")]
    SHA384,
    #[serde(rename = "SHA-512")]
    SHA512,
}

impl From<DigestAlgorithm> for HashAlgorithm {
    fn from(alg: DigestAlgorithm) -> Self {
        match alg {
            DigestAlgorithm::SHA256 => HashAlgorithm::Sha256,
            DigestAlgorithm::SHA384 => HashAlgorithm::Sha384,
            DigestAlgorithm::SHA512 => HashAlgorithm::Sha512,
        }
    }
}

impl Mso {
    /// The expected digest of an element, if the issuer signed one.
    pub fn digest_for(&self, namespace: &str, digest_id: DigestId) -> Option<&[u8]> {
        self.value_digests
            .get(namespace)
            .and_then(|ids| ids.get(&digest_id))
            .map(|d| d.as_slice())
    }
}
