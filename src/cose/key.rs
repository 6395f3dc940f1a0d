//! An implementation of RFC-8152 [COSE_Key](https://datatracker.ietf.org/doc/html/rfc8152#section-13)
//! restricted to the key shapes a verifier meets in mdoc and SD-JWT-VC presentations.
//!
//! Keys arrive as generic CBOR maps keyed by small integers. [CoseKey::from_cbor] is the
//! only way in: it validates the map once and yields a typed variant per key type.

use ciborium::Value;
use elliptic_curve::sec1::ToEncodedPoint;

use super::algorithm::Algorithm;

/// Errors raised while building or using a [CoseKey].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(i64),
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(i64),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(i64),
    #[error("unsupported hash: {0}")]
    UnsupportedHash(&'static str),
    #[error("COSE_Key missing parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("COSE_Key parameter '{0}' has an unexpected type")]
    InvalidParameter(&'static str),
    #[error("expected a CBOR map for COSE_Key")]
    NotAMap,
    #[error("could not reconstruct a point on {0:?} from the key coordinates")]
    InvalidPoint(Curve),
}

/// The `kty` registry values accepted by this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Okp,
    Ec2,
    Rsa,
}

impl KeyType {
    pub fn from_i64(value: i64) -> Result<Self, KeyError> {
        match value {
            1 => Ok(KeyType::Okp),
            2 => Ok(KeyType::Ec2),
            3 => Ok(KeyType::Rsa),
            other => Err(KeyError::UnsupportedKeyType(other)),
        }
    }
}

/// The RFC-8152 identifier of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    P256,
    P384,
    P521,
    Ed25519,
    Secp256k1,
}

impl Curve {
    pub fn from_i64(value: i64) -> Result<Self, KeyError> {
        match value {
            1 => Ok(Curve::P256),
            2 => Ok(Curve::P384),
            3 => Ok(Curve::P521),
            6 => Ok(Curve::Ed25519),
            8 => Ok(Curve::Secp256k1),
            other => Err(KeyError::UnsupportedCurve(other)),
        }
    }

    pub fn to_i64(self) -> i64 {
        match self {
            Curve::P256 => 1,
            Curve::P384 => 2,
            Curve::P521 => 3,
            Curve::Ed25519 => 6,
            Curve::Secp256k1 => 8,
        }
    }

    /// Byte length of one affine coordinate.
    pub fn coordinate_len(self) -> usize {
        match self {
            Curve::P256 | Curve::Secp256k1 | Curve::Ed25519 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
        }
    }
}

/// The sign bit or value of the y-coordinate for the EC point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ec2Y {
    Value(Vec<u8>),
    SignBit(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Key {
    pub alg: Option<Algorithm>,
    pub crv: Curve,
    pub x: Vec<u8>,
    pub y: Ec2Y,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkpKey {
    pub alg: Option<Algorithm>,
    pub crv: Curve,
    pub x: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKey {
    pub alg: Option<Algorithm>,
    pub n: Vec<u8>,
    pub e: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKey {
    Ec2(Ec2Key),
    Okp(OkpKey),
    Rsa(RsaKey),
}

const KTY: i64 = 1;
const ALG: i64 = 3;
const CRV: i64 = -1;
const X: i64 = -2;
const Y: i64 = -3;
const RSA_N: i64 = -1;
const RSA_E: i64 = -2;

impl CoseKey {
    /// Validate a raw CBOR map and turn it into a typed key.
    pub fn from_cbor(value: &Value) -> Result<Self, KeyError> {
        let Value::Map(entries) = value else {
            return Err(KeyError::NotAMap);
        };
        let param = |label: i64| {
            entries.iter().find_map(|(k, v)| match k {
                Value::Integer(i) if i128::from(*i) == i128::from(label) => Some(v),
                _ => None,
            })
        };

        let kty = param(KTY)
            .ok_or(KeyError::MissingParameter("kty"))
            .and_then(|v| as_i64(v, "kty"))
            .and_then(KeyType::from_i64)?;
        let alg = param(ALG)
            .map(|v| as_i64(v, "alg").and_then(Algorithm::from_i64))
            .transpose()?;

        match kty {
            KeyType::Ec2 => {
                let crv = param(CRV)
                    .ok_or(KeyError::MissingParameter("crv"))
                    .and_then(|v| as_i64(v, "crv"))
                    .and_then(Curve::from_i64)?;
                let x = param(X)
                    .ok_or(KeyError::MissingParameter("x"))
                    .and_then(|v| as_bytes(v, "x"))?;
                let y = match param(Y).ok_or(KeyError::MissingParameter("y"))? {
                    Value::Bytes(y) => Ec2Y::Value(y.clone()),
                    Value::Bool(b) => Ec2Y::SignBit(*b),
                    _ => return Err(KeyError::InvalidParameter("y")),
                };
                Ok(CoseKey::Ec2(Ec2Key { alg, crv, x, y }))
            }
            KeyType::Okp => {
                let crv = param(CRV)
                    .ok_or(KeyError::MissingParameter("crv"))
                    .and_then(|v| as_i64(v, "crv"))
                    .and_then(Curve::from_i64)?;
                let x = param(X)
                    .ok_or(KeyError::MissingParameter("x"))
                    .and_then(|v| as_bytes(v, "x"))?;
                Ok(CoseKey::Okp(OkpKey { alg, crv, x }))
            }
            KeyType::Rsa => {
                let n = param(RSA_N)
                    .ok_or(KeyError::MissingParameter("n"))
                    .and_then(|v| as_bytes(v, "n"))?;
                let e = param(RSA_E)
                    .ok_or(KeyError::MissingParameter("e"))
                    .and_then(|v| as_bytes(v, "e"))?;
                Ok(CoseKey::Rsa(RsaKey { alg, n, e }))
            }
        }
    }

    pub fn key_type(&self) -> KeyType {
        match self {
            CoseKey::Ec2(_) => KeyType::Ec2,
            CoseKey::Okp(_) => KeyType::Okp,
            CoseKey::Rsa(_) => KeyType::Rsa,
        }
    }

    /// Narrow to the EC2 shape, the only one ECDSA verification accepts.
    pub fn into_ec2(self) -> Result<Ec2Key, KeyError> {
        match self {
            CoseKey::Ec2(key) => Ok(key),
            CoseKey::Okp(_) => Err(KeyError::UnsupportedKeyType(1)),
            CoseKey::Rsa(_) => Err(KeyError::UnsupportedKeyType(3)),
        }
    }

    pub fn to_cbor(&self) -> Value {
        let int = |i: i64| Value::Integer(i.into());
        let mut entries = Vec::new();
        let alg = match self {
            CoseKey::Ec2(k) => {
                entries.push((int(KTY), int(2)));
                entries.push((int(CRV), int(k.crv.to_i64())));
                entries.push((int(X), Value::Bytes(k.x.clone())));
                entries.push((
                    int(Y),
                    match &k.y {
                        Ec2Y::Value(v) => Value::Bytes(v.clone()),
                        Ec2Y::SignBit(b) => Value::Bool(*b),
                    },
                ));
                k.alg
            }
            CoseKey::Okp(k) => {
                entries.push((int(KTY), int(1)));
                entries.push((int(CRV), int(k.crv.to_i64())));
                entries.push((int(X), Value::Bytes(k.x.clone())));
                k.alg
            }
            CoseKey::Rsa(k) => {
                entries.push((int(KTY), int(3)));
                entries.push((int(RSA_N), Value::Bytes(k.n.clone())));
                entries.push((int(RSA_E), Value::Bytes(k.e.clone())));
                k.alg
            }
        };
        if let Some(alg) = alg {
            entries.push((int(ALG), int(alg.to_i64())));
        }
        Value::Map(entries)
    }
}

impl Ec2Key {
    /// The algorithm declared on the key. Devices that omit it are treated as ES256;
    /// callers holding an explicit hash from a protected header pass it as an override
    /// at verification time.
    pub fn algorithm(&self) -> Algorithm {
        self.alg.unwrap_or(Algorithm::ES256)
    }

    pub fn y_coordinate(&self) -> Result<Vec<u8>, KeyError> {
        match &self.y {
            Ec2Y::Value(y) => Ok(y.clone()),
            Ec2Y::SignBit(sign) => self.decompress(*sign),
        }
    }

    /// SEC1 uncompressed encoding `0x04 || x || y`.
    pub fn to_sec1_uncompressed(&self) -> Result<Vec<u8>, KeyError> {
        let y = self.y_coordinate()?;
        let len = self.crv.coordinate_len();
        if self.x.len() != len || y.len() != len {
            return Err(KeyError::InvalidPoint(self.crv));
        }
        let mut out = Vec::with_capacity(1 + 2 * len);
        out.push(0x04);
        out.extend_from_slice(&self.x);
        out.extend_from_slice(&y);
        Ok(out)
    }

    fn decompress(&self, sign: bool) -> Result<Vec<u8>, KeyError> {
        let len = self.crv.coordinate_len();
        if self.x.len() != len {
            return Err(KeyError::InvalidPoint(self.crv));
        }
        let mut compressed = Vec::with_capacity(1 + len);
        compressed.push(if sign { 0x03 } else { 0x02 });
        compressed.extend_from_slice(&self.x);
        let uncompressed = match self.crv {
            Curve::P256 => p256::PublicKey::from_sec1_bytes(&compressed)
                .map(|k| k.to_encoded_point(false).as_bytes().to_vec()),
            Curve::P384 => p384::PublicKey::from_sec1_bytes(&compressed)
                .map(|k| k.to_encoded_point(false).as_bytes().to_vec()),
            other => return Err(KeyError::UnsupportedCurve(other.to_i64())),
        }
        .map_err(|_| KeyError::InvalidPoint(self.crv))?;
        Ok(uncompressed[1 + len..].to_vec())
    }
}

fn as_i64(value: &Value, name: &'static str) -> Result<i64, KeyError> {
    match value {
        Value::Integer(i) => i64::try_from(*i).map_err(|_| KeyError::InvalidParameter(name)),
        _ => Err(KeyError::InvalidParameter(name)),
    }
}

fn as_bytes(value: &Value, name: &'static str) -> Result<Vec<u8>, KeyError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        _ => Err(KeyError::InvalidParameter(name)),
    }
}
