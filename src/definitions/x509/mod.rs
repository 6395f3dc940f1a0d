//! Leaf-key extraction from X.509 certificate chains.
//!
//! Chains are parsed only far enough to reach the end-entity SubjectPublicKeyInfo.
//! Trust, validity and revocation of the chain are left to the caller.
mod util;
pub mod x5chain;

pub use util::{common_name_or_unknown, curve_from_oid, ec2_key_from_spki};
pub use x5chain::{CertificateWithDer, X5Chain};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unable to decode x509 certificate: {0}")]
    Der(#[from] x509_cert::der::Error),
    #[error("x5chain contains no certificate")]
    EmptyChain,
    #[error("{0}")]
    UnexpectedCbor(String),
    #[error("unsupported key type: public key algorithm {0} is not id-ecPublicKey")]
    UnsupportedKeyType(String),
    #[error("unsupported key type: unknown named curve {0}")]
    UnsupportedCurve(String),
    #[error("EC public key does not name its curve")]
    MissingCurve,
    #[error("malformed EC public key point")]
    InvalidPoint,
    #[error("unable to PEM encode certificate: {0}")]
    Pem(String),
}

impl Error {
    /// Whether the chain was well formed but carries a key this crate cannot use.
    pub fn is_unsupported_key(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedKeyType(_) | Error::UnsupportedCurve(_)
        )
    }
}
