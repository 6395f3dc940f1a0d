//! COSE building blocks: the key model, the algorithm registry, `Sig_structure`
//! construction and EC2 signature verification.

pub mod algorithm;
pub mod key;
pub mod sign1;
pub mod verifier;

pub use algorithm::{Algorithm, HashAlgorithm, HeaderLabel};
pub use key::{CoseKey, Curve, Ec2Key, Ec2Y, KeyError, KeyType};
pub use sign1::CoseSign1;
pub use verifier::{verify_ec2, VerifyError};
