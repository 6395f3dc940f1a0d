//! Verification of mdoc presentations.
pub mod mdoc;
pub mod mdoc_auth;

pub use mdoc::{verify_mdoc, Decoded, DeviceVerified, IssuerVerified, NamespacesVerified};
