//! Verifier for credential presentations received through the Digital Credentials API.
//!
//! Two formats are supported over OpenID4VP: ISO/IEC 18013-5 `mso_mdoc` device
//! responses and `dc+sd-jwt` SD-JWT VCs. [dc_api::RequestBuilder] produces the request
//! and its sealed nonce, [dc_api::Verifier] checks what comes back.
pub mod cbor;
pub mod config;
pub mod cose;
pub mod dc_api;
pub mod definitions;
pub mod error;
pub mod nonce;
pub mod presentation;
pub mod providers;
pub mod sd_jwt;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::VerifierConfig;
pub use dc_api::{
    verify_response, GeneratedRequest, PresentationOptions, RequestBuilder, VerificationOutcome,
    VerifiedCredential, Verifier,
};
pub use error::{Error, ErrorKind, Result};
