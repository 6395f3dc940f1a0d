//! OpenID4VP over the Digital Credentials API: building requests and verifying the
//! responses they produce.
pub mod credential;
pub mod request;
pub mod response;

pub use credential::{CredentialMeta, IssuerMeta, VerificationContext, VerifiedCredential};
pub use request::{
    ClaimQuery, CredentialFormat, CredentialQuery, CredentialQueryMeta, DcApiRequest, DcqlQuery,
    GeneratedRequest, OpenId4VpRequest, PresentationOptions, RequestBuilder,
};
pub use response::{sniff_format, verify_response, VerificationOutcome, Verifier};
