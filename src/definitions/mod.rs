//! CBOR data structures of ISO/IEC 18013-5 needed to verify a presentation.
pub mod device_response;
pub mod device_signed;
pub mod helpers;
pub mod issuer_signed;
pub mod mso;
pub mod session;
pub mod validity_info;
pub mod x509;

pub use device_response::{DeviceResponse, Document};
pub use device_signed::{DeviceAuth, DeviceNamespaces, DeviceNamespacesBytes, DeviceSigned};
pub use issuer_signed::{IssuerNamespaces, IssuerSigned, IssuerSignedItem, IssuerSignedItemBytes};
pub use mso::{DeviceKeyInfo, DigestAlgorithm, DigestId, DigestIds, Mso};
pub use session::{HandoverIdentifier, HandoverVersion, SessionTranscript};
pub use validity_info::ValidityInfo;
