use serde::{Deserialize, Serialize};

use crate::definitions::{DeviceSigned, IssuerSigned};

/// The top-level CBOR structure a wallet returns for an `mso_mdoc` credential.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,
    pub status: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub doc_type: String,
    pub issuer_signed: IssuerSigned,
    pub device_signed: DeviceSigned,
}

impl DeviceResponse {
    pub const VERSION: &'static str = "1.0";
    pub const STATUS_OK: u64 = 0;
}
