use std::collections::BTreeMap;

use ciborium::Value;
use serde::{Deserialize, Serialize};

use crate::cose::CoseSign1;
use crate::definitions::helpers::Tag24;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSigned {
    #[serde(rename = "nameSpaces")]
    pub namespaces: DeviceNamespacesBytes,
    pub device_auth: DeviceAuth,
}

pub type DeviceNamespacesBytes = Tag24<DeviceNamespaces>;
pub type DeviceNamespaces = BTreeMap<String, BTreeMap<String, Value>>;

/// `deviceAuth` holds either a signature or a MAC. Only signatures can be checked by a
/// verifier that never ran a device engagement.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_signature: Option<CoseSign1>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_mac: Option<Value>,
}

/// `DeviceAuthenticationBytes = #6.24(bstr .cbor DeviceAuthentication)` where
/// `DeviceAuthentication = ["DeviceAuthentication", SessionTranscript, DocType,
/// DeviceNameSpacesBytes]`.
pub fn device_authentication_bytes(
    session_transcript: &Value,
    doc_type: &str,
    namespaces: &DeviceNamespacesBytes,
) -> Result<Vec<u8>, crate::definitions::helpers::tag24::Error> {
    let device_authentication = Value::Array(vec![
        Value::Text("DeviceAuthentication".to_string()),
        session_transcript.clone(),
        Value::Text(doc_type.to_string()),
        namespaces.to_value(),
    ]);
    Tag24::new(device_authentication)?.to_tagged_bytes()
}
