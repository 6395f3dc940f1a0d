//! The issuer-signed half of an mdoc [Document](super::device_response::Document).
//!
//! Each element is wrapped as [IssuerSignedItemBytes] so that its digest is computed
//! over the bytes the issuer produced, not over a re-encoding.
use std::collections::BTreeMap;

use ciborium::Value;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::cose::CoseSign1;
use crate::definitions::{helpers::Tag24, DigestId};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSigned {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "nameSpaces"
    )]
    pub namespaces: Option<IssuerNamespaces>,
    pub issuer_auth: CoseSign1,
}

pub type IssuerNamespaces = BTreeMap<String, Vec<IssuerSignedItemBytes>>;
pub type IssuerSignedItemBytes = Tag24<IssuerSignedItem>;

/// Represents an item signed by the issuer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerSignedItem {
    #[serde(rename = "digestID")]
    pub digest_id: DigestId,

    /// Salt that prevents digest precomputation.
    pub random: ByteBuf,

    pub element_identifier: String,

    pub element_value: Value,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cbor;

    #[test]
    fn item_uses_wire_names() {
        let item = IssuerSignedItem {
            digest_id: 7,
            random: ByteBuf::from(vec![1, 2, 3]),
            element_identifier: "family_name".into(),
            element_value: Value::Text("Smith".into()),
        };
        let Value::Map(entries) = cbor::into_value(&item).unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(
            cbor::map_get(&entries, "digestID"),
            Some(&Value::Integer(7.into()))
        );
        assert!(cbor::map_get(&entries, "elementIdentifier").is_some());

        let tagged = Tag24::new(item.clone()).unwrap();
        let bytes = cbor::to_vec(&tagged).unwrap();
        let back: IssuerSignedItemBytes = cbor::from_slice(&bytes).unwrap();
        assert_eq!(back.as_ref(), &item);
    }
}
