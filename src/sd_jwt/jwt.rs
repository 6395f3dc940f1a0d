//! Compact JWS parsing. Signatures are checked by the caller; this module only splits
//! and decodes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct CompactJwt {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
    /// `base64url(header) "." base64url(payload)`, the bytes that were signed.
    pub signing_input: String,
    pub signature: Vec<u8>,
}

impl CompactJwt {
    pub fn parse(token: &str) -> Result<Self> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(Error::sd_jwt(format!(
                "JWT must have 3 segments, found {}",
                parts.len()
            )));
        };
        Ok(Self {
            header: decode_object(header, "header")?,
            payload: decode_object(payload, "payload")?,
            signing_input: format!("{header}.{payload}"),
            signature: URL_SAFE_NO_PAD
                .decode(signature)
                .map_err(|e| Error::sd_jwt("JWT signature is not base64url").with_source(e))?,
        })
    }

    pub fn alg(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }

    pub fn typ(&self) -> Option<&str> {
        self.header.get("typ").and_then(Value::as_str)
    }

    /// DER certificates from the `x5c` header, leaf first.
    pub fn x5c(&self) -> Result<Vec<Vec<u8>>> {
        let Some(Value::Array(certs)) = self.header.get("x5c") else {
            return Err(Error::sd_jwt("issuer JWT header has no x5c certificate chain"));
        };
        if certs.is_empty() {
            return Err(Error::sd_jwt("issuer JWT x5c certificate chain is empty"));
        }
        certs
            .iter()
            .map(|cert| {
                let cert = cert
                    .as_str()
                    .ok_or_else(|| Error::sd_jwt("x5c entries must be strings"))?;
                // x5c is standard base64, not base64url.
                base64::engine::general_purpose::STANDARD
                    .decode(cert)
                    .map_err(|e| Error::sd_jwt("x5c entry is not base64").with_source(e))
            })
            .collect()
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    pub fn numeric_date(&self, name: &str) -> Result<Option<i64>> {
        numeric_date(&self.payload, name)
    }
}

/// A `NumericDate` claim, seconds since the epoch.
pub fn numeric_date(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>> {
    match claims.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| Error::sd_jwt(format!("claim '{name}' is not a NumericDate"))),
    }
}

fn decode_object(segment: &str, what: &str) -> Result<Map<String, Value>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::sd_jwt(format!("JWT {what} is not base64url")).with_source(e))?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::sd_jwt(format!("JWT {what} is not a JSON object"))),
        Err(e) => Err(Error::sd_jwt(format!("JWT {what} is not valid JSON")).with_source(e)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn encode(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    #[test]
    fn parses_segments() {
        let header = encode(&json!({"alg": "ES256", "typ": "dc+sd-jwt", "x5c": ["AQID"]}));
        let payload = encode(&json!({"iat": 1700000000, "vct": "urn:example"}));
        let token = format!("{header}.{payload}.{}", URL_SAFE_NO_PAD.encode([9u8; 64]));
        let jwt = CompactJwt::parse(&token).unwrap();
        assert_eq!(jwt.alg(), Some("ES256"));
        assert_eq!(jwt.typ(), Some("dc+sd-jwt"));
        assert_eq!(jwt.x5c().unwrap(), vec![vec![1, 2, 3]]);
        assert_eq!(jwt.numeric_date("iat").unwrap(), Some(1700000000));
        assert_eq!(jwt.numeric_date("exp").unwrap(), None);
        assert_eq!(jwt.signing_input, format!("{header}.{payload}"));
        assert_eq!(jwt.signature, vec![9u8; 64]);
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["a.b", "a.b.c.d", "e30.W10.AA", "!!.e30.AA"] {
            assert!(CompactJwt::parse(token).is_err(), "{token}");
        }
    }
}
