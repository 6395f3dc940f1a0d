use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

use super::engine::Hasher;
use crate::error::{Error, Result};

/// A decoded disclosure: `[salt, name, value]` for an object property or
/// `[salt, value]` for an array element.
#[derive(Debug, Clone, PartialEq)]
pub struct Disclosure {
    /// The base64url text exactly as presented; digests are computed over it.
    pub encoded: String,
    pub salt: String,
    pub name: Option<String>,
    pub value: Value,
}

impl Disclosure {
    pub fn parse(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::sd_jwt("disclosure is not base64url").with_source(e))?;
        let array: Vec<Value> = serde_json::from_slice(&bytes)
            .map_err(|e| Error::sd_jwt("disclosure is not a JSON array").with_source(e))?;
        let salt = |v: &Value| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::sd_jwt("disclosure salt must be a string"))
        };
        match array.as_slice() {
            [s, name, value] => Ok(Self {
                encoded: encoded.to_string(),
                salt: salt(s)?,
                name: Some(
                    name.as_str()
                        .ok_or_else(|| Error::sd_jwt("disclosure claim name must be a string"))?
                        .to_string(),
                ),
                value: value.clone(),
            }),
            [s, value] => Ok(Self {
                encoded: encoded.to_string(),
                salt: salt(s)?,
                name: None,
                value: value.clone(),
            }),
            other => Err(Error::sd_jwt(format!(
                "disclosure must have 2 or 3 elements, found {}",
                other.len()
            ))),
        }
    }

    /// `base64url(hash(ascii(encoded)))` under the issuer's `_sd_alg`.
    pub fn digest(&self, hasher: &dyn Hasher, sd_alg: &str) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(hasher.digest(sd_alg, self.encoded.as_bytes())?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sd_jwt::engine::Sha2Hasher;

    #[test]
    fn digest_of_known_disclosure() {
        // SD-JWT draft example: ["_26bc4LT-ac6q2KI6cBW5es", "family_name", "Möbius"]
        let encoded = "WyJfMjZiYzRMVC1hYzZxMktJNmNCVzVlcyIsICJmYW1pbHlfbmFtZSIsICJNw7ZiaXVzIl0";
        let disclosure = Disclosure::parse(encoded).unwrap();
        assert_eq!(disclosure.name.as_deref(), Some("family_name"));
        assert_eq!(disclosure.value, Value::String("Möbius".into()));
        assert_eq!(
            disclosure.digest(&Sha2Hasher, "sha-256").unwrap(),
            "X9yH0Ajrdm1Oij4tWso9UzzKJvPoDxwmuEcO3XAdRC0"
        );
    }

    #[test]
    fn array_element_has_no_name() {
        let encoded = URL_SAFE_NO_PAD.encode(r#"["salt","DE"]"#);
        let disclosure = Disclosure::parse(&encoded).unwrap();
        assert!(disclosure.name.is_none());
        assert_eq!(disclosure.value, Value::String("DE".into()));
    }

    #[test]
    fn rejects_bad_shapes() {
        for raw in [r#"["salt"]"#, r#"{"a":1}"#, r#"[1,"name","v"]"#, r#"["s",2,"v"]"#] {
            assert!(Disclosure::parse(&URL_SAFE_NO_PAD.encode(raw)).is_err(), "{raw}");
        }
    }
}
