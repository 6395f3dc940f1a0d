//! Disclosure processing behind a pluggable interface.
//!
//! An [SdJwtEngine] receives the split presentation together with signature and hash
//! callbacks, and returns the issuer payload with every disclosure substituted in. The
//! claim assertions specific to SD-JWT VC live in [super::verify] and do not depend on
//! which engine is used.

use std::collections::{HashMap, HashSet};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::disclosure::Disclosure;
use super::jwt::CompactJwt;
use crate::error::{Error, Result};

pub const DEFAULT_SD_ALG: &str = "sha-256";
pub const KB_JWT_TYP: &str = "kb+jwt";

/// Checks the signature of a parsed JWT.
pub trait JwtVerifier {
    fn verify(&self, jwt: &CompactJwt) -> Result<()>;
}

impl<F> JwtVerifier for F
where
    F: Fn(&CompactJwt) -> Result<()>,
{
    fn verify(&self, jwt: &CompactJwt) -> Result<()> {
        self(jwt)
    }
}

/// Digest primitive over the IANA "Named Information Hash Algorithm" names.
pub trait Hasher {
    fn digest(&self, sd_alg: &str, input: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha2Hasher;

impl Hasher for Sha2Hasher {
    fn digest(&self, sd_alg: &str, input: &[u8]) -> Result<Vec<u8>> {
        match sd_alg {
            "sha-256" => Ok(Sha256::digest(input).to_vec()),
            "sha-384" => Ok(Sha384::digest(input).to_vec()),
            "sha-512" => Ok(Sha512::digest(input).to_vec()),
            other => Err(Error::sd_jwt(format!("unsupported _sd_alg '{other}'"))),
        }
    }
}

/// An SD-JWT presentation split on `~`.
#[derive(Debug, Clone, PartialEq)]
pub struct SdJwtPresentation {
    pub issuer_jwt: String,
    pub disclosures: Vec<String>,
    pub key_binding_jwt: Option<String>,
}

impl SdJwtPresentation {
    pub fn parse(presentation: &str) -> Result<Self> {
        let mut segments: Vec<&str> = presentation.split('~').collect();
        if segments.len() < 2 {
            return Err(Error::sd_jwt("SD-JWT presentation contains no '~' separator"));
        }
        let issuer_jwt = segments.remove(0).to_string();
        // The last segment is a key-binding JWT only when it has the three JWS parts.
        let last = segments.last().copied().unwrap_or_default();
        let key_binding_jwt = if last.matches('.').count() == 2 {
            segments.pop();
            Some(last.to_string())
        } else {
            if last.is_empty() {
                segments.pop();
            }
            None
        };
        if segments.iter().any(|d| d.is_empty()) {
            return Err(Error::sd_jwt("SD-JWT presentation contains an empty disclosure"));
        }
        Ok(Self {
            issuer_jwt,
            disclosures: segments.into_iter().map(str::to_string).collect(),
            key_binding_jwt,
        })
    }

    /// The string a key-binding JWT's `sd_hash` covers: issuer JWT and disclosures,
    /// each followed by `~`.
    pub fn sd_hash_input(&self) -> String {
        let mut input = format!("{}~", self.issuer_jwt);
        for disclosure in &self.disclosures {
            input.push_str(disclosure);
            input.push('~');
        }
        input
    }
}

/// Output of an engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedSdJwt {
    pub issuer_jwt: CompactJwt,
    /// Issuer payload with `_sd`, `_sd_alg` and array placeholders resolved.
    pub claims: Map<String, Value>,
    /// Every object-property disclosure, nested ones included, values fully expanded.
    pub disclosed: Vec<(String, Value)>,
    pub key_binding: Option<CompactJwt>,
}

pub trait SdJwtEngine: Send + Sync {
    /// Verify the issuer signature, match every disclosure to a digest, and check the
    /// key-binding JWT's type, signature and `sd_hash` when one is present.
    ///
    /// `holder` is `None` when the issuer bound no key; a key-binding JWT is then an
    /// error.
    fn process(
        &self,
        presentation: &SdJwtPresentation,
        issuer: &dyn JwtVerifier,
        holder: Option<&dyn JwtVerifier>,
        hasher: &dyn Hasher,
    ) -> Result<ProcessedSdJwt>;
}

/// Default engine following the IETF SD-JWT processing rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEngine;

impl SdJwtEngine for StandardEngine {
    fn process(
        &self,
        presentation: &SdJwtPresentation,
        issuer: &dyn JwtVerifier,
        holder: Option<&dyn JwtVerifier>,
        hasher: &dyn Hasher,
    ) -> Result<ProcessedSdJwt> {
        let issuer_jwt = CompactJwt::parse(&presentation.issuer_jwt)?;
        issuer.verify(&issuer_jwt)?;
        tracing::debug!("issuer JWT signature verified");

        let sd_alg = match issuer_jwt.claim("_sd_alg") {
            None => DEFAULT_SD_ALG.to_string(),
            Some(Value::String(alg)) => alg.clone(),
            Some(_) => return Err(Error::sd_jwt("_sd_alg must be a string")),
        };

        let mut by_digest = HashMap::new();
        for encoded in &presentation.disclosures {
            let disclosure = Disclosure::parse(encoded)?;
            let digest = disclosure.digest(hasher, &sd_alg)?;
            if by_digest.insert(digest, disclosure).is_some() {
                return Err(Error::sd_jwt("the same disclosure is presented twice"));
            }
        }

        let mut expander = Expander {
            by_digest: &by_digest,
            used: HashSet::new(),
            disclosed: Vec::new(),
        };
        let mut claims = issuer_jwt.payload.clone();
        claims.remove("_sd_alg");
        let claims = match expander.expand(Value::Object(claims), true)? {
            Value::Object(map) => map,
            _ => return Err(Error::sd_jwt("issuer payload is not an object")),
        };
        if expander.used.len() != by_digest.len() {
            return Err(Error::sd_jwt(
                "a disclosure is not referenced by the issuer-signed JWT",
            ));
        }
        let disclosed = expander.disclosed;

        let key_binding = match &presentation.key_binding_jwt {
            None => None,
            Some(token) => {
                let kb = CompactJwt::parse(token)?;
                if kb.typ() != Some(KB_JWT_TYP) {
                    return Err(Error::sd_jwt(format!(
                        "key binding JWT typ must be '{KB_JWT_TYP}'"
                    )));
                }
                let holder = holder.ok_or_else(|| {
                    Error::sd_jwt("key binding JWT present but the issuer bound no holder key")
                })?;
                holder.verify(&kb)?;
                let expected = URL_SAFE_NO_PAD.encode(
                    hasher.digest(&sd_alg, presentation.sd_hash_input().as_bytes())?,
                );
                match kb.claim("sd_hash").and_then(Value::as_str) {
                    Some(sd_hash) if sd_hash == expected => {}
                    _ => return Err(Error::sd_jwt("key binding JWT sd_hash mismatch")),
                }
                tracing::debug!("key binding JWT signature and sd_hash verified");
                Some(kb)
            }
        };

        Ok(ProcessedSdJwt {
            issuer_jwt,
            claims,
            disclosed,
            key_binding,
        })
    }
}

struct Expander<'a> {
    by_digest: &'a HashMap<String, Disclosure>,
    used: HashSet<String>,
    disclosed: Vec<(String, Value)>,
}

impl<'a> Expander<'a> {
    fn take(&mut self, digest: &str) -> Result<Option<&'a Disclosure>> {
        let Some(disclosure) = self.by_digest.get(digest) else {
            // Decoy digests have no disclosure.
            return Ok(None);
        };
        if !self.used.insert(digest.to_string()) {
            return Err(Error::sd_jwt("a digest is referenced more than once"));
        }
        Ok(Some(disclosure))
    }

    fn expand(&mut self, value: Value, top_level: bool) -> Result<Value> {
        match value {
            Value::Object(mut map) => {
                let digests = match map.remove("_sd") {
                    None => Vec::new(),
                    Some(Value::Array(digests)) => digests,
                    Some(_) => return Err(Error::sd_jwt("_sd must be an array")),
                };
                let mut out = Map::new();
                for (name, value) in map {
                    out.insert(name, self.expand(value, false)?);
                }
                for digest in digests {
                    let digest = digest
                        .as_str()
                        .ok_or_else(|| Error::sd_jwt("_sd entries must be strings"))?;
                    let Some(disclosure) = self.take(digest)? else {
                        continue;
                    };
                    let Some(name) = &disclosure.name else {
                        return Err(Error::sd_jwt(
                            "array element disclosure referenced from an _sd array",
                        ));
                    };
                    if name == "_sd" || name == "..." || (top_level && name == "_sd_alg") {
                        return Err(Error::sd_jwt(format!(
                            "disclosure uses reserved claim name '{name}'"
                        )));
                    }
                    if out.contains_key(name) {
                        return Err(Error::sd_jwt(format!(
                            "disclosed claim '{name}' already exists"
                        )));
                    }
                    let value = self.expand(disclosure.value.clone(), false)?;
                    self.disclosed.push((name.clone(), value.clone()));
                    out.insert(name.clone(), value);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match array_placeholder(&item)? {
                        Some(digest) => {
                            let Some(disclosure) = self.take(digest)? else {
                                continue;
                            };
                            if disclosure.name.is_some() {
                                return Err(Error::sd_jwt(
                                    "object property disclosure referenced from an array",
                                ));
                            }
                            out.push(self.expand(disclosure.value.clone(), false)?);
                        }
                        None => out.push(self.expand(item, false)?),
                    }
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        }
    }
}

/// `{"...": "<digest>"}` stands for an array element.
fn array_placeholder(item: &Value) -> Result<Option<&str>> {
    match item {
        Value::Object(map) if map.len() == 1 && map.contains_key("...") => map
            .get("...")
            .and_then(Value::as_str)
            .map(Some)
            .ok_or_else(|| Error::sd_jwt("array element digest must be a string")),
        _ => Ok(None),
    }
}
