use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::definitions::HandoverVersion;

pub const DEFAULT_NONCE_LIFETIME_SECS: u64 = 300;

/// Verifier settings that do not change from one request to the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifierConfig {
    /// Origins a request may have been made from, e.g. a website and its app.
    pub expected_origins: Vec<String>,
    pub handover: HandoverVersion,
    /// Registered client identifier. Without one the identifier is derived from the
    /// origin according to `handover`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub nonce_lifetime_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            expected_origins: Vec::new(),
            handover: HandoverVersion::default(),
            client_id: None,
            nonce_lifetime_secs: DEFAULT_NONCE_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifierConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn with_expected_origin(mut self, origin: impl Into<String>) -> Self {
        self.expected_origins.push(origin.into());
        self
    }
}
