//! Secrets document with dotted-path lookup

use super::ConfigError;
use serde_json::Value;
use std::path::PathBuf;

/// JSON document of named secrets, e.g. `{"secrets": {"gemini": {"api_key": "..."}}}`
#[derive(Debug, Clone, Default)]
pub struct Secrets(Value);

impl Secrets {
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(source) => return Err(ConfigError::SecretsFile { path, source }),
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Self(value)),
            Err(source) => Err(ConfigError::SecretsFormat { path, source }),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Look up a string secret by dotted path, e.g. `secrets.gemini.api_key`
    pub fn get(&self, path: &str) -> Option<&str> {
        path.split('.')
            .try_fold(&self.0, |node, key| node.get(key))?
            .as_str()
            .filter(|s| !s.is_empty())
    }
}
