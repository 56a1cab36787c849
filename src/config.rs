//! Startup configuration
//!
//! Everything the service needs from its environment is read once into an
//! [`AppConfig`] and handed to the components that need it.

mod secrets;

pub use secrets::Secrets;

use crate::llm::DEFAULT_MODEL;
use crate::session::DEFAULT_COMPLETION_TIMEOUT;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

pub const DEFAULT_PORT: u16 = 3101;
pub const DEFAULT_TRANSCRIPT_URL: &str =
    "https://cjremmett.com/finance-api/get-earnings-call-transcript";
pub const DEFAULT_LOG_TABLE: &str = "ai_logs";

const GEMINI_KEY_PATH: &str = "secrets.gemini.api_key";
const FINANCE_TOKEN_PATH: &str = "secrets.finance_tools.api_token";
const LOG_TOKEN_PATH: &str = "secrets.logging_microservice.api_token";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("Cannot read secrets file {path}: {source}")]
    SecretsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Secrets file {path} is not valid JSON: {source}")]
    SecretsFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Remote log sink settings. Present only when a sink URL is configured.
#[derive(Debug, Clone)]
pub struct RemoteLogConfig {
    pub base_url: String,
    pub token: String,
    pub table: String,
    pub min_level: Level,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub transcript_url: String,
    pub finance_token: String,
    pub completion_model: String,
    pub completion_timeout: Duration,
    pub gemini_api_key: String,
    pub llm_gateway: Option<String>,
    pub remote_log: Option<RemoteLogConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secrets = match var("ECT_SECRETS_FILE") {
            Some(path) => Secrets::load(PathBuf::from(path))?,
            None => Secrets::default(),
        };
        let secret = |env_key: &str, path: &str| {
            var(env_key)
                .or_else(|| secrets.get(path).map(str::to_string))
                .unwrap_or_default()
        };

        let db_path = var("ECT_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".ect-relay").join("chats.db")
            },
            PathBuf::from,
        );

        let remote_log = match var("ECT_LOG_URL") {
            Some(base_url) => Some(RemoteLogConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                token: secret("LOG_API_TOKEN", LOG_TOKEN_PATH),
                table: var("ECT_LOG_TABLE").unwrap_or_else(|| DEFAULT_LOG_TABLE.to_string()),
                min_level: parse_var("ECT_LOG_LEVEL", var("ECT_LOG_LEVEL"), Level::INFO)?,
            }),
            None => None,
        };

        Ok(Self {
            port: parse_var("ECT_PORT", var("ECT_PORT"), DEFAULT_PORT)?,
            db_path,
            transcript_url: var("ECT_TRANSCRIPT_URL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPT_URL.to_string()),
            finance_token: secret("FINANCE_API_TOKEN", FINANCE_TOKEN_PATH),
            completion_model: var("ECT_COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_timeout: Duration::from_secs(parse_var(
                "ECT_COMPLETION_TIMEOUT_SECS",
                var("ECT_COMPLETION_TIMEOUT_SECS"),
                DEFAULT_COMPLETION_TIMEOUT.as_secs(),
            )?),
            gemini_api_key: secret("GEMINI_API_KEY", GEMINI_KEY_PATH),
            llm_gateway: var("ECT_LLM_GATEWAY"),
            remote_log,
        })
    }

    /// Secrets that resolved to nothing. The features using them run degraded.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_empty() && self.llm_gateway.is_none() {
            missing.push(GEMINI_KEY_PATH);
        }
        if self.finance_token.is_empty() {
            missing.push(FINANCE_TOKEN_PATH);
        }
        if self.remote_log.as_ref().is_some_and(|log| log.token.is_empty()) {
            missing.push(LOG_TOKEN_PATH);
        }
        missing
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
        None => Ok(default),
    }
}
