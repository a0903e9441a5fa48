//! Configuration loading for the migration tool.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `GDAP_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application configuration derived from `GDAP_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base endpoint of the partner administration API.
    #[serde(default = "default_partner_api_base")]
    pub partner_api_base: String,
    /// Base endpoint of the directory graph API.
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    /// OAuth authority used for device-code credential acquisition.
    #[serde(default = "default_authority")]
    pub authority: String,
    /// Public client application id registered for this tool.
    pub client_id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum concurrent create/refresh requests in one batch.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Root directory for operations/, downloads/ and logs/.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
}

fn default_partner_api_base() -> String {
    "https://api.partnercustomeradministration.microsoft.com".to_string()
}

fn default_graph_api_base() -> String {
    "https://graph.microsoft.com".to_string()
}

fn default_authority() -> String {
    "https://login.microsoftonline.com/organizations".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_concurrency() -> usize {
    5
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("GDAPBulkMigration")
}

impl AppConfig {
    /// Serialize the configuration for startup logging. No secrets are held in
    /// the current schema (the tool uses a public client, not a client secret).
    pub fn redacted_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Validate configuration bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if self.batch_concurrency == 0 || self.batch_concurrency > 64 {
            return Err(ConfigError::InvalidBatchConcurrency {
                value: self.batch_concurrency,
            });
        }
        for (name, value) in [
            ("partner API base", &self.partner_api_base),
            ("graph API base", &self.graph_api_base),
            ("authority", &self.authority),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(ConfigError::InvalidEndpoint {
                    name: name.to_string(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("client id is missing; set GDAP_CLIENT_ID environment variable")]
    MissingClientId,
    #[error("batch concurrency must be between 1 and 64, got {value}")]
    InvalidBatchConcurrency { value: usize },
    #[error("invalid {name} '{value}': not a URL")]
    InvalidEndpoint { name: String, value: String },
}

/// Loads configuration using layered `.env` files and `GDAP_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration from `.env`, `.env.local` and the process
    /// environment, the last one winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut layered = BTreeMap::new();
        self.merge_dotenv(self.base_dir.join(".env"), &mut layered)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut layered)?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("GDAP_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let take = |layered: &mut BTreeMap<String, String>, key: &str| {
            layered.remove(key).filter(|v| !v.trim().is_empty())
        };

        let config = AppConfig {
            partner_api_base: take(&mut layered, "PARTNER_API_BASE")
                .unwrap_or_else(default_partner_api_base),
            graph_api_base: take(&mut layered, "GRAPH_API_BASE")
                .unwrap_or_else(default_graph_api_base),
            authority: take(&mut layered, "AUTHORITY").unwrap_or_else(default_authority),
            client_id: take(&mut layered, "CLIENT_ID").unwrap_or_default(),
            log_level: take(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level),
            batch_concurrency: take(&mut layered, "BATCH_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_batch_concurrency),
            workspace_dir: take(&mut layered, "WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_workspace_dir),
        };

        config.validate()?;
        Ok(config)
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) =
                        item.map_err(|source| ConfigError::EnvFile {
                            path: path.clone(),
                            source,
                        })?;
                    if let Some(stripped) = key.strip_prefix("GDAP_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(source) => Err(ConfigError::EnvFile { path, source }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
