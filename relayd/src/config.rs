//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The
//! configuration file path defaults to `config.yaml` but can be specified via the `-f` flag or
//! the `RELAYD_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `RELAYD_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `RELAYD_SECRETS__VAULT__ADDRESS=https://vault:8200` sets `secrets.vault.address`.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding
//! - **Credential**: `secret_name` - name of the credential record in the secret store
//! - **OAuth**: `token_url`, `redirect_uri` - refresh-grant exchange parameters
//! - **Ticketing**: `ticket_url` - optional override for the endpoint stored with the credential
//! - **Limits**: `request_timeout`, `max_body_bytes`
//! - **Secrets**: `secrets` - which secret store backend to use and how to reach it
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! RELAYD_PORT=8080
//!
//! # Point at a different token endpoint
//! RELAYD_TOKEN_URL="https://accounts.zoho.eu/oauth/v2/token"
//!
//! # Select the file-backed secret store
//! RELAYD_SECRETS__FILE__DIR="/var/lib/relayd/secrets"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "RELAYD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Name of the credential record in the secret store
    pub secret_name: String,
    /// OAuth token endpoint used for refresh-grant renewals
    pub token_url: Url,
    /// Redirect URI registered with the OAuth client, sent with every refresh grant
    pub redirect_uri: String,
    /// Ticketing endpoint override. When set, this takes precedence over the URL
    /// stored inside the credential record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_url: Option<Url>,
    /// Per-operation deadline applied to every outbound store and network call.
    /// On timeout the whole relay operation fails; callers retry at a higher layer.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Maximum accepted webhook body size in bytes
    pub max_body_bytes: usize,
    /// Secret store backend configuration
    pub secrets: SecretsConfig,
}

/// Secret store backend configuration.
///
/// Selects which store holds the integration credential. Credentials for the
/// store itself (e.g., the Vault token) should be set via environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretsConfig {
    /// File-backed store: one JSON file per secret under `dir`
    File(FileStoreConfig),
    /// HashiCorp Vault KV v2 store
    /// Set credentials via:
    /// - `RELAYD_SECRETS__VAULT__ADDRESS` - Vault server address
    /// - `RELAYD_SECRETS__VAULT__TOKEN` - Vault client token
    Vault(VaultStoreConfig),
    /// In-memory store for tests and local development. Not durable.
    Memory,
}

/// File-backed secret store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileStoreConfig {
    /// Directory holding one `<secret_name>.json` file per record
    pub dir: PathBuf,
}

/// Vault KV v2 secret store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VaultStoreConfig {
    /// Vault server address (e.g., "https://vault.internal:8200")
    pub address: String,
    /// Vault client token
    pub token: String,
    /// KV v2 mount point
    #[serde(default = "default_vault_mount")]
    pub mount: String,
}

fn default_vault_mount() -> String {
    "secret".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            secret_name: "ticketing-oauth".to_string(),
            token_url: Url::parse("https://accounts.zoho.com/oauth/v2/token").expect("default token URL is valid"),
            redirect_uri: "https://localhost/callback".to_string(),
            ticket_url: None,
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 1024 * 1024,
            secrets: SecretsConfig::Memory,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Build the figment for configuration loading
    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("RELAYD_").split("__"))
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_name.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: secret_name must not be empty".to_string(),
            });
        }

        // Secret names become file names in the file store; keep them flat
        if self.secret_name.contains(['/', '\\']) {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: secret_name '{}' must not contain path separators",
                    self.secret_name
                ),
            });
        }

        if self.redirect_uri.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: redirect_uri must not be empty".to_string(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: request_timeout must be greater than zero".to_string(),
            });
        }

        if let SecretsConfig::Vault(vault) = &self.secrets {
            if Url::parse(&vault.address).is_err() {
                return Err(Error::Internal {
                    operation: format!("Config validation: invalid Vault address '{}'", vault.address),
                });
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
