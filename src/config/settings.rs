//! # Configuration Settings
//!
//! Defines the configuration structure for Knox.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::certificate::SecretString;
use crate::errors::{KnoxError, Result};
use crate::observability::LogFormat;
use crate::storage::StoreEngineType;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Store selection and request deadline
    #[validate(nested)]
    pub store: StoreConfig,

    /// HashiCorp Vault connection
    #[validate(nested)]
    pub vault: VaultConfig,

    /// AWS Certificate Manager session
    #[validate(nested)]
    pub acm: AcmConfig,

    /// Local filesystem store
    pub file: FileStoreConfig,

    /// Certificate issuance provider
    #[validate(nested)]
    pub issuer: IssuerConfig,

    /// Log output
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(KnoxError::from)?;
        self.validate_custom()?;
        Ok(())
    }

    fn validate_custom(&self) -> Result<()> {
        if self.store.engine == StoreEngineType::Vault
            && !(self.vault.address.starts_with("http://") || self.vault.address.starts_with("https://"))
        {
            return Err(KnoxError::config(format!(
                "Vault address must start with 'http://' or 'https://', got '{}'",
                self.vault.address
            )));
        }

        if self.issuer.kind == IssuerKind::Command
            && self.issuer.program.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(KnoxError::config("issuer.program is required for the command issuer"));
        }

        Ok(())
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfig {
    /// Which backend to use
    pub engine: StoreEngineType,

    /// Deadline applied to every backend call, in seconds
    #[validate(range(min = 1, max = 600, message = "Request timeout must be between 1 and 600 seconds"))]
    pub request_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { engine: StoreEngineType::Vault, request_timeout_secs: 30 }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Vault KV v2 configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VaultConfig {
    #[validate(length(min = 1, message = "Vault address cannot be empty"))]
    pub address: String,

    /// Pre-established token; never logged
    pub token: Option<SecretString>,

    pub namespace: Option<String>,

    /// KV v2 mount holding the certificate tree
    #[validate(length(min = 1, message = "Vault mount cannot be empty"))]
    pub mount: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            token: None,
            namespace: None,
            mount: "secret".to_string(),
        }
    }
}

/// ACM session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AcmConfig {
    /// Named profile from the shared AWS config files
    pub profile: Option<String>,

    #[validate(length(min = 1, message = "AWS region cannot be empty"))]
    pub region: String,
}

impl Default for AcmConfig {
    fn default() -> Self {
        Self { profile: None, region: "us-east-1".to_string() }
    }
}

/// File store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Root directory of the store tree
    pub home: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self { home: PathBuf::from(".knox/store") }
    }
}

/// Issuance provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssuerKind {
    /// External program such as certbot
    #[default]
    Command,
    /// Local self-signed certificates for development
    SelfSigned,
}

/// Issuance provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IssuerConfig {
    pub kind: IssuerKind,

    /// Program run by the command issuer
    pub program: Option<String>,

    /// Program arguments; `{name}` is replaced with the common name
    pub args: Vec<String>,

    /// Directory holding `<name>/{cert.pem,chain.pem,privkey.pem}` after issuance
    pub live_dir: PathBuf,

    /// Output directory of the self-signed issuer
    pub work_dir: PathBuf,

    /// Validity of self-signed certificates
    #[validate(range(min = 1, max = 825, message = "Validity must be between 1 and 825 days"))]
    pub validity_days: u32,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            kind: IssuerKind::Command,
            program: Some("certbot".to_string()),
            args: vec![
                "certonly".to_string(),
                "--non-interactive".to_string(),
                "--agree-tos".to_string(),
                "--dns-route53".to_string(),
                "-d".to_string(),
                "{name}".to_string(),
            ],
            live_dir: PathBuf::from("/etc/letsencrypt/live"),
            work_dir: PathBuf::from(".knox/issued"),
            validity_days: 90,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.engine, StoreEngineType::Vault);
        assert_eq!(config.store.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.vault.mount, "secret");
    }

    #[test]
    fn test_request_timeout_range() {
        let mut config = AppConfig::default();
        config.store.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(KnoxError::Config { .. })));
    }

    #[test]
    fn test_vault_address_scheme() {
        let mut config = AppConfig::default();
        config.vault.address = "vault.internal:8200".to_string();
        assert!(config.validate().is_err());

        // Only checked when Vault is the selected engine
        config.store.engine = StoreEngineType::File;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_command_issuer_requires_program() {
        let mut config = AppConfig::default();
        config.issuer.program = None;
        assert!(config.validate().is_err());

        config.issuer.kind = IssuerKind::SelfSigned;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "store": { "engine": "file" },
            "vault": { "token": "s.abc" }
        }))
        .unwrap();

        assert_eq!(config.store.engine, StoreEngineType::File);
        assert_eq!(config.store.request_timeout_secs, 30);
        assert_eq!(config.vault.token.as_ref().unwrap().expose_secret(), "s.abc");
        assert_eq!(config.vault.mount, "secret");
    }
}
