//! # Configuration Management
//!
//! Loads [`AppConfig`] once at startup from layered sources, lowest
//! precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config FILE`, else `./knox.toml` when present)
//! 3. `KNOX_*` environment variables, `__` between sections
//!    (`KNOX_VAULT__ADDRESS`, `KNOX_STORE__ENGINE`)
//! 4. the standard `VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`,
//!    `AWS_PROFILE` and `AWS_REGION` variables, for settings whose `KNOX_*`
//!    variable is unset

pub mod settings;

pub use settings::{
    AcmConfig, AppConfig, FileStoreConfig, IssuerConfig, IssuerKind, LoggingConfig, StoreConfig,
    VaultConfig,
};

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::certificate::SecretString;
use crate::errors::Result;

pub const ENV_PREFIX: &str = "KNOX";
pub const DEFAULT_CONFIG_FILE: &str = "knox";

/// Loads configuration from the file and process environment.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_with_env(path, None)
}

/// Loads configuration with an explicit environment instead of the process one.
pub fn load_config_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<AppConfig> {
    let mut builder = config::Config::builder();
    builder = match path {
        Some(path) => builder.add_source(config::File::from(path).required(true)),
        None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env.clone()),
        )
        .build()?;

    let mut app: AppConfig = settings.try_deserialize()?;
    match env {
        Some(env) => app.apply_standard_env(|key| env.get(key).cloned()),
        None => app.apply_standard_env(|key| std::env::var(key).ok()),
    }

    app.validate()?;
    debug!(
        engine = %app.store.engine,
        request_timeout_secs = app.store.request_timeout_secs,
        "Loaded configuration"
    );
    Ok(app)
}

impl AppConfig {
    /// Fills settings from the conventional Vault and AWS variables.
    pub fn apply_standard_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fallback = |knox_key: &str, standard_keys: &[&str]| -> Option<String> {
            if lookup(knox_key).is_some() {
                return None;
            }
            standard_keys.iter().find_map(|key| lookup(key)).filter(|value| !value.is_empty())
        };

        if let Some(address) = fallback("KNOX_VAULT__ADDRESS", &["VAULT_ADDR"]) {
            self.vault.address = address;
        }
        if let Some(token) = fallback("KNOX_VAULT__TOKEN", &["VAULT_TOKEN"]) {
            self.vault.token = Some(SecretString::new(token));
        }
        if let Some(namespace) = fallback("KNOX_VAULT__NAMESPACE", &["VAULT_NAMESPACE"]) {
            self.vault.namespace = Some(namespace);
        }
        if let Some(profile) = fallback("KNOX_ACM__PROFILE", &["AWS_PROFILE"]) {
            self.acm.profile = Some(profile);
        }
        if let Some(region) = fallback("KNOX_ACM__REGION", &["AWS_REGION", "AWS_DEFAULT_REGION"]) {
            self.acm.region = region;
        }
    }
}
