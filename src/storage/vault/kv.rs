//! KV v2 access seam
//!
//! [`KvStore`] is the subset of the KV v2 API the Vault engine needs.
//! [`VaultKvClient`] talks to a real Vault through `vaultrs`.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::{kv2, sys};

use crate::config::VaultConfig;
use crate::errors::{KnoxError, Result};

/// Engine type enabled when the configured mount is missing
pub const KV_V2_ENGINE: &str = "kv-v2";

/// Versioned key/value operations on a single mount.
///
/// Paths are relative to the mount and carry no leading `/`.
#[async_trait]
pub trait KvStore: Send + Sync + fmt::Debug {
    /// Latest version of the secret at `path`; `NotFound` if absent or deleted.
    async fn read(&self, path: &str) -> Result<Value>;

    /// Writes a new version and returns its number.
    async fn write(&self, path: &str, data: &Value) -> Result<u64>;

    /// Immediate children of `path`; sub-folders end with `/`.
    ///
    /// `NotFound` when nothing exists below `path`.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Soft-deletes the latest version at `path`.
    async fn delete_latest(&self, path: &str) -> Result<()>;

    /// Current version number of the secret at `path`.
    async fn current_version(&self, path: &str) -> Result<u64>;
}

/// Maps a `vaultrs` error onto the store taxonomy.
pub fn map_client_error(err: ClientError, path: &str) -> KnoxError {
    match err {
        ClientError::APIError { code: 404, .. } => KnoxError::not_found(path),
        other => KnoxError::backend_unavailable(format!("Vault request for '{}' failed: {}", path, other)),
    }
}

/// KV v2 client backed by a live Vault server
pub struct VaultKvClient {
    client: VaultClient,
    mount: String,
}

impl fmt::Debug for VaultKvClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultKvClient").field("mount", &self.mount).field("client", &"[VaultClient]").finish()
    }
}

impl VaultKvClient {
    /// Builds the client, checks server health and makes sure the mount exists.
    pub async fn connect(config: &VaultConfig) -> Result<Self> {
        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address);

        if let Some(ref token) = config.token {
            settings_builder.token(token.expose_secret());
        }

        if let Some(ref namespace) = config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        let settings = settings_builder
            .build()
            .map_err(|e| KnoxError::config(format!("Invalid Vault configuration: {}", e)))?;

        let client = VaultClient::new(settings)
            .map_err(|e| KnoxError::config(format!("Failed to create Vault client: {}", e)))?;

        if let Err(e) = sys::health(&client).await {
            error!(error = %e, vault_addr = %config.address, "Vault health check failed");
            return Err(KnoxError::backend_unavailable(format!("Vault health check failed: {}", e)));
        }

        let kv = Self { client, mount: config.mount.clone() };
        kv.ensure_mount().await?;

        info!(vault_addr = %config.address, mount = %kv.mount, "Connected to Vault");
        Ok(kv)
    }

    async fn ensure_mount(&self) -> Result<()> {
        let mounts = sys::mount::list(&self.client)
            .await
            .map_err(|e| KnoxError::backend_unavailable(format!("Failed to list Vault mounts: {}", e)))?;

        let key = format!("{}/", self.mount.trim_end_matches('/'));
        if mounts.contains_key(&key) {
            return Ok(());
        }

        info!(mount = %self.mount, engine = KV_V2_ENGINE, "Enabling missing secrets engine");
        sys::mount::enable(&self.client, &self.mount, KV_V2_ENGINE, None).await.map_err(|e| {
            KnoxError::backend_unavailable(format!("Failed to enable {} at '{}': {}", KV_V2_ENGINE, self.mount, e))
        })
    }
}

#[async_trait]
impl KvStore for VaultKvClient {
    async fn read(&self, path: &str) -> Result<Value> {
        kv2::read::<Value>(&self.client, &self.mount, path).await.map_err(|e| map_client_error(e, path))
    }

    async fn write(&self, path: &str, data: &Value) -> Result<u64> {
        let metadata =
            kv2::set(&self.client, &self.mount, path, data).await.map_err(|e| map_client_error(e, path))?;
        Ok(metadata.version)
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        kv2::list(&self.client, &self.mount, path).await.map_err(|e| map_client_error(e, path))
    }

    async fn delete_latest(&self, path: &str) -> Result<()> {
        kv2::delete_latest(&self.client, &self.mount, path).await.map_err(|e| map_client_error(e, path))
    }

    async fn current_version(&self, path: &str) -> Result<u64> {
        let metadata =
            kv2::read_metadata(&self.client, &self.mount, path).await.map_err(|e| map_client_error(e, path))?;
        Ok(metadata.current_version)
    }
}
