//! HashiCorp Vault certificate store
//!
//! Each certificate occupies two sibling KV v2 secrets under its derived
//! path, with the leading `/` dropped:
//!
//! ```text
//! com/example/www/cert_body   { public, private, chain }
//! com/example/www/cert_info   { common_name, cert_type, subject, issuer, validity }
//! ```
//!
//! Both secrets are written by [`VaultStoreEngine::save`] as a two-step
//! saga. When the info write fails the body write is rolled back with a
//! soft delete and the caller gets [`KnoxError::PartialWrite`].

pub mod kv;
pub mod memory;

pub use kv::{KvStore, VaultKvClient};
pub use memory::MemoryKvStore;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::engine::{with_deadline, StoreAddress, StoreEngine, StoreEngineType};
use crate::certificate::documents::{self, CertBodyDocument, CertInfoDocument, CERT_BODY_KEY, CERT_INFO_KEY};
use crate::certificate::{CertType, CertificateParser, CertificateRecord, PathCodec};
use crate::config::VaultConfig;
use crate::errors::{KnoxError, Result};

/// Certificate store on a KV v2 mount
#[derive(Debug)]
pub struct VaultStoreEngine {
    kv: Arc<dyn KvStore>,
    request_timeout: Duration,
}

fn kv_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn leaf(path: &str, leaf: &str) -> String {
    let base = kv_path(path);
    if base.is_empty() {
        leaf.to_string()
    } else {
        format!("{}/{}", base, leaf)
    }
}

impl VaultStoreEngine {
    pub fn new(kv: Arc<dyn KvStore>, request_timeout: Duration) -> Self {
        Self { kv, request_timeout }
    }

    /// Connects to Vault and prepares the mount.
    ///
    /// Any failure here means the store is unusable.
    pub async fn connect(config: &VaultConfig, request_timeout: Duration) -> Result<Self> {
        let client = with_deadline(request_timeout, "vault bootstrap", VaultKvClient::connect(config)).await?;
        Ok(Self::new(Arc::new(client), request_timeout))
    }

    async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.request_timeout, operation, call).await
    }

    async fn read_document<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value: Value = self.call("vault read", self.kv.read(key)).await?;
        serde_json::from_value(value)
            .map_err(|e| KnoxError::serialization(e, format!("Malformed document at '{}'", key)))
    }

    /// Reads both leaves at `path` into a record.
    async fn read_record(&self, path: &str, name: &str, cert_type: CertType) -> Result<CertificateRecord> {
        let body_key = leaf(path, CERT_BODY_KEY);
        let body: CertBodyDocument = self.read_document(&body_key).await?;

        let mut record = match self.read_document::<CertInfoDocument>(&leaf(path, CERT_INFO_KEY)).await {
            Ok(info) => documents::into_record(body, info)?,
            Err(e) if e.is_not_found() => {
                warn!(path = %path, "cert_info missing, rebuilding it from cert_body");
                let mut record = CertificateRecord::new(name)?;
                record.body = body.into_body();
                let public = record.body.public_pem();
                let mut record = CertificateParser::parse(public.as_bytes(), CertType::Pem, record)?;
                record.cert_type = cert_type;
                record
            }
            Err(e) => return Err(e),
        };

        record.version = match self.call("vault metadata", self.kv.current_version(&body_key)).await {
            Ok(version) => Some(version),
            Err(e) => {
                debug!(path = %path, error = %e, "Could not read cert_body version");
                None
            }
        };
        Ok(record)
    }
}

#[async_trait]
impl StoreEngine for VaultStoreEngine {
    #[instrument(skip(self, record), fields(path = %record.path()))]
    async fn save(&self, record: &mut CertificateRecord) -> Result<()> {
        record.ensure_storable()?;

        let path = record.path().to_string();
        let body = serde_json::to_value(CertBodyDocument::from_record(record))?;
        let info = serde_json::to_value(CertInfoDocument::from_record(record))?;
        let body_key = leaf(&path, CERT_BODY_KEY);
        let info_key = leaf(&path, CERT_INFO_KEY);

        let previous = match self.call("vault read cert_body", self.kv.read(&body_key)).await {
            Ok(value) => Some(value),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let version = self.call("vault write cert_body", self.kv.write(&body_key, &body)).await?;

        if let Err(e) = self.call("vault write cert_info", self.kv.write(&info_key, &info)).await {
            error!(path = %path, error = %e, "cert_info write failed, rolling back cert_body");
            // Restore the prior body as a new version; delete only when there was none
            let rollback = match &previous {
                Some(prior) => self.call("vault restore cert_body", self.kv.write(&body_key, prior)).await.map(|_| ()),
                None => self.call("vault delete cert_body", self.kv.delete_latest(&body_key)).await,
            };
            let compensated = match rollback {
                Ok(()) => true,
                Err(rollback) => {
                    error!(path = %path, error = %rollback, "cert_body rollback failed");
                    false
                }
            };
            return Err(KnoxError::PartialWrite {
                path,
                written: CERT_BODY_KEY.to_string(),
                failed: CERT_INFO_KEY.to_string(),
                compensated,
                reason: e.to_string(),
            });
        }

        record.version = Some(version);
        info!(path = %path, common_name = %record.common_name(), version, "Saved certificate to Vault");
        Ok(())
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn get(&self, address: &StoreAddress, name: &str, cert_type: CertType) -> Result<CertificateRecord> {
        // Vault is path-addressed; a handle is treated as a path
        let path = address.as_str();
        let record = self.read_record(path, name, cert_type).await.map_err(|e| {
            if e.is_not_found() {
                KnoxError::not_found(address.to_string())
            } else {
                e
            }
        })?;
        debug!(path = %path, version = ?record.version, "Loaded certificate from Vault");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn find(&self, path: &str, name: &str) -> Result<Vec<CertificateRecord>> {
        let root = kv_path(path);
        let root_keys = self.call("vault list", self.kv.list(&root)).await.map_err(|e| {
            if e.is_not_found() {
                KnoxError::not_found(path)
            } else {
                e
            }
        })?;

        let mut records = Vec::new();
        let mut stack = vec![(root, root_keys)];

        while let Some((node, keys)) = stack.pop() {
            if keys.iter().any(|key| key == CERT_INFO_KEY) {
                let node_name = PathCodec::reverse(&format!("/{}", node))
                    .unwrap_or_else(|_| name.to_string());
                match self.read_record(&node, &node_name, CertType::Pem).await {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %node, error = %e, "Skipping unreadable certificate"),
                }
            }

            let mut children = Vec::new();
            for child in keys.iter().filter(|key| key.ends_with('/')) {
                let child_path = leaf(&node, child.trim_end_matches('/'));
                match self.call("vault list", self.kv.list(&child_path)).await {
                    Ok(child_keys) => children.push((child_path, child_keys)),
                    Err(e) => warn!(path = %child_path, error = %e, "Skipping unreadable branch"),
                }
            }
            // Reverse so siblings pop in listing order
            stack.extend(children.into_iter().rev());
        }

        if records.is_empty() {
            return Err(KnoxError::not_found(path));
        }

        debug!(path = %path, count = records.len(), "Found certificates in Vault");
        Ok(records)
    }

    fn engine_type(&self) -> StoreEngineType {
        StoreEngineType::Vault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_paths_drop_leading_slash() {
        assert_eq!(leaf("/com/example/www", CERT_BODY_KEY), "com/example/www/cert_body");
        assert_eq!(leaf("/", CERT_INFO_KEY), "cert_info");
        assert_eq!(kv_path("/com/example/"), "com/example");
    }
}
