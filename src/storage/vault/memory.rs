//! In-process KV v2 store
//!
//! Keeps every version of every key in memory, with soft deletes and
//! metadata-based listing like a KV v2 mount. Used for tests and for
//! `--engine memory` dry runs.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::kv::KvStore;
use crate::errors::{KnoxError, Result};

#[derive(Debug, Default)]
struct Inner {
    /// Versions per key; `None` marks a soft-deleted version
    secrets: BTreeMap<String, Vec<Option<Value>>>,
    fail_writes: Vec<String>,
    fail_lists: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: Mutex<Inner>,
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes writes to keys ending in `suffix` fail.
    pub async fn fail_writes_to(&self, suffix: &str) {
        self.inner.lock().await.fail_writes.push(suffix.to_string());
    }

    /// Makes listings of `path` fail.
    pub async fn fail_lists_under(&self, path: &str) {
        self.inner.lock().await.fail_lists.push(normalize(path));
    }

    /// All stored versions of `path`, oldest first.
    pub async fn versions(&self, path: &str) -> Vec<Option<Value>> {
        self.inner.lock().await.secrets.get(&normalize(path)).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn read(&self, path: &str) -> Result<Value> {
        let key = normalize(path);
        let inner = self.inner.lock().await;
        inner
            .secrets
            .get(&key)
            .and_then(|versions| versions.last())
            .and_then(|latest| latest.clone())
            .ok_or_else(|| KnoxError::not_found(key))
    }

    async fn write(&self, path: &str, data: &Value) -> Result<u64> {
        let key = normalize(path);
        let mut inner = self.inner.lock().await;
        if inner.fail_writes.iter().any(|suffix| key.ends_with(suffix.as_str())) {
            return Err(KnoxError::backend_unavailable(format!("write to '{}' rejected", key)));
        }

        let versions = inner.secrets.entry(key).or_default();
        versions.push(Some(data.clone()));
        Ok(versions.len() as u64)
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let prefix = normalize(path);
        let inner = self.inner.lock().await;
        if inner.fail_lists.contains(&prefix) {
            return Err(KnoxError::backend_unavailable(format!("list of '{}' rejected", prefix)));
        }

        let mut children = BTreeSet::new();
        for key in inner.secrets.keys() {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key.strip_prefix(prefix.as_str()).and_then(|rest| rest.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };

            match rest.split_once('/') {
                Some((folder, _)) => children.insert(format!("{}/", folder)),
                None => children.insert(rest.to_string()),
            };
        }

        if children.is_empty() {
            return Err(KnoxError::not_found(prefix));
        }
        Ok(children.into_iter().collect())
    }

    async fn delete_latest(&self, path: &str) -> Result<()> {
        let key = normalize(path);
        let mut inner = self.inner.lock().await;
        match inner.secrets.get_mut(&key).and_then(|versions| versions.last_mut()) {
            Some(latest) => {
                *latest = None;
                Ok(())
            }
            None => Err(KnoxError::not_found(key)),
        }
    }

    async fn current_version(&self, path: &str) -> Result<u64> {
        let key = normalize(path);
        let inner = self.inner.lock().await;
        inner
            .secrets
            .get(&key)
            .map(|versions| versions.len() as u64)
            .ok_or_else(|| KnoxError::not_found(key))
    }
}
