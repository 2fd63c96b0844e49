//! Store engine trait and types
//!
//! Defines the interface every certificate backing store implements.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::certificate::{CertType, CertificateRecord};
use crate::errors::{KnoxError, Result};

/// Type of store engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngineType {
    /// HashiCorp Vault KV v2
    Vault,
    /// AWS Certificate Manager
    Acm,
    /// Local filesystem
    File,
    /// In-process store, nothing persists past the process
    Memory,
}

impl StoreEngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Acm => "acm",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for StoreEngineType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "vault" => Ok(Self::Vault),
            "acm" => Ok(Self::Acm),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown store engine: {}", s)),
        }
    }
}

impl fmt::Display for StoreEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a certificate lives inside a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StoreAddress {
    /// Hierarchical path derived from the common name
    Path(String),
    /// Backend-assigned identity such as an ACM ARN
    Handle(String),
}

impl StoreAddress {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::Handle(handle) => handle,
        }
    }
}

impl fmt::Display for StoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for certificate stores
///
/// Implementations must be Send + Sync for use in async contexts.
#[async_trait]
pub trait StoreEngine: Send + Sync + fmt::Debug {
    /// Persist a certificate, replacing whatever is at its address.
    ///
    /// May record backend-assigned values (`version`, `handle`) on `record`.
    async fn save(&self, record: &mut CertificateRecord) -> Result<()>;

    /// Retrieve one certificate; `NotFound` if nothing exists at `address`.
    async fn get(&self, address: &StoreAddress, name: &str, cert_type: CertType) -> Result<CertificateRecord>;

    /// All certificates under `path` matching `name`; `NotFound` on zero matches.
    async fn find(&self, path: &str, name: &str) -> Result<Vec<CertificateRecord>>;

    /// Get the engine type identifier
    fn engine_type(&self) -> StoreEngineType;
}

/// Runs `call` under `deadline`; expiry becomes `BackendUnavailable`.
pub async fn with_deadline<T, F>(deadline: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(KnoxError::backend_unavailable(format!(
            "{} timed out after {}s",
            operation,
            deadline.as_secs_f64()
        ))),
    }
}
