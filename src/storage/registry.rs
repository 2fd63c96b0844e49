//! Store and issuer construction from configuration
//!
//! Picks the configured backend, bootstraps it and returns it behind the
//! [`StoreEngine`] trait. Bootstrap failures are returned to the caller,
//! which treats them as fatal.

use std::sync::Arc;

use tracing::{info, warn};

use super::acm::AcmStoreEngine;
use super::engine::{StoreEngine, StoreEngineType};
use super::file::FileStoreEngine;
use super::vault::{MemoryKvStore, VaultStoreEngine};
use crate::config::{AppConfig, IssuerKind};
use crate::errors::Result;
use crate::issuance::{CommandIssuer, IssuanceProvider, SelfSignedIssuer};

/// Connects to the store selected by `config.store.engine`.
pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn StoreEngine>> {
    let timeout = config.store.request_timeout();
    let engine = config.store.engine;

    let store: Arc<dyn StoreEngine> = match engine {
        StoreEngineType::Vault => Arc::new(VaultStoreEngine::connect(&config.vault, timeout).await?),
        StoreEngineType::Acm => Arc::new(connect_acm(config).await?),
        StoreEngineType::File => Arc::new(FileStoreEngine::open(&config.file.home, timeout).await?),
        StoreEngineType::Memory => {
            warn!("Using the in-memory store; nothing will persist after exit");
            Arc::new(VaultStoreEngine::new(Arc::new(MemoryKvStore::new()), timeout))
        }
    };

    info!(engine = %engine, "Store engine ready");
    Ok(store)
}

#[cfg(feature = "aws")]
async fn connect_acm(config: &AppConfig) -> Result<AcmStoreEngine> {
    AcmStoreEngine::connect(&config.acm, config.store.request_timeout()).await
}

#[cfg(not(feature = "aws"))]
async fn connect_acm(_config: &AppConfig) -> Result<AcmStoreEngine> {
    Err(crate::errors::KnoxError::config("the acm engine requires building knox with the 'aws' feature"))
}

/// Builds the configured issuance provider.
pub fn build_issuer(config: &AppConfig) -> Result<Arc<dyn IssuanceProvider>> {
    let issuer: Arc<dyn IssuanceProvider> = match config.issuer.kind {
        IssuerKind::Command => Arc::new(CommandIssuer::from_config(&config.issuer)?),
        IssuerKind::SelfSigned => {
            Arc::new(SelfSignedIssuer::new(config.issuer.work_dir.clone(), config.issuer.validity_days))
        }
    };
    Ok(issuer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.store.engine = StoreEngineType::File;
        config.file.home = dir.path().join("store");

        let store = connect_store(&config).await.unwrap();
        assert_eq!(store.engine_type(), StoreEngineType::File);
        assert!(dir.path().join("store").is_dir());
    }

    #[tokio::test]
    async fn test_connect_memory_store() {
        let mut config = AppConfig::default();
        config.store.engine = StoreEngineType::Memory;
        let store = connect_store(&config).await.unwrap();
        assert_eq!(store.engine_type(), StoreEngineType::Vault);
    }

    #[cfg(not(feature = "aws"))]
    #[tokio::test]
    async fn test_acm_without_feature_is_config_error() {
        let mut config = AppConfig::default();
        config.store.engine = StoreEngineType::Acm;
        assert!(matches!(connect_store(&config).await, Err(crate::errors::KnoxError::Config { .. })));
    }

    #[test]
    fn test_build_issuer() {
        let mut config = AppConfig::default();
        assert_eq!(build_issuer(&config).unwrap().provider_name(), "command");

        config.issuer.kind = IssuerKind::SelfSigned;
        assert_eq!(build_issuer(&config).unwrap().provider_name(), "self_signed");
    }
}
