//! # Knox
//!
//! Knox stores TLS certificates, their private keys and chains in a backing
//! store under a path derived from the certificate's common name.
//!
//! ## Architecture
//!
//! ```text
//! CLI → CertificateService → StoreEngine (Vault KV v2 | AWS ACM | files)
//!              ↓
//!   CertificateParser / IssuanceProvider
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use knox::services::CertificateService;
//! use knox::storage::FileStoreEngine;
//!
//! #[tokio::main]
//! async fn main() -> knox::Result<()> {
//!     let store = FileStoreEngine::open(".knox/store", Duration::from_secs(30)).await?;
//!     let service = CertificateService::new(Arc::new(store));
//!     let record = service.get("www.example.com").await?;
//!     println!("{} expires {}", record.common_name(), record.info.validity.not_after);
//!     Ok(())
//! }
//! ```

pub mod certificate;
pub mod cli;
pub mod config;
pub mod errors;
pub mod issuance;
pub mod observability;
pub mod services;
pub mod storage;

// Re-export commonly used types and traits
pub use certificate::{CertType, CertificateRecord, PathCodec};
pub use config::AppConfig;
pub use errors::{KnoxError, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
