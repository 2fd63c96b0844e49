//! # Certificate Storage
//!
//! Pluggable backing stores for certificate records. Every backend
//! implements [`StoreEngine`]:
//!
//! - **Vault**: HashiCorp Vault KV v2, two leaves per certificate path
//! - **ACM**: AWS Certificate Manager, addressed by ARN (feature `aws`)
//! - **File**: one JSON document per certificate path on local disk
//! - **Memory**: the Vault layout on an in-process KV store

pub mod acm;
pub mod engine;
pub mod file;
pub mod registry;
pub mod vault;

pub use acm::AcmStoreEngine;
pub use engine::{with_deadline, StoreAddress, StoreEngine, StoreEngineType};
pub use file::FileStoreEngine;
pub use registry::{build_issuer, connect_store};
pub use vault::VaultStoreEngine;
