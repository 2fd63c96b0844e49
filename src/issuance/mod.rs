//! # Certificate Issuance
//!
//! Providers that produce a new certificate for a common name and hand
//! back the paths of the resulting PEM files. The providers never store
//! anything; the certificate service reads the files and saves the record.

pub mod command;
pub mod self_signed;

pub use command::CommandIssuer;
pub use self_signed::SelfSignedIssuer;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::Result;

pub const CERT_FILE: &str = "cert.pem";
pub const CHAIN_FILE: &str = "chain.pem";
pub const PRIVATE_KEY_FILE: &str = "privkey.pem";

/// Locations of freshly issued material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedFiles {
    pub public: PathBuf,
    pub chain: PathBuf,
    pub private_key: PathBuf,
}

impl IssuedFiles {
    /// The conventional `cert.pem`, `chain.pem`, `privkey.pem` layout of `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self { public: dir.join(CERT_FILE), chain: dir.join(CHAIN_FILE), private_key: dir.join(PRIVATE_KEY_FILE) }
    }
}

/// Directory name used for a certificate's files; `*.` is dropped.
pub fn output_dir_name(common_name: &str) -> &str {
    let name = common_name.trim();
    name.strip_prefix("*.").unwrap_or(name)
}

#[async_trait]
pub trait IssuanceProvider: Send + Sync + fmt::Debug {
    /// Issues a certificate for `common_name`.
    ///
    /// Every failure is reported as `GenerationFailed`.
    async fn issue(&self, common_name: &str) -> Result<IssuedFiles>;

    /// Short provider name for logs
    fn provider_name(&self) -> &'static str;
}
