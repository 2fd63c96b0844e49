//! ACM access seam
//!
//! The operations of AWS Certificate Manager the ACM engine needs, reduced
//! to plain request/response types.

use std::fmt;

use async_trait::async_trait;

use crate::certificate::SecretString;
use crate::errors::Result;

/// ACM status of certificates that can be served
pub const STATUS_ISSUED: &str = "ISSUED";

/// Page size used when listing certificates
pub const LIST_PAGE_SIZE: i32 = 123;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub arn: String,
    pub domain_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct CertificatePage {
    pub summaries: Vec<CertificateSummary>,
    pub next_token: Option<String>,
}

/// Public material returned by ACM; private keys never come back
#[derive(Debug, Clone)]
pub struct FetchedCertificate {
    pub certificate: String,
    pub chain: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Existing certificate to re-import over, if any
    pub arn: Option<String>,
    /// PEM certificate
    pub certificate: String,
    pub private_key: SecretString,
    pub chain: Option<String>,
    pub tags: Vec<(String, String)>,
}

#[async_trait]
pub trait AcmApi: Send + Sync + fmt::Debug {
    /// One page of certificates with status `ISSUED`.
    async fn list_issued(&self, max_items: i32, next_token: Option<String>) -> Result<CertificatePage>;

    /// Certificate and chain for `arn`; `NotFound` when ACM has no such ARN.
    async fn get_certificate(&self, arn: &str) -> Result<FetchedCertificate>;

    /// Imports a certificate and returns its ARN.
    async fn import_certificate(&self, request: ImportRequest) -> Result<String>;
}
