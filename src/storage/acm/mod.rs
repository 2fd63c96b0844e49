//! AWS Certificate Manager certificate store
//!
//! ACM addresses certificates by ARN rather than by path. Saving imports the
//! certificate and records the ARN on the record as its handle; lookups by
//! name list `ISSUED` certificates and match their domain name exactly.
//! ACM never returns private keys, so records read back from it carry an
//! empty private key.

pub mod client;
pub mod memory;

#[cfg(feature = "aws")]
pub mod aws;

pub use client::{AcmApi, CertificatePage, CertificateSummary, FetchedCertificate, ImportRequest};
pub use memory::MemoryAcm;

#[cfg(feature = "aws")]
pub use aws::AwsAcmClient;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::engine::{with_deadline, StoreAddress, StoreEngine, StoreEngineType};
use crate::certificate::documents::acm_tags;
use crate::certificate::{CertType, CertificateParser, CertificateRecord, PathCodec};
use crate::errors::{KnoxError, Result};

#[derive(Debug)]
pub struct AcmStoreEngine {
    api: Arc<dyn AcmApi>,
    request_timeout: Duration,
}

impl AcmStoreEngine {
    pub fn new(api: Arc<dyn AcmApi>, request_timeout: Duration) -> Self {
        Self { api, request_timeout }
    }

    /// Builds an engine on a real ACM session.
    #[cfg(feature = "aws")]
    pub async fn connect(config: &crate::config::AcmConfig, request_timeout: Duration) -> Result<Self> {
        let client = with_deadline(request_timeout, "acm bootstrap", AwsAcmClient::connect(config)).await?;
        Ok(Self::new(Arc::new(client), request_timeout))
    }

    async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_deadline(self.request_timeout, operation, call).await
    }

    async fn get_by_arn(&self, arn: &str, name: &str) -> Result<CertificateRecord> {
        let fetched = self.call("acm get", self.api.get_certificate(arn)).await?;

        let record = CertificateRecord::new(name)?;
        let mut record = CertificateParser::parse(fetched.certificate.as_bytes(), CertType::Pem, record)?;
        record.body.chain = fetched.chain.unwrap_or_default();
        record.handle = Some(arn.to_string());
        Ok(record)
    }

    /// Issued certificates whose domain matches `name`.
    async fn matching(&self, name: &str) -> Result<Vec<CertificateSummary>> {
        let match_all = name.is_empty() || name == "*";
        let target = PathCodec::valid_name(name);

        let mut matches = Vec::new();
        let mut next_token = None;
        loop {
            let page = self.call("acm list", self.api.list_issued(client::LIST_PAGE_SIZE, next_token)).await?;
            matches.extend(
                page.summaries
                    .into_iter()
                    .filter(|summary| match_all || PathCodec::valid_name(&summary.domain_name) == target),
            );

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl StoreEngine for AcmStoreEngine {
    #[instrument(skip(self, record), fields(common_name = %record.common_name()))]
    async fn save(&self, record: &mut CertificateRecord) -> Result<()> {
        record.ensure_storable()?;
        if !record.body.private.is_pem_private_key() {
            return Err(KnoxError::invalid_certificate(format!(
                "certificate '{}' needs a PEM private key for ACM import",
                record.common_name()
            )));
        }

        // A record without a handle replaces the issued certificate of the same name
        let arn = match &record.handle {
            Some(arn) => Some(arn.clone()),
            None => self.matching(record.common_name()).await?.into_iter().next().map(|summary| summary.arn),
        };

        let chain = record.body.chain.trim();
        let request = ImportRequest {
            arn,
            certificate: record.body.public_pem(),
            private_key: record.body.private.clone(),
            chain: if chain.is_empty() { None } else { Some(chain.to_string()) },
            tags: acm_tags(record),
        };
        let reimport = request.arn.is_some();

        let arn = self.call("acm import", self.api.import_certificate(request)).await?;
        info!(common_name = %record.common_name(), arn = %arn, reimport, "Imported certificate into ACM");
        record.handle = Some(arn);
        Ok(())
    }

    #[instrument(skip(self, address), fields(address = %address))]
    async fn get(&self, address: &StoreAddress, name: &str, _cert_type: CertType) -> Result<CertificateRecord> {
        match address {
            StoreAddress::Handle(arn) => self.get_by_arn(arn, name).await,
            StoreAddress::Path(path) => {
                let records = self.find(path, name).await?;
                records.into_iter().next().ok_or_else(|| KnoxError::not_found(path.clone()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn find(&self, path: &str, name: &str) -> Result<Vec<CertificateRecord>> {
        let matches = self.matching(name).await?;
        debug!(name = %name, matches = matches.len(), "Listed ACM certificates");

        let mut records = Vec::new();
        for summary in matches {
            match self.get_by_arn(&summary.arn, &summary.domain_name).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(arn = %summary.arn, error = %e, "Skipping unreadable ACM certificate"),
            }
        }

        if records.is_empty() {
            return Err(KnoxError::not_found(if name.is_empty() { path } else { name }));
        }
        Ok(records)
    }

    fn engine_type(&self) -> StoreEngineType {
        StoreEngineType::Acm
    }
}
