//! In-process ACM double

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::client::{
    AcmApi, CertificatePage, CertificateSummary, FetchedCertificate, ImportRequest, STATUS_ISSUED,
};
use crate::certificate::{CertType, CertificateParser};
use crate::errors::{KnoxError, Result};

#[derive(Debug, Clone)]
pub struct StoredCertificate {
    pub domain_name: String,
    pub status: String,
    pub certificate: String,
    pub chain: Option<String>,
    pub tags: Vec<(String, String)>,
    pub imports: u32,
}

#[derive(Debug)]
pub struct MemoryAcm {
    region: String,
    account: String,
    certificates: Mutex<BTreeMap<String, StoredCertificate>>,
}

impl Default for MemoryAcm {
    fn default() -> Self {
        Self::new("us-east-1")
    }
}

impl MemoryAcm {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            account: "000000000000".to_string(),
            certificates: Mutex::new(BTreeMap::new()),
        }
    }

    fn new_arn(&self) -> String {
        format!("arn:aws:acm:{}:{}:certificate/{}", self.region, self.account, Uuid::new_v4())
    }

    /// Adds a certificate directly, e.g. one that is not `ISSUED`.
    pub async fn insert(&self, domain_name: &str, status: &str, certificate: &str) -> String {
        let arn = self.new_arn();
        self.certificates.lock().await.insert(
            arn.clone(),
            StoredCertificate {
                domain_name: domain_name.to_string(),
                status: status.to_string(),
                certificate: certificate.to_string(),
                chain: None,
                tags: Vec::new(),
                imports: 1,
            },
        );
        arn
    }

    pub async fn stored(&self, arn: &str) -> Option<StoredCertificate> {
        self.certificates.lock().await.get(arn).cloned()
    }

    pub async fn len(&self) -> usize {
        self.certificates.lock().await.len()
    }
}

#[async_trait]
impl AcmApi for MemoryAcm {
    async fn list_issued(&self, max_items: i32, next_token: Option<String>) -> Result<CertificatePage> {
        let certificates = self.certificates.lock().await;
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| KnoxError::backend_unavailable(format!("invalid next token '{}'", token)))?,
            None => 0,
        };

        let issued: Vec<CertificateSummary> = certificates
            .iter()
            .filter(|(_, cert)| cert.status == STATUS_ISSUED)
            .map(|(arn, cert)| CertificateSummary { arn: arn.clone(), domain_name: cert.domain_name.clone() })
            .collect();

        let page_size = max_items.max(1) as usize;
        let end = (start + page_size).min(issued.len());
        let summaries = issued.get(start..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_token = if end < issued.len() { Some(end.to_string()) } else { None };

        Ok(CertificatePage { summaries, next_token })
    }

    async fn get_certificate(&self, arn: &str) -> Result<FetchedCertificate> {
        let certificates = self.certificates.lock().await;
        let cert = certificates.get(arn).ok_or_else(|| KnoxError::not_found(arn))?;
        Ok(FetchedCertificate { certificate: cert.certificate.clone(), chain: cert.chain.clone() })
    }

    async fn import_certificate(&self, request: ImportRequest) -> Result<String> {
        if request.private_key.is_empty() {
            return Err(KnoxError::backend_unavailable("ValidationException: private key is required"));
        }

        // ACM derives the domain name from the certificate itself
        let parsed = CertificateParser::inspect(request.certificate.as_bytes(), CertType::Pem)
            .map_err(|e| KnoxError::backend_unavailable(format!("ValidationException: {}", e)))?;
        let domain_name = parsed.subject_common_name.unwrap_or_default();

        let mut certificates = self.certificates.lock().await;
        let arn = match request.arn {
            Some(arn) => {
                let existing = certificates.get_mut(&arn).ok_or_else(|| KnoxError::not_found(arn.clone()))?;
                existing.domain_name = domain_name;
                existing.certificate = request.certificate;
                existing.chain = request.chain;
                existing.imports += 1;
                arn
            }
            None => {
                let arn = self.new_arn();
                certificates.insert(
                    arn.clone(),
                    StoredCertificate {
                        domain_name,
                        status: STATUS_ISSUED.to_string(),
                        certificate: request.certificate,
                        chain: request.chain,
                        tags: request.tags,
                        imports: 1,
                    },
                );
                arn
            }
        };
        Ok(arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_pages_only_issued() {
        let acm = MemoryAcm::default();
        for i in 0..5 {
            acm.insert(&format!("host{}.example.com", i), STATUS_ISSUED, "pem").await;
        }
        acm.insert("expired.example.com", "EXPIRED", "pem").await;

        let first = acm.list_issued(3, None).await.unwrap();
        assert_eq!(first.summaries.len(), 3);
        let second = acm.list_issued(3, first.next_token).await.unwrap();
        assert_eq!(second.summaries.len(), 2);
        assert!(second.next_token.is_none());
        assert!(second.summaries.iter().all(|s| s.domain_name != "expired.example.com"));
    }

    #[tokio::test]
    async fn test_unknown_arn_is_not_found() {
        let acm = MemoryAcm::default();
        assert!(acm.get_certificate("arn:aws:acm:us-east-1:0:certificate/x").await.unwrap_err().is_not_found());
    }
}
