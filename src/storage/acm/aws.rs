//! AWS Certificate Manager client (feature `aws`)

use async_trait::async_trait;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::Region;
use aws_sdk_acm::error::DisplayErrorContext;
use aws_sdk_acm::primitives::Blob;
use aws_sdk_acm::types::{CertificateStatus, Tag};
use aws_sdk_acm::Client;
use tracing::info;

use super::client::{AcmApi, CertificatePage, CertificateSummary, FetchedCertificate, ImportRequest};
use crate::config::AcmConfig;
use crate::errors::{KnoxError, Result};

/// ACM client on an SDK session built from a named profile and region
#[derive(Debug, Clone)]
pub struct AwsAcmClient {
    client: Client,
    region: String,
}

fn sdk_error<E>(operation: &str, err: E) -> KnoxError
where
    E: std::error::Error + Send + Sync + 'static,
{
    KnoxError::backend_unavailable(format!("ACM {} failed: {}", operation, DisplayErrorContext(&err)))
}

impl AwsAcmClient {
    /// Builds the session. Credentials are resolved from the shared AWS files.
    pub async fn connect(config: &AcmConfig) -> Result<Self> {
        let region = Region::new(config.region.clone());
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

        if let Some(ref profile) = config.profile {
            let credentials_provider = ProfileFileCredentialsProvider::builder().profile_name(profile).build();
            loader = loader.credentials_provider(credentials_provider);
        }

        let sdk_config = loader.load().await;
        if sdk_config.credentials_provider().is_none() {
            return Err(KnoxError::config(format!(
                "No AWS credentials available for profile '{}'",
                config.profile.as_deref().unwrap_or("default")
            )));
        }

        info!(region = %config.region, profile = ?config.profile, "Created ACM session");
        Ok(Self { client: Client::new(&sdk_config), region: config.region.clone() })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl AcmApi for AwsAcmClient {
    async fn list_issued(&self, max_items: i32, next_token: Option<String>) -> Result<CertificatePage> {
        let response = self
            .client
            .list_certificates()
            .certificate_statuses(CertificateStatus::Issued)
            .max_items(max_items)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error("ListCertificates", e))?;

        let summaries = response
            .certificate_summary_list()
            .iter()
            .filter_map(|summary| {
                Some(CertificateSummary {
                    arn: summary.certificate_arn()?.to_string(),
                    domain_name: summary.domain_name()?.to_string(),
                })
            })
            .collect();

        Ok(CertificatePage { summaries, next_token: response.next_token().map(str::to_string) })
    }

    async fn get_certificate(&self, arn: &str) -> Result<FetchedCertificate> {
        let response = match self.client.get_certificate().certificate_arn(arn).send().await {
            Ok(response) => response,
            Err(e) => {
                let not_found =
                    e.as_service_error().map(|service| service.is_resource_not_found_exception()).unwrap_or(false);
                if not_found {
                    return Err(KnoxError::not_found(arn));
                }
                return Err(sdk_error("GetCertificate", e));
            }
        };

        let certificate = response
            .certificate()
            .ok_or_else(|| KnoxError::backend_unavailable(format!("ACM returned no certificate for {}", arn)))?
            .to_string();

        Ok(FetchedCertificate { certificate, chain: response.certificate_chain().map(str::to_string) })
    }

    async fn import_certificate(&self, request: ImportRequest) -> Result<String> {
        let mut builder = self
            .client
            .import_certificate()
            .certificate(Blob::new(request.certificate.into_bytes()))
            .private_key(Blob::new(request.private_key.expose_secret().as_bytes().to_vec()))
            .set_certificate_chain(request.chain.map(|chain| Blob::new(chain.into_bytes())));

        match request.arn {
            // Tags cannot be applied on re-import
            Some(arn) => builder = builder.certificate_arn(arn),
            None => {
                for (key, value) in request.tags {
                    let tag = Tag::builder()
                        .key(key)
                        .value(value)
                        .build()
                        .map_err(|e| KnoxError::backend_unavailable(format!("Invalid ACM tag: {}", e)))?;
                    builder = builder.tags(tag);
                }
            }
        }

        let response = builder.send().await.map_err(|e| sdk_error("ImportCertificate", e))?;
        response
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| KnoxError::backend_unavailable("ACM import returned no certificate ARN"))
    }
}
