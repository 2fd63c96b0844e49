//! Self-signed development issuer
//!
//! Generates an ECDSA P-256 certificate locally with rcgen. Useful for
//! exercising `knox cert gen` without a CA.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, PKCS_ECDSA_P256_SHA256};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};

use super::{output_dir_name, IssuanceProvider, IssuedFiles};
use crate::errors::{KnoxError, Result};

#[derive(Debug, Clone)]
pub struct SelfSignedIssuer {
    work_dir: PathBuf,
    validity_days: u32,
}

impl SelfSignedIssuer {
    pub fn new(work_dir: impl Into<PathBuf>, validity_days: u32) -> Self {
        Self { work_dir: work_dir.into(), validity_days }
    }

    fn generate(&self, common_name: &str) -> std::result::Result<(String, String), rcgen::Error> {
        let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)?;

        let mut params = CertificateParams::new(vec![common_name.to_string()])?;
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, common_name);
        distinguished_name.push(DnType::OrganizationName, "Knox Self-Signed");
        params.distinguished_name = distinguished_name;

        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::days(1);
        params.not_after = now + Duration::days(i64::from(self.validity_days));

        let cert = params.self_signed(&key_pair)?;
        Ok((cert.pem(), key_pair.serialize_pem()))
    }
}

async fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    tokio::fs::write(path, contents).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

#[async_trait]
impl IssuanceProvider for SelfSignedIssuer {
    #[instrument(skip(self))]
    async fn issue(&self, common_name: &str) -> Result<IssuedFiles> {
        let (cert_pem, key_pem) = self
            .generate(common_name)
            .map_err(|e| KnoxError::generation_failed(common_name, e.to_string()))?;

        let dir = self.work_dir.join(output_dir_name(common_name));
        let files = IssuedFiles::in_dir(&dir);
        let write = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(&files.public, &cert_pem).await?;
            // A self-signed certificate is its own chain
            tokio::fs::write(&files.chain, &cert_pem).await?;
            write_private(&files.private_key, &key_pem).await
        };
        write.await.map_err(|e| {
            KnoxError::generation_failed(common_name, format!("failed to write {}: {}", dir.display(), e))
        })?;

        info!(common_name = %common_name, dir = %dir.display(), "Generated self-signed certificate");
        Ok(files)
    }

    fn provider_name(&self) -> &'static str {
        "self_signed"
    }
}
