//! Certificate business logic service
//!
//! Ties parsing, issuance and the configured store together for the
//! operations the CLI exposes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::certificate::{CertType, CertificateParser, CertificateRecord, PathCodec, SecretString};
use crate::errors::{KnoxError, Result};
use crate::issuance::IssuanceProvider;
use crate::storage::{StoreAddress, StoreEngine};

/// Files written by [`CertificateService::load_existing`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedFiles {
    pub public: PathBuf,
    pub private_key: Option<PathBuf>,
    pub chain: Option<PathBuf>,
}

/// One row of a batch import file
#[derive(Debug, Clone, Deserialize)]
struct BatchRow {
    common_name: String,
    cert_file: PathBuf,
    #[serde(default)]
    key_file: Option<PathBuf>,
    #[serde(default)]
    chain_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// 1-based line in the CSV file, header included
    pub line: u64,
    pub common_name: Option<String>,
    pub reason: String,
}

/// Outcome of a batch import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Store paths of the saved certificates
    pub saved: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Service for certificate operations against one store
#[derive(Debug, Clone)]
pub struct CertificateService {
    store: Arc<dyn StoreEngine>,
    issuer: Option<Arc<dyn IssuanceProvider>>,
}

async fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| KnoxError::io(e, format!("Failed to read {} {}", what, path.display())))
}

async fn read_text(path: &Path, what: &str) -> Result<String> {
    let bytes = read_file(path, what).await?;
    String::from_utf8(bytes)
        .map_err(|_| KnoxError::invalid_certificate(format!("{} {} is not valid UTF-8", what, path.display())))
}

async fn write_private(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| KnoxError::io(e, format!("Failed to write {}", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| KnoxError::io(e, format!("Failed to restrict {}", path.display())))?;
    }
    Ok(())
}

impl CertificateService {
    /// Create a new certificate service
    pub fn new(store: Arc<dyn StoreEngine>) -> Self {
        Self { store, issuer: None }
    }

    pub fn with_issuer(mut self, issuer: Arc<dyn IssuanceProvider>) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn store(&self) -> &Arc<dyn StoreEngine> {
        &self.store
    }

    /// Parses in-memory material and saves it.
    #[instrument(skip(self, public, private_key, chain), fields(engine = %self.store.engine_type()))]
    pub async fn save_material(
        &self,
        name: &str,
        public: &[u8],
        private_key: String,
        chain: String,
        cert_type: CertType,
    ) -> Result<CertificateRecord> {
        let record = CertificateRecord::new(name)?;
        let mut record = CertificateParser::parse(public, cert_type, record)?;
        record.body.private = SecretString::new(private_key);
        record.body.chain = chain;

        self.store.save(&mut record).await?;

        info!(
            common_name = %record.common_name(),
            path = %record.path(),
            version = ?record.version,
            handle = ?record.handle,
            "Certificate saved"
        );
        Ok(record)
    }

    /// Stores an existing certificate read from files.
    pub async fn save_existing(
        &self,
        name: &str,
        public: &Path,
        private_key: Option<&Path>,
        chain: Option<&Path>,
        cert_type: CertType,
    ) -> Result<CertificateRecord> {
        let public_bytes = read_file(public, "public certificate").await?;
        let private_key = match private_key {
            Some(path) => read_text(path, "private key").await?,
            None => String::new(),
        };
        let chain = match chain {
            Some(path) => read_text(path, "certificate chain").await?,
            None => String::new(),
        };

        self.save_material(name, &public_bytes, private_key, chain, cert_type).await
    }

    /// Fetches the certificate stored for `name`.
    #[instrument(skip(self))]
    pub async fn get(&self, name: &str) -> Result<CertificateRecord> {
        let path = PathCodec::derive(name)?;
        self.store.get(&StoreAddress::Path(path), &PathCodec::valid_name(name), CertType::Pem).await
    }

    /// Retrieves a certificate and writes `<name>-pub.pem`, `<name>-key.pem`
    /// and `<name>-chain.pem` into `out_dir`.
    ///
    /// The key and chain files are skipped when the store has none.
    #[instrument(skip(self, out_dir))]
    pub async fn load_existing(&self, name: &str, out_dir: &Path) -> Result<LoadedFiles> {
        let record = self.get(name).await?;
        let base = record.common_name().to_string();

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| KnoxError::io(e, format!("Failed to create {}", out_dir.display())))?;

        let public = out_dir.join(format!("{}-pub.pem", base));
        tokio::fs::write(&public, record.body.public_pem())
            .await
            .map_err(|e| KnoxError::io(e, format!("Failed to write {}", public.display())))?;

        let private_key = if record.body.private.is_empty() {
            warn!(common_name = %base, "Store returned no private key");
            None
        } else {
            let path = out_dir.join(format!("{}-key.pem", base));
            write_private(&path, record.body.private.expose_secret()).await?;
            Some(path)
        };

        let chain = if record.body.chain.trim().is_empty() {
            None
        } else {
            let path = out_dir.join(format!("{}-chain.pem", base));
            tokio::fs::write(&path, &record.body.chain)
                .await
                .map_err(|e| KnoxError::io(e, format!("Failed to write {}", path.display())))?;
            Some(path)
        };

        info!(common_name = %base, dir = %out_dir.display(), "Certificate written to disk");
        Ok(LoadedFiles { public, private_key, chain })
    }

    /// Issues a new certificate through the configured provider and saves it.
    #[instrument(skip(self))]
    pub async fn generate(&self, name: &str) -> Result<CertificateRecord> {
        let issuer = self
            .issuer
            .as_ref()
            .ok_or_else(|| KnoxError::config("No issuance provider configured"))?;

        let files = issuer.issue(name).await?;
        info!(common_name = %name, provider = issuer.provider_name(), "Certificate issued");

        let read = async {
            let public = read_file(&files.public, "issued certificate").await?;
            let private_key = read_text(&files.private_key, "issued private key").await?;
            let chain = read_text(&files.chain, "issued chain").await?;
            Ok::<_, KnoxError>((public, private_key, chain))
        };
        let (public, private_key, chain) =
            read.await.map_err(|e| KnoxError::generation_failed(name, e.to_string()))?;

        self.save_material(name, &public, private_key, chain, CertType::Pem).await
    }

    /// Every stored certificate matching `name`.
    ///
    /// `*.example.com` searches the `example.com` subtree and `*` the whole store.
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<CertificateRecord>> {
        let root = PathCodec::search_root(name)?;
        self.store.find(&root, name).await
    }

    /// Imports every row of a `common_name,cert_file` CSV file.
    ///
    /// Rows are saved one after another. A failing row is recorded in the
    /// report and does not stop the rest. Relative certificate paths are
    /// resolved against the CSV file's directory.
    #[instrument(skip(self, csv_path), fields(csv = %csv_path.display()))]
    pub async fn import_batch(&self, csv_path: &Path) -> Result<BatchReport> {
        let contents = read_file(csv_path, "batch file").await?;
        let base = csv_path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(contents.as_slice());

        let headers = reader
            .headers()
            .map_err(|e| KnoxError::io(e.into(), format!("Failed to read header of {}", csv_path.display())))?
            .clone();

        let mut report = BatchReport::default();
        for result in reader.records() {
            let parsed = result.and_then(|record| {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                record.deserialize::<BatchRow>(Some(&headers)).map(|row| (line, row))
            });
            let (line, row) = match parsed {
                Ok(parsed) => parsed,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    warn!(line, error = %e, "Skipping malformed batch row");
                    report.failures.push(BatchFailure { line, common_name: None, reason: e.to_string() });
                    continue;
                }
            };

            let resolve = |path: &Path| if path.is_absolute() { path.to_path_buf() } else { base.join(path) };
            let cert_file = resolve(row.cert_file.as_path());
            let key_file = row.key_file.as_deref().map(|path| resolve(path));
            let chain_file = row.chain_file.as_deref().map(|path| resolve(path));

            match self
                .save_existing(&row.common_name, &cert_file, key_file.as_deref(), chain_file.as_deref(), CertType::Pem)
                .await
            {
                Ok(record) => report.saved.push(record.path().to_string()),
                Err(e) => {
                    warn!(line, common_name = %row.common_name, error = %e, "Batch row failed");
                    report.failures.push(BatchFailure {
                        line,
                        common_name: Some(row.common_name.clone()),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(saved = report.saved.len(), failed = report.failures.len(), "Batch import finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::vault::{MemoryKvStore, VaultStoreEngine};
    use std::time::Duration;
    use tracing_test::traced_test;

    const RSA_PEM: &[u8] = include_bytes!("../../tests/fixtures/certs/www.8x8.com.pem");
    const RSA_KEY: &str = include_str!("../../tests/fixtures/certs/www.8x8.com.key");

    fn service() -> CertificateService {
        let store = VaultStoreEngine::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(5));
        CertificateService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_save_material_then_get() {
        let service = service();
        let saved = service
            .save_material("www.8x8.com", RSA_PEM, RSA_KEY.to_string(), String::new(), CertType::Pem)
            .await
            .unwrap();
        assert_eq!(saved.version, Some(1));

        let loaded = service.get("www.8x8.com").await.unwrap();
        assert_eq!(loaded.body.public, saved.body.public);
        assert_eq!(loaded.body.private.expose_secret(), RSA_KEY);
    }

    #[tokio::test]
    async fn test_generate_without_issuer_is_config_error() {
        let err = service().generate("www.example.com").await.unwrap_err();
        assert!(matches!(err, KnoxError::Config { .. }));
    }

    #[tokio::test]
    async fn test_save_existing_missing_file() {
        let err = service()
            .save_existing("www.8x8.com", Path::new("/nonexistent/cert.pem"), None, None, CertType::Pem)
            .await
            .unwrap_err();
        assert!(matches!(err, KnoxError::Io { .. }));
    }

    #[tokio::test]
    async fn test_invalid_name_on_find() {
        let err = service().find_by_name("a..b").await.unwrap_err();
        assert!(matches!(err, KnoxError::InvalidSubjectName { .. }));
    }

    #[traced_test]
    #[tokio::test]
    async fn test_import_batch_reports_failed_rows() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("www.pem"), RSA_PEM).unwrap();
        std::fs::write(dir.path().join("www.key"), RSA_KEY).unwrap();
        let csv = dir.path().join("batch.csv");
        std::fs::write(
            &csv,
            "common_name,cert_file,key_file\nwww.8x8.com,www.pem,www.key\nmissing.example.com,missing.pem,\n",
        )
        .unwrap();

        let report = service().import_batch(&csv).await.unwrap();

        assert_eq!(report.saved, vec!["/com/8x8/www".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].line, 3);
        assert_eq!(report.failures[0].common_name.as_deref(), Some("missing.example.com"));
        assert!(!report.is_success());
        assert!(logs_contain("Batch row failed"));
    }
}
