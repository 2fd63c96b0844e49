//! Store CLI commands
//!
//! Read-only views over the configured backing store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;

use super::output::{print_output_format, print_table_header, truncate, OutputFormat};
use crate::certificate::{oid, CertificateRecord, KeyType};
use crate::services::CertificateService;

#[derive(Subcommand)]
pub enum StoreCommands {
    /// List stored certificates matching a name
    #[command(
        long_about = "List every stored certificate under the path of NAME.\n\nUse '*.example.com' to search the example.com subtree and '*' for the whole store.",
        after_help = "EXAMPLES:\n    knox store find '*.example.com'\n\n    knox store find www.example.com --output json"
    )]
    Find {
        /// Common name or wildcard pattern
        #[arg(value_name = "NAME")]
        name: String,

        /// Output format (json, yaml, or table)
        #[arg(short, long, default_value = "table", value_parser = ["json", "yaml", "table"])]
        output: String,
    },
}

/// One row of `store find` output
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    pub common_name: String,
    pub path: String,
    pub cert_type: String,
    pub issuer: Option<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub key: Option<String>,
    pub fingerprint_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl From<&CertificateRecord> for CertificateSummary {
    fn from(record: &CertificateRecord) -> Self {
        let key = record.key_details.as_ref().map(|details| {
            let family = match details.key_type {
                KeyType::Rsa => "RSA",
                KeyType::Dsa => "DSA",
                KeyType::Ecc => "ECC",
            };
            match &details.curve {
                Some(curve) => format!("{} {}", family, curve),
                None => format!("{} {}", family, details.size),
            }
        });

        Self {
            common_name: record.common_name().to_string(),
            path: record.path().to_string(),
            cert_type: record.cert_type.to_string(),
            issuer: record.info.issuer.get(oid::COMMON_NAME).cloned(),
            not_before: record.info.validity.not_before,
            not_after: record.info.validity.not_after,
            key,
            fingerprint_sha256: record.key_details.as_ref().map(|d| d.fingerprint_sha256.clone()),
            handle: record.handle.clone(),
            version: record.version,
        }
    }
}

/// Handle store commands
pub async fn handle_store_command(command: StoreCommands, service: &CertificateService) -> Result<()> {
    match command {
        StoreCommands::Find { name, output } => {
            let records = service
                .find_by_name(&name)
                .await
                .with_context(|| format!("No certificates found for '{}'", name))?;
            let summaries: Vec<CertificateSummary> = records.iter().map(CertificateSummary::from).collect();

            match output.parse::<OutputFormat>()? {
                OutputFormat::Table => print_summaries_table(&summaries),
                format => print_output_format(&summaries, format)?,
            }
        }
    }

    Ok(())
}

fn print_summaries_table(summaries: &[CertificateSummary]) {
    print_table_header(&[("Common Name", 35), ("Path", 40), ("Type", 5), ("Key", 16), ("Not After", 20)]);

    for summary in summaries {
        println!(
            "{:<35} {:<40} {:<5} {:<16} {}",
            truncate(&summary.common_name, 33),
            truncate(&summary.path, 38),
            summary.cert_type,
            truncate(summary.key.as_deref().unwrap_or("-"), 14),
            summary.not_after.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    println!();
    println!("{} certificate(s)", summaries.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{CertType, CertificateParser};

    const RSA_PEM: &[u8] = include_bytes!("../../tests/fixtures/certs/www.8x8.com.pem");

    #[test]
    fn test_summary_from_record() {
        let record = CertificateParser::parse_new(RSA_PEM, CertType::Pem, "www.8x8.com").unwrap();
        let summary = CertificateSummary::from(&record);

        assert_eq!(summary.common_name, "www.8x8.com");
        assert_eq!(summary.path, "/com/8x8/www");
        assert_eq!(summary.key.as_deref(), Some("RSA 2048"));
        assert_eq!(summary.cert_type, "PEM");
    }
}
