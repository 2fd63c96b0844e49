//! Certificate CLI commands
//!
//! Save, load, generate and batch-import certificates through the
//! configured store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::certificate::{CertType, CertificateRecord};
use crate::services::CertificateService;

fn parse_cert_type(value: &str) -> std::result::Result<CertType, String> {
    value.parse::<CertType>().map_err(|e| e.to_string())
}

#[derive(Args)]
pub struct CertArgs {
    /// Encoding of the public certificate file (PEM or DER)
    #[arg(long = "type", default_value = "PEM", value_parser = parse_cert_type)]
    pub cert_type: CertType,

    /// Public certificate file
    #[arg(long = "pub", value_name = "FILE")]
    pub public: Option<PathBuf>,

    /// Private key file
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// Certificate chain file
    #[arg(long, value_name = "FILE")]
    pub chain: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CertCommands,
}

#[derive(Subcommand)]
pub enum CertCommands {
    /// Store an existing certificate
    #[command(
        long_about = "Parse an existing certificate and store it with its private key and chain.\n\nThe stored name is taken from the certificate subject when it has a common name.",
        after_help = "EXAMPLES:\n    knox cert --pub www.pem --key www.key --chain chain.pem save www.example.com\n\n    # DER encoded certificate\n    knox cert --type DER --pub www.der save www.example.com"
    )]
    Save {
        /// Common name to store the certificate under
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Retrieve a certificate and write it to disk
    #[command(
        visible_alias = "load",
        after_help = "EXAMPLES:\n    knox cert get www.example.com --out ./certs\n\n    # Writes www.example.com-pub.pem, www.example.com-key.pem and www.example.com-chain.pem"
    )]
    Get {
        /// Common name of the certificate
        #[arg(value_name = "NAME")]
        name: String,

        /// Directory to write the PEM files into
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
    },

    /// Issue a new certificate and store it
    Gen {
        /// Common name to issue for
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Import every certificate listed in a CSV file
    #[command(
        long_about = "Import certificates listed in a CSV file with a header row.\n\nColumns: common_name, cert_file and optionally key_file and chain_file. Relative paths are resolved against the CSV file's directory.",
        after_help = "EXAMPLES:\n    knox cert import certificates.csv"
    )]
    Import {
        /// CSV file to import
        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },
}

/// Handle certificate commands
pub async fn handle_cert_command(args: CertArgs, service: &CertificateService) -> Result<()> {
    match args.command {
        CertCommands::Save { name } => {
            let public = args
                .public
                .as_deref()
                .context("--pub FILE is required to save a certificate")?;
            let record = service
                .save_existing(&name, public, args.key.as_deref(), args.chain.as_deref(), args.cert_type)
                .await
                .with_context(|| format!("Failed to save certificate '{}'", name))?;
            print_saved(&record);
        }
        CertCommands::Get { name, out } => {
            let files = service
                .load_existing(&name, &out)
                .await
                .with_context(|| format!("Failed to load certificate '{}'", name))?;

            println!("Wrote {}", files.public.display());
            if let Some(path) = &files.private_key {
                println!("Wrote {}", path.display());
            } else {
                println!("No private key available for '{}'", name);
            }
            if let Some(path) = &files.chain {
                println!("Wrote {}", path.display());
            }
        }
        CertCommands::Gen { name } => {
            let record = service
                .generate(&name)
                .await
                .with_context(|| format!("Failed to generate certificate '{}'", name))?;
            print_saved(&record);
        }
        CertCommands::Import { csv } => {
            let report = service
                .import_batch(&csv)
                .await
                .with_context(|| format!("Failed to import {}", csv.display()))?;

            for path in &report.saved {
                println!("Saved {}", path);
            }
            for failure in &report.failures {
                eprintln!(
                    "Line {}: {}: {}",
                    failure.line,
                    failure.common_name.as_deref().unwrap_or("<unreadable row>"),
                    failure.reason
                );
            }
            println!("Imported {} certificate(s), {} failed", report.saved.len(), report.failures.len());

            if !report.is_success() {
                anyhow::bail!("{} row(s) of {} could not be imported", report.failures.len(), csv.display());
            }
        }
    }

    Ok(())
}

fn print_saved(record: &CertificateRecord) {
    let location = match (&record.handle, record.version) {
        (Some(handle), _) => format!(" ({})", handle),
        (None, Some(version)) => format!(" (version {})", version),
        (None, None) => String::new(),
    };
    println!("Saved {} at {}{}", record.common_name(), record.path(), location);
}
