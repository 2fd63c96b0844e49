//! # Store Documents
//!
//! Typed payloads written to and read from the backing stores. Every store
//! persists the same two halves of a record:
//!
//! - `cert_body`: `public`, `private`, `chain`
//! - `cert_info`: `common_name`, `cert_type`, `subject`, `issuer`, `validity`
//!
//! These are the only place where private key material is exposed for
//! serialization.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::certificate::parser::CertificateParser;
use crate::certificate::record::{CertType, CertificateBody, CertificateInfo, CertificateRecord, Validity};
use crate::certificate::secret::SecretString;
use crate::errors::Result;

pub const CERT_BODY_KEY: &str = "cert_body";
pub const CERT_INFO_KEY: &str = "cert_info";

const MAX_TAG_KEY_LEN: usize = 128;
const MAX_TAG_VALUE_LEN: usize = 256;

/// `cert_body` leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertBodyDocument {
    pub public: String,
    #[serde(default)]
    pub private: String,
    #[serde(default)]
    pub chain: String,
}

/// `cert_info` leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertInfoDocument {
    pub common_name: String,
    #[serde(default)]
    pub cert_type: CertType,
    #[serde(default)]
    pub subject: BTreeMap<String, String>,
    #[serde(default)]
    pub issuer: BTreeMap<String, String>,
    pub validity: Validity,
}

/// Single-file form used by the file store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDocument {
    pub common_name: String,
    #[serde(default)]
    pub cert_type: CertType,
    pub cert_body: CertBodyDocument,
    pub cert_info: CertInfoDocument,
}

impl CertBodyDocument {
    pub fn from_record(record: &CertificateRecord) -> Self {
        Self {
            public: record.body.public.clone(),
            private: record.body.private.expose_secret().to_string(),
            chain: record.body.chain.clone(),
        }
    }

    pub fn into_body(self) -> CertificateBody {
        CertificateBody {
            public: CertificateBody::flatten(&self.public),
            private: SecretString::new(self.private),
            chain: self.chain,
        }
    }
}

impl CertInfoDocument {
    pub fn from_record(record: &CertificateRecord) -> Self {
        Self {
            common_name: record.common_name().to_string(),
            cert_type: record.cert_type,
            subject: record.info.subject.clone(),
            issuer: record.info.issuer.clone(),
            validity: record.info.validity,
        }
    }
}

impl CertificateDocument {
    pub fn from_record(record: &CertificateRecord) -> Self {
        Self {
            common_name: record.common_name().to_string(),
            cert_type: record.cert_type,
            cert_body: CertBodyDocument::from_record(record),
            cert_info: CertInfoDocument::from_record(record),
        }
    }

    pub fn into_record(self) -> Result<CertificateRecord> {
        into_record(self.cert_body, self.cert_info)
    }
}

/// Rebuilds a record from its two stored halves.
///
/// Key details are re-derived from the public certificate. A certificate that
/// no longer parses still yields a record, without key details.
pub fn into_record(body: CertBodyDocument, info: CertInfoDocument) -> Result<CertificateRecord> {
    let mut record = CertificateRecord::new(&info.common_name)?;
    record.cert_type = info.cert_type;
    record.body = body.into_body();
    record.info = CertificateInfo { subject: info.subject, issuer: info.issuer, validity: info.validity };
    record.key_details = match CertificateParser::key_details_for(&record.body) {
        Ok(details) => Some(details),
        Err(e) => {
            warn!(common_name = %record.common_name(), error = %e, "Could not derive key details from stored certificate");
            None
        }
    };
    Ok(record)
}

/// Tags attached to an imported ACM certificate.
pub fn acm_tags(record: &CertificateRecord) -> Vec<(String, String)> {
    let mut tags = vec![
        ("Name".to_string(), record.common_name().to_string()),
        ("KnoxPath".to_string(), record.path().to_string()),
        ("CertType".to_string(), record.cert_type.as_str().to_string()),
    ];

    let issuer = record
        .info
        .issuer
        .get("commonName")
        .or_else(|| record.info.issuer.get("organizationName"));
    if let Some(issuer) = issuer {
        tags.push(("Issuer".to_string(), issuer.clone()));
    }

    if record.info.validity.not_after.timestamp() > 0 {
        tags.push((
            "NotAfter".to_string(),
            record.info.validity.not_after.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }

    if let Some(details) = &record.key_details {
        tags.push(("Fingerprint".to_string(), details.fingerprint_sha256.clone()));
    }

    tags.into_iter()
        .map(|(key, value)| (sanitize_tag(&key, MAX_TAG_KEY_LEN), sanitize_tag(&value, MAX_TAG_VALUE_LEN)))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Restricts a tag to the characters ACM accepts and truncates it.
fn sanitize_tag(value: &str, max_len: usize) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || "_.:/=+-@".contains(c) {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect()
}
