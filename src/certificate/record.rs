//! # Certificate Record
//!
//! The canonical in-memory representation of a stored certificate.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certificate::path::PathCodec;
use crate::certificate::secret::SecretString;
use crate::errors::{KnoxError, Result};
use crate::storage::StoreAddress;

pub const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
pub const PEM_END: &str = "-----END CERTIFICATE-----";

const PEM_LINE_WIDTH: usize = 64;

/// Encoding of the certificate material as supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CertType {
    #[default]
    Pem,
    Der,
    Pfx,
}

impl CertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertType::Pem => "PEM",
            CertType::Der => "DER",
            CertType::Pfx => "PFX",
        }
    }

    /// Whether public material in this encoding can be persisted
    pub fn is_storable(&self) -> bool {
        matches!(self, CertType::Pem | CertType::Der)
    }
}

impl FromStr for CertType {
    type Err = KnoxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PEM" => Ok(CertType::Pem),
            "DER" => Ok(CertType::Der),
            "PFX" => Ok(CertType::Pfx),
            _ => Err(KnoxError::InvalidCertType { value: s.to_string() }),
        }
    }
}

impl fmt::Display for CertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Public key algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Rsa,
    Dsa,
    Ecc,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Rsa => "RSA",
            KeyType::Dsa => "DSA",
            KeyType::Ecc => "ECC",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Certificate material
///
/// `public` is a PEM block flattened to a single line. `chain` is kept as
/// supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateBody {
    pub public: String,
    pub private: SecretString,
    pub chain: String,
}

impl CertificateBody {
    /// Flattens PEM text to the single-line storage form.
    pub fn flatten(pem: &str) -> String {
        pem.chars().filter(|c| *c != '\n' && *c != '\r').collect()
    }

    /// Base64 payload of the public certificate without PEM markers.
    fn public_payload(&self) -> String {
        let flat = Self::flatten(&self.public);
        let inner = flat.trim();
        let inner = inner.strip_prefix(PEM_BEGIN).unwrap_or(inner);
        let inner = inner.strip_suffix(PEM_END).unwrap_or(inner);
        inner.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// The public certificate as a standard 64-column PEM block.
    pub fn public_pem(&self) -> String {
        let payload = self.public_payload();
        let mut pem = String::with_capacity(payload.len() + payload.len() / PEM_LINE_WIDTH + 64);
        pem.push_str(PEM_BEGIN);
        pem.push('\n');

        let bytes = payload.as_bytes();
        for line in bytes.chunks(PEM_LINE_WIDTH) {
            // base64 payload is ASCII
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }

        pem.push_str(PEM_END);
        pem.push('\n');
        pem
    }

    /// DER bytes of the public certificate.
    pub fn public_der(&self) -> Result<Vec<u8>> {
        let payload = self.public_payload();
        if payload.is_empty() {
            return Err(KnoxError::invalid_certificate("public certificate is empty"));
        }
        STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| KnoxError::invalid_certificate(format!("public certificate is not valid base64: {}", e)))
    }
}

/// Validity window as absolute UTC instants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl Validity {
    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }
}

/// Subject, issuer and validity extracted from the certificate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub subject: BTreeMap<String, String>,
    pub issuer: BTreeMap<String, String>,
    pub validity: Validity,
}

/// Key metadata derived from the public certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDetails {
    pub key_type: KeyType,
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    pub serial_number: String,
    pub fingerprint_sha256: String,
}

/// A certificate together with the name and path it is stored under.
///
/// `common_name` and `path` are only reachable through accessors; changing
/// the name goes through [`CertificateRecord::set_common_name`] so that the
/// path always matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateRecord {
    common_name: String,
    path: String,
    pub cert_type: CertType,
    pub body: CertificateBody,
    pub info: CertificateInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_details: Option<KeyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl CertificateRecord {
    /// Creates an empty record for `name`, canonicalizing it first.
    pub fn new(name: &str) -> Result<Self> {
        let common_name = PathCodec::valid_name(name);
        let path = PathCodec::derive(&common_name)?;
        Ok(Self {
            common_name,
            path,
            cert_type: CertType::default(),
            body: CertificateBody::default(),
            info: CertificateInfo::default(),
            key_details: None,
            handle: None,
            version: None,
        })
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Renames the record and re-derives its path.
    ///
    /// On error the record is left unchanged.
    pub fn set_common_name(&mut self, name: &str) -> Result<()> {
        let common_name = PathCodec::valid_name(name);
        let path = PathCodec::derive(&common_name)?;
        self.common_name = common_name;
        self.path = path;
        Ok(())
    }

    /// Backend identity when one has been assigned, else the derived path.
    pub fn address(&self) -> StoreAddress {
        match &self.handle {
            Some(handle) => StoreAddress::Handle(handle.clone()),
            None => StoreAddress::Path(self.path.clone()),
        }
    }

    /// Checks that the record holds material that can be persisted.
    pub fn ensure_storable(&self) -> Result<()> {
        if !self.cert_type.is_storable() {
            return Err(KnoxError::unsupported_encoding(self.cert_type.as_str()));
        }
        if self.body.public.trim().is_empty() {
            return Err(KnoxError::invalid_certificate(format!(
                "certificate '{}' has no public material",
                self.common_name
            )));
        }
        if self.body.public.contains('\n') || self.body.public.contains('\r') {
            return Err(KnoxError::invalid_certificate(format!(
                "public material for '{}' must be a single line",
                self.common_name
            )));
        }
        Ok(())
    }

    /// First subject common name as recorded in the certificate itself.
    pub fn subject_common_name(&self) -> Option<&str> {
        self.info.subject.get("commonName").and_then(|names| names.split(',').next())
    }
}
