//! # Certificate Parser
//!
//! Turns raw PEM or DER bytes into a populated [`CertificateRecord`]:
//! subject and issuer attribute maps, the validity window, key metadata and
//! the single-line PEM form used for storage. Parsing has no side effects.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

use crate::certificate::oid;
use crate::certificate::record::{
    CertType, CertificateBody, CertificateInfo, CertificateRecord, KeyDetails, KeyType, Validity,
    PEM_BEGIN, PEM_END,
};
use crate::errors::{KnoxError, Result};

const PEM_CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Everything extracted from one X.509 certificate
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub subject_common_name: Option<String>,
    pub info: CertificateInfo,
    pub key_details: KeyDetails,
    pub public: String,
}

/// Stateless X.509 decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateParser;

impl CertificateParser {
    /// Parses `bytes` and populates `record` with the result.
    ///
    /// The subject `commonName` of the certificate replaces the record's name
    /// (wildcards substituted, path re-derived). Without a subject CN the
    /// requested name is kept. Private key and chain are left untouched.
    pub fn parse(
        bytes: &[u8],
        encoding: CertType,
        mut record: CertificateRecord,
    ) -> Result<CertificateRecord> {
        let parsed = Self::inspect(bytes, encoding)?;

        if let Some(cn) = parsed.subject_common_name.as_deref() {
            if cn != record.common_name() {
                debug!(requested = %record.common_name(), subject = %cn, "Using certificate subject as common name");
            }
            record.set_common_name(cn)?;
        }

        record.cert_type = encoding;
        record.body.public = parsed.public;
        record.info = parsed.info;
        record.key_details = Some(parsed.key_details);
        Ok(record)
    }

    /// Parses into a fresh record named after the certificate subject.
    pub fn parse_new(bytes: &[u8], encoding: CertType, fallback_name: &str) -> Result<CertificateRecord> {
        let record = CertificateRecord::new(fallback_name)?;
        Self::parse(bytes, encoding, record)
    }

    /// Decodes a certificate without touching any record.
    pub fn inspect(bytes: &[u8], encoding: CertType) -> Result<ParsedCertificate> {
        let der = match encoding {
            CertType::Pem => Self::first_pem_certificate(bytes)?,
            CertType::Der => bytes.to_vec(),
            CertType::Pfx => return Err(KnoxError::unsupported_encoding(encoding.as_str())),
        };
        Self::inspect_der(&der)
    }

    /// Re-derives key details from stored public material.
    pub fn key_details_for(body: &CertificateBody) -> Result<KeyDetails> {
        let der = body.public_der()?;
        Ok(Self::inspect_der(&der)?.key_details)
    }

    /// Single-line PEM encoding of a DER certificate.
    pub fn single_line_pem(der: &[u8]) -> String {
        format!("{}{}{}", PEM_BEGIN, STANDARD.encode(der), PEM_END)
    }

    fn first_pem_certificate(bytes: &[u8]) -> Result<Vec<u8>> {
        for pem in Pem::iter_from_buffer(bytes) {
            let pem = pem.map_err(|e| {
                KnoxError::invalid_certificate(format!("failed to decode PEM block: {}", e))
            })?;
            if pem.label == PEM_CERTIFICATE_LABEL {
                return Ok(pem.contents);
            }
        }
        Err(KnoxError::invalid_certificate("no CERTIFICATE block found in PEM input"))
    }

    fn inspect_der(der: &[u8]) -> Result<ParsedCertificate> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| KnoxError::invalid_certificate(format!("failed to parse X.509: {}", e)))?;

        let subject = name_map(cert.subject());
        let issuer = name_map(cert.issuer());
        let subject_common_name = first_common_name(cert.subject());

        let validity = Validity {
            not_before: to_utc(cert.validity().not_before.timestamp())?,
            not_after: to_utc(cert.validity().not_after.timestamp())?,
        };

        let (key_type, size, curve) = classify_key(cert.public_key())?;
        let key_details = KeyDetails {
            key_type,
            size,
            curve,
            serial_number: format!("{:x}", cert.serial),
            fingerprint_sha256: hex::encode(Sha256::digest(der)),
        };

        Ok(ParsedCertificate {
            subject_common_name,
            info: CertificateInfo { subject, issuer, validity },
            key_details,
            public: Self::single_line_pem(der),
        })
    }
}

fn name_map(name: &X509Name<'_>) -> BTreeMap<String, String> {
    let pairs = name.iter().flat_map(|rdn| rdn.iter()).map(|attr| {
        let key = oid::attribute_name(&attr.attr_type().to_id_string());
        let value = match attr.as_str() {
            Ok(value) => value.to_string(),
            // Non-string attribute values are kept as hex
            Err(_) => hex::encode(attr.attr_value().data),
        };
        (key, value)
    });
    merge_attributes(pairs)
}

/// Repeated attributes keep every value, comma separated in RDN order.
fn merge_attributes(pairs: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, String> {
    let mut attributes: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in pairs {
        attributes
            .entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    attributes
}

/// First common name of the subject. Later ones never name the record.
fn first_common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .map(|attr| attr.as_str().map(str::to_string).unwrap_or_else(|_| hex::encode(attr.attr_value().data)))
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| KnoxError::invalid_certificate(format!("timestamp {} out of range", timestamp)))
}

fn classify_key(spki: &SubjectPublicKeyInfo<'_>) -> Result<(KeyType, u32, Option<String>)> {
    let algorithm = spki.algorithm.algorithm.to_id_string();
    match algorithm.as_str() {
        oid::RSA_ENCRYPTION => match spki.parsed() {
            Ok(x509_parser::public_key::PublicKey::RSA(rsa)) => Ok((KeyType::Rsa, rsa.key_size() as u32, None)),
            _ => Err(KnoxError::invalid_certificate("malformed RSA public key")),
        },
        oid::EC_PUBLIC_KEY => {
            let params = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or_else(|| KnoxError::invalid_certificate("EC key without curve parameters"))?;
            match oid::named_curve(params.data) {
                Some((curve, bits)) => Ok((KeyType::Ecc, bits, Some(curve.to_string()))),
                None => Err(KnoxError::unsupported_key_type(format!(
                    "EC curve {}",
                    hex::encode(params.data)
                ))),
            }
        }
        oid::DSA => {
            let params = spki
                .algorithm
                .parameters
                .as_ref()
                .ok_or_else(|| KnoxError::invalid_certificate("DSA key without domain parameters"))?;
            let bits = leading_integer_bits(params.data)
                .ok_or_else(|| KnoxError::invalid_certificate("malformed DSA domain parameters"))?;
            Ok((KeyType::Dsa, bits, None))
        }
        other => Err(KnoxError::unsupported_key_type(other)),
    }
}

/// Bit length of the first DER INTEGER in `data`.
///
/// DSA parameters are `SEQUENCE { p, q, g }` and `data` is the sequence
/// content, so the first integer is the prime `p`.
fn leading_integer_bits(data: &[u8]) -> Option<u32> {
    let (&tag, rest) = data.split_first()?;
    if tag != 0x02 {
        return None;
    }

    let (&first_len, rest) = rest.split_first()?;
    let (len, rest) = if first_len & 0x80 == 0 {
        (first_len as usize, rest)
    } else {
        let count = (first_len & 0x7f) as usize;
        if count == 0 || count > 4 || rest.len() < count {
            return None;
        }
        let len = rest[..count].iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, &rest[count..])
    };

    let value = rest.get(..len)?;
    let significant: Vec<u8> = value.iter().copied().skip_while(|b| *b == 0).collect();
    let first = *significant.first()?;
    Some((significant.len() as u32 - 1) * 8 + (8 - first.leading_zeros()))
}
