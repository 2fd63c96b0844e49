//! Fixture certificates shared by the store tests.

use knox::certificate::{CertType, CertificateParser, CertificateRecord, SecretString};

pub const RSA_PEM: &str = include_str!("../fixtures/certs/www.8x8.com.pem");
pub const RSA_KEY: &str = include_str!("../fixtures/certs/www.8x8.com.key");
pub const ECC_PEM: &str = include_str!("../fixtures/certs/wildcard.example.com.pem");
pub const ECC_KEY: &str = include_str!("../fixtures/certs/wildcard.example.com.key");
pub const CA_PEM: &str = include_str!("../fixtures/certs/example-ca.pem");

fn record(pem: &str, key: &str, name: &str) -> CertificateRecord {
    let mut record = CertificateParser::parse_new(pem.as_bytes(), CertType::Pem, name).unwrap();
    record.body.private = SecretString::new(key);
    record.body.chain = CA_PEM.to_string();
    record
}

/// RSA leaf for `www.8x8.com` with key and chain attached
pub fn rsa_record() -> CertificateRecord {
    record(RSA_PEM, RSA_KEY, "www.8x8.com")
}

/// ECDSA P-384 leaf for `*.example.com` with key and chain attached
pub fn wildcard_record() -> CertificateRecord {
    record(ECC_PEM, ECC_KEY, "*.example.com")
}
