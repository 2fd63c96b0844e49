//! # Certificates
//!
//! Certificate model, path derivation and X.509 parsing. Nothing in this
//! module performs I/O.

pub mod documents;
pub mod oid;
pub mod parser;
pub mod path;
pub mod record;
pub mod secret;

pub use parser::{CertificateParser, ParsedCertificate};
pub use path::PathCodec;
pub use record::{
    CertType, CertificateBody, CertificateInfo, CertificateRecord, KeyDetails, KeyType, Validity,
};
pub use secret::SecretString;
