//! # Error Types
//!
//! Error taxonomy for certificate parsing, storage and issuance using `thiserror`.

/// Custom result type for Knox operations
pub type Result<T> = std::result::Result<T, KnoxError>;

/// Main error type for Knox
#[derive(thiserror::Error, Debug)]
pub enum KnoxError {
    /// The subject name cannot be turned into a store path
    #[error("Invalid subject name '{name}': {reason}")]
    InvalidSubjectName { name: String, reason: String },

    /// The certificate encoding is declared but not supported
    #[error("Unsupported certificate encoding: {encoding}")]
    UnsupportedEncoding { encoding: String },

    /// The certificate public key algorithm is not RSA, DSA or ECC
    #[error("Unsupported key type: {algorithm}")]
    UnsupportedKeyType { algorithm: String },

    /// A certificate type string did not match PEM, DER or PFX
    #[error("Invalid certificate type '{value}', expected one of PEM, DER, PFX")]
    InvalidCertType { value: String },

    /// The certificate material itself is malformed
    #[error("Invalid certificate: {reason}")]
    InvalidCertificate { reason: String },

    /// Nothing exists at the requested address
    #[error("Certificate not found: {address}")]
    NotFound { address: String },

    /// Connectivity, authentication, throttling or deadline failure
    #[error("Backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// The issuance provider could not produce a certificate
    #[error("Certificate generation failed for '{name}': {reason}")]
    GenerationFailed { name: String, reason: String },

    /// One leaf of a two-leaf write succeeded and the other did not
    #[error(
        "Partial write at {path}: {written} written, {failed} failed (compensated: {compensated}): {reason}"
    )]
    PartialWrite {
        path: String,
        written: String,
        failed: String,
        compensated: bool,
        reason: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },
}

impl KnoxError {
    /// Create an invalid subject name error
    pub fn invalid_subject_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidSubjectName { name: name.into(), reason: reason.into() }
    }

    /// Create an unsupported encoding error
    pub fn unsupported_encoding<S: Into<String>>(encoding: S) -> Self {
        Self::UnsupportedEncoding { encoding: encoding.into() }
    }

    /// Create an unsupported key type error
    pub fn unsupported_key_type<S: Into<String>>(algorithm: S) -> Self {
        Self::UnsupportedKeyType { algorithm: algorithm.into() }
    }

    /// Create an invalid certificate error
    pub fn invalid_certificate<S: Into<String>>(reason: S) -> Self {
        Self::InvalidCertificate { reason: reason.into() }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(address: S) -> Self {
        Self::NotFound { address: address.into() }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable<S: Into<String>>(message: S) -> Self {
        Self::BackendUnavailable { message: message.into() }
    }

    /// Create a generation failed error
    pub fn generation_failed<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::GenerationFailed { name: name.into(), reason: reason.into() }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }

    /// Create a serialization error with context
    pub fn serialization<S: Into<String>>(source: serde_json::Error, context: S) -> Self {
        Self::Serialization { source, context: context.into() }
    }

    /// Parsing errors are deterministic and never worth retrying
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            KnoxError::InvalidSubjectName { .. }
                | KnoxError::UnsupportedEncoding { .. }
                | KnoxError::UnsupportedKeyType { .. }
                | KnoxError::InvalidCertType { .. }
                | KnoxError::InvalidCertificate { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KnoxError::NotFound { .. })
    }
}

impl From<std::io::Error> for KnoxError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for KnoxError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for KnoxError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for KnoxError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = KnoxError::not_found("/com/example/www");
        assert!(matches!(err, KnoxError::NotFound { .. }));
        assert_eq!(err.to_string(), "Certificate not found: /com/example/www");

        let err = KnoxError::invalid_subject_name("", "name is empty");
        assert!(matches!(err, KnoxError::InvalidSubjectName { .. }));

        let err = KnoxError::generation_failed("www.example.com", "provider exited with 1");
        assert!(err.to_string().contains("www.example.com"));
    }

    #[test]
    fn test_parse_errors_are_classified() {
        assert!(KnoxError::unsupported_encoding("PFX").is_parse_error());
        assert!(KnoxError::unsupported_key_type("1.3.101.112").is_parse_error());
        assert!(!KnoxError::backend_unavailable("connection refused").is_parse_error());
        assert!(!KnoxError::not_found("/com/example").is_parse_error());
    }

    #[test]
    fn test_partial_write_display() {
        let err = KnoxError::PartialWrite {
            path: "/com/example/www".to_string(),
            written: "cert_body".to_string(),
            failed: "cert_info".to_string(),
            compensated: true,
            reason: "permission denied".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("cert_body written"));
        assert!(message.contains("cert_info failed"));
        assert!(message.contains("compensated: true"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let knox_error: KnoxError = io_error.into();
        assert!(matches!(knox_error, KnoxError::Io { .. }));

        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let knox_error: KnoxError = json_error.into();
        assert!(matches!(knox_error, KnoxError::Serialization { .. }));
    }
}
