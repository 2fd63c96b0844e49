//! Private key material that never prints.
//!
//! Keys are held as their PEM text. The text leaves the wrapper through
//! [`SecretString::expose_secret`] only, which the store payload builders in
//! [`crate::certificate::documents`] and the ACM import call use. The Vault
//! token from configuration rides in the same wrapper.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// What serialized records and `Display` show in place of key material.
pub const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The PEM text. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label of the first PEM block, e.g. `RSA PRIVATE KEY` or `EC PRIVATE KEY`.
    ///
    /// The label says what kind of key is held without revealing any of it.
    pub fn pem_label(&self) -> Option<&str> {
        let start = self.0.find("-----BEGIN ")? + "-----BEGIN ".len();
        let rest = &self.0[start..];
        let end = rest.find("-----")?;
        Some(&rest[..end])
    }

    pub fn is_pem_private_key(&self) -> bool {
        self.pem_label().is_some_and(|label| label.ends_with("PRIVATE KEY"))
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

// Store payloads and config files carry the real value
impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_empty(), self.pem_label()) {
            (true, _) => f.write_str("SecretString(<empty>)"),
            (false, Some(label)) => write!(f, "SecretString(<{} redacted>)", label),
            (false, None) => write!(f, "SecretString({})", REDACTED),
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Compares every byte regardless of where the first difference is.
impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.0.as_bytes(), other.0.as_bytes());
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for SecretString {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}
