//! # Error Handling
//!
//! Error types shared by the certificate, storage and issuance layers.

pub mod types;

pub use types::{KnoxError, Result};
