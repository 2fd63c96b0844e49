//! Business logic services
//!
//! This module contains the service layer that drives parsing, issuance
//! and storage, separated from CLI concerns.

pub mod certificate_service;

pub use certificate_service::{BatchFailure, BatchReport, CertificateService, LoadedFiles};
