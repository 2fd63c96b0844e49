use std::sync::Arc;
use std::time::Duration;

use knox::certificate::{CertType, SecretString};
use knox::errors::KnoxError;
use knox::storage::acm::MemoryAcm;
use knox::storage::{AcmStoreEngine, StoreAddress, StoreEngine};

use super::support::{rsa_record, wildcard_record, RSA_PEM};

fn engine() -> (Arc<MemoryAcm>, AcmStoreEngine) {
    let acm = Arc::new(MemoryAcm::default());
    let engine = AcmStoreEngine::new(acm.clone(), Duration::from_secs(5));
    (acm, engine)
}

#[tokio::test]
async fn save_imports_and_sets_handle() {
    let (acm, engine) = engine();
    let mut record = rsa_record();
    engine.save(&mut record).await.unwrap();

    let arn = record.handle.clone().unwrap();
    assert!(arn.starts_with("arn:aws:acm:us-east-1:"));

    let stored = acm.stored(&arn).await.unwrap();
    assert_eq!(stored.domain_name, "www.8x8.com");
    assert!(stored.chain.is_some());
    assert!(stored.tags.iter().any(|(key, value)| key == "Name" && value == "www.8x8.com"));
    assert!(stored.tags.iter().any(|(key, value)| key == "KnoxPath" && value == "/com/8x8/www"));
}

#[tokio::test]
async fn resave_with_handle_reimports() {
    let (acm, engine) = engine();
    let mut record = rsa_record();
    engine.save(&mut record).await.unwrap();
    let arn = record.handle.clone().unwrap();

    engine.save(&mut record).await.unwrap();
    assert_eq!(record.handle.as_deref(), Some(arn.as_str()));
    assert_eq!(acm.len().await, 1);
    assert_eq!(acm.stored(&arn).await.unwrap().imports, 2);
}

#[tokio::test]
async fn resave_without_handle_replaces_issued_certificate() {
    let (acm, engine) = engine();
    let mut first = rsa_record();
    engine.save(&mut first).await.unwrap();

    let mut second = rsa_record();
    assert!(second.handle.is_none());
    engine.save(&mut second).await.unwrap();

    assert_eq!(second.handle, first.handle);
    assert_eq!(acm.len().await, 1);
    assert_eq!(acm.stored(first.handle.as_deref().unwrap()).await.unwrap().imports, 2);

    let records = engine.find("/com/8x8/www", "www.8x8.com").await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn one_issued_match_yields_record_with_handle() {
    let (acm, engine) = engine();
    engine.save(&mut rsa_record()).await.unwrap();
    engine.save(&mut wildcard_record()).await.unwrap();
    acm.insert("www.8x8.com", "EXPIRED", RSA_PEM).await;

    let records = engine.find("/com/8x8/www", "www.8x8.com").await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.common_name(), "www.8x8.com");
    assert!(record.handle.is_some());
    assert!(record.body.private.is_empty());
    assert!(!record.body.chain.is_empty());
}

#[tokio::test]
async fn no_match_is_not_found() {
    let (acm, engine) = engine();
    engine.save(&mut wildcard_record()).await.unwrap();
    acm.insert("www.8x8.com", "PENDING_VALIDATION", RSA_PEM).await;

    let err = engine.find("/com/8x8/www", "www.8x8.com").await.unwrap_err();
    assert!(matches!(err, KnoxError::NotFound { ref address } if address == "www.8x8.com"));
}

#[tokio::test]
async fn get_by_handle_and_by_path() {
    let (_, engine) = engine();
    let mut record = rsa_record();
    engine.save(&mut record).await.unwrap();
    let arn = record.handle.clone().unwrap();

    let by_handle = engine.get(&StoreAddress::Handle(arn.clone()), "www.8x8.com", CertType::Pem).await.unwrap();
    assert_eq!(by_handle.body.public, record.body.public);
    assert_eq!(by_handle.info, record.info);

    let by_path = engine
        .get(&StoreAddress::Path("/com/8x8/www".to_string()), "www.8x8.com", CertType::Pem)
        .await
        .unwrap();
    assert_eq!(by_path.handle.as_deref(), Some(arn.as_str()));
}

#[tokio::test]
async fn wildcard_name_matches_wildcard_domain() {
    let (_, engine) = engine();
    engine.save(&mut wildcard_record()).await.unwrap();

    let records = engine.find("/com/example/wildcard", "*.example.com").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].common_name(), "wildcard.example.com");
}

#[tokio::test]
async fn save_without_private_key_is_rejected() {
    let (acm, engine) = engine();
    let mut record = rsa_record();
    record.body.private = SecretString::default();

    let err = engine.save(&mut record).await.unwrap_err();
    assert!(matches!(err, KnoxError::InvalidCertificate { .. }));
    assert_eq!(acm.len().await, 0);
}

#[tokio::test]
async fn save_with_unarmored_key_is_rejected() {
    let (acm, engine) = engine();
    let mut record = rsa_record();
    record.body.private = SecretString::new("MIIEvQIBADANBgkqhkiG9w0BAQEFAASC");

    let err = engine.save(&mut record).await.unwrap_err();
    assert!(matches!(err, KnoxError::InvalidCertificate { .. }));
    assert_eq!(acm.len().await, 0);
}
