use std::sync::Arc;
use std::time::Duration;

use knox::certificate::documents::{CertBodyDocument, CERT_BODY_KEY};
use knox::certificate::CertType;
use knox::errors::KnoxError;
use knox::storage::vault::{KvStore, MemoryKvStore, VaultStoreEngine};
use knox::storage::{StoreAddress, StoreEngine};

use super::support::{rsa_record, wildcard_record, RSA_KEY};

fn engine() -> (Arc<MemoryKvStore>, VaultStoreEngine) {
    let kv = Arc::new(MemoryKvStore::new());
    let engine = VaultStoreEngine::new(kv.clone(), Duration::from_secs(5));
    (kv, engine)
}

fn www() -> StoreAddress {
    StoreAddress::Path("/com/8x8/www".to_string())
}

#[tokio::test]
async fn save_then_get_round_trips_both_leaves() {
    let (kv, engine) = engine();
    let mut record = rsa_record();
    engine.save(&mut record).await.unwrap();
    assert_eq!(record.version, Some(1));

    let loaded = engine.get(&www(), "www.8x8.com", CertType::Pem).await.unwrap();
    assert_eq!(loaded.common_name(), "www.8x8.com");
    assert_eq!(loaded.body.public, record.body.public);
    assert_eq!(loaded.body.private.expose_secret(), RSA_KEY);
    assert_eq!(loaded.body.chain, record.body.chain);
    assert_eq!(loaded.info.subject, record.info.subject);
    assert_eq!(loaded.info.validity, record.info.validity);
    assert_eq!(loaded.key_details, record.key_details);
    assert_eq!(loaded.version, Some(1));

    assert_eq!(kv.versions("com/8x8/www/cert_info").await.len(), 1);
}

#[tokio::test]
async fn resave_is_idempotent_and_bumps_version() {
    let (kv, engine) = engine();
    let mut first = rsa_record();
    engine.save(&mut first).await.unwrap();
    let mut second = rsa_record();
    engine.save(&mut second).await.unwrap();

    assert_eq!(second.version, Some(2));
    let versions = kv.versions("com/8x8/www/cert_body").await;
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0], versions[1]);

    let loaded = engine.get(&www(), "www.8x8.com", CertType::Pem).await.unwrap();
    assert_eq!(loaded.body.public, first.body.public);
    assert_eq!(loaded.version, Some(2));
}

#[tokio::test]
async fn failed_info_write_rolls_back_body() {
    let (kv, engine) = engine();
    kv.fail_writes_to("cert_info").await;

    let mut record = rsa_record();
    let err = engine.save(&mut record).await.unwrap_err();
    match err {
        KnoxError::PartialWrite { path, written, failed, compensated, .. } => {
            assert_eq!(path, "/com/8x8/www");
            assert_eq!(written, "cert_body");
            assert_eq!(failed, "cert_info");
            assert!(compensated);
        }
        other => panic!("expected PartialWrite, got {other:?}"),
    }
    assert_eq!(record.version, None);
    assert_eq!(kv.versions("com/8x8/www/cert_body").await, vec![None]);
    assert!(engine.get(&www(), "www.8x8.com", CertType::Pem).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn failed_resave_keeps_previous_certificate_readable() {
    let (kv, engine) = engine();
    let mut original = rsa_record();
    engine.save(&mut original).await.unwrap();

    kv.fail_writes_to("cert_info").await;
    let mut replacement = rsa_record();
    replacement.body.chain = String::new();
    let err = engine.save(&mut replacement).await.unwrap_err();
    assert!(matches!(err, KnoxError::PartialWrite { compensated: true, .. }));

    let versions = kv.versions("com/8x8/www/cert_body").await;
    assert_eq!(versions.len(), 3);
    assert_eq!(versions[2], versions[0]);

    let loaded = engine.get(&www(), "www.8x8.com", CertType::Pem).await.unwrap();
    assert_eq!(loaded.body.chain, original.body.chain);
    assert_eq!(loaded.body.private.expose_secret(), RSA_KEY);
    assert_eq!(loaded.version, Some(3));
}

#[tokio::test]
async fn missing_info_is_rebuilt_from_body() {
    let (kv, engine) = engine();
    let record = rsa_record();
    let body = serde_json::to_value(CertBodyDocument::from_record(&record)).unwrap();
    kv.write(&format!("com/8x8/www/{}", CERT_BODY_KEY), &body).await.unwrap();

    let loaded = engine.get(&www(), "www.8x8.com", CertType::Pem).await.unwrap();
    assert_eq!(loaded.info, record.info);
    assert_eq!(loaded.body.private.expose_secret(), RSA_KEY);
    assert_eq!(loaded.version, Some(1));
}

#[tokio::test]
async fn get_unknown_path_is_not_found() {
    let (_, engine) = engine();
    let err = engine.get(&www(), "www.8x8.com", CertType::Pem).await.unwrap_err();
    assert!(matches!(err, KnoxError::NotFound { ref address } if address == "/com/8x8/www"));
}

#[tokio::test]
async fn find_walks_subtree() {
    let (_, engine) = engine();
    engine.save(&mut rsa_record()).await.unwrap();
    engine.save(&mut wildcard_record()).await.unwrap();

    let all = engine.find("/", "*").await.unwrap();
    let paths: Vec<&str> = all.iter().map(|record| record.path()).collect();
    assert_eq!(paths, vec!["/com/8x8/www", "/com/example/wildcard"]);

    let example = engine.find("/com/example", "*.example.com").await.unwrap();
    assert_eq!(example.len(), 1);
    assert_eq!(example[0].common_name(), "wildcard.example.com");
}

#[tokio::test]
async fn find_without_cert_info_is_not_found() {
    let (kv, engine) = engine();
    kv.write("org/example/cert_body", &serde_json::json!({ "public": "x" })).await.unwrap();

    let err = engine.find("/org", "*").await.unwrap_err();
    assert!(matches!(err, KnoxError::NotFound { ref address } if address == "/org"));
}

#[tokio::test]
async fn find_isolates_failing_branches() {
    let (kv, engine) = engine();
    engine.save(&mut rsa_record()).await.unwrap();
    engine.save(&mut wildcard_record()).await.unwrap();
    kv.fail_lists_under("/com/8x8").await;

    let records = engine.find("/com", "*").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].path(), "/com/example/wildcard");
}

#[tokio::test]
async fn find_surfaces_root_listing_failure() {
    let (kv, engine) = engine();
    engine.save(&mut rsa_record()).await.unwrap();
    kv.fail_lists_under("/com").await;

    let err = engine.find("/com", "*").await.unwrap_err();
    assert!(matches!(err, KnoxError::BackendUnavailable { .. }));
}
