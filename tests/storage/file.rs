use std::time::Duration;

use knox::certificate::{CertType, CertificateParser};
use knox::errors::KnoxError;
use knox::storage::{FileStoreEngine, StoreAddress, StoreEngine};

use super::support::{rsa_record, wildcard_record, RSA_KEY, RSA_PEM};

async fn engine(dir: &tempfile::TempDir) -> FileStoreEngine {
    FileStoreEngine::open(dir.path().join("store"), Duration::from_secs(5)).await.unwrap()
}

#[tokio::test]
async fn www_8x8_com_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;

    let mut record = rsa_record();
    assert_eq!(record.path(), "/com/8x8/www");
    engine.save(&mut record).await.unwrap();
    assert!(dir.path().join("store/com/8x8/www/certificate.json").is_file());

    let address = StoreAddress::Path("/com/8x8/www".to_string());
    let loaded = engine.get(&address, "www.8x8.com", CertType::Pem).await.unwrap();
    assert_eq!(loaded.common_name(), "www.8x8.com");
    assert_eq!(loaded.body.public, record.body.public);
    assert_eq!(loaded.body.private.expose_secret(), RSA_KEY);
    assert_eq!(loaded.body.chain, record.body.chain);
    assert_eq!(loaded.info, record.info);
    assert_eq!(loaded.info.issuer.get("organizationName").map(String::as_str), Some("ExampleCA"));
    assert_eq!(loaded.version, None);

    let reparsed = CertificateParser::inspect(loaded.body.public_pem().as_bytes(), CertType::Pem).unwrap();
    let original = CertificateParser::inspect(RSA_PEM.as_bytes(), CertType::Pem).unwrap();
    assert_eq!(reparsed.key_details, original.key_details);

    let found = engine.find("/com/8x8", "*.8x8.com").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path(), "/com/8x8/www");
}

#[tokio::test]
async fn resave_overwrites_document() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;

    engine.save(&mut rsa_record()).await.unwrap();
    let mut updated = rsa_record();
    updated.body.chain = String::new();
    engine.save(&mut updated).await.unwrap();

    let address = StoreAddress::Path("/com/8x8/www".to_string());
    let loaded = engine.get(&address, "www.8x8.com", CertType::Pem).await.unwrap();
    assert!(loaded.body.chain.is_empty());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("store/com/8x8/www"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("certificate.json")]);
}

#[tokio::test]
async fn find_skips_malformed_documents() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;
    engine.save(&mut rsa_record()).await.unwrap();
    engine.save(&mut wildcard_record()).await.unwrap();

    let broken = dir.path().join("store/com/broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("certificate.json"), "{ not json").unwrap();

    let records = engine.find("/", "*").await.unwrap();
    let paths: Vec<&str> = records.iter().map(|record| record.path()).collect();
    assert_eq!(paths, vec!["/com/8x8/www", "/com/example/wildcard"]);
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;

    let address = StoreAddress::Path("/com/example/www".to_string());
    let err = engine.get(&address, "www.example.com", CertType::Pem).await.unwrap_err();
    assert!(matches!(err, KnoxError::NotFound { ref address } if address == "/com/example/www"));
}

#[tokio::test]
async fn pfx_records_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;

    let mut record = rsa_record();
    record.cert_type = CertType::Pfx;
    let err = engine.save(&mut record).await.unwrap_err();
    assert!(matches!(err, KnoxError::UnsupportedEncoding { .. }));
    assert!(!dir.path().join("store/com/8x8/www").exists());
}

#[tokio::test]
async fn paths_outside_the_store_root_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).await;

    engine.save(&mut rsa_record()).await.unwrap();
    std::fs::create_dir_all(dir.path().join("outside")).unwrap();
    std::fs::copy(
        dir.path().join("store/com/8x8/www/certificate.json"),
        dir.path().join("outside/certificate.json"),
    )
    .unwrap();

    let err = engine.find("/../outside", "*").await.unwrap_err();
    assert!(matches!(err, KnoxError::InvalidSubjectName { .. }));

    let address = StoreAddress::Path("/../outside".to_string());
    let err = engine.get(&address, "www.8x8.com", CertType::Pem).await.unwrap_err();
    assert!(matches!(err, KnoxError::InvalidSubjectName { .. }));
}
