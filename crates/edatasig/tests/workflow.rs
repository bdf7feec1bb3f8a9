//! The open-file flow as reported to the user.

use std::path::{Path, PathBuf};

use edatasig::core::SignatureType;
use edatasig::keys::loader::load_dsa_private_pem;
use edatasig::keys::{CertificateStore, DirectoryStore, DsaCertificate};
use edatasig::schema::Schema;
use edatasig::workflow::*;
use edatasig::xml::EdataDocument;

const DATA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data");

fn data(name: &str) -> PathBuf {
    Path::new(DATA).join(name)
}

fn schema() -> Schema {
    Schema::load(data("eData.xsd")).unwrap()
}

fn private(name: &str) -> dsa::SigningKey {
    let pem = std::fs::read(data(&format!("keys/{name}"))).unwrap();
    load_dsa_private_pem(&pem)
        .unwrap()
        .dsa_private_key()
        .unwrap()
        .clone()
}

fn signer_certificate() -> DsaCertificate {
    DsaCertificate::load(&data("keys/signer-cert.pem")).unwrap()
}

fn in_validity() -> der::DateTime {
    der::DateTime::new(2030, 1, 1, 0, 0, 0).unwrap()
}

/// A store holding the signer certificate, optionally pinned as trusted.
fn store(dir: &Path, trusted: bool) -> DirectoryStore {
    std::fs::copy(data("keys/signer-cert.pem"), dir.join("signer.pem")).unwrap();
    if trusted {
        std::fs::create_dir(dir.join("trusted")).unwrap();
        std::fs::copy(data("keys/signer-cert.der"), dir.join("trusted/signer.der")).unwrap();
    }
    DirectoryStore::new(dir).with_time(in_validity())
}

fn sign_dsa_to(dir: &Path, key: &str) -> PathBuf {
    let doc = EdataDocument::load(data("edata-several.xml")).unwrap();
    let out = dir.join("signed-dsa.xml");
    edatasig::dsig::sign_dsa(&doc, &private(key), &out).unwrap();
    out
}

fn sign_hmac_to(dir: &Path) -> PathBuf {
    let doc = EdataDocument::load(data("edata-empty.xml")).unwrap();
    let out = dir.join("signed-hmac.xml");
    edatasig::dsig::sign_hmac(&doc, b"password", &out).unwrap();
    out
}

#[test]
fn test_unsigned_document() {
    let path = data("edata-several.xml");
    let report = inspect(&path, &schema(), &VerifyInput::default());
    assert_eq!(
        report.lines,
        vec![
            format!("Opening file {}", path.display()),
            XML_VALID.to_owned(),
            FORMAT_VALID.to_owned(),
            "3 MaterialData elements found".to_owned(),
            NOT_SIGNED.to_owned(),
        ]
    );
    assert!(report.signable);
    assert_eq!(report.signature, SignatureType::None);
}

#[test]
fn test_unreadable_files() {
    let report = inspect(data("malformed.xml"), &schema(), &VerifyInput::default());
    assert_eq!(report.lines.last().map(String::as_str), Some(INVALID_XML));
    assert!(!report.signable);

    let report = inspect(data("missing.xml"), &schema(), &VerifyInput::default());
    assert_eq!(report.lines.last().map(String::as_str), Some(UNREADABLE));
}

#[test]
fn test_invalid_format_stops() {
    let report = inspect(data("edata-missing-group.xml"), &schema(), &VerifyInput::default());
    assert!(report.contains(FORMAT_INVALID));
    assert!(report
        .lines
        .iter()
        .any(|l| l.starts_with("eData format errors: ") && l.contains("MaterialDataGroup")));
    assert!(!report.lines.iter().any(|l| l.contains("MaterialData elements found")));
    assert!(!report.signable);
}

#[test]
fn test_dsa_with_trusted_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let signed = sign_dsa_to(dir.path(), "signer-key.pem");
    let store_dir = tempfile::tempdir().unwrap();
    let store = store(store_dir.path(), true);
    let input = VerifyInput {
        certificate: Some(signer_certificate()),
        store: Some(&store as &dyn CertificateStore),
        password: None,
    };
    let report = inspect(&signed, &schema(), &input);
    assert!(report.contains(FORMAT_VALID));
    assert!(report.contains(DSA_SIGNED));
    assert!(report.contains(CHAIN_VALID));
    assert!(report.contains(DSA_VALID));
    assert!(!report.contains(EMBEDDED_VALID));
    assert!(!report.signable);
    assert_eq!(report.signature, SignatureType::Dsa);
}

#[test]
fn test_dsa_with_wrong_certificate_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let signed = sign_dsa_to(dir.path(), "other-key.pem");
    let input = VerifyInput {
        certificate: Some(signer_certificate()),
        ..VerifyInput::default()
    };
    let report = inspect(&signed, &schema(), &input);
    assert!(report.contains(CHAIN_UNVERIFIED));
    assert!(report.contains(DSA_INVALID));
    assert!(report.contains(EMBEDDED_VALID));
}

#[test]
fn test_dsa_without_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let signed = sign_dsa_to(dir.path(), "signer-key.pem");
    let report = inspect(&signed, &schema(), &VerifyInput::default());
    assert!(report.contains(NO_CERTIFICATE));
    assert!(report.contains(EMBEDDED_VALID));
}

#[test]
fn test_dsa_candidate_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let signed = sign_dsa_to(dir.path(), "signer-key.pem");
    let store_dir = tempfile::tempdir().unwrap();
    let store = store(store_dir.path(), false);
    assert_eq!(store.candidate_keys().unwrap().len(), 1);
    let input = VerifyInput {
        store: Some(&store as &dyn CertificateStore),
        ..VerifyInput::default()
    };
    let report = inspect(&signed, &schema(), &input);
    assert!(report.contains(CHAIN_UNVERIFIED));
    assert!(report.contains(DSA_VALID));
}

#[test]
fn test_hmac_passwords() {
    let dir = tempfile::tempdir().unwrap();
    let signed = sign_hmac_to(dir.path());

    let report = inspect(&signed, &schema(), &VerifyInput::default());
    assert!(report.contains(HMAC_SIGNED));
    assert!(report.contains(NO_PASSWORD));
    assert_eq!(report.signature, SignatureType::HmacSha1);

    let input = VerifyInput {
        password: Some("password".into()),
        ..VerifyInput::default()
    };
    assert!(inspect(&signed, &schema(), &input).contains(HMAC_VALID));

    let input = VerifyInput {
        password: Some("Password".into()),
        ..VerifyInput::default()
    };
    assert!(inspect(&signed, &schema(), &input).contains(HMAC_INVALID));
}

#[test]
fn test_unsupported_signature_method() {
    let dir = tempfile::tempdir().unwrap();
    let signed = sign_hmac_to(dir.path());
    let text = std::fs::read_to_string(&signed)
        .unwrap()
        .replace("xmldsig#hmac-sha1", "xmldsig-more#hmac-md5");
    let path = dir.path().join("md5.xml");
    std::fs::write(&path, text).unwrap();

    let report = inspect(&path, &schema(), &VerifyInput::default());
    assert!(report.contains(INVALID_SIGNATURE));
    assert_eq!(report.signature, SignatureType::Invalid);
    assert!(!report.signable);
}
