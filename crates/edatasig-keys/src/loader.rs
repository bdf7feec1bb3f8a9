#![forbid(unsafe_code)]

//! Key loading from PEM and DER (PKCS#8, SubjectPublicKeyInfo, X.509).

use std::path::Path;

use edatasig_core::Error;
use tracing::debug;

use crate::key::{Key, KeyData, KeyUsage};
use crate::x509::DsaCertificate;

/// Load a DSA private key from PKCS#8 PEM data.
pub fn load_dsa_private_pem(pem_data: &[u8]) -> Result<Key, Error> {
    let (label, der_bytes) = decode_pem(pem_data)?;
    if label != "PRIVATE KEY" {
        return Err(Error::Key(format!("expected PRIVATE KEY PEM label, got: {label}")));
    }
    load_dsa_private_der(&der_bytes)
}

/// Load a DSA private key from PKCS#8 DER data.
pub fn load_dsa_private_der(der_bytes: &[u8]) -> Result<Key, Error> {
    use pkcs8::der::Decode;
    let pki = pkcs8::PrivateKeyInfo::from_der(der_bytes)
        .map_err(|e| Error::Key(format!("failed to parse PKCS#8 private key: {e}")))?;
    let sk = dsa::SigningKey::try_from(pki)
        .map_err(|e| Error::Key(format!("not a DSA private key: {e}")))?;
    let vk = sk.verifying_key().clone();
    Ok(Key::new(
        KeyData {
            private: Some(sk),
            public: vk,
        },
        KeyUsage::Sign,
    ))
}

/// Load a DSA public key from a PEM-encoded SubjectPublicKeyInfo (`-----BEGIN PUBLIC KEY-----`).
pub fn load_spki_pem(pem_data: &[u8]) -> Result<Key, Error> {
    let (label, der_bytes) = decode_pem(pem_data)?;
    if label != "PUBLIC KEY" {
        return Err(Error::Key(format!("expected PUBLIC KEY PEM label, got: {label}")));
    }
    load_spki_der(&der_bytes)
}

/// Load a DSA public key from raw SubjectPublicKeyInfo DER bytes.
pub fn load_spki_der(spki_der: &[u8]) -> Result<Key, Error> {
    use spki::DecodePublicKey;
    let vk = dsa::VerifyingKey::from_public_key_der(spki_der)
        .map_err(|e| Error::Key(format!("not a DSA public key: {e}")))?;
    Ok(Key::new(
        KeyData {
            private: None,
            public: vk,
        },
        KeyUsage::Verify,
    ))
}

/// Load the DSA public key from a PEM-encoded X.509 certificate.
pub fn load_x509_cert_pem(pem_data: &[u8]) -> Result<Key, Error> {
    DsaCertificate::from_pem(pem_data).map(DsaCertificate::into_key)
}

/// Load the DSA public key from a DER-encoded X.509 certificate.
pub fn load_x509_cert_der(data: &[u8]) -> Result<Key, Error> {
    DsaCertificate::from_der(data).map(DsaCertificate::into_key)
}

/// Auto-detect key format from PEM data: PKCS#8 private key, SPKI public
/// key or X.509 certificate.
pub fn load_pem_auto(pem_data: &[u8]) -> Result<Key, Error> {
    let (label, der_bytes) = decode_pem(pem_data)?;
    match label.as_str() {
        "PRIVATE KEY" => load_dsa_private_der(&der_bytes),
        "PUBLIC KEY" => load_spki_der(&der_bytes),
        "CERTIFICATE" => load_x509_cert_der(&der_bytes),
        other => Err(Error::Key(format!("unsupported PEM label: {other}"))),
    }
}

/// Auto-detect key format from DER data.
pub fn load_der_auto(der_bytes: &[u8]) -> Result<Key, Error> {
    if let Ok(key) = load_dsa_private_der(der_bytes) {
        return Ok(key);
    }
    if let Ok(key) = load_spki_der(der_bytes) {
        return Ok(key);
    }
    if let Ok(key) = load_x509_cert_der(der_bytes) {
        return Ok(key);
    }
    Err(Error::Key("unable to auto-detect DER key format".into()))
}

/// Load a key from a file, auto-detecting PEM or DER.
pub fn load_key_file(path: &Path) -> Result<Key, Error> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(e),
    })?;
    debug!(path = %path.display(), "loading key file");
    let result = if looks_like_pem(&data) {
        load_pem_auto(&data)
    } else {
        load_der_auto(&data)
    };
    result.map_err(|e| Error::Key(format!("{}: {e}", path.display())))
}

/// Whether the data is PEM armored rather than raw DER.
pub(crate) fn looks_like_pem(data: &[u8]) -> bool {
    const MARKER: &[u8] = b"-----BEGIN ";
    data.windows(MARKER.len()).any(|w| w == MARKER)
}

/// Decode one PEM block, tolerating surrounding whitespace.
pub(crate) fn decode_pem(pem_data: &[u8]) -> Result<(String, Vec<u8>), Error> {
    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;
    let (label, der_bytes) = der::pem::decode_vec(pem_str.trim().as_bytes())
        .map_err(|e| Error::Key(format!("failed to decode PEM: {e}")))?;
    Ok((label.to_owned(), der_bytes))
}
