#![forbid(unsafe_code)]

//! X.509 certificates carrying DSA public keys.
//!
//! Parses a certificate, checks its validity period and extracts the DSA
//! verification key. Path building and revocation are out of scope; trust is
//! decided by a [`crate::CertificateStore`].

use der::{Decode, DecodePem, Encode};
use edatasig_core::{algorithm, Error};
use x509_cert::Certificate;

use crate::key::{Key, KeyData, KeyUsage};

/// A parsed certificate whose subject key is DSA.
#[derive(Clone)]
pub struct DsaCertificate {
    der: Vec<u8>,
    subject: String,
    not_before: der::DateTime,
    not_after: der::DateTime,
    public: dsa::VerifyingKey,
}

impl std::fmt::Debug for DsaCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DsaCertificate")
            .field("subject", &self.subject)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

impl DsaCertificate {
    /// Parse a DER-encoded certificate.
    pub fn from_der(data: &[u8]) -> Result<Self, Error> {
        let cert = Certificate::from_der(data)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Self::from_certificate(&cert, data.to_vec())
    }

    /// Parse a PEM-encoded certificate.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self, Error> {
        let pem_str = std::str::from_utf8(pem_data)
            .map_err(|e| Error::Certificate(format!("invalid PEM encoding: {e}")))?;
        let cert = Certificate::from_pem(pem_str.trim())
            .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;
        let der_bytes = cert
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode certificate: {e}")))?;
        Self::from_certificate(&cert, der_bytes)
    }

    /// Parse PEM or DER, whichever the data is.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        if crate::loader::looks_like_pem(data) {
            Self::from_pem(data)
        } else {
            Self::from_der(data)
        }
    }

    /// Load a certificate file (PEM or DER).
    pub fn load(path: &std::path::Path) -> Result<Self, Error> {
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
            _ => Error::Io(e),
        })?;
        Self::from_bytes(&data)
    }

    fn from_certificate(cert: &Certificate, der_bytes: Vec<u8>) -> Result<Self, Error> {
        let tbs = &cert.tbs_certificate;
        let spki = &tbs.subject_public_key_info;
        if !is_dsa_key(cert) {
            return Err(Error::Certificate(format!(
                "the DSA public key cannot be retrieved from the certificate (key algorithm {})",
                spki.algorithm.oid
            )));
        }
        let spki_der = spki
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;
        let public = crate::loader::load_spki_der(&spki_der)
            .map_err(|e| Error::Certificate(format!("the DSA public key cannot be retrieved from the certificate: {e}")))?
            .data
            .public;
        Ok(Self {
            der: der_bytes,
            subject: tbs.subject.to_string(),
            not_before: tbs.validity.not_before.to_date_time(),
            not_after: tbs.validity.not_after.to_date_time(),
            public,
        })
    }

    /// DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The DSA verification key.
    pub fn public_key(&self) -> &dsa::VerifyingKey {
        &self.public
    }

    pub fn not_before(&self) -> der::DateTime {
        self.not_before
    }

    pub fn not_after(&self) -> der::DateTime {
        self.not_after
    }

    /// Whether `at` lies within the validity period.
    pub fn is_valid_at(&self, at: &der::DateTime) -> bool {
        check_time_validity(self, at).is_ok()
    }

    /// Convert into a verification key tagged with the certificate.
    pub fn into_key(self) -> Key {
        let mut key = Key::new(
            KeyData {
                private: None,
                public: self.public,
            },
            KeyUsage::Verify,
        )
        .with_name(self.subject);
        key.certificate = Some(self.der);
        key
    }
}

/// Whether the certificate's subject key algorithm is DSA.
pub fn is_dsa_key(cert: &Certificate) -> bool {
    cert.tbs_certificate
        .subject_public_key_info
        .algorithm
        .oid
        .to_string()
        == algorithm::DSA_KEY_OID
}

/// The current time as a `der::DateTime`.
pub fn now() -> Result<der::DateTime, Error> {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| Error::Certificate(format!("system time error: {e}")))?;
    der::DateTime::from_unix_duration(since_epoch)
        .map_err(|e| Error::Certificate(format!("time conversion error: {e}")))
}

/// Check if a certificate is valid at the given time.
fn check_time_validity(cert: &DsaCertificate, at: &der::DateTime) -> Result<(), Error> {
    if *at < cert.not_before {
        return Err(Error::Certificate(format!(
            "certificate is not yet valid (notBefore: {})",
            cert.not_before
        )));
    }
    if *at > cert.not_after {
        return Err(Error::Certificate(format!(
            "certificate has expired (notAfter: {})",
            cert.not_after
        )));
    }
    Ok(())
}
