#![forbid(unsafe_code)]

//! The open-file flow: load, validate, count, locate and verify, reported as
//! a list of status lines.

use std::path::Path;

use edatasig_core::{Error, Result, SignatureType};
use edatasig_dsig::{locate, verify, VerificationKey};
use edatasig_keys::passphrase;
use edatasig_keys::{CertificateStore, DsaCertificate};
use edatasig_schema::Schema;
use edatasig_xml::EdataDocument;
use tracing::{debug, info, warn};

pub const OPENING: &str = "Opening file";
pub const INVALID_XML: &str = "The file contains invalid XML";
pub const UNREADABLE: &str = "The file could not be read";
pub const XML_VALID: &str = "The XML format is valid";
pub const FORMAT_VALID: &str = "The eData format is valid";
pub const FORMAT_INVALID: &str = "The eData format is not valid";
pub const NOT_SIGNED: &str = "File has no digital signature";
pub const DSA_SIGNED: &str = "File has a DSA digital signature";
pub const HMAC_SIGNED: &str = "File has HMAC-SHA1 digital signature";
pub const INVALID_SIGNATURE: &str = "File has invalid digital signature";
pub const CHAIN_VALID: &str = "The certificate trust chain is valid";
pub const CHAIN_UNVERIFIED: &str = "The certificate trust chain cannot be verified";
pub const DSA_VALID: &str = "The digital signature is valid.";
pub const DSA_INVALID: &str =
    "Either the digital signature is not valid or the wrong certificate was selected";
pub const NO_CERTIFICATE: &str =
    "The digital signature was not checked because no certificate was selected";
pub const EMBEDDED_VALID: &str = "The digital signature is valid according to the embedded public key but the integrity of the data cannot be guaranteed";
pub const EMBEDDED_INVALID: &str =
    "The digital signature is not valid according to the embedded public key";
pub const HMAC_VALID: &str = "Digital signature is valid";
pub const HMAC_INVALID: &str = "Digital signature is not valid or the password is incorrect";
pub const NO_PASSWORD: &str = "Digital signature was not checked because no password was provided";

/// Key material offered to [`inspect`].
#[derive(Default)]
pub struct VerifyInput<'a> {
    /// The certificate chosen to verify a DSA signature.
    pub certificate: Option<DsaCertificate>,
    /// Store for trust decisions, and for candidates when no certificate
    /// was chosen.
    pub store: Option<&'a dyn CertificateStore>,
    /// Password for an HMAC signature.
    pub password: Option<String>,
}

/// Status lines of one inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub lines: Vec<String>,
    /// Only a valid document with no signature may be signed.
    pub signable: bool,
    pub signature: SignatureType,
}

impl Report {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            signable: false,
            signature: SignatureType::None,
        }
    }

    fn add(&mut self, line: impl Into<String>) {
        let line = line.into();
        info!("{line}");
        self.lines.push(line);
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.iter().any(|l| l == line)
    }
}

/// Load a document and reject it unless it is valid against `schema`.
/// Warnings are logged and recorded on the document.
pub fn load_validated(path: impl AsRef<Path>, schema: &Schema) -> Result<EdataDocument> {
    let mut doc = EdataDocument::load(path)?;
    let outcome = edatasig_schema::validate(&doc, schema);
    for warning in outcome.warnings() {
        warn!("{warning}");
    }
    let outcome = outcome.into_result()?;
    doc.record_validation(outcome);
    Ok(doc)
}

/// Run the open-file flow on `path`. Every outcome, including failure to
/// read the file, is reported as status lines.
pub fn inspect(path: impl AsRef<Path>, schema: &Schema, input: &VerifyInput<'_>) -> Report {
    let path = path.as_ref();
    let mut report = Report::new();
    report.add(format!("{OPENING} {}", path.display()));

    let mut doc = match EdataDocument::load(path) {
        Ok(doc) => doc,
        Err(Error::MalformedXml(e)) => {
            debug!(error = %e, "parse failed");
            report.add(INVALID_XML);
            return report;
        }
        Err(e) => {
            debug!(error = %e, "read failed");
            report.add(UNREADABLE);
            return report;
        }
    };
    report.add(XML_VALID);

    let outcome = edatasig_schema::validate(&doc, schema);
    let valid = outcome.is_valid();
    report.add(if valid { FORMAT_VALID } else { FORMAT_INVALID });
    if !outcome.errors().is_empty() {
        report.add(format!("eData format errors: {}", outcome.error_text()));
    }
    if !outcome.warnings().is_empty() {
        report.add(format!("eData format warnings: {}", outcome.warning_text()));
    }
    doc.record_validation(outcome);
    if !valid {
        return report;
    }

    report.add(format!("{} MaterialData elements found", doc.material_data_count()));

    report.signature = locate(&doc).signature_type();
    match report.signature {
        SignatureType::None => {
            report.add(NOT_SIGNED);
            report.signable = true;
        }
        SignatureType::Dsa => {
            report.add(DSA_SIGNED);
            check_dsa(&doc, input, &mut report);
        }
        SignatureType::HmacSha1 => {
            report.add(HMAC_SIGNED);
            match &input.password {
                Some(password) => {
                    let key = VerificationKey::SharedSecret(passphrase::key_bytes(password));
                    report.add(if verify(&doc, &key).is_valid() {
                        HMAC_VALID
                    } else {
                        HMAC_INVALID
                    });
                }
                None => report.add(NO_PASSWORD),
            }
        }
        SignatureType::Invalid => report.add(INVALID_SIGNATURE),
    }
    report
}

fn check_dsa(doc: &EdataDocument, input: &VerifyInput<'_>, report: &mut Report) {
    let candidate = match (&input.certificate, input.store) {
        (None, Some(store)) => pick_candidate(doc, store),
        _ => None,
    };
    let Some(certificate) = input.certificate.as_ref().or(candidate.as_ref()) else {
        report.add(NO_CERTIFICATE);
        check_embedded(doc, report);
        return;
    };
    debug!(subject = certificate.subject(), "verifying with certificate");

    let trusted = input
        .store
        .map(|store| store.verify_trust_chain(certificate))
        .unwrap_or(false);
    report.add(if trusted { CHAIN_VALID } else { CHAIN_UNVERIFIED });

    let key = VerificationKey::PublicKey(certificate.public_key().clone());
    if verify(doc, &key).is_valid() {
        report.add(DSA_VALID);
    } else {
        report.add(DSA_INVALID);
        check_embedded(doc, report);
    }
}

fn check_embedded(doc: &EdataDocument, report: &mut Report) {
    report.add(if verify(doc, &VerificationKey::Embedded).is_valid() {
        EMBEDDED_VALID
    } else {
        EMBEDDED_INVALID
    });
}

/// The first candidate whose key verifies the signature, else the first
/// candidate.
fn pick_candidate(doc: &EdataDocument, store: &dyn CertificateStore) -> Option<DsaCertificate> {
    let candidates = match store.candidate_keys() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "cannot list candidate certificates");
            return None;
        }
    };
    let matching = candidates.iter().position(|cert| {
        verify(doc, &VerificationKey::PublicKey(cert.public_key().clone())).is_valid()
    });
    candidates.into_iter().nth(matching.unwrap_or(0))
}
