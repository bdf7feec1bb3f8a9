#![forbid(unsafe_code)]

//! Certificate stores.
//!
//! The signature engine never enumerates certificates itself. Callers inject a
//! [`CertificateStore`] that offers candidate DSA certificates and decides
//! whether one chains to a trust anchor.

use std::path::{Path, PathBuf};

use edatasig_core::Error;
use tracing::{debug, warn};

use crate::x509::{self, DsaCertificate};

/// Source of verification certificates and trust decisions.
pub trait CertificateStore {
    /// Certificates that are valid now and whose key algorithm is DSA.
    fn candidate_keys(&self) -> Result<Vec<DsaCertificate>, Error>;

    /// Whether `cert` chains to a trust anchor known to the store.
    fn verify_trust_chain(&self, cert: &DsaCertificate) -> bool;
}

const CERT_EXTENSIONS: &[&str] = &["pem", "crt", "cer", "der"];
const TRUSTED_DIR: &str = "trusted";

/// A directory of certificate files.
///
/// Candidates are the `*.pem`, `*.crt`, `*.cer` and `*.der` files directly in
/// the directory. A certificate is trusted when it is time-valid and
/// byte-identical to a certificate in the `trusted/` subdirectory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    at: Option<der::DateTime>,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            at: None,
        }
    }

    /// Evaluate validity at a fixed time instead of now.
    pub fn with_time(mut self, at: der::DateTime) -> Self {
        self.at = Some(at);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn time(&self) -> Result<der::DateTime, Error> {
        match self.at {
            Some(t) => Ok(t),
            None => x509::now(),
        }
    }

    fn trusted_certificates(&self) -> Vec<DsaCertificate> {
        let dir = self.root.join(TRUSTED_DIR);
        if !dir.is_dir() {
            return Vec::new();
        }
        read_certificates(&dir).unwrap_or_default()
    }
}

impl CertificateStore for DirectoryStore {
    fn candidate_keys(&self) -> Result<Vec<DsaCertificate>, Error> {
        let now = self.time()?;
        let certs: Vec<_> = read_certificates(&self.root)?
            .into_iter()
            .filter(|c| c.is_valid_at(&now))
            .collect();
        debug!(count = certs.len(), dir = %self.root.display(), "candidate certificates");
        Ok(certs)
    }

    fn verify_trust_chain(&self, cert: &DsaCertificate) -> bool {
        let now = match self.time() {
            Ok(t) => t,
            Err(e) => {
                warn!("cannot determine current time: {e}");
                return false;
            }
        };
        if !cert.is_valid_at(&now) {
            return false;
        }
        self.trusted_certificates()
            .iter()
            .any(|anchor| anchor.der() == cert.der())
    }
}

/// Read every parseable DSA certificate in `dir` (not recursive), sorted by
/// file name. Unreadable or non-DSA files are skipped.
fn read_certificates(dir: &Path) -> Result<Vec<DsaCertificate>, Error> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_cert_extension(p))
        .collect();
    paths.sort();

    let mut certs = Vec::new();
    for path in paths {
        match DsaCertificate::load(&path) {
            Ok(cert) => certs.push(cert),
            Err(e) => debug!(path = %path.display(), "skipping certificate: {e}"),
        }
    }
    Ok(certs)
}

fn has_cert_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CERT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
