#![forbid(unsafe_code)]

//! Key management for eData signatures.
//!
//! Loads DSA keys from PKCS#8, SPKI and X.509 (PEM or DER), reads and writes
//! `<DSAKeyValue>`, derives HMAC keys from passphrases and exposes the
//! certificate-store capability used to pick verification keys.

pub mod key;
pub mod keyinfo;
pub mod loader;
pub mod passphrase;
pub mod store;
pub mod x509;

pub use key::{Key, KeyData, KeyUsage};
pub use passphrase::PassphrasePolicy;
pub use store::{CertificateStore, DirectoryStore};
pub use x509::DsaCertificate;
