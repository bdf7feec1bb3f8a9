#![forbid(unsafe_code)]

//! Key types and data structures.

use edatasig_crypto::sign::SigningKey;

/// Usage flags for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Sign,
    Verify,
}

/// DSA key material. `private` is present only for keys loaded from a
/// private key file.
pub struct KeyData {
    pub private: Option<dsa::SigningKey>,
    pub public: dsa::VerifyingKey,
}

impl std::fmt::Debug for KeyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.private.is_some() {
            write!(f, "DSA private+public key")
        } else {
            write!(f, "DSA public key")
        }
    }
}

/// A named key with associated data.
#[derive(Debug)]
pub struct Key {
    /// Optional name for display, e.g. a certificate subject.
    pub name: Option<String>,
    /// The key data.
    pub data: KeyData,
    /// The intended usage.
    pub usage: KeyUsage,
    /// DER certificate the key came from, if any.
    pub certificate: Option<Vec<u8>>,
}

impl Key {
    /// Create a new key.
    pub fn new(data: KeyData, usage: KeyUsage) -> Self {
        Self {
            name: None,
            data,
            usage,
            certificate: None,
        }
    }

    /// Set the key name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Convert to a `SigningKey` for use with crypto algorithms.
    pub fn to_signing_key(&self) -> SigningKey {
        match &self.data.private {
            Some(sk) => SigningKey::Dsa(sk.clone()),
            None => SigningKey::DsaPublic(self.data.public.clone()),
        }
    }

    /// The DSA public key.
    pub fn dsa_public_key(&self) -> &dsa::VerifyingKey {
        &self.data.public
    }

    /// The DSA private key, if loaded.
    pub fn dsa_private_key(&self) -> Option<&dsa::SigningKey> {
        self.data.private.as_ref()
    }
}
