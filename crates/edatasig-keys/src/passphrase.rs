#![forbid(unsafe_code)]

//! Shared-secret passphrases for HMAC signatures.

use edatasig_core::Error;

/// Rules a passphrase must satisfy before it becomes an HMAC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassphrasePolicy {
    /// Minimum number of characters.
    pub min_len: usize,
}

impl Default for PassphrasePolicy {
    fn default() -> Self {
        Self { min_len: 6 }
    }
}

impl PassphrasePolicy {
    /// Check a passphrase and, when signing, its confirmation.
    pub fn check(&self, passphrase: &str, confirmation: Option<&str>) -> Result<(), Error> {
        if passphrase.chars().count() < self.min_len {
            return Err(Error::Key(format!(
                "the password must be at least {} characters",
                self.min_len
            )));
        }
        if let Some(confirm) = confirmation {
            if confirm != passphrase {
                return Err(Error::Key("the passwords do not match".into()));
            }
        }
        Ok(())
    }

    /// Check the passphrase and derive the HMAC key bytes.
    pub fn derive(&self, passphrase: &str, confirmation: Option<&str>) -> Result<Vec<u8>, Error> {
        self.check(passphrase, confirmation)?;
        Ok(key_bytes(passphrase))
    }
}

/// ASCII encoding of a passphrase; characters outside ASCII become `?`.
pub fn key_bytes(passphrase: &str) -> Vec<u8> {
    passphrase
        .chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_length() {
        let policy = PassphrasePolicy::default();
        assert!(policy.check("12345", None).is_err());
        assert!(policy.check("123456", None).is_ok());
    }

    #[test]
    fn test_confirmation_must_match() {
        let policy = PassphrasePolicy::default();
        assert!(policy.check("secret1", Some("secret2")).is_err());
        assert_eq!(policy.derive("secret1", Some("secret1")).unwrap(), b"secret1");
    }

    #[test]
    fn test_non_ascii_becomes_question_mark() {
        assert_eq!(key_bytes("päss€"), b"p?ss?");
        // Length is counted in characters, not bytes.
        assert!(PassphrasePolicy::default().check("ääääää", None).is_ok());
    }
}
