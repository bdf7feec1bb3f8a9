#![forbid(unsafe_code)]

//! Signature algorithm implementations (DSA-SHA1, HMAC-SHA1).

use edatasig_core::{algorithm, Error};
use sha1::{Digest, Sha1};

/// Key material for signature operations.
pub enum SigningKey {
    Dsa(dsa::SigningKey),
    DsaPublic(dsa::VerifyingKey),
    Hmac(Vec<u8>),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SigningKey::Dsa(_) => write!(f, "SigningKey::Dsa(..)"),
            SigningKey::DsaPublic(_) => write!(f, "SigningKey::DsaPublic(..)"),
            SigningKey::Hmac(k) => write!(f, "SigningKey::Hmac({} bytes)", k.len()),
        }
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri.trim() {
        algorithm::DSA_SHA1 => Ok(Box::new(DsaSha1)),
        algorithm::HMAC_SHA1 => Ok(Box::new(HmacSha1)),
        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

// ── DSA-SHA1 ─────────────────────────────────────────────────────────

/// DSA over SHA-1. The XML-DSig value is `r || s`, each left-padded to the
/// byte length of the subgroup order `q` (20 bytes for 160-bit `q`).
struct DsaSha1;

fn q_len(components: &dsa::Components) -> usize {
    components.q().to_bytes_be().len()
}

/// Convert a DSA signature to the XML-DSig `r || s` form.
pub fn dsa_to_xmldsig(sig: &dsa::Signature, width: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(width * 2);
    for part in [sig.r(), sig.s()] {
        let bytes = part.to_bytes_be();
        if bytes.len() > width {
            return Err(Error::Crypto(format!(
                "DSA signature component is {} bytes, expected at most {width}",
                bytes.len()
            )));
        }
        out.resize(out.len() + width - bytes.len(), 0);
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

/// Convert XML-DSig `r || s` to a typed DSA signature.
pub fn xmldsig_to_dsa(rs: &[u8], width: usize) -> Result<dsa::Signature, Error> {
    if rs.len() != width * 2 {
        return Err(Error::Crypto(format!(
            "DSA signature must be {} bytes, got {}",
            width * 2,
            rs.len()
        )));
    }
    let r = dsa::BigUint::from_bytes_be(&rs[..width]);
    let s = dsa::BigUint::from_bytes_be(&rs[width..]);
    dsa::Signature::from_components(r, s)
        .map_err(|e| Error::Crypto(format!("invalid DSA signature: {e}")))
}

impl SignatureAlgorithm for DsaSha1 {
    fn uri(&self) -> &'static str {
        algorithm::DSA_SHA1
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::DigestSigner;
        let SigningKey::Dsa(sk) = key else {
            return Err(Error::Key("DSA private key required".into()));
        };
        let sig: dsa::Signature = sk
            .try_sign_digest(Sha1::new_with_prefix(data))
            .map_err(|e| Error::Crypto(format!("DSA signing failed: {e}")))?;
        dsa_to_xmldsig(&sig, q_len(sk.verifying_key().components()))
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::DigestVerifier;
        let vk = match key {
            SigningKey::Dsa(sk) => sk.verifying_key(),
            SigningKey::DsaPublic(vk) => vk,
            SigningKey::Hmac(_) => return Err(Error::Key("DSA key required".into())),
        };
        let sig = xmldsig_to_dsa(sig_bytes, q_len(vk.components()))?;
        Ok(vk.verify_digest(Sha1::new_with_prefix(data), &sig).is_ok())
    }
}

// ── HMAC-SHA1 ────────────────────────────────────────────────────────

struct HmacSha1;

impl SignatureAlgorithm for HmacSha1 {
    fn uri(&self) -> &'static str {
        algorithm::HMAC_SHA1
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        compute_hmac(key_bytes, data)
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let SigningKey::Hmac(key_bytes) = key else {
            return Err(Error::Key("HMAC key required".into()));
        };
        let expected = compute_hmac(key_bytes, data)?;
        Ok(constant_time_eq(&expected, sig_bytes))
    }
}

fn compute_hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
    use hmac::{Hmac, Mac};
    let mut mac = <Hmac<Sha1>>::new_from_slice(key)
        .map_err(|e| Error::Key(format!("invalid HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Compare two byte strings without early exit. Lengths must match.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::DecodePrivateKey;

    const SIGNER_KEY: &str = include_str!("../../../test-data/keys/signer-key.pem");
    const OTHER_KEY: &str = include_str!("../../../test-data/keys/other-key.pem");

    fn dsa_key(pem: &str) -> dsa::SigningKey {
        dsa::SigningKey::from_pkcs8_pem(pem).unwrap()
    }

    #[test]
    fn test_dsa_sign_verify() {
        let key = SigningKey::Dsa(dsa_key(SIGNER_KEY));
        let alg = from_uri(algorithm::DSA_SHA1).unwrap();
        let sig = alg.sign(&key, b"signed info").unwrap();
        assert_eq!(sig.len(), 40);
        assert!(alg.verify(&key, b"signed info", &sig).unwrap());
        assert!(!alg.verify(&key, b"signed inf0", &sig).unwrap());
    }

    #[test]
    fn test_dsa_verify_with_public_key_only() {
        let sk = dsa_key(SIGNER_KEY);
        let public = SigningKey::DsaPublic(sk.verifying_key().clone());
        let alg = from_uri(algorithm::DSA_SHA1).unwrap();
        let sig = alg.sign(&SigningKey::Dsa(sk), b"data").unwrap();
        assert!(alg.verify(&public, b"data", &sig).unwrap());
    }

    #[test]
    fn test_dsa_wrong_key() {
        let alg = from_uri(algorithm::DSA_SHA1).unwrap();
        let sig = alg
            .sign(&SigningKey::Dsa(dsa_key(SIGNER_KEY)), b"data")
            .unwrap();
        let other = SigningKey::Dsa(dsa_key(OTHER_KEY));
        assert!(!alg.verify(&other, b"data", &sig).unwrap());
    }

    #[test]
    fn test_dsa_bad_length_is_error() {
        let alg = from_uri(algorithm::DSA_SHA1).unwrap();
        let key = SigningKey::Dsa(dsa_key(SIGNER_KEY));
        assert!(alg.verify(&key, b"data", &[1u8; 39]).is_err());
    }

    #[test]
    fn test_dsa_rs_padding() {
        let r = dsa::BigUint::from_bytes_be(&[0x01, 0x02]);
        let s = dsa::BigUint::from_bytes_be(&[0x03]);
        let sig = dsa::Signature::from_components(r, s).unwrap();
        let rs = dsa_to_xmldsig(&sig, 20).unwrap();
        assert_eq!(rs.len(), 40);
        assert_eq!(&rs[18..20], &[0x01, 0x02]);
        assert_eq!(rs[39], 0x03);
        assert!(rs[..18].iter().all(|b| *b == 0));
        let back = xmldsig_to_dsa(&rs, 20).unwrap();
        assert_eq!(back.r(), sig.r());
        assert_eq!(back.s(), sig.s());
    }

    #[test]
    fn test_hmac_sha1_known_answer() {
        // RFC 2202 test case 2
        let key = SigningKey::Hmac(b"Jefe".to_vec());
        let alg = from_uri(algorithm::HMAC_SHA1).unwrap();
        let mac = alg.sign(&key, b"what do ya want for nothing?").unwrap();
        let hex: String = mac.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
        assert!(alg.verify(&key, b"what do ya want for nothing?", &mac).unwrap());
    }

    #[test]
    fn test_hmac_rejects_truncated_value() {
        let key = SigningKey::Hmac(b"secret".to_vec());
        let alg = from_uri(algorithm::HMAC_SHA1).unwrap();
        let mac = alg.sign(&key, b"data").unwrap();
        assert!(!alg.verify(&key, b"data", &mac[..10]).unwrap());
    }

    #[test]
    fn test_key_type_mismatch() {
        let alg = from_uri(algorithm::HMAC_SHA1).unwrap();
        let key = SigningKey::Dsa(dsa_key(SIGNER_KEY));
        assert!(matches!(alg.sign(&key, b"x"), Err(Error::Key(_))));
    }

    #[test]
    fn test_unknown_uri() {
        assert!(from_uri("http://www.w3.org/2000/09/xmldsig#rsa-sha1").is_err());
    }
}
