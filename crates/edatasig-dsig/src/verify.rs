#![forbid(unsafe_code)]

//! Signature verification.
//!
//! Processing order:
//! 1. Locate the single `<Signature>` under `FileInformation`
//! 2. Check that the key material fits the signature method
//! 3. Resolve the reference, run its transforms, compute and compare the digest
//! 4. Canonicalize `<SignedInfo>` and check `<SignatureValue>`
//!
//! Failures of any kind end in a `false` [`Verification`] with a diagnostic.

use edatasig_c14n::C14nMode;
use edatasig_core::{Error, SignatureType};
use edatasig_crypto::{digest, sign::constant_time_eq, SigningKey};
use edatasig_transforms::{resolve_reference, TransformData, TransformPipeline};
use edatasig_xml::{EdataDocument, NodeSet};
use roxmltree::Document;
use tracing::{debug, info, warn};

use crate::locate::{locate_xml, SignatureDescriptor, SignatureState};

const HMAC_SHA1_BITS: u32 = 160;

/// Key material to verify with.
pub enum VerificationKey {
    /// An explicit DSA public key, e.g. from a certificate.
    PublicKey(dsa::VerifyingKey),
    /// HMAC key bytes derived from a shared passphrase.
    SharedSecret(Vec<u8>),
    /// The DSA key carried in the signature's own `KeyInfo`.
    Embedded,
}

impl VerificationKey {
    pub fn mode(&self) -> VerificationMode {
        match self {
            VerificationKey::PublicKey(_) => VerificationMode::PublicKey,
            VerificationKey::SharedSecret(_) => VerificationMode::SharedSecret,
            VerificationKey::Embedded => VerificationMode::Embedded,
        }
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationKey::PublicKey(_) => write!(f, "VerificationKey::PublicKey(..)"),
            VerificationKey::SharedSecret(k) => {
                write!(f, "VerificationKey::SharedSecret({} bytes)", k.len())
            }
            VerificationKey::Embedded => write!(f, "VerificationKey::Embedded"),
        }
    }
}

/// Which kind of key a verification ran with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    PublicKey,
    SharedSecret,
    Embedded,
}

impl std::fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationMode::PublicKey => write!(f, "public key"),
            VerificationMode::SharedSecret => write!(f, "shared secret"),
            VerificationMode::Embedded => write!(f, "embedded key"),
        }
    }
}

/// Outcome of a verification. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    pub mode: VerificationMode,
    pub signature_type: SignatureType,
    /// Why the signature did not verify.
    pub diagnostic: Option<String>,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Result of checking one located signature.
#[derive(Debug)]
enum VerifyResult {
    Valid,
    Invalid { reason: String },
}

/// Verify the signature of `doc` with `key`.
pub fn verify(doc: &EdataDocument, key: &VerificationKey) -> Verification {
    let mode = key.mode();
    let failed = |signature_type, reason: String| {
        warn!(%mode, reason = %reason, "signature not verified");
        Verification {
            valid: false,
            mode,
            signature_type,
            diagnostic: Some(reason),
        }
    };

    let xml = match doc.parse_doc() {
        Ok(xml) => xml,
        Err(e) => return failed(SignatureType::None, e.to_string()),
    };
    let descriptor = match locate_xml(&xml) {
        SignatureState::Absent => {
            return failed(SignatureType::None, "the document is not signed".into())
        }
        SignatureState::Ambiguous => {
            return failed(SignatureType::Invalid, Error::SignatureAmbiguous.to_string())
        }
        SignatureState::Found(d) => d,
    };
    if let Some(problem) = &descriptor.problem {
        return failed(descriptor.signature_type, problem.clone());
    }

    info!(%mode, signature = %descriptor.signature_type, "verifying signature");
    match check(&xml, &descriptor, key) {
        Ok(VerifyResult::Valid) => {
            info!(%mode, "signature is valid");
            Verification {
                valid: true,
                mode,
                signature_type: descriptor.signature_type,
                diagnostic: None,
            }
        }
        Ok(VerifyResult::Invalid { reason }) => failed(descriptor.signature_type, reason),
        Err(e) => failed(descriptor.signature_type, e.to_string()),
    }
}

/// Pick the signing key for the descriptor's method, or explain why none
/// fits.
fn select_key(d: &SignatureDescriptor, key: &VerificationKey) -> Result<SigningKey, String> {
    match (key, d.signature_type) {
        (VerificationKey::PublicKey(vk), SignatureType::Dsa) => Ok(SigningKey::DsaPublic(vk.clone())),
        (VerificationKey::SharedSecret(secret), SignatureType::HmacSha1) => {
            if secret.is_empty() {
                Err("the shared secret is empty".into())
            } else {
                Ok(SigningKey::Hmac(secret.clone()))
            }
        }
        (VerificationKey::Embedded, SignatureType::Dsa) => match (&d.embedded_key, &d.embedded_key_error) {
            (Some(embedded), _) => Ok(embedded.to_signing_key()),
            (None, Some(e)) => Err(format!("the embedded key cannot be read: {e}")),
            (None, None) => Err("the signature carries no embedded key".into()),
        },
        (key, signature_type) => Err(format!(
            "the {} does not fit a {signature_type} signature",
            key.mode()
        )),
    }
}

fn check(
    xml: &Document<'_>,
    d: &SignatureDescriptor,
    key: &VerificationKey,
) -> Result<VerifyResult, Error> {
    let signing_key = match select_key(d, key) {
        Ok(k) => k,
        Err(reason) => return Ok(VerifyResult::Invalid { reason }),
    };
    if let Some(bits) = d.hmac_output_length {
        if bits != HMAC_SHA1_BITS {
            return Ok(VerifyResult::Invalid {
                reason: format!("truncated HMACOutputLength {bits} is not accepted"),
            });
        }
    }
    let c14n_mode = C14nMode::from_uri(&d.c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {}", d.c14n_uri)))?;

    // Reference digest
    let node_set = resolve_reference(&d.reference_uri, xml)?;
    let pipeline = TransformPipeline::from_uris(d.transforms.as_slice(), d.signature)?;
    let input = pipeline.digest_input(TransformData::Xml { doc: xml, node_set })?;
    let computed = digest::digest(&d.digest_method, &input)?;
    debug!(bytes = input.len(), transforms = pipeline.len(), "reference digest computed");
    if !constant_time_eq(&computed, &d.digest_value) {
        return Ok(VerifyResult::Invalid {
            reason: "the reference digest does not match".into(),
        });
    }

    // SignedInfo
    let signed_info = d
        .signed_info
        .and_then(|id| xml.get_node(id))
        .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;
    let node_set = if c14n_mode.with_comments() {
        NodeSet::tree_with_comments(signed_info)
    } else {
        NodeSet::tree_without_comments(signed_info)
    };
    let canonical = edatasig_c14n::canonicalize_doc(xml, c14n_mode, Some(&node_set))?;

    let algorithm = edatasig_crypto::sign::from_uri(&d.method_uri)?;
    if algorithm.verify(&signing_key, &canonical, &d.signature_value)? {
        Ok(VerifyResult::Valid)
    } else {
        Ok(VerifyResult::Invalid {
            reason: "the signature value does not match".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::sign_document;
    use edatasig_keys::keyinfo;
    use edatasig_keys::loader::{load_dsa_private_pem, load_spki_pem};

    const EMPTY: &str = include_str!("../../../test-data/edata-empty.xml");
    const SEVERAL: &str = include_str!("../../../test-data/edata-several.xml");
    const SIGNER_KEY: &[u8] = include_bytes!("../../../test-data/keys/signer-key.pem");
    const OTHER_KEY: &[u8] = include_bytes!("../../../test-data/keys/other-key.pem");
    const SIGNER_PUB: &[u8] = include_bytes!("../../../test-data/keys/signer-pub.pem");
    const OTHER_PUB: &[u8] = include_bytes!("../../../test-data/keys/other-pub.pem");

    fn private(pem: &[u8]) -> dsa::SigningKey {
        load_dsa_private_pem(pem)
            .unwrap()
            .dsa_private_key()
            .unwrap()
            .clone()
    }

    fn public(pem: &[u8]) -> dsa::VerifyingKey {
        load_spki_pem(pem).unwrap().dsa_public_key().clone()
    }

    fn sign_with_dsa(text: &str, pem: &[u8]) -> EdataDocument {
        let doc = EdataDocument::from_text(text.into()).unwrap();
        let key = private(pem);
        let key_info = keyinfo::write_dsa_key_info(key.verifying_key());
        sign_document(&doc, &SigningKey::Dsa(key), Some(&key_info)).unwrap()
    }

    fn sign_with_secret(text: &str, secret: &[u8]) -> EdataDocument {
        let doc = EdataDocument::from_text(text.into()).unwrap();
        sign_document(&doc, &SigningKey::Hmac(secret.to_vec()), None).unwrap()
    }

    fn edit(doc: &EdataDocument, from: &str, to: &str) -> EdataDocument {
        assert!(doc.text().contains(from), "missing {from}");
        EdataDocument::from_text(doc.text().replacen(from, to, 1)).unwrap()
    }

    #[test]
    fn test_dsa_round_trip() {
        for text in [EMPTY, SEVERAL] {
            let signed = sign_with_dsa(text, SIGNER_KEY);
            let result = verify(&signed, &VerificationKey::PublicKey(public(SIGNER_PUB)));
            assert!(result.is_valid(), "{:?}", result.diagnostic);
            assert_eq!(result.mode, VerificationMode::PublicKey);
            assert_eq!(result.signature_type, SignatureType::Dsa);
        }
    }

    #[test]
    fn test_hmac_round_trip() {
        for text in [EMPTY, SEVERAL] {
            let signed = sign_with_secret(text, b"secret");
            let result = verify(&signed, &VerificationKey::SharedSecret(b"secret".to_vec()));
            assert!(result.is_valid(), "{:?}", result.diagnostic);
            assert_eq!(result.signature_type, SignatureType::HmacSha1);
        }
    }

    #[test]
    fn test_embedded_round_trip() {
        let signed = sign_with_dsa(SEVERAL, SIGNER_KEY);
        let result = verify(&signed, &VerificationKey::Embedded);
        assert!(result.is_valid(), "{:?}", result.diagnostic);
        assert_eq!(result.mode, VerificationMode::Embedded);
    }

    #[test]
    fn test_tampered_content() {
        let signed = sign_with_dsa(EMPTY, SIGNER_KEY);
        let tampered = edit(&signed, "EDX-0001", "EDX-0002");
        let result = verify(&tampered, &VerificationKey::PublicKey(public(SIGNER_PUB)));
        assert!(!result.is_valid());
        assert!(result.diagnostic.unwrap().contains("digest"));

        let signed = sign_with_secret(EMPTY, b"secret");
        let tampered = edit(&signed, "Example Test", "Example Best");
        assert!(!verify(&tampered, &VerificationKey::SharedSecret(b"secret".to_vec())).is_valid());
    }

    #[test]
    fn test_tampered_signed_info() {
        let signed = sign_with_secret(EMPTY, b"secret");
        let tampered = edit(&signed, "<Transforms>", "<Transforms >");
        // Same canonical form, still valid.
        assert!(verify(&tampered, &VerificationKey::SharedSecret(b"secret".to_vec())).is_valid());
        let tampered = edit(&signed, "<SignatureMethod ", "<SignatureMethod Id=\"m\" ");
        assert!(!verify(&tampered, &VerificationKey::SharedSecret(b"secret".to_vec())).is_valid());
    }

    #[test]
    fn test_wrong_key_is_false() {
        let signed = sign_with_dsa(SEVERAL, SIGNER_KEY);
        let result = verify(&signed, &VerificationKey::PublicKey(public(OTHER_PUB)));
        assert!(!result.is_valid());
        assert_eq!(
            result.diagnostic.as_deref(),
            Some("the signature value does not match")
        );

        let signed = sign_with_secret(SEVERAL, b"secret");
        let result = verify(&signed, &VerificationKey::SharedSecret(b"secreT".to_vec()));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_key_must_fit_method() {
        let hmac = sign_with_secret(EMPTY, b"secret");
        let result = verify(&hmac, &VerificationKey::PublicKey(public(SIGNER_PUB)));
        assert!(!result.is_valid());
        assert_eq!(result.signature_type, SignatureType::HmacSha1);
        assert!(!verify(&hmac, &VerificationKey::Embedded).is_valid());

        let dsa = sign_with_dsa(EMPTY, SIGNER_KEY);
        assert!(!verify(&dsa, &VerificationKey::SharedSecret(b"secret".to_vec())).is_valid());
    }

    #[test]
    fn test_embedded_key_replaced() {
        // Re-sign with a fresh key pair: the embedded key verifies, the
        // original signer's key does not.
        let signed = sign_with_dsa(SEVERAL, OTHER_KEY);
        assert!(verify(&signed, &VerificationKey::Embedded).is_valid());
        assert!(!verify(&signed, &VerificationKey::PublicKey(public(SIGNER_PUB))).is_valid());
    }

    #[test]
    fn test_embedded_without_key_info() {
        let signed = sign_with_dsa(EMPTY, SIGNER_KEY);
        let start = signed.text().find("<KeyInfo>").unwrap();
        let end = signed.text().find("</KeyInfo>").unwrap() + "</KeyInfo>".len();
        let stripped = edit(&signed, &signed.text()[start..end], "");
        let result = verify(&stripped, &VerificationKey::Embedded);
        assert!(!result.is_valid());
        assert!(result.diagnostic.unwrap().contains("no embedded key"));
        assert!(verify(&stripped, &VerificationKey::PublicKey(public(SIGNER_PUB))).is_valid());
    }

    #[test]
    fn test_absent_and_ambiguous() {
        let unsigned = EdataDocument::from_text(SEVERAL.into()).unwrap();
        let result = verify(&unsigned, &VerificationKey::Embedded);
        assert!(!result.is_valid());
        assert_eq!(result.signature_type, SignatureType::None);

        let signed = sign_with_secret(EMPTY, b"secret");
        let start = signed.text().find("<Signature ").unwrap();
        let end = signed.text().find("</Signature>").unwrap() + "</Signature>".len();
        let twice = signed.text()[start..end].repeat(2);
        let doubled = edit(&signed, &signed.text()[start..end], &twice);
        let result = verify(&doubled, &VerificationKey::SharedSecret(b"secret".to_vec()));
        assert!(!result.is_valid());
        assert_eq!(result.signature_type, SignatureType::Invalid);
    }

    #[test]
    fn test_truncated_hmac_rejected() {
        let signed = sign_with_secret(EMPTY, b"secret");
        let truncated = edit(
            &signed,
            "#hmac-sha1\" />",
            "#hmac-sha1\"><HMACOutputLength>80</HMACOutputLength></SignatureMethod>",
        );
        let result = verify(&truncated, &VerificationKey::SharedSecret(b"secret".to_vec()));
        assert!(!result.is_valid());
        assert!(result.diagnostic.unwrap().contains("HMACOutputLength"));
    }

    #[test]
    fn test_unsupported_digest_is_false() {
        let signed = sign_with_secret(EMPTY, b"secret");
        let other = edit(&signed, "xmldsig#sha1", "xmldsig-more#md5");
        let result = verify(&other, &VerificationKey::SharedSecret(b"secret".to_vec()));
        assert!(!result.is_valid());
        assert!(result.diagnostic.unwrap().contains("digest algorithm"));
    }
}
