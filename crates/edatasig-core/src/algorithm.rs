#![forbid(unsafe_code)]

//! Algorithm URI constants and the signature-method table.
//!
//! Each constant is the canonical URI string that appears in `Algorithm`
//! attributes of an XML-DSig `<Signature>`.

// ── Canonicalization ─────────────────────────────────────────────────

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";

// ── Digest algorithms ────────────────────────────────────────────────

pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

// ── Signature algorithms ─────────────────────────────────────────────

pub const DSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#dsa-sha1";
pub const HMAC_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#hmac-sha1";

// ── Transform algorithms ─────────────────────────────────────────────

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

// ── Key algorithm OIDs ───────────────────────────────────────────────

/// `id-dsa` from RFC 3279.
pub const DSA_KEY_OID: &str = "1.2.840.10040.4.1";

/// The kind of digital signature carried by an eData document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    /// No signature is present.
    None,
    /// Keyed-hash signature (HMAC over SHA-1) seeded from a shared secret.
    HmacSha1,
    /// Asymmetric DSA signature over SHA-1.
    Dsa,
    /// A signature is present but cannot be used: unknown method,
    /// unparseable structure, or more than one signature.
    Invalid,
}

/// The only place signature-method identifiers are mapped to variants.
const SIGNATURE_METHODS: &[(&str, SignatureType)] = &[
    (DSA_SHA1, SignatureType::Dsa),
    (HMAC_SHA1, SignatureType::HmacSha1),
];

impl SignatureType {
    /// Map a `SignatureMethod/@Algorithm` URI. Anything not in the table
    /// is `Invalid`.
    pub fn from_method_uri(uri: &str) -> Self {
        SIGNATURE_METHODS
            .iter()
            .find(|(u, _)| *u == uri.trim())
            .map(|(_, t)| *t)
            .unwrap_or(SignatureType::Invalid)
    }

    /// The `SignatureMethod` URI written when signing with this type.
    pub fn method_uri(&self) -> Option<&'static str> {
        SIGNATURE_METHODS
            .iter()
            .find(|(_, t)| t == self)
            .map(|(u, _)| *u)
    }
}

impl std::fmt::Display for SignatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureType::None => write!(f, "none"),
            SignatureType::HmacSha1 => write!(f, "HMAC-SHA1"),
            SignatureType::Dsa => write!(f, "DSA"),
            SignatureType::Invalid => write!(f, "invalid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_methods() {
        assert_eq!(SignatureType::from_method_uri(DSA_SHA1), SignatureType::Dsa);
        assert_eq!(
            SignatureType::from_method_uri(HMAC_SHA1),
            SignatureType::HmacSha1
        );
    }

    #[test]
    fn test_unknown_method_is_invalid() {
        assert_eq!(
            SignatureType::from_method_uri("http://www.w3.org/2000/09/xmldsig#rsa-sha1"),
            SignatureType::Invalid
        );
        assert_eq!(SignatureType::from_method_uri(""), SignatureType::Invalid);
    }

    #[test]
    fn test_method_uri_round_trip() {
        assert_eq!(SignatureType::Dsa.method_uri(), Some(DSA_SHA1));
        assert_eq!(SignatureType::HmacSha1.method_uri(), Some(HMAC_SHA1));
        assert_eq!(SignatureType::Invalid.method_uri(), None);
        assert_eq!(SignatureType::None.method_uri(), None);
    }
}
