#![forbid(unsafe_code)]

//! XML namespace constants used across the workspace.

/// eData exchange content namespace (ASTM E55 WK51651 draft).
pub const EDATA: &str = "http://www.astm.org/E55/03/eDataXchange";

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XML Schema namespace
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // eData elements
    pub const ASTM_EDATA_XCHANGE: &str = "ASTMeDataXchange";
    pub const FILE_INFORMATION: &str = "FileInformation";
    pub const MATERIAL_DATA_GROUP: &str = "MaterialDataGroup";
    pub const MATERIAL_DATA: &str = "MaterialData";

    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const HMAC_OUTPUT_LENGTH: &str = "HMACOutputLength";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";

    // KeyInfo elements
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";

    // DSA elements
    pub const DSA_KEY_VALUE: &str = "DSAKeyValue";
    pub const DSA_P: &str = "P";
    pub const DSA_Q: &str = "Q";
    pub const DSA_G: &str = "G";
    pub const DSA_Y: &str = "Y";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
}
