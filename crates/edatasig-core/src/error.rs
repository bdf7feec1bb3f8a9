#![forbid(unsafe_code)]

/// Errors produced by the eDataSig crates.
///
/// A failed signature verification is not an error; see
/// `edatasig_dsig::Verification`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("the file contains invalid XML: {0}")]
    MalformedXml(String),

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid document structure: {0}")]
    Structure(String),

    #[error("the eData format is not valid: {errors}")]
    SchemaValidationFailed { errors: String, warnings: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("more than one signature is present")]
    SignatureAmbiguous,

    #[error("unsupported signature: {0}")]
    SignatureUnsupported(String),

    #[error("error while signing: {0}")]
    Signing(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),
}

impl Error {
    /// Collapse any error raised on the signing path into a single
    /// `Signing` error, keeping the original message.
    pub fn into_signing(self) -> Self {
        match self {
            Error::Signing(_) => self,
            other => Error::Signing(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
