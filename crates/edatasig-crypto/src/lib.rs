#![forbid(unsafe_code)]

//! Cryptographic algorithms for eData signatures: SHA-1/SHA-256 digests,
//! DSA over SHA-1 and HMAC-SHA1.

pub mod digest;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey};
