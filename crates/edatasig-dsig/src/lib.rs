#![forbid(unsafe_code)]

//! The eData signature engine.
//!
//! Locates the single enveloped XML-DSig `<Signature>` of an eData document,
//! creates one with DSA-SHA1 or HMAC-SHA1, and verifies it with an explicit
//! public key, a shared secret or the key embedded in the signature.

pub mod locate;
pub mod sign;
pub mod verify;

pub use locate::{locate, SignatureDescriptor, SignatureState};
pub use sign::{sign_dsa, sign_hmac};
pub use verify::{verify, Verification, VerificationKey, VerificationMode};
