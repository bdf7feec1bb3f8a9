#![forbid(unsafe_code)]

//! Core types shared by the eDataSig crates: the error taxonomy, algorithm
//! identifiers, namespace constants and the schema validation outcome.

pub mod algorithm;
pub mod error;
pub mod ns;
pub mod validation;

pub use algorithm::SignatureType;
pub use error::{Error, Result};
pub use validation::{Severity, ValidationOutcome};
