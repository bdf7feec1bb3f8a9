#![forbid(unsafe_code)]

//! XML Schema validation for eData documents.
//!
//! Compiles the subset of XSD used by the eData schema family into
//! [`Schema`] components and validates instance documents against it,
//! collecting every finding as an error or a warning.

pub mod builtin;
mod compile;
mod facets;
pub mod model;
mod validate;

pub use model::{QName, Schema};
pub use validate::{validate, validate_xml};
