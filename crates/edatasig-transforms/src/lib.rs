#![forbid(unsafe_code)]

//! Transform pipeline for eData signature references.
//!
//! Implements the transform chain model from XML-DSig: a reference selects
//! a node set, and its transforms are applied in order until the data is
//! an octet stream ready for digesting.

pub mod enveloped;
pub mod pipeline;
pub mod uri;

pub use enveloped::EnvelopedSignatureTransform;
pub use pipeline::{C14nTransform, Transform, TransformData, TransformPipeline};
pub use uri::resolve_reference;
