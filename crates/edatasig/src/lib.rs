#![forbid(unsafe_code)]

//! eDataSig: digital signatures for ASTM eData exchange documents.
//!
//! Re-exports the component crates and adds the inspection workflow used by
//! the `edatasig` binary.

pub use edatasig_c14n as c14n;
pub use edatasig_core as core;
pub use edatasig_crypto as crypto;
pub use edatasig_dsig as dsig;
pub use edatasig_keys as keys;
pub use edatasig_schema as schema;
pub use edatasig_transforms as transforms;
pub use edatasig_xml as xml;

pub mod config;
pub mod logging;
pub mod workflow;

pub use config::SchemaSource;
pub use workflow::{inspect, load_validated, Report, VerifyInput};
