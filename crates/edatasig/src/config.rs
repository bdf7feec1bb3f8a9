#![forbid(unsafe_code)]

//! Schema location.
//!
//! The schema is looked up, in order: an explicit path, `EDATA_SCHEMA`,
//! `eData.xsd` next to the executable, then `eData.xsd` in the data
//! directory named by `EDATA_DATA_DIR`.

use std::path::{Path, PathBuf};

use edatasig_core::{Error, Result};
use edatasig_schema::Schema;
use tracing::{debug, info};

pub const SCHEMA_FILE: &str = "eData.xsd";
pub const SCHEMA_ENV: &str = "EDATA_SCHEMA";
pub const DATA_DIR_ENV: &str = "EDATA_DATA_DIR";

/// A resolved schema path and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    Explicit(PathBuf),
    Environment(PathBuf),
    /// Installed beside the executable.
    Installed(PathBuf),
    /// Deployed into the data directory.
    DataDirectory(PathBuf),
}

impl SchemaSource {
    /// Resolve against the process environment and executable location.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::resolve_from(
            explicit,
            env_path(SCHEMA_ENV),
            exe_dir.as_deref(),
            env_path(DATA_DIR_ENV).as_deref(),
        )
    }

    /// Resolve from explicitly supplied candidates.
    ///
    /// Explicit and environment paths are taken as given; a missing file is
    /// reported when the schema is loaded. The directory candidates only
    /// count when `eData.xsd` exists in them.
    pub fn resolve_from(
        explicit: Option<&Path>,
        env_schema: Option<PathBuf>,
        exe_dir: Option<&Path>,
        data_dir: Option<&Path>,
    ) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::Explicit(path.to_path_buf()));
        }
        if let Some(path) = env_schema {
            return Ok(Self::Environment(path));
        }
        if let Some(path) = exe_dir.map(|d| d.join(SCHEMA_FILE)).filter(|p| p.is_file()) {
            return Ok(Self::Installed(path));
        }
        if let Some(path) = data_dir.map(|d| d.join(SCHEMA_FILE)).filter(|p| p.is_file()) {
            return Ok(Self::DataDirectory(path));
        }
        Err(Error::Schema(format!(
            "{SCHEMA_FILE} not found; use --schema or set {SCHEMA_ENV}"
        )))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(p) | Self::Environment(p) | Self::Installed(p) | Self::DataDirectory(p) => p,
        }
    }

    /// Load and compile the schema.
    pub fn load(&self) -> Result<Schema> {
        info!(source = %self, "loading eData schema");
        Schema::load(self.path())
    }
}

impl std::fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let origin = match self {
            Self::Explicit(_) => "command line",
            Self::Environment(_) => SCHEMA_ENV,
            Self::Installed(_) => "installation directory",
            Self::DataDirectory(_) => "data directory",
        };
        write!(f, "{} ({origin})", self.path().display())
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    let value = std::env::var_os(name).filter(|v| !v.is_empty())?;
    debug!(variable = name, "using path from environment");
    Some(PathBuf::from(value))
}
