//! Errors from loading, validating and saving `config.toml`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn a `config.toml` or the `COMPORT_*` environment into a
/// [`Config`](super::Config), or to write one back.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("comport config not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot read comport config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML or has a key of the wrong type.
    #[error("malformed comport config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode comport config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("cannot write comport config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A key parsed but holds a value no port accepts.
    #[error("[{section}] {key} = {value}: {reason}")]
    OutOfRange {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A `COMPORT_<SECTION>_<KEY>` (or legacy `TEST_*`) override did not parse.
    #[error("environment override {var}={value:?} rejected: {reason}")]
    BadOverride {
        var: String,
        value: String,
        reason: String,
    },

    /// [`ConfigLoader::save`](super::ConfigLoader::save) on a loader built
    /// from defaults.
    #[error("no config file to save to; use save_to with an explicit path")]
    NoConfigPath,
}

impl ConfigError {
    pub fn out_of_range(
        section: &'static str,
        key: &'static str,
        value: impl ToString,
        reason: &'static str,
    ) -> Self {
        Self::OutOfRange {
            section,
            key,
            value: value.to_string(),
            reason,
        }
    }

    /// The `section.key` path of the offending setting, if the error names one.
    pub fn key_path(&self) -> Option<String> {
        match self {
            Self::OutOfRange { section, key, .. } => Some(format!("{section}.{key}")),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
