//! Data sources feeding the build pipeline.
//!
//! A source produces one [`Layer`]: a mapping from provider identifier to a
//! provider record with an embedded `models` list. Sources are consulted in
//! precedence order, lowest first, and a later layer overrides an earlier one.
//! What a source does to produce its layer (reading a file, replaying a cache
//! of remote API responses, ...) is opaque to the pipeline.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Layer = BTreeMap<String, Value>;

/// Why a source produced nothing. None of these are fatal on their own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The source reads from a cache that has not been populated.
    #[error("no cached data")]
    NoCache,
    /// The source has nothing to contribute.
    #[error("no data")]
    NoData,
    /// Credentials needed to reach the source are missing.
    #[error("no API key")]
    NoApiKey,
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("failed to parse {path}: {detail}")]
    Parse { path: String, detail: String },
    #[error("failed to read {path}: {detail}")]
    Io { path: String, detail: String },
}

impl SourceError {
    pub fn reason(&self) -> &'static str {
        match self {
            SourceError::NoCache => "no_cache",
            SourceError::NoData => "no_data",
            SourceError::NoApiKey => "no_api_key",
            SourceError::Transport(_) => "transport",
            SourceError::Parse { .. } => "parse",
            SourceError::Io { .. } => "io",
        }
    }
}

/// A trait implemented by everything that can contribute a layer.
pub trait Source: Send + Sync {
    /// A short name used in logs and errors.
    fn name(&self) -> &str;

    fn load(&self) -> Result<Layer, SourceError>;
}

impl fmt::Debug for dyn Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({})", self.name())
    }
}

/// The catalog snapshot packaged with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineSource;

const BASELINE: &str = include_str!("../data/baseline.json");

impl Source for BaselineSource {
    fn name(&self) -> &str {
        "baseline"
    }

    fn load(&self) -> Result<Layer, SourceError> {
        serde_json::from_str(BASELINE).map_err(|err| SourceError::Parse {
            path: "baseline".to_string(),
            detail: err.to_string(),
        })
    }
}

/// A layer held in memory: configuration overrides, per-call overrides, tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    name: String,
    layer: Layer,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, layer: Layer) -> StaticSource {
        StaticSource {
            name: name.into(),
            layer,
        }
    }
}

impl Source for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Layer, SourceError> {
        if self.layer.is_empty() {
            return Err(SourceError::NoData);
        }

        Ok(self.layer.clone())
    }
}

/// A single JSON or TOML file holding one layer. The extension picks the
/// format; anything other than `.toml` is read as JSON.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> FileSource {
        let path = path.into();

        FileSource {
            name: format!("file:{}", path.display()),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_toml(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
    }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Layer, SourceError> {
        let display = self.path.display().to_string();

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NoData)
            }
            Err(err) => {
                return Err(SourceError::Io {
                    path: display,
                    detail: err.to_string(),
                })
            }
        };

        let parsed = if self.is_toml() {
            toml::from_str::<Layer>(&raw).map_err(|err| err.to_string())
        } else {
            serde_json::from_str::<Layer>(&raw).map_err(|err| err.to_string())
        };

        parsed.map_err(|detail| SourceError::Parse {
            path: display,
            detail,
        })
    }
}
