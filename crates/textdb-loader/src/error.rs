use std::path::PathBuf;
use textdb_core::{LookupError, RemapError, SubstError, TimestampError, ValidityError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid validity log {}: {source}", .path.display())]
    Validity {
        path: PathBuf,
        #[source]
        source: ValidityError,
    },

    #[error("multiple validity files in {}: {files:?}", .dir.display())]
    MultipleValidityFiles { dir: PathBuf, files: Vec<PathBuf> },

    #[error("variable substitution failed in {}: {source}", .path.display())]
    Subst {
        path: PathBuf,
        #[source]
        source: SubstError,
    },

    #[error("'{0}' is not a directory in the database")]
    NotABranch(String),

    #[error("'{0}' has no validity log")]
    NoValidityLog(String),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error(transparent)]
    Remap(#[from] RemapError),
}
