//! Error types for the dtrust core
//!
//! These never escape a collector: they are converted into diagnostics at the
//! collector boundary. They are public so that callers using the lower level
//! helpers directly (`rootfs`, `WeightConfig::from_file`) can match on them.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while resolving a path inside a target root filesystem
#[derive(Error, Debug)]
pub enum RootfsError {
    /// Symlink chain longer than the resolution limit
    #[error("Too many levels of symbolic links while resolving {path}")]
    SymlinkLoop { path: PathBuf },

    /// A component of the path does not exist inside the rootfs
    #[error("Path not found inside rootfs: {path}")]
    NotFound { path: PathBuf },

    /// Any other I/O failure while inspecting a component
    #[error("Failed to inspect {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while loading a scoring weight configuration
#[derive(Error, Debug)]
pub enum WeightsError {
    #[error("Failed to read weight configuration from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse weight configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}
