use std::path::PathBuf;
use thiserror::Error;

/// Typed resolution errors.
///
/// All variants except [`ResolveError::InvalidManifest`] are caught by the
/// orchestrator and converted into a `NotFound` outcome. `InvalidManifest`
/// signals that a package's configuration itself is broken, which makes any
/// resolution under that scope meaningless; it is surfaced to the caller.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid module specifier {specifier:?}: {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    #[error("Invalid exports target {target:?} for key {key:?} in {scope}")]
    InvalidExportTarget {
        target: String,
        key: String,
        scope: String,
    },

    #[error("Subpath {subpath:?} is not exported by package at {scope}")]
    SubpathNotExported { subpath: String, scope: String },

    #[error("Import specifier {specifier:?} is not defined in package at {scope}")]
    ImportNotDefined { specifier: String, scope: String },

    #[error("Cannot find package {name:?} imported from {}", importer.display())]
    ModuleNotFound { name: String, importer: PathBuf },

    #[error("Invalid package configuration at {}: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Invalid address {address:?}")]
    InvalidAddress { address: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Whether this error may be swallowed by the orchestrator and reported
    /// as a `NotFound` outcome.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidManifest { .. })
    }

    pub(crate) fn invalid_specifier(specifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.to_string(),
            reason: reason.into(),
        }
    }
}
