//! Package manifest loading and scope discovery.
//!
//! A package scope is the nearest ancestor directory containing a
//! `package.json`. Scope discovery stops at a `node_modules` boundary so a
//! walk started inside one package never crosses into a dependency's own
//! scope. Manifest access is behind a trait so hosts can inject caching or
//! tests can supply in-memory fakes.

use crate::error::ResolveError;
use crate::location;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// Conventional manifest file name at a package directory root.
pub const MANIFEST_FILE: &str = "package.json";

/// Conventional vendored-dependency directory name.
pub const DEPENDENCY_DIR: &str = "node_modules";

/// Recognized fields of a package manifest.
///
/// `browser`, `exports` and `imports` stay as raw JSON values: they are
/// shape-polymorphic (string | array | object | null) and are classified at
/// the point of use.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default, rename = "jsnext:main", alias = "jsnext")]
    pub jsnext: Option<String>,
    #[serde(default)]
    pub browser: Option<Value>,
    #[serde(default)]
    pub exports: Option<Value>,
    #[serde(default)]
    pub imports: Option<Value>,
    #[serde(default, rename = "type")]
    pub module_type: Option<String>,
}

impl Manifest {
    /// Whether the manifest's `type` field marks this scope as using the
    /// static (ESM) module system by default.
    #[must_use]
    pub fn is_static_scope(&self) -> bool {
        self.module_type.as_deref() == Some("module")
    }
}

/// Shape of a manifest `exports`/`imports` value, read once before
/// resolution.
#[derive(Debug, Clone, Copy)]
pub enum ExportsShape<'a> {
    Array(&'a Vec<Value>),
    Null,
    String(&'a str),
    /// Object whose keys all start with `.` (subpath map).
    RelativeKeys(&'a Map<String, Value>),
    /// Object whose keys are all condition names (no leading `.`).
    ConditionalKeys(&'a Map<String, Value>),
}

/// Classify an `exports`/`imports` value.
///
/// An object mixing keys that start with `.` and keys that do not is a fatal
/// configuration error: the package itself is broken, so this is never
/// reported as a soft `NotFound`.
pub fn classify_exports<'a>(
    value: &'a Value,
    scope: &Url,
) -> Result<ExportsShape<'a>, ResolveError> {
    match value {
        Value::Null => Ok(ExportsShape::Null),
        Value::String(s) => Ok(ExportsShape::String(s)),
        Value::Array(items) => Ok(ExportsShape::Array(items)),
        Value::Object(map) => {
            let mut relative = false;
            let mut conditional = false;
            for key in map.keys() {
                if key.starts_with('.') {
                    relative = true;
                } else {
                    conditional = true;
                }
            }
            if relative && conditional {
                return Err(invalid_manifest(
                    scope,
                    "exports object mixes relative keys and condition keys",
                ));
            }
            if conditional {
                Ok(ExportsShape::ConditionalKeys(map))
            } else {
                Ok(ExportsShape::RelativeKeys(map))
            }
        }
        _ => Err(invalid_manifest(
            scope,
            "exports value must be a string, array, object, or null",
        )),
    }
}

fn invalid_manifest(scope: &Url, reason: &str) -> ResolveError {
    let path = location::to_path(scope)
        .map(|p| p.join(MANIFEST_FILE))
        .unwrap_or_else(|_| PathBuf::from(scope.as_str()));
    ResolveError::InvalidManifest {
        path,
        reason: reason.to_string(),
    }
}

/// Access to package scopes and their manifests.
pub trait ManifestStore {
    /// Walk directory ancestors of `from` and return the first one containing
    /// a manifest file, as a directory URL ending with a separator.
    ///
    /// Returns `None` immediately upon entering a `node_modules` directory,
    /// and `None` at the filesystem root when no manifest was found.
    fn locate_scope(&self, from: &Url) -> Option<Url>;

    /// Read and parse the manifest at a scope directory.
    fn read(&self, scope: &Url) -> Result<Arc<Manifest>, ResolveError>;
}

/// Plain filesystem-backed store. Performs no caching: the algorithm itself
/// is cache-free, and repeated walks for sibling specifiers are expected.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsManifestStore;

impl ManifestStore for FsManifestStore {
    fn locate_scope(&self, from: &Url) -> Option<Url> {
        let start = location::to_path(from).ok()?;
        locate_scope_path(&start).and_then(|dir| location::to_dir_url(&dir).ok())
    }

    fn read(&self, scope: &Url) -> Result<Arc<Manifest>, ResolveError> {
        let path = location::to_path(scope)?.join(MANIFEST_FILE);
        read_manifest_file(&path).map(Arc::new)
    }
}

fn locate_scope_path(start: &Path) -> Option<PathBuf> {
    // A file location starts the walk at its parent directory.
    let mut current = if start.extension().is_some() || start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        if current.file_name().is_some_and(|n| n == DEPENDENCY_DIR) {
            return None;
        }
        if current.join(MANIFEST_FILE).is_file() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn read_manifest_file(path: &Path) -> Result<Manifest, ResolveError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| ResolveError::InvalidManifest {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Manifest store with a stamped parse cache.
///
/// Entries are invalidated when the manifest file's mtime or size changes,
/// so a long-lived host can keep one store across resolutions while editors
/// rewrite manifests underneath it.
#[derive(Debug, Default)]
pub struct CachedManifestStore {
    entries: Mutex<HashMap<PathBuf, CachedManifest>>,
}

#[derive(Debug, Clone)]
struct CachedManifest {
    stamp: ManifestStamp,
    manifest: Arc<Manifest>,
}

/// File stamp for cache invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestStamp {
    pub mtime_ms: Option<u64>,
    pub size: Option<u64>,
}

impl ManifestStamp {
    /// Create a stamp from a path by reading its metadata.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_path(path: &Path) -> Self {
        let Ok(meta) = path.metadata() else {
            return Self::default();
        };
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64);
        Self {
            mtime_ms,
            size: Some(meta.len()),
        }
    }

    /// Check if the stamp still matches the file on disk.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        *self == Self::from_path(path)
    }
}

impl CachedManifestStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ManifestStore for CachedManifestStore {
    fn locate_scope(&self, from: &Url) -> Option<Url> {
        FsManifestStore.locate_scope(from)
    }

    fn read(&self, scope: &Url) -> Result<Arc<Manifest>, ResolveError> {
        let path = location::to_path(scope)?.join(MANIFEST_FILE);

        if let Ok(entries) = self.entries.lock() {
            if let Some(entry) = entries.get(&path) {
                if entry.stamp.matches(&path) {
                    return Ok(Arc::clone(&entry.manifest));
                }
            }
        }

        let stamp = ManifestStamp::from_path(&path);
        let manifest = Arc::new(read_manifest_file(&path)?);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                path,
                CachedManifest {
                    stamp,
                    manifest: Arc::clone(&manifest),
                },
            );
        }
        Ok(manifest)
    }
}
