#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]

//! Module specifier resolution for package-based JavaScript projects.
//!
//! Maps an import specifier, as written in a source file, to the concrete
//! file it refers to: package-scope discovery, conditional `exports` and
//! `imports` maps, import-map overrides, legacy manifest fields with
//! browser-field remapping, and optional extension/index probing with
//! case-sensitivity verification.

pub mod error;
pub mod exports;
pub mod importmap;
pub mod legacy;
pub mod location;
pub mod manifest;
pub mod probe;
pub mod resolve;
pub mod specifier;

pub use error::ResolveError;
pub use exports::{resolve_package_exports, resolve_package_imports, TargetOutcome};
pub use importmap::ImportMap;
pub use manifest::{
    CachedManifestStore, FsManifestStore, Manifest, ManifestStore, DEPENDENCY_DIR, MANIFEST_FILE,
};
pub use probe::{FileKind, FileProbe, FsProbe, ProbeHit, ProbeOptions, ProbeOutcome};
pub use resolve::{ModuleMode, Origin, Resolution, ResolveOptions, Resolver};
pub use specifier::Specifier;
