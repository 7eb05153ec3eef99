//! Top-level resolution orchestration.
//!
//! `Resolver::resolve` classifies the specifier, picks the module-system
//! mode from the importer's extension and manifest `type`, drives the
//! import-map / conditional / legacy resolution chain, and feeds the
//! resulting address through magic probing and case verification.
//!
//! This is the single place where typed resolution errors are swallowed:
//! every recoverable error becomes a logged `NotFound` outcome, so callers
//! only ever see a hard error for broken package configuration.

use crate::error::ResolveError;
use crate::exports::{resolve_package_exports, resolve_package_imports, TargetOutcome};
use crate::importmap::ImportMap;
use crate::legacy::{
    is_ignored, remap_browser_field, resolve_legacy_main, BrowserLookup, BrowserRemap,
};
use crate::location;
use crate::manifest::{FsManifestStore, Manifest, ManifestStore, MANIFEST_FILE, DEPENDENCY_DIR};
use crate::probe::{probe, FileKind, FileProbe, FsProbe, ProbeOptions, ProbeOutcome};
use crate::specifier::Specifier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Bare names that name host-native modules and never reach the filesystem.
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Subpath-bearing builtin module names (`fs/promises` style). These are
/// whole module names, not exports subpaths of the builtins above.
const NODE_BUILTIN_SUBPATHS: &[&str] = &[
    "assert/strict", "dns/promises", "fs/promises", "path/posix", "path/win32",
    "readline/promises", "stream/consumers", "stream/promises", "stream/web",
    "timers/promises", "util/types",
];

fn is_builtin_module(name: &str, subpath: Option<&str>, specifier: &str) -> bool {
    match subpath {
        None => NODE_BUILTINS.contains(&name),
        Some(_) => NODE_BUILTIN_SUBPATHS.contains(&specifier),
    }
}

/// Module system mode of the importing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleMode {
    /// Static (ESM) imports.
    Static,
    /// Dynamic (CJS-style) requires.
    Dynamic,
    /// Plain address references (e.g. from JSON); no manifest machinery.
    PlainAddress,
}

/// Which strategy produced a found address. Diagnostic only; never affects
/// correctness downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    PlainAddress,
    ImportMap,
    ExportsMap,
    ImportsMap,
    ManifestField,
    BrowserField,
    DependencyWalk,
}

/// Outcome of one resolution.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A concrete file on disk.
    Found { path: PathBuf, origin: Origin },
    /// A host-native module; there is no path to load.
    Native { specifier: String },
    /// Intentionally disabled by a browser-field entry; load as a no-op
    /// module.
    Ignored { specifier: String },
    /// Nothing matched; `tried` retains the probed candidates.
    NotFound { tried: Vec<PathBuf> },
}

impl Resolution {
    /// Whether the specifier resolved to something loadable.
    #[must_use]
    pub fn found(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }

    /// The resolved file path, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Resolution options, fixed for the lifetime of a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Ordered condition set, e.g. `["browser", "import"]` or
    /// `["node", "require"]`.
    pub conditions: Vec<String>,
    /// Project root; the base for root-relative specifiers and case
    /// verification.
    pub root_dir: PathBuf,
    /// Optional import-map document, resolved against its own location.
    pub import_map_file: Option<PathBuf>,
    /// Reject candidates whose on-disk casing differs from the request.
    pub case_sensitive: bool,
    /// Probe `<address>/index` for directory addresses.
    pub magic_directory_index: bool,
    /// Extension candidates for magic probing; may include `"inherit"`.
    pub magic_extensions: Vec<String>,
    /// Return the resolved address as-is instead of its symlink-resolved
    /// real path.
    pub preserve_symlinks: bool,
    /// Override the importer-derived module mode.
    pub module_mode: Option<ModuleMode>,
}

impl ResolveOptions {
    /// Options with the defaults of the call contract: case-sensitive, no
    /// magic, no import map.
    #[must_use]
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            conditions: Vec::new(),
            root_dir: root_dir.into(),
            import_map_file: None,
            case_sensitive: true,
            magic_directory_index: false,
            magic_extensions: Vec::new(),
            preserve_symlinks: false,
            module_mode: None,
        }
    }
}

/// The resolver: immutable options plus injected filesystem and manifest
/// access.
pub struct Resolver {
    options: ResolveOptions,
    store: Arc<dyn ManifestStore>,
    fs: Arc<dyn FileProbe>,
    import_map: Option<ImportMap>,
}

impl Resolver {
    /// Build a resolver over the real filesystem, loading the configured
    /// import map eagerly (a broken map file is a setup error, not a
    /// per-specifier soft failure).
    pub fn new(options: ResolveOptions) -> Result<Self, ResolveError> {
        Self::with_backends(options, Arc::new(FsManifestStore), Arc::new(FsProbe))
    }

    /// Build a resolver with injected manifest and filesystem backends.
    pub fn with_backends(
        options: ResolveOptions,
        store: Arc<dyn ManifestStore>,
        fs: Arc<dyn FileProbe>,
    ) -> Result<Self, ResolveError> {
        let import_map = match &options.import_map_file {
            Some(path) => {
                let base = location::to_url(path)?;
                let text = fs.read_to_string(path)?;
                Some(ImportMap::parse(&text, &base)?)
            }
            None => None,
        };
        Ok(Self {
            options,
            store,
            fs,
            import_map,
        })
    }

    /// Resolve `specifier` as written in the file at `importer`.
    ///
    /// Never fails for a merely-unresolvable specifier; the only `Err` is a
    /// broken package configuration (`InvalidManifest`).
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<Resolution, ResolveError> {
        match self.resolve_inner(specifier, importer) {
            Ok(resolution) => Ok(resolution),
            Err(err) if err.is_recoverable() => {
                warn!(
                    specifier = %specifier,
                    importer = %importer.display(),
                    error = %err,
                    "resolution failed"
                );
                Ok(Resolution::NotFound { tried: Vec::new() })
            }
            Err(err) => Err(err),
        }
    }

    fn resolve_inner(
        &self,
        specifier: &str,
        importer: &Path,
    ) -> Result<Resolution, ResolveError> {
        if specifier.is_empty() {
            return Err(ResolveError::invalid_specifier(
                specifier,
                "specifier is empty",
            ));
        }

        // Reserved schemes and builtin names are native: found, no path.
        if specifier.starts_with("node:") || specifier.starts_with("data:") {
            return Ok(Resolution::Native {
                specifier: specifier.to_string(),
            });
        }

        let importer_url = location::to_url(importer)?;
        let class = Specifier::classify(specifier);
        class.validate(specifier)?;

        if let Specifier::Bare { name, subpath, .. } = &class {
            // Bare builtin names short-circuit only for node-flavored
            // condition sets; browser builds remap them via the browser
            // field or an import map instead.
            if is_builtin_module(name, *subpath, specifier) && self.has_condition("node") {
                return Ok(Resolution::Native {
                    specifier: specifier.to_string(),
                });
            }
        }

        // Root-relative specifiers under browser-only conditions resolve
        // against the project root, not the importer's filesystem root.
        if let Specifier::Relative(spec) = &class {
            if let Some(rest) = spec.strip_prefix('/') {
                let candidate = if self.has_condition("browser") && !self.has_condition("node") {
                    location::to_dir_url(&self.options.root_dir)?.join(rest)
                } else {
                    importer_url.join(spec)
                }
                .map_err(|_| ResolveError::InvalidAddress {
                    address: (*spec).to_string(),
                })?;
                let candidate = location::restore_drive_letter(&candidate, &importer_url);
                return self.finish(&candidate, &importer_url, Origin::PlainAddress);
            }
        }

        if let Specifier::Absolute(spec) = &class {
            // A drive path like `C:\proj\a.js` would parse as a URL with
            // scheme `c`; treat it as a filesystem path first.
            let candidate = if crate::specifier::is_windows_absolute(spec) {
                location::to_url(Path::new(spec))?
            } else {
                Url::parse(spec).map_err(|_| ResolveError::InvalidAddress {
                    address: (*spec).to_string(),
                })?
            };
            return self.finish(&candidate, &importer_url, Origin::PlainAddress);
        }

        if let Some(map) = &self.import_map {
            if let Some(address) = map.apply(specifier, &importer_url) {
                debug!(specifier = %specifier, address = %address, "import map override");
                return self.finish(&address, &importer_url, Origin::ImportMap);
            }
        }

        if self.module_mode(&importer_url) == ModuleMode::PlainAddress {
            let base = importer_dir(&importer_url)?;
            let candidate = base.join(specifier).map_err(|_| {
                ResolveError::invalid_specifier(specifier, "does not resolve against importer")
            })?;
            return self.finish(&candidate, &importer_url, Origin::PlainAddress);
        }

        match class {
            Specifier::Relative(spec) => self.resolve_relative(spec, &importer_url),
            Specifier::Internal(spec) => self.resolve_internal(spec, &importer_url),
            Specifier::Bare { name, subpath, .. } => {
                self.resolve_bare(specifier, name, subpath, &importer_url, 0)
            }
            Specifier::Absolute(_) => unreachable!("absolute handled above"),
        }
    }

    /// Module-system mode of the importer: explicit override, then
    /// extension, then the nearest manifest's `type` field.
    fn module_mode(&self, importer_url: &Url) -> ModuleMode {
        if let Some(mode) = self.options.module_mode {
            return mode;
        }
        match extension_of(importer_url).as_deref() {
            Some(".mjs") => ModuleMode::Static,
            Some(".cjs") => ModuleMode::Dynamic,
            Some(".json") => ModuleMode::PlainAddress,
            _ => {
                let is_static = self
                    .store
                    .locate_scope(importer_url)
                    .and_then(|scope| self.store.read(&scope).ok())
                    .is_some_and(|manifest| manifest.is_static_scope());
                if is_static {
                    ModuleMode::Static
                } else {
                    ModuleMode::Dynamic
                }
            }
        }
    }

    fn resolve_relative(
        &self,
        spec: &str,
        importer_url: &Url,
    ) -> Result<Resolution, ResolveError> {
        let base = importer_dir(importer_url)?;
        let candidate = base
            .join(spec)
            .map_err(|_| ResolveError::invalid_specifier(spec, "does not resolve against importer"))?;

        // The enclosing package's browser field may remap this file.
        if let Some(scope) = self.store.locate_scope(importer_url) {
            let manifest = self.store.read(&scope)?;
            if let Some(subpath) = package_relative(&scope, &candidate) {
                match remap_browser_field(
                    BrowserLookup::Relative(&subpath),
                    &manifest,
                    &scope,
                    &self.options.conditions,
                )? {
                    Some(BrowserRemap::Address(url)) => {
                        return self.finish(&url, importer_url, Origin::BrowserField);
                    }
                    Some(BrowserRemap::Ignored(_)) => {
                        return Ok(Resolution::Ignored {
                            specifier: spec.to_string(),
                        });
                    }
                    Some(BrowserRemap::Package(name)) => {
                        return self.resolve_redirected_package(&name, importer_url, 0);
                    }
                    None => {}
                }
            }
        }

        self.finish(&candidate, importer_url, Origin::PlainAddress)
    }

    fn resolve_internal(
        &self,
        spec: &str,
        importer_url: &Url,
    ) -> Result<Resolution, ResolveError> {
        let not_defined = || ResolveError::ImportNotDefined {
            specifier: spec.to_string(),
            scope: importer_url.to_string(),
        };

        let scope = self
            .store
            .locate_scope(importer_url)
            .ok_or_else(not_defined)?;
        let manifest = self.store.read(&scope)?;

        match resolve_package_imports(spec, &manifest, &scope, &self.options.conditions)? {
            TargetOutcome::Address(url) => self.finish(&url, importer_url, Origin::ImportsMap),
            TargetOutcome::Package(target) => {
                // Re-enter package resolution with the package directory as
                // the referencing location.
                self.resolve_redirected_package(&target, &scope, 0)
            }
        }
    }

    /// Resolve a bare specifier that arrived via an imports-field or
    /// browser-field redirect, from the redirecting scope.
    fn resolve_redirected_package(
        &self,
        target: &str,
        base_url: &Url,
        depth: u8,
    ) -> Result<Resolution, ResolveError> {
        let class = Specifier::classify(target);
        class.validate(target)?;
        match class {
            Specifier::Bare { name, subpath, .. } => {
                self.resolve_bare(target, name, subpath, base_url, depth + 1)
            }
            _ => Err(ResolveError::invalid_specifier(
                target,
                "redirect target must be a bare specifier",
            )),
        }
    }

    fn resolve_bare(
        &self,
        specifier: &str,
        name: &str,
        subpath: Option<&str>,
        importer_url: &Url,
        depth: u8,
    ) -> Result<Resolution, ResolveError> {
        // A browser-field redirect chain can loop (a -> b -> a); bound it.
        if depth > 8 {
            return Err(ResolveError::invalid_specifier(
                specifier,
                "browser-field redirect chain too deep",
            ));
        }

        let subpath_key = subpath.map_or_else(|| ".".to_string(), |s| format!("./{s}"));

        if let Some(scope) = self.store.locate_scope(importer_url) {
            if let Some(manifest) = self.read_manifest_if_present(&scope)? {
                // Package self-reference through its own exports.
                if manifest.name.as_deref() == Some(name) && manifest.exports.is_some() {
                    let url = resolve_package_exports(
                        &subpath_key,
                        &manifest,
                        &scope,
                        &self.options.conditions,
                    )?;
                    return self.finish(&url, importer_url, Origin::ExportsMap);
                }

                // The importing package's browser field may rename or
                // disable the dependency outright.
                match remap_browser_field(
                    BrowserLookup::Bare(specifier),
                    &manifest,
                    &scope,
                    &self.options.conditions,
                )? {
                    Some(BrowserRemap::Address(url)) => {
                        return self.finish(&url, importer_url, Origin::BrowserField);
                    }
                    Some(BrowserRemap::Ignored(_)) => {
                        return Ok(Resolution::Ignored {
                            specifier: specifier.to_string(),
                        });
                    }
                    Some(BrowserRemap::Package(target)) if target != specifier => {
                        return self.resolve_redirected_package(&target, importer_url, depth);
                    }
                    _ => {}
                }
            }
        }

        // Dependency-directory walk: the first existing package directory
        // wins; errors under it propagate rather than continuing the walk.
        let mut dir = location::to_path(importer_url)?;
        if dir.extension().is_some() || self.fs.kind(&dir) == Some(FileKind::File) {
            dir.pop();
        }
        loop {
            let pkg_dir = dir.join(DEPENDENCY_DIR).join(name);
            if self.fs.kind(&pkg_dir) == Some(FileKind::Dir) {
                let scope = location::to_dir_url(&pkg_dir)?;
                return self.resolve_in_package(specifier, subpath, &subpath_key, &scope, importer_url, depth);
            }
            if !dir.pop() {
                return Err(ResolveError::ModuleNotFound {
                    name: name.to_string(),
                    importer: location::to_path(importer_url)?,
                });
            }
        }
    }

    fn resolve_in_package(
        &self,
        specifier: &str,
        subpath: Option<&str>,
        subpath_key: &str,
        scope: &Url,
        importer_url: &Url,
        depth: u8,
    ) -> Result<Resolution, ResolveError> {
        let Some(manifest) = self.read_manifest_if_present(scope)? else {
            // Bare directory with no manifest: plain join, magic probing
            // picks up index files if enabled.
            let url = match subpath {
                Some(sub) => scope.join(sub).map_err(|_| {
                    ResolveError::invalid_specifier(specifier, "subpath does not resolve")
                })?,
                None => scope.join("index.js").map_err(|_| {
                    ResolveError::invalid_specifier(specifier, "package root does not resolve")
                })?,
            };
            return self.finish(&url, importer_url, Origin::DependencyWalk);
        };

        if manifest.exports.is_some() {
            let url = resolve_package_exports(
                subpath_key,
                &manifest,
                scope,
                &self.options.conditions,
            )?;
            return self.finish(&url, importer_url, Origin::ExportsMap);
        }

        // No exports map: the dependency's own browser field applies to the
        // requested subpath before the legacy chain.
        if let Some(sub) = subpath {
            let key = format!("./{sub}");
            match remap_browser_field(
                BrowserLookup::Relative(&key),
                &manifest,
                scope,
                &self.options.conditions,
            )? {
                Some(BrowserRemap::Address(url)) => {
                    return self.finish(&url, importer_url, Origin::BrowserField);
                }
                Some(BrowserRemap::Ignored(_)) => {
                    return Ok(Resolution::Ignored {
                        specifier: specifier.to_string(),
                    });
                }
                Some(BrowserRemap::Package(target)) => {
                    return self.resolve_redirected_package(&target, importer_url, depth);
                }
                None => {}
            }
            let url = scope.join(sub).map_err(|_| {
                ResolveError::invalid_specifier(specifier, "subpath does not resolve")
            })?;
            return self.finish(&url, importer_url, Origin::DependencyWalk);
        }

        let url = resolve_legacy_main(&manifest, scope, &self.options.conditions, self.fs.as_ref())?;
        self.finish(&url, importer_url, Origin::ManifestField)
    }

    /// Read the manifest at a scope when a manifest file exists there.
    fn read_manifest_if_present(
        &self,
        scope: &Url,
    ) -> Result<Option<Arc<Manifest>>, ResolveError> {
        let manifest_path = location::to_path(scope)?.join(MANIFEST_FILE);
        if self.fs.kind(&manifest_path) != Some(FileKind::File) {
            return Ok(None);
        }
        self.store.read(scope).map(Some)
    }

    /// Final stage: magic probing, case verification, symlink handling.
    fn finish(
        &self,
        candidate: &Url,
        importer_url: &Url,
        origin: Origin,
    ) -> Result<Resolution, ResolveError> {
        if is_ignored(candidate) {
            return Ok(Resolution::Ignored {
                specifier: candidate.path().to_string(),
            });
        }
        if candidate.scheme() != "file" {
            return Ok(Resolution::Native {
                specifier: candidate.to_string(),
            });
        }

        let path = location::to_path(candidate)?;
        let importer_ext = extension_of(importer_url);
        let probe_options = ProbeOptions {
            directory_index: self.options.magic_directory_index,
            extensions: &self.options.magic_extensions,
            importer_extension: importer_ext.as_deref(),
        };

        let hit = match probe(self.fs.as_ref(), &path, &probe_options) {
            ProbeOutcome::Hit(hit) => hit,
            ProbeOutcome::Miss { tried } => {
                debug!(candidate = %path.display(), "probe miss");
                return Ok(Resolution::NotFound { tried });
            }
        };
        if hit.kind == FileKind::Dir {
            // A directory is not loadable; without directory-index magic
            // there is nothing more to try.
            debug!(candidate = %hit.path.display(), "resolved to a directory");
            return Ok(Resolution::NotFound {
                tried: vec![hit.path],
            });
        }

        if self.options.case_sensitive
            && !verify_case(self.fs.as_ref(), &hit.path, &self.options.root_dir)
        {
            warn!(candidate = %hit.path.display(), "on-disk casing differs from request");
            return Ok(Resolution::NotFound {
                tried: vec![hit.path],
            });
        }

        let path = if self.options.preserve_symlinks {
            hit.path
        } else {
            self.fs.real_path(&hit.path).unwrap_or(hit.path)
        };

        Ok(Resolution::Found { path, origin })
    }

    fn has_condition(&self, name: &str) -> bool {
        self.options.conditions.iter().any(|c| c == name)
    }
}

/// The importer's directory as a join base.
fn importer_dir(importer_url: &Url) -> Result<Url, ResolveError> {
    importer_url
        .join("./")
        .map_err(|_| ResolveError::InvalidAddress {
            address: importer_url.to_string(),
        })
}

/// `./`-prefixed path of `candidate` inside `scope`, when it is inside.
fn package_relative(scope: &Url, candidate: &Url) -> Option<String> {
    candidate
        .as_str()
        .strip_prefix(scope.as_str())
        .map(|rest| format!("./{rest}"))
}

/// The file extension (with leading dot) of a URL's last segment.
fn extension_of(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let dot = last.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(last[dot..].to_string())
}

/// Reconstruct the address segment-by-segment from directory listings,
/// comparing names case-insensitively and requiring the on-disk casing to
/// match exactly.
///
/// Segments under `root` are checked; `root` itself (and anything outside
/// it) is trusted as spelled, and an unreadable directory listing skips that
/// segment rather than failing the resolution.
fn verify_case(fs: &dyn FileProbe, path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };

    let mut dir = root.to_path_buf();
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if let Ok(entries) = fs.list_dir(&dir) {
            let exact = entries.iter().any(|e| *e == name);
            if !exact {
                // The probe saw this entry, so a case-insensitive match must
                // exist with different casing.
                return false;
            }
        }
        dir.push(component);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
            }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn manifest(&self, rel: &str, value: serde_json::Value) {
            self.write(rel, &value.to_string());
        }

        fn resolver(&self, conditions: &[&str]) -> Resolver {
            let mut options = ResolveOptions::new(self.root());
            options.conditions = conditions.iter().map(|s| (*s).to_string()).collect();
            Resolver::new(options).unwrap()
        }
    }

    #[test]
    fn test_relative_file() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        let dep = fx.write("src/dep.js", "");

        let resolution = fx.resolver(&["node"]).resolve("./dep.js", &importer).unwrap();
        assert_eq!(resolution.path().unwrap(), dep.canonicalize().unwrap());
    }

    #[test]
    fn test_relative_missing_is_not_found() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");

        let resolution = fx.resolver(&["node"]).resolve("./ghost.js", &importer).unwrap();
        assert!(!resolution.found());
    }

    #[test]
    fn test_magic_extension() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.write("src/util.js", "");

        let mut options = ResolveOptions::new(fx.root());
        options.conditions = vec!["node".to_string()];
        options.magic_extensions = vec![".js".to_string()];
        let resolver = Resolver::new(options).unwrap();

        let resolution = resolver.resolve("./util", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("src/util.js"));
    }

    #[test]
    fn test_magic_directory_index() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.write("src/utils/index.js", "");

        let mut options = ResolveOptions::new(fx.root());
        options.conditions = vec!["node".to_string()];
        options.magic_directory_index = true;
        options.magic_extensions = vec![".js".to_string()];
        let resolver = Resolver::new(options).unwrap();

        let resolution = resolver.resolve("./utils", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("utils/index.js"));
    }

    #[test]
    fn test_bare_with_exports() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/dep/package.json",
            json!({"name": "dep", "exports": {".": "./lib/main.js"}}),
        );
        let main = fx.write("node_modules/dep/lib/main.js", "");

        let resolution = fx.resolver(&["node"]).resolve("dep", &importer).unwrap();
        assert_eq!(resolution.path().unwrap(), main.canonicalize().unwrap());
        assert!(matches!(
            resolution,
            Resolution::Found { origin: Origin::ExportsMap, .. }
        ));
    }

    #[test]
    fn test_bare_conditional_exports() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/dep/package.json",
            json!({"exports": {".": {"browser": "./web.js", "default": "./node.js"}}}),
        );
        fx.write("node_modules/dep/web.js", "");
        fx.write("node_modules/dep/node.js", "");

        let web = fx.resolver(&["browser"]).resolve("dep", &importer).unwrap();
        assert!(web.path().unwrap().ends_with("web.js"));
        let node = fx.resolver(&["node"]).resolve("dep", &importer).unwrap();
        assert!(node.path().unwrap().ends_with("node.js"));
    }

    #[test]
    fn test_bare_subpath_pattern() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/dep/package.json",
            json!({"exports": {"./features/*": "./dist/*.js"}}),
        );
        fx.write("node_modules/dep/dist/auth.js", "");

        let resolution = fx
            .resolver(&["node"])
            .resolve("dep/features/auth", &importer)
            .unwrap();
        assert!(resolution.path().unwrap().ends_with("dist/auth.js"));
    }

    #[test]
    fn test_bare_subpath_not_exported() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/dep/package.json",
            json!({"exports": {".": "./main.js"}}),
        );
        fx.write("node_modules/dep/main.js", "");
        fx.write("node_modules/dep/secret.js", "");

        // Error is swallowed into NotFound by the orchestrator.
        let resolution = fx
            .resolver(&["node"])
            .resolve("dep/secret.js", &importer)
            .unwrap();
        assert!(!resolution.found());
    }

    #[test]
    fn test_bare_legacy_main() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/dep/package.json",
            json!({"main": "./lib/index.js"}),
        );
        fx.write("node_modules/dep/lib/index.js", "");

        let resolution = fx.resolver(&["node"]).resolve("dep", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("lib/index.js"));
        assert!(matches!(
            resolution,
            Resolution::Found { origin: Origin::ManifestField, .. }
        ));
    }

    #[test]
    fn test_bare_subpath_without_exports() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest("node_modules/dep/package.json", json!({"main": "./main.js"}));
        fx.write("node_modules/dep/lib/util.js", "");

        let resolution = fx
            .resolver(&["node"])
            .resolve("dep/lib/util.js", &importer)
            .unwrap();
        assert!(resolution.path().unwrap().ends_with("lib/util.js"));
    }

    #[test]
    fn test_scoped_package() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/@scope/dep/package.json",
            json!({"main": "./index.js"}),
        );
        fx.write("node_modules/@scope/dep/index.js", "");

        let resolution = fx.resolver(&["node"]).resolve("@scope/dep", &importer).unwrap();
        assert!(resolution.found());
    }

    #[test]
    fn test_dependency_walk_goes_up() {
        let fx = Fixture::new();
        let importer = fx.write("packages/web/src/app.js", "");
        fx.manifest("node_modules/dep/package.json", json!({"main": "./index.js"}));
        fx.write("node_modules/dep/index.js", "");

        let resolution = fx.resolver(&["node"]).resolve("dep", &importer).unwrap();
        assert!(resolution.found());
    }

    #[test]
    fn test_module_not_found() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");

        let resolution = fx.resolver(&["node"]).resolve("ghost-pkg", &importer).unwrap();
        assert!(!resolution.found());
    }

    #[test]
    fn test_mixed_exports_keys_is_hard_error() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/dep/package.json",
            json!({"exports": {".": "./a.js", "import": "./b.js"}}),
        );

        let err = fx.resolver(&["node"]).resolve("dep", &importer).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidManifest { .. }));
    }

    #[test]
    fn test_internal_import() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "imports": {"#util": "./src/util.js"}}),
        );
        let importer = fx.write("src/app.js", "");
        let util = fx.write("src/util.js", "");

        let resolution = fx.resolver(&["node"]).resolve("#util", &importer).unwrap();
        assert_eq!(resolution.path().unwrap(), util.canonicalize().unwrap());
    }

    #[test]
    fn test_internal_import_package_redirect() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "imports": {"#dep": "real-dep"}}),
        );
        let importer = fx.write("src/app.js", "");
        fx.manifest(
            "node_modules/real-dep/package.json",
            json!({"main": "./index.js"}),
        );
        fx.write("node_modules/real-dep/index.js", "");

        let resolution = fx.resolver(&["node"]).resolve("#dep", &importer).unwrap();
        assert!(resolution.found());
    }

    #[test]
    fn test_self_reference_via_exports() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "exports": {"./util": "./src/util.js"}}),
        );
        let importer = fx.write("src/app.js", "");
        fx.write("src/util.js", "");

        let resolution = fx.resolver(&["node"]).resolve("app/util", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("src/util.js"));
    }

    #[test]
    fn test_node_builtin_native() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");

        let resolution = fx.resolver(&["node"]).resolve("fs", &importer).unwrap();
        assert!(matches!(resolution, Resolution::Native { .. }));
        let resolution = fx.resolver(&["node"]).resolve("node:path", &importer).unwrap();
        assert!(matches!(resolution, Resolution::Native { .. }));
    }

    #[test]
    fn test_builtin_subpath_modules_native() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");

        let resolver = fx.resolver(&["node"]);
        for spec in ["fs/promises", "stream/web", "timers/promises", "util/types"] {
            let resolution = resolver.resolve(spec, &importer).unwrap();
            assert!(
                matches!(resolution, Resolution::Native { .. }),
                "expected native outcome for {spec}"
            );
        }

        // A subpath that is not itself a builtin module still walks the
        // dependency directories.
        let resolution = resolver.resolve("fs/ghost", &importer).unwrap();
        assert!(!resolution.found());
    }

    #[test]
    fn test_builtin_name_not_native_for_browser() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.manifest("node_modules/path/package.json", json!({"main": "./index.js"}));
        fx.write("node_modules/path/index.js", "");

        let resolution = fx.resolver(&["browser"]).resolve("path", &importer).unwrap();
        assert!(matches!(resolution, Resolution::Found { .. }));
    }

    #[test]
    fn test_browser_field_disables_dependency() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "browser": {"fs": false}}),
        );
        let importer = fx.write("src/app.js", "");

        let resolution = fx.resolver(&["browser"]).resolve("fs", &importer).unwrap();
        assert!(matches!(resolution, Resolution::Ignored { .. }));
        assert!(resolution.found());
        assert!(resolution.path().is_none());
    }

    #[test]
    fn test_browser_field_renames_dependency() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "browser": {"fs": "fake-fs"}}),
        );
        let importer = fx.write("src/app.js", "");
        fx.manifest("node_modules/fake-fs/package.json", json!({"main": "./index.js"}));
        fx.write("node_modules/fake-fs/index.js", "");

        let resolution = fx.resolver(&["browser"]).resolve("fs", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("fake-fs/index.js"));
    }

    #[test]
    fn test_browser_field_remaps_relative() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "browser": {"./src/env.js": "./src/env-web.js"}}),
        );
        let importer = fx.write("src/app.js", "");
        fx.write("src/env.js", "");
        fx.write("src/env-web.js", "");

        let resolution = fx.resolver(&["browser"]).resolve("./env.js", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("env-web.js"));

        // Without the browser condition the original file wins.
        let resolution = fx.resolver(&["node"]).resolve("./env.js", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("src/env.js"));
    }

    #[test]
    fn test_root_relative_browser() {
        let fx = Fixture::new();
        let importer = fx.write("pages/deep/page.js", "");
        fx.write("assets/app.js", "");

        let resolution = fx
            .resolver(&["browser"])
            .resolve("/assets/app.js", &importer)
            .unwrap();
        assert!(resolution.path().unwrap().ends_with("assets/app.js"));
    }

    #[test]
    fn test_import_map_override() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.write("vendor/dep/main.js", "");
        let map = fx.write(
            "importmap.json",
            r#"{ "imports": { "dep": "./vendor/dep/main.js" } }"#,
        );

        let mut options = ResolveOptions::new(fx.root());
        options.conditions = vec!["browser".to_string()];
        options.import_map_file = Some(map);
        let resolver = Resolver::new(options).unwrap();

        let resolution = resolver.resolve("dep", &importer).unwrap();
        assert!(resolution.path().unwrap().ends_with("vendor/dep/main.js"));
        assert!(matches!(
            resolution,
            Resolution::Found { origin: Origin::ImportMap, .. }
        ));
    }

    #[test]
    fn test_case_sensitivity_enforcement() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.write("src/Foo.js", "");

        // On case-insensitive filesystems the stat succeeds but the listing
        // disagrees; on case-sensitive ones the stat itself misses.
        let resolution = fx.resolver(&["node"]).resolve("./foo.js", &importer).unwrap();
        assert!(!resolution.found());

        let mut options = ResolveOptions::new(fx.root());
        options.conditions = vec!["node".to_string()];
        options.case_sensitive = false;
        let resolver = Resolver::new(options).unwrap();
        let resolution = resolver.resolve("./Foo.js", &importer).unwrap();
        assert!(resolution.found());
    }

    #[test]
    fn test_idempotence() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        fx.write("src/dep.js", "");

        let resolver = fx.resolver(&["node"]);
        let first = resolver.resolve("./dep.js", &importer).unwrap();
        let second = resolver.resolve("./dep.js", &importer).unwrap();
        assert_eq!(first.path(), second.path());
    }

    #[test]
    fn test_empty_specifier_not_found() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        let resolution = fx.resolver(&["node"]).resolve("", &importer).unwrap();
        assert!(!resolution.found());
    }

    #[test]
    fn test_plain_address_mode_for_json_importer() {
        let fx = Fixture::new();
        fx.manifest(
            "package.json",
            json!({"name": "app", "imports": {"#x": "./x.js"}}),
        );
        let importer = fx.write("data/config.json", "{}");
        fx.write("data/other.json", "{}");

        let resolution = fx
            .resolver(&["node"])
            .resolve("./other.json", &importer)
            .unwrap();
        assert!(resolution.path().unwrap().ends_with("other.json"));
    }

    #[test]
    fn test_absolute_file_url() {
        let fx = Fixture::new();
        let importer = fx.write("src/app.js", "");
        let dep = fx.write("src/dep.js", "");

        let url = location::to_url(&dep).unwrap();
        let resolution = fx.resolver(&["node"]).resolve(url.as_str(), &importer).unwrap();
        assert_eq!(resolution.path().unwrap(), dep.canonicalize().unwrap());
    }
}
