//! Conditional `exports`/`imports` map evaluation.
//!
//! Turns a package subpath request into a target address using a manifest's
//! conditional export/import map:
//! - exact subpath keys
//! - pattern keys with a single `*` wildcard
//! - legacy trailing-`/` folder keys with remainder append
//! - array fallback targets
//! - nested conditional objects, matched in declared key order
//!
//! Targets are modeled as an explicit sum type with one `resolve_target`
//! match arm per shape, so an unhandled shape is a compile error rather than
//! a silent fallthrough.

use crate::error::ResolveError;
use crate::manifest::{classify_exports, ExportsShape, Manifest};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use url::Url;

/// What a matched target resolved to.
#[derive(Debug, Clone)]
pub enum TargetOutcome {
    /// A concrete address inside the package.
    Address(Url),
    /// An imports-field target naming another package. The caller re-enters
    /// full package resolution with the package directory as the importer.
    Package(String),
}

/// A manifest export/import target, recursive over conditional objects and
/// array fallbacks.
#[derive(Debug, Clone, Copy)]
enum ExportTarget<'a> {
    Str(&'a str),
    Arr(&'a Vec<Value>),
    Cond(&'a Map<String, Value>),
    Null,
}

fn classify_target<'a>(
    value: &'a Value,
    key: &str,
    scope: &Url,
) -> Result<ExportTarget<'a>, ResolveError> {
    match value {
        Value::String(s) => Ok(ExportTarget::Str(s)),
        Value::Array(items) => Ok(ExportTarget::Arr(items)),
        Value::Object(map) => Ok(ExportTarget::Cond(map)),
        Value::Null => Ok(ExportTarget::Null),
        _ => Err(ResolveError::InvalidExportTarget {
            target: value.to_string(),
            key: key.to_string(),
            scope: scope.to_string(),
        }),
    }
}

/// Resolve a package subpath (`.` or `./…`) through the manifest `exports`
/// value.
///
/// `Err(SubpathNotExported)` covers both "no matching key" and an
/// explicitly `null` target; a malformed manifest shape surfaces as the
/// fatal `InvalidManifest`.
pub fn resolve_package_exports(
    subpath: &str,
    manifest: &Manifest,
    scope: &Url,
    conditions: &[String],
) -> Result<Url, ResolveError> {
    let exports = manifest.exports.as_ref().ok_or_else(|| not_exported(subpath, scope))?;
    let shape = classify_exports(exports, scope)?;

    let outcome = if subpath == "." {
        // The "main export": a bare string/array/conditional value is itself
        // the target; a relative-keyed object exposes it under the "." key.
        let target = match shape {
            ExportsShape::String(_) | ExportsShape::Array(_) | ExportsShape::ConditionalKeys(_) => {
                Some(exports)
            }
            ExportsShape::RelativeKeys(map) => map.get("."),
            ExportsShape::Null => None,
        };
        match target {
            Some(value) => resolve_target(value, ".", None, None, false, scope, conditions)?,
            None => None,
        }
    } else {
        // Non-root subpaths are only exposed by an all-relative-keyed
        // object; every other shape hides them.
        match shape {
            ExportsShape::RelativeKeys(map) => {
                match_and_resolve(subpath, map, false, scope, conditions)?
            }
            _ => None,
        }
    };

    match outcome {
        Some(TargetOutcome::Address(url)) => Ok(url),
        // Exports targets are always package-relative, never bare packages.
        Some(TargetOutcome::Package(target)) => Err(ResolveError::InvalidExportTarget {
            target,
            key: subpath.to_string(),
            scope: scope.to_string(),
        }),
        None => Err(not_exported(subpath, scope)),
    }
}

/// Resolve a `#`-prefixed internal specifier through the manifest `imports`
/// value.
pub fn resolve_package_imports(
    specifier: &str,
    manifest: &Manifest,
    scope: &Url,
    conditions: &[String],
) -> Result<TargetOutcome, ResolveError> {
    let not_defined = || ResolveError::ImportNotDefined {
        specifier: specifier.to_string(),
        scope: scope.to_string(),
    };

    let imports = manifest.imports.as_ref().ok_or_else(not_defined)?;
    let Value::Object(map) = imports else {
        return Err(ResolveError::InvalidManifest {
            path: std::path::PathBuf::from(scope.as_str()),
            reason: "imports value must be an object".to_string(),
        });
    };

    match_and_resolve(specifier, map, true, scope, conditions)?.ok_or_else(not_defined)
}

/// Match a key against an exports/imports object and resolve the winning
/// target.
///
/// An exact, wildcard-free key wins outright. Otherwise candidates are the
/// single-`*` pattern keys whose prefix/suffix fit the match key, plus
/// legacy trailing-`/` folder keys that prefix it; they are ordered by the
/// pattern-key comparator and the first one is taken.
fn match_and_resolve(
    match_key: &str,
    map: &Map<String, Value>,
    is_imports: bool,
    scope: &Url,
    conditions: &[String],
) -> Result<Option<TargetOutcome>, ResolveError> {
    if let Some(value) = map.get(match_key) {
        if !match_key.contains('*') {
            return resolve_target(value, match_key, None, None, is_imports, scope, conditions);
        }
    }

    let mut candidates: Vec<&str> = Vec::new();
    for key in map.keys() {
        let stars = key.chars().filter(|&c| c == '*').count();
        if stars == 1 {
            let star = key.find('*').unwrap_or(0);
            let prefix = &key[..star];
            let suffix = &key[star + 1..];
            // A match key equal to the pattern base does not match: the
            // capture must be non-empty.
            let fits = match_key.starts_with(prefix)
                && if suffix.is_empty() {
                    match_key.len() > prefix.len()
                } else {
                    match_key.len() >= key.len() && match_key.ends_with(suffix)
                };
            if fits {
                candidates.push(key);
            }
        } else if stars == 0 && key.ends_with('/') && match_key.starts_with(key.as_str()) {
            candidates.push(key);
        }
    }
    candidates.sort_by(|a, b| pattern_key_compare(a, b));

    let Some(key) = candidates.first().copied() else {
        return Ok(None);
    };
    let value = &map[key];

    if let Some(star) = key.find('*') {
        let prefix_len = star;
        let suffix_len = key.len() - star - 1;
        let capture = &match_key[prefix_len..match_key.len() - suffix_len];
        resolve_target(value, key, Some(capture), None, is_imports, scope, conditions)
    } else {
        let remainder = &match_key[key.len()..];
        resolve_target(value, key, None, Some(remainder), is_imports, scope, conditions)
    }
}

/// Ordering of expansion keys: longer prefix (up to the `*`) first, then a
/// wildcard-free key beats a wildcard key, then the longer full key.
fn pattern_key_compare(a: &str, b: &str) -> Ordering {
    let star_a = a.find('*');
    let star_b = b.find('*');
    let base_a = star_a.map_or(a.len(), |i| i + 1);
    let base_b = star_b.map_or(b.len(), |i| i + 1);

    base_b
        .cmp(&base_a)
        .then_with(|| star_a.is_some().cmp(&star_b.is_some()))
        .then_with(|| b.len().cmp(&a.len()))
}

/// Recursive target resolution, one arm per target shape.
///
/// Returns `Ok(None)` for "unresolvable under the current conditions"
/// (explicit `null`, exhausted array, unmatched conditional object), which
/// is distinct from the `Err` cases for malformed targets.
fn resolve_target(
    value: &Value,
    key: &str,
    capture: Option<&str>,
    remainder: Option<&str>,
    is_imports: bool,
    scope: &Url,
    conditions: &[String],
) -> Result<Option<TargetOutcome>, ResolveError> {
    match classify_target(value, key, scope)? {
        ExportTarget::Str(target) => {
            resolve_string_target(target, key, capture, remainder, is_imports, scope)
        }
        ExportTarget::Arr(items) => {
            // Entries are tried left to right. Only InvalidExportTarget is
            // skippable; anything else aborts the whole array.
            for item in items {
                match resolve_target(item, key, capture, remainder, is_imports, scope, conditions)
                {
                    Ok(Some(outcome)) => return Ok(Some(outcome)),
                    Ok(None) => {}
                    Err(ResolveError::InvalidExportTarget { .. }) => {}
                    Err(other) => return Err(other),
                }
            }
            Ok(None)
        }
        ExportTarget::Cond(map) => {
            // Declared key order decides; "default" always matches.
            for (condition, nested) in map {
                if condition == "default" || conditions.iter().any(|c| c == condition) {
                    return resolve_target(
                        nested, key, capture, remainder, is_imports, scope, conditions,
                    );
                }
            }
            Ok(None)
        }
        ExportTarget::Null => Ok(None),
    }
}

fn resolve_string_target(
    target: &str,
    key: &str,
    capture: Option<&str>,
    remainder: Option<&str>,
    is_imports: bool,
    scope: &Url,
) -> Result<Option<TargetOutcome>, ResolveError> {
    let invalid = || ResolveError::InvalidExportTarget {
        target: target.to_string(),
        key: key.to_string(),
        scope: scope.to_string(),
    };

    if !target.starts_with("./") {
        if is_imports {
            // Imports may redirect to another package; substitute the
            // capture before handing the specifier back.
            let substituted = match capture {
                Some(capture) => target.replace('*', capture),
                None => target.to_string(),
            };
            return Ok(Some(TargetOutcome::Package(substituted)));
        }
        return Err(invalid());
    }

    let mut expanded = match capture {
        Some(capture) => target.replace('*', capture),
        None => target.to_string(),
    };
    if let Some(rest) = remainder {
        expanded.push_str(rest);
    }

    let url = scope.join(&expanded).map_err(|_| invalid())?;
    // URL joining normalized any `..` segments; a target that escaped the
    // package directory no longer shares its prefix.
    if !url.as_str().starts_with(scope.as_str()) {
        return Err(invalid());
    }
    Ok(Some(TargetOutcome::Address(url)))
}

fn not_exported(subpath: &str, scope: &Url) -> ResolveError {
    ResolveError::SubpathNotExported {
        subpath: subpath.to_string(),
        scope: scope.to_string(),
    }
}
