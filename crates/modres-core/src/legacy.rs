//! Legacy entry-point and browser-field resolution.
//!
//! Used only when a manifest has no `exports`/`imports` value for the shape
//! in question: ordered per-condition field lookup (`module`, `jsnext:main`,
//! `main`, `browser`) plus browser-field object remapping.
//!
//! The browser-vs-module disambiguation sniffs the candidate file's text for
//! CJS markers. That makes this one step content-dependent while the rest of
//! the algorithm is pure path resolution; the behavior is kept for
//! compatibility with the package ecosystem.

use crate::error::ResolveError;
use crate::manifest::Manifest;
use crate::probe::FileProbe;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Scheme of the sentinel address produced when a browser-field entry maps a
/// module to `false`. The caller treats such an address as a no-op module
/// instead of a miss.
pub const IGNORED_SCHEME: &str = "ignored";

/// Build the "intentionally ignored" sentinel address for a specifier.
#[must_use]
pub fn ignored_address(specifier: &str) -> Url {
    Url::parse(&format!("{IGNORED_SCHEME}:{specifier}"))
        .unwrap_or_else(|_| Url::parse("ignored:module").unwrap())
}

/// Whether an address is the ignored-module sentinel.
#[must_use]
pub fn is_ignored(url: &Url) -> bool {
    url.scheme() == IGNORED_SCHEME
}

/// Resolve a package's main entry via legacy manifest fields.
///
/// Tries, in the condition list's order: `import` -> `module`, then
/// `jsnext:main`, then `main`; `browser` -> the browser field entry (with
/// CJS sniffing against `module`), then `main`; `node` -> `main`. When no
/// condition produces a field, the conventional `index.js` is assumed.
///
/// The `browser` -> `main` fallback is deliberate: most published packages
/// declare only `main`, and a browser-only condition set must still be able
/// to load them.
pub fn resolve_legacy_main(
    manifest: &Manifest,
    scope: &Url,
    conditions: &[String],
    fs: &dyn FileProbe,
) -> Result<Url, ResolveError> {
    for condition in conditions {
        let target = match condition.as_str() {
            "import" => manifest
                .module
                .as_deref()
                .or(manifest.jsnext.as_deref())
                .or(manifest.main.as_deref()),
            "browser" => pick_browser_entry(manifest, scope, fs).or(manifest.main.as_deref()),
            "node" => manifest.main.as_deref(),
            _ => None,
        };
        if let Some(target) = target {
            return join_scope(scope, target);
        }
    }
    join_scope(scope, "index.js")
}

/// The browser-field entry for the package root, disambiguated against the
/// `module` field.
///
/// When both fields exist and disagree, the browser target's text is sniffed
/// for CJS markers: a CJS browser build loses to the static `module` build,
/// which bundlers can consume directly.
fn pick_browser_entry<'a>(
    manifest: &'a Manifest,
    scope: &Url,
    fs: &dyn FileProbe,
) -> Option<&'a str> {
    let entry = match manifest.browser.as_ref()? {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get(".")?.as_str()?,
        _ => return None,
    };

    let Some(module) = manifest.module.as_deref() else {
        return Some(entry);
    };
    if module == entry {
        return Some(entry);
    }

    let Ok(entry_url) = join_scope(scope, entry) else {
        return Some(entry);
    };
    let Ok(path) = crate::location::to_path(&entry_url) else {
        return Some(entry);
    };
    match fs.read_to_string(&path) {
        Ok(text) if looks_like_cjs(&text) => {
            debug!(entry = %entry, module = %module, "browser entry sniffed as CJS, preferring module field");
            Some(module)
        }
        // Unreadable content proves nothing; keep the browser entry.
        _ => Some(entry),
    }
}

/// CJS markers: an assignment to `module.exports`, or the paired
/// `typeof exports`/`typeof module` guards of a UMD wrapper.
fn looks_like_cjs(text: &str) -> bool {
    text.contains("module.exports =")
        || (text.contains("typeof exports") && text.contains("typeof module"))
}

/// What a browser-field lookup maps a specifier to.
#[derive(Debug, Clone)]
pub enum BrowserRemap {
    /// A file inside the package.
    Address(Url),
    /// Intentionally disabled for browsers (`false` entry).
    Ignored(Url),
    /// Redirected to another package.
    Package(String),
}

/// The key looked up in a browser-field object.
#[derive(Debug, Clone, Copy)]
pub enum BrowserLookup<'a> {
    /// A package-relative path like `./lib/fs.js`.
    Relative(&'a str),
    /// A bare dependency name.
    Bare(&'a str),
}

/// Apply a manifest's object-form browser field to one specifier.
///
/// Only active when `browser` is among the active conditions. Returns `None`
/// when the field is absent, non-object, or has no entry for the key; the
/// caller then falls into the general algorithm.
pub fn remap_browser_field(
    lookup: BrowserLookup<'_>,
    manifest: &Manifest,
    scope: &Url,
    conditions: &[String],
) -> Result<Option<BrowserRemap>, ResolveError> {
    if !conditions.iter().any(|c| c == "browser") {
        return Ok(None);
    }
    let Some(Value::Object(map)) = manifest.browser.as_ref() else {
        return Ok(None);
    };

    let entry = match lookup {
        BrowserLookup::Relative(subpath) => map
            .get(subpath)
            .or_else(|| map.get(subpath.trim_start_matches("./"))),
        BrowserLookup::Bare(name) => map.get(name),
    };
    let Some(entry) = entry else {
        return Ok(None);
    };

    match entry {
        Value::Bool(false) => {
            let original = match lookup {
                BrowserLookup::Relative(s) | BrowserLookup::Bare(s) => s,
            };
            Ok(Some(BrowserRemap::Ignored(ignored_address(original))))
        }
        Value::String(target) => {
            if target.starts_with("./") || target.starts_with("../") {
                Ok(Some(BrowserRemap::Address(join_scope(scope, target)?)))
            } else {
                Ok(Some(BrowserRemap::Package(target.clone())))
            }
        }
        _ => Ok(None),
    }
}

fn join_scope(scope: &Url, target: &str) -> Result<Url, ResolveError> {
    scope
        .join(target)
        .map_err(|_| ResolveError::InvalidAddress {
            address: format!("{scope}{target}"),
        })
}
