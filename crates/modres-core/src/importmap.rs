//! Declarative import-map overrides.
//!
//! An import map is a JSON document with `imports` and `scopes` top-level
//! keys, normalized against its own file location. After normalization every
//! mapping is sorted by specificity (longer key first, lexicographic
//! tie-break) so first-match iteration is equivalent to "most specific
//! wins". Entries that fail to normalize are dropped with a warning rather
//! than failing the whole map.

use crate::error::ResolveError;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

/// A normalized import map. Mappings and scopes are held pre-sorted.
#[derive(Debug, Clone, Default)]
pub struct ImportMap {
    imports: Vec<(String, String)>,
    scopes: Vec<(String, Vec<(String, String)>)>,
}

#[derive(Debug, Default, Deserialize)]
struct RawImportMap {
    #[serde(default)]
    imports: serde_json::Map<String, Value>,
    #[serde(default)]
    scopes: serde_json::Map<String, Value>,
}

impl ImportMap {
    /// Parse and normalize an import-map document against the location of
    /// the file it was read from.
    pub fn parse(text: &str, base: &Url) -> Result<Self, ResolveError> {
        let raw: RawImportMap =
            serde_json::from_str(text).map_err(|e| ResolveError::InvalidAddress {
                address: format!("import map at {base}: {e}"),
            })?;

        let imports = normalize_mapping(&raw.imports, base);

        let mut scopes = Vec::new();
        for (scope_key, value) in &raw.scopes {
            let Some(mapping) = value.as_object() else {
                warn!(scope = %scope_key, "import map scope value is not an object, dropping");
                continue;
            };
            let Some(scope_address) = normalize_key(scope_key, base) else {
                warn!(scope = %scope_key, "import map scope key does not resolve, dropping");
                continue;
            };
            scopes.push((scope_address, normalize_mapping(mapping, base)));
        }
        sort_by_specificity(&mut scopes, |(key, _)| key);

        Ok(Self { imports, scopes })
    }

    /// Apply the map to a specifier written in `importer`.
    ///
    /// Scope mappings whose key contains the importer are tried first, most
    /// specific scope first; the top-level mapping is the fallback. `None`
    /// means the map has no opinion and the caller continues with ordinary
    /// resolution.
    #[must_use]
    pub fn apply(&self, specifier: &str, importer: &Url) -> Option<Url> {
        let wanted = normalize_match_key(specifier, importer);

        for (scope_address, mapping) in &self.scopes {
            let in_scope = importer.as_str() == scope_address
                || (scope_address.ends_with('/') && importer.as_str().starts_with(scope_address));
            if !in_scope {
                continue;
            }
            if let Some(address) = match_mapping(mapping, &wanted) {
                return Some(address);
            }
        }

        match_mapping(&self.imports, &wanted)
    }

    /// Whether the map defines no mappings at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty()
    }
}

/// Match within one mapping: an exact key wins outright; otherwise the
/// longest key ending in `/` that prefixes the specifier wins and the
/// remainder is appended to its address.
fn match_mapping(mapping: &[(String, String)], wanted: &str) -> Option<Url> {
    for (key, address) in mapping {
        if key == wanted {
            return Url::parse(address).ok();
        }
        if key.ends_with('/') && wanted.starts_with(key.as_str()) {
            let rest = &wanted[key.len()..];
            return Url::parse(&format!("{address}{rest}")).ok();
        }
    }
    None
}

fn normalize_mapping(raw: &serde_json::Map<String, Value>, base: &Url) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (key, value) in raw {
        let Some(address) = value.as_str() else {
            warn!(key = %key, "import map address is not a string, dropping");
            continue;
        };
        let Some(key) = normalize_key(key, base) else {
            warn!(key = %key, "import map key does not resolve, dropping");
            continue;
        };
        let Some(address) = resolve_address(address, base) else {
            warn!(key = %key, address = %address, "import map address does not resolve, dropping");
            continue;
        };
        // A trailing-slash key must map to a trailing-slash address, or
        // prefix matching would splice into the middle of a path segment.
        if key.ends_with('/') && !address.ends_with('/') {
            warn!(key = %key, address = %address, "prefix mapping to non-directory address, dropping");
            continue;
        }
        out.push((key, address));
    }
    sort_by_specificity(&mut out, |(key, _)| key);
    out
}

/// Specifier keys that are paths or URLs are resolved against the map's
/// base; bare keys stay as written.
fn normalize_key(key: &str, base: &Url) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    if key.starts_with("./") || key.starts_with("../") || key.starts_with('/') {
        return base.join(key).ok().map(|u| u.to_string());
    }
    if let Ok(url) = Url::parse(key) {
        return Some(url.to_string());
    }
    Some(key.to_string())
}

/// Addresses must resolve to absolute URLs.
fn resolve_address(address: &str, base: &Url) -> Option<String> {
    if let Ok(url) = Url::parse(address) {
        return Some(url.to_string());
    }
    base.join(address).ok().map(|u| u.to_string())
}

/// The form of a written specifier that mapping keys are compared against:
/// relative and absolute specifiers become URL strings, bare specifiers stay
/// raw.
fn normalize_match_key(specifier: &str, importer: &Url) -> String {
    if specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/') {
        if let Ok(url) = importer.join(specifier) {
            return url.to_string();
        }
    } else if let Ok(url) = Url::parse(specifier) {
        return url.to_string();
    }
    specifier.to_string()
}

fn sort_by_specificity<T, F: Fn(&T) -> &String>(items: &mut [T], key: F) {
    items.sort_by(|a, b| {
        let (a, b) = (key(a), key(b));
        b.len().cmp(&a.len()).then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("file:///proj/web/importmap.json").unwrap()
    }

    fn importer() -> Url {
        Url::parse("file:///proj/web/src/app.js").unwrap()
    }

    #[test]
    fn test_bare_mapping() {
        let map = ImportMap::parse(
            r#"{ "imports": { "lit": "./vendor/lit/lit.js" } }"#,
            &base(),
        )
        .unwrap();
        let hit = map.apply("lit", &importer()).unwrap();
        assert_eq!(hit.as_str(), "file:///proj/web/vendor/lit/lit.js");
    }

    #[test]
    fn test_prefix_mapping_appends_remainder() {
        let map = ImportMap::parse(
            r#"{ "imports": { "lit/": "./vendor/lit/" } }"#,
            &base(),
        )
        .unwrap();
        let hit = map.apply("lit/directives/cache.js", &importer()).unwrap();
        assert_eq!(
            hit.as_str(),
            "file:///proj/web/vendor/lit/directives/cache.js"
        );
    }

    #[test]
    fn test_exact_beats_prefix() {
        let map = ImportMap::parse(
            r#"{ "imports": {
                "lit/": "./vendor/lit/",
                "lit/html.js": "./overrides/html.js"
            } }"#,
            &base(),
        )
        .unwrap();
        let hit = map.apply("lit/html.js", &importer()).unwrap();
        assert_eq!(hit.as_str(), "file:///proj/web/overrides/html.js");
    }

    #[test]
    fn test_longest_prefix_wins_regardless_of_order() {
        let map = ImportMap::parse(
            r#"{ "imports": {
                "a/": "./short/",
                "a/b/": "./long/"
            } }"#,
            &base(),
        )
        .unwrap();
        let hit = map.apply("a/b/c.js", &importer()).unwrap();
        assert_eq!(hit.as_str(), "file:///proj/web/long/c.js");
    }

    #[test]
    fn test_relative_key_matches_resolved_specifier() {
        let map = ImportMap::parse(
            r#"{ "imports": { "./src/legacy.js": "./src/modern.js" } }"#,
            &base(),
        )
        .unwrap();
        // Written as `./legacy.js` inside src/, which resolves to the same
        // address the key normalized to.
        let hit = map.apply("./legacy.js", &importer()).unwrap();
        assert_eq!(hit.as_str(), "file:///proj/web/src/modern.js");
    }

    #[test]
    fn test_scope_isolation() {
        let map = ImportMap::parse(
            r#"{
                "scopes": {
                    "./vendor/": { "dep": "./vendor/dep/patched.js" }
                }
            }"#,
            &base(),
        )
        .unwrap();

        // Importer outside the scope: no opinion.
        assert!(map.apply("dep", &importer()).is_none());

        let vendored = Url::parse("file:///proj/web/vendor/lib/main.js").unwrap();
        let hit = map.apply("dep", &vendored).unwrap();
        assert_eq!(hit.as_str(), "file:///proj/web/vendor/dep/patched.js");
    }

    #[test]
    fn test_scope_falls_back_to_top_level() {
        let map = ImportMap::parse(
            r#"{
                "imports": { "dep": "./vendor/dep/index.js" },
                "scopes": { "./vendor/": { "other": "./vendor/other.js" } }
            }"#,
            &base(),
        )
        .unwrap();
        let vendored = Url::parse("file:///proj/web/vendor/lib/main.js").unwrap();
        let hit = map.apply("dep", &vendored).unwrap();
        assert_eq!(hit.as_str(), "file:///proj/web/vendor/dep/index.js");
    }

    #[test]
    fn test_bad_entries_dropped_not_fatal() {
        let map = ImportMap::parse(
            r#"{ "imports": {
                "ok": "./fine.js",
                "broken": 42,
                "trailing/": "./not-a-dir.js"
            } }"#,
            &base(),
        )
        .unwrap();
        assert!(map.apply("ok", &importer()).is_some());
        assert!(map.apply("broken", &importer()).is_none());
        assert!(map.apply("trailing/x.js", &importer()).is_none());
    }
}
