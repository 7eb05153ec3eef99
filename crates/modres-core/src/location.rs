//! Conversions between filesystem paths and `file:` URL addresses.
//!
//! The resolution algorithm works on absolute `file:` URLs so that generic
//! URL joining handles `.`/`..` segments and trailing-slash semantics. These
//! helpers are pure; the only failure mode is a malformed input address.

use crate::error::ResolveError;
use std::path::{Path, PathBuf};
use url::Url;

/// Convert an absolute filesystem path to a `file:` URL.
pub fn to_url(path: &Path) -> Result<Url, ResolveError> {
    Url::from_file_path(path).map_err(|()| ResolveError::InvalidAddress {
        address: path.to_string_lossy().into_owned(),
    })
}

/// Convert an absolute filesystem path to a `file:` URL that ends with a
/// separator, so it can serve as a join base for directory-relative lookups.
pub fn to_dir_url(path: &Path) -> Result<Url, ResolveError> {
    Url::from_directory_path(path).map_err(|()| ResolveError::InvalidAddress {
        address: path.to_string_lossy().into_owned(),
    })
}

/// Convert a `file:` URL back to a filesystem path.
pub fn to_path(url: &Url) -> Result<PathBuf, ResolveError> {
    url.to_file_path().map_err(|()| ResolveError::InvalidAddress {
        address: url.to_string(),
    })
}

/// Normalize a directory URL to end with a separator.
#[must_use]
pub fn ensure_trailing_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        return url.clone();
    }
    let mut out = url.clone();
    out.set_path(&format!("{}/", url.path()));
    out
}

/// Re-attach a drive letter that generic URL resolution dropped.
///
/// Joining a root-relative specifier like `/src/a.js` against
/// `file:///C:/proj/index.js` produces `file:///src/a.js`; the base's drive
/// letter is silently lost. When the candidate lacks a drive prefix and the
/// base has one, the base's drive is restored.
#[must_use]
pub fn restore_drive_letter(url: &Url, base: &Url) -> Url {
    if url.scheme() != "file" || base.scheme() != "file" {
        return url.clone();
    }
    if drive_prefix(url.path()).is_some() {
        return url.clone();
    }
    let Some(drive) = drive_prefix(base.path()) else {
        return url.clone();
    };
    let mut out = url.clone();
    out.set_path(&format!("/{}{}", drive, url.path()));
    out
}

/// Extract a leading `X:` drive component from a URL path like `/C:/proj`.
fn drive_prefix(url_path: &str) -> Option<&str> {
    let rest = url_path.strip_prefix('/')?;
    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        Some(&rest[..2])
    } else {
        None
    }
}
