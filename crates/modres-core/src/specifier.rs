//! Specifier classification.
//!
//! A specifier is classified, never mutated, from its leading characters
//! alone. Classification is total for non-empty strings and performs no
//! filesystem access; validation failures (empty bare name, reserved
//! characters) are raised later, during resolution.

use crate::error::ResolveError;

/// The syntactic class of a module specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier<'a> {
    /// `./x`, `../x`, or a root-relative `/x`.
    Relative(&'a str),
    /// Already an absolute address: a URL with a scheme, a Windows drive
    /// path, or a UNC path.
    Absolute(&'a str),
    /// A `#`-prefixed private import resolved through the manifest `imports`
    /// field.
    Internal(&'a str),
    /// A package name, optionally with a subpath.
    Bare {
        name: &'a str,
        subpath: Option<&'a str>,
        scoped: bool,
    },
}

impl<'a> Specifier<'a> {
    /// Classify a specifier. Total for non-empty input; the empty string
    /// classifies as a bare specifier with an empty name, which is rejected
    /// during validation.
    #[must_use]
    pub fn classify(spec: &'a str) -> Self {
        if spec.starts_with('#') {
            return Self::Internal(spec);
        }
        if has_scheme(spec) || is_windows_absolute(spec) {
            return Self::Absolute(spec);
        }
        if spec.starts_with('/') || spec.starts_with("./") || spec.starts_with("../") {
            return Self::Relative(spec);
        }
        // Bare `.` and `..` behave like relative paths.
        if spec == "." || spec == ".." {
            return Self::Relative(spec);
        }
        let (name, subpath, scoped) = split_bare(spec);
        Self::Bare {
            name,
            subpath,
            scoped,
        }
    }

    /// Validate the parts that classification deliberately left unchecked.
    pub fn validate(&self, original: &str) -> Result<(), ResolveError> {
        match self {
            Self::Bare { name, .. } => validate_package_name(original, name),
            Self::Internal(spec) => {
                if *spec == "#" || spec.starts_with("#/") {
                    Err(ResolveError::invalid_specifier(
                        original,
                        "internal specifiers must not be \"#\" or start with \"#/\"",
                    ))
                } else {
                    Ok(())
                }
            }
            Self::Relative(_) | Self::Absolute(_) => Ok(()),
        }
    }
}

/// Does the specifier start with a URL scheme (`xyz:`)?
fn has_scheme(spec: &str) -> bool {
    let Some(colon) = spec.find(':') else {
        return false;
    };
    if colon == 0 {
        return false;
    }
    let head = &spec[..colon];
    let mut chars = head.chars();
    let first = chars.next().unwrap_or(' ');
    if !first.is_ascii_alphabetic() {
        return false;
    }
    // Single letters are drive designators, not schemes.
    if head.len() == 1 {
        return is_windows_absolute(spec);
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub(crate) fn is_windows_absolute(spec: &str) -> bool {
    let bytes = spec.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
    {
        return true;
    }
    spec.starts_with("\\\\")
}

/// Split a bare specifier into `(package name, subpath, scoped)`.
///
/// `lodash/fp` -> `("lodash", Some("fp"), false)`,
/// `@scope/pkg/sub` -> `("@scope/pkg", Some("sub"), true)`.
fn split_bare(spec: &str) -> (&str, Option<&str>, bool) {
    if let Some(rest) = spec.strip_prefix('@') {
        let Some(first_slash) = rest.find('/') else {
            // `@scope` without a name; rejected during validation.
            return (spec, None, true);
        };
        let after = &rest[first_slash + 1..];
        match after.find('/') {
            Some(second) => {
                let name_len = 1 + first_slash + 1 + second;
                (&spec[..name_len], Some(&spec[name_len + 1..]), true)
            }
            None => (spec, None, true),
        }
    } else {
        match spec.find('/') {
            Some(pos) => (&spec[..pos], Some(&spec[pos + 1..]), false),
            None => (spec, None, false),
        }
    }
}

fn validate_package_name(original: &str, name: &str) -> Result<(), ResolveError> {
    if name.is_empty() {
        return Err(ResolveError::invalid_specifier(
            original,
            "package name is empty",
        ));
    }
    if name.starts_with('.') {
        return Err(ResolveError::invalid_specifier(
            original,
            "package name must not start with '.'",
        ));
    }
    if name.contains('%') || name.contains('\\') {
        return Err(ResolveError::invalid_specifier(
            original,
            "package name must not contain '%' or '\\'",
        ));
    }
    if let Some(rest) = name.strip_prefix('@') {
        if !rest.contains('/') {
            return Err(ResolveError::invalid_specifier(
                original,
                "scoped package name is missing its name part",
            ));
        }
    }
    Ok(())
}
