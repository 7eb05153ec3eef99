//! Filesystem "magic" probing.
//!
//! Turns an address that may not exist verbatim into a real file by trying
//! directory-index and extension-guessing strategies. Filesystem access goes
//! through [`FileProbe`] so tests and unusual hosts can supply their own
//! stat/list/read capability.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Pseudo extension candidate meaning "use the importer's file extension".
pub const INHERIT_EXTENSION: &str = "inherit";

/// Maximum number of tried candidate paths retained for diagnostics.
const MAX_TRIED_PATHS: usize = 20;

/// What a path points at, after following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
}

/// Host-supplied filesystem capability: stat, directory listing, file read.
pub trait FileProbe: Send + Sync {
    /// Stat a path, following symlinks. `None` when it does not exist.
    fn kind(&self, path: &Path) -> Option<FileKind>;

    /// List the entry names of a directory.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Read a file as text.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Resolve symlinks to the on-disk real path.
    fn real_path(&self, path: &Path) -> io::Result<PathBuf>;
}

/// Standard-library filesystem probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn kind(&self, path: &Path) -> Option<FileKind> {
        let meta = fs::metadata(path).ok()?;
        if meta.is_file() {
            Some(FileKind::File)
        } else if meta.is_dir() {
            Some(FileKind::Dir)
        } else {
            None
        }
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        // Lossy read: content sniffing must not fail on stray bytes.
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn real_path(&self, path: &Path) -> io::Result<PathBuf> {
        dunce::canonicalize(path)
    }
}

/// Probing strategy knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeOptions<'a> {
    /// Try `<address>/index` when the address is a directory.
    pub directory_index: bool,
    /// Extension candidates appended to the address, in order. May contain
    /// [`INHERIT_EXTENSION`].
    pub extensions: &'a [String],
    /// The importer's extension (with leading dot), substituted for the
    /// `inherit` pseudo candidate.
    pub importer_extension: Option<&'a str>,
}

/// A successful probe.
#[derive(Debug, Clone)]
pub struct ProbeHit {
    pub path: PathBuf,
    pub kind: FileKind,
    /// The extension candidate that matched, if extension guessing was used.
    pub matched_extension: Option<String>,
    /// Whether the hit came from directory-index probing.
    pub used_directory_index: bool,
}

/// Probe result: a hit, or a miss retaining the candidates that were tried.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Hit(ProbeHit),
    Miss { tried: Vec<PathBuf> },
}

impl ProbeOutcome {
    #[must_use]
    pub fn hit(self) -> Option<ProbeHit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::Miss { .. } => None,
        }
    }
}

/// Probe an address.
///
/// Order: the address as-is wins immediately when it is a file; a directory
/// recurses once onto `<address>/index` when directory-index probing is on
/// (with an explicit depth limit rather than a re-entrant flag), or is
/// returned as-is for the caller to judge; a missing address tries each
/// extension candidate appended in configured order.
#[must_use]
pub fn probe(fs: &dyn FileProbe, path: &Path, options: &ProbeOptions<'_>) -> ProbeOutcome {
    let mut tried = Vec::new();
    probe_at_depth(fs, path, options, 1, &mut tried)
}

fn probe_at_depth(
    fs: &dyn FileProbe,
    path: &Path,
    options: &ProbeOptions<'_>,
    index_depth: u8,
    tried: &mut Vec<PathBuf>,
) -> ProbeOutcome {
    add_tried(tried, path);

    match fs.kind(path) {
        Some(FileKind::File) => {
            return ProbeOutcome::Hit(ProbeHit {
                path: path.to_path_buf(),
                kind: FileKind::File,
                matched_extension: None,
                used_directory_index: false,
            });
        }
        Some(FileKind::Dir) => {
            if options.directory_index && index_depth > 0 {
                let inner = ProbeOptions {
                    directory_index: false,
                    ..*options
                };
                let outcome =
                    probe_at_depth(fs, &path.join("index"), &inner, index_depth - 1, tried);
                return match outcome {
                    ProbeOutcome::Hit(hit) => ProbeOutcome::Hit(ProbeHit {
                        used_directory_index: true,
                        ..hit
                    }),
                    miss @ ProbeOutcome::Miss { .. } => miss,
                };
            }
            return ProbeOutcome::Hit(ProbeHit {
                path: path.to_path_buf(),
                kind: FileKind::Dir,
                matched_extension: None,
                used_directory_index: false,
            });
        }
        None => {}
    }

    for candidate in options.extensions {
        let ext = if candidate == INHERIT_EXTENSION {
            match options.importer_extension {
                Some(ext) => ext,
                None => continue,
            }
        } else {
            candidate.as_str()
        };
        let with_ext = append_to_file_name(path, ext);
        add_tried(tried, &with_ext);
        if fs.kind(&with_ext) == Some(FileKind::File) {
            return ProbeOutcome::Hit(ProbeHit {
                path: with_ext,
                kind: FileKind::File,
                matched_extension: Some(ext.to_string()),
                used_directory_index: false,
            });
        }
    }

    ProbeOutcome::Miss {
        tried: tried.clone(),
    }
}

/// Append a candidate verbatim to the last path segment (`./util` + `.js`
/// -> `./util.js`), never replacing an existing extension.
fn append_to_file_name(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map_or_else(String::new, |n| {
        n.to_string_lossy().into_owned()
    });
    name.push_str(suffix);
    path.with_file_name(name)
}

fn add_tried(tried: &mut Vec<PathBuf>, path: &Path) {
    if tried.len() < MAX_TRIED_PATHS {
        tried.push(path.to_path_buf());
    }
}
