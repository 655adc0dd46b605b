//! Packages a function's (or layer's) files into an in-memory zip archive.
//!
//! Each wildcard match is stored relative to its pattern's literal root, the
//! directories in front of the first wildcard component: `src/*.py` stores
//! `src/a.py` as `a.py` and `src/**/*.py` stores `src/pkg/m.py` as
//! `pkg/m.py`. A relative pattern without wildcards keeps its path as
//! written, so `lib/util.py` stays `lib/util.py`. Wildcards never match
//! hidden files.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{TripodError, TripodResult};

const GLOB_METACHARS: [char; 3] = ['*', '?', '['];
const DEFAULT_FILE_MODE: u32 = 0o644;

/// A finished zip archive and the entry names it contains, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePackage {
    bytes: Vec<u8>,
    entries: Vec<String>,
}

impl ArchivePackage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn write_to(&self, path: &Path) -> TripodResult<()> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| {
                TripodError::io(
                    format!("failed to create archive directory '{}'", parent.display()),
                    error,
                )
            })?;
        }
        fs::write(path, &self.bytes).map_err(|error| {
            TripodError::io(format!("failed to write archive '{}'", path.display()), error)
        })
    }
}

pub fn build_archive(base_dir: &Path, patterns: &[String]) -> TripodResult<ArchivePackage> {
    build_archive_with_prefix(base_dir, patterns, "")
}

/// Same as [`build_archive`], with `prefix` prepended to every entry name.
pub fn build_archive_with_prefix(
    base_dir: &Path,
    patterns: &[String],
    prefix: &str,
) -> TripodResult<ArchivePackage> {
    let prefix = prefix.trim_matches('/');
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for pattern in patterns {
        let matches = expand_pattern(base_dir, pattern)?;
        if matches.is_empty() {
            return Err(TripodError::io(
                format!("failed to package '{pattern}'"),
                io::Error::new(io::ErrorKind::NotFound, "pattern matched no files"),
            ));
        }

        for (path, relative) in matches {
            let entry = if prefix.is_empty() {
                relative
            } else {
                format!("{prefix}/{relative}")
            };
            if !seen.insert(entry.clone()) {
                warn!(entry = %entry, path = %path.display(), "skipping duplicate archive entry");
                continue;
            }

            let body = fs::read(&path).map_err(|error| {
                TripodError::io(format!("failed to read '{}'", path.display()), error)
            })?;
            let options = FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(file_mode(&path));
            writer
                .start_file(entry.as_str(), options)
                .map_err(|error| zip_error(&entry, error))?;
            writer
                .write_all(&body)
                .map_err(|error| TripodError::io(format!("failed to write entry '{entry}'"), error))?;

            info!(entry = %entry, bytes = body.len(), "adding");
            entries.push(entry);
        }
    }

    let bytes = writer
        .finish()
        .map_err(|error| zip_error("central directory", error))?
        .into_inner();
    debug!(entries = entries.len(), bytes = bytes.len(), "archive finished");
    Ok(ArchivePackage { bytes, entries })
}

/// Expands one pattern into `(path, entry name)` pairs, in glob order,
/// skipping directories.
fn expand_pattern(base_dir: &Path, pattern: &str) -> TripodResult<Vec<(PathBuf, String)>> {
    glob::Pattern::new(pattern).map_err(|error| {
        TripodError::Configuration(format!("invalid file pattern '{pattern}': {error}"))
    })?;

    let (full_pattern, root) = if Path::new(pattern).is_absolute() {
        (pattern.to_string(), PathBuf::from(literal_root(pattern)))
    } else {
        let base = base_dir.to_str().ok_or_else(|| {
            TripodError::Configuration(format!(
                "base directory '{}' is not valid UTF-8",
                base_dir.display()
            ))
        })?;
        (
            format!("{}/{pattern}", glob::Pattern::escape(base)),
            base_dir.join(literal_root(pattern)),
        )
    };

    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let paths = glob::glob_with(&full_pattern, options).map_err(|error| {
        TripodError::Configuration(format!("invalid file pattern '{pattern}': {error}"))
    })?;

    let mut matches = Vec::new();
    for result in paths {
        let path = result.map_err(|error| {
            let context = format!("failed to expand '{pattern}' at '{}'", error.path().display());
            TripodError::io(context, error.into_error())
        })?;
        if path.is_dir() {
            continue;
        }
        let relative = entry_name(&path, &root).ok_or_else(|| {
            TripodError::Configuration(format!(
                "'{}' is not below the root of pattern '{pattern}'",
                path.display()
            ))
        })?;
        matches.push((path, relative));
    }
    Ok(matches)
}

/// Directories in front of the first wildcard component. A relative pattern
/// without wildcards is rooted at the base directory; an absolute one at the
/// file's parent.
fn literal_root(pattern: &str) -> String {
    let components: Vec<&str> = pattern.split('/').collect();
    let literal_count = components
        .iter()
        .position(|component| component.contains(GLOB_METACHARS))
        .unwrap_or_else(|| {
            if pattern.starts_with('/') {
                components.len().saturating_sub(1)
            } else {
                0
            }
        });
    components[..literal_count].join("/")
}

fn entry_name(path: &Path, root: &Path) -> Option<String> {
    fn normal(path: &Path) -> Vec<Component<'_>> {
        path.components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect()
    }

    let path_components = normal(path);
    let root_components = normal(root);
    if !path_components.starts_with(&root_components) {
        return None;
    }

    let rest: Vec<String> = path_components[root_components.len()..]
        .iter()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    if rest.is_empty() {
        return None;
    }
    Some(rest.join("/"))
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|metadata| metadata.permissions().mode() & 0o777)
        .unwrap_or(DEFAULT_FILE_MODE)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    DEFAULT_FILE_MODE
}

fn zip_error(entry: &str, error: zip::result::ZipError) -> TripodError {
    TripodError::io(format!("failed to write archive entry '{entry}'"), io::Error::other(error))
}
