// src/pattern/matcher.rs

//! Resolve a [`Pattern`] against the live filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use super::Pattern;
use super::path_utils::relative_str;

/// Ordered, de-duplicated absolute source paths matching a pattern at one
/// point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchSet {
    paths: Vec<PathBuf>,
}

impl MatchSet {
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        paths.dedup();
        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.binary_search_by(|p| p.as_path().cmp(path)).is_ok()
    }
}

impl IntoIterator for MatchSet {
    type Item = PathBuf;
    type IntoIter = std::vec::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

/// Walk the pattern's base directory and collect every matching file.
///
/// Re-reads the filesystem on every call. A missing base directory yields an
/// empty set.
pub fn resolve(pattern: &Pattern) -> MatchSet {
    resolve_under(pattern, pattern.base())
}

/// Like [`resolve`], but only walks the subtree at `dir` (which must lie
/// under the pattern's base). Used when a whole directory appears at once.
pub fn resolve_under(pattern: &Pattern, dir: &Path) -> MatchSet {
    if !dir.is_dir() {
        debug!(dir = ?dir, "match root is not a directory; nothing to match");
        return MatchSet::default();
    }

    let mut paths = Vec::new();
    // The base is walked even when it is itself a link; a linked
    // subdirectory is only entered when dereferencing.
    let walker = WalkDir::new(dir)
        .follow_links(pattern.dereference())
        .follow_root_links(pattern.dereference() || dir == pattern.base());

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry while matching");
                continue;
            }
        };

        if !is_matchable_file(&entry) {
            continue;
        }

        let Some(rel) = relative_str(pattern.base(), entry.path()) else {
            continue;
        };
        if pattern.matches_relative(&rel) {
            paths.push(entry.into_path());
        }
    }

    let set = MatchSet::from_paths(paths);
    debug!(pattern = %pattern.raw(), count = set.len(), "resolved pattern");
    set
}

/// Returns true if the file at `path`, known to the caller as `rel`,
/// currently satisfies `pattern`.
///
/// Same rule as [`resolve`], applied to a single path reported by the
/// watcher. A path that no longer exists never matches.
pub(crate) fn matches_file(pattern: &Pattern, rel: &str, path: &Path) -> bool {
    pattern.matches_relative(rel) && is_file_like(path)
}

/// A regular file, or a symlink whose target is a regular file.
fn is_file_like(path: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_file() => true,
        Ok(meta) if meta.file_type().is_symlink() => fs::metadata(path)
            .map(|m| m.is_file())
            .unwrap_or(false),
        _ => false,
    }
}

/// Regular files always qualify. Without dereferencing, a symlink is matched
/// by its own path when it points at a file; directory links are not entered.
fn is_matchable_file(entry: &DirEntry) -> bool {
    let ft = entry.file_type();
    if ft.is_file() {
        return true;
    }
    if ft.is_symlink() {
        return fs::metadata(entry.path())
            .map(|m| m.is_file())
            .unwrap_or(false);
    }
    false
}
