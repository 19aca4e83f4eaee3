// src/clean.rs

//! Prune destination files that no longer correspond to a matching source.
//!
//! "Stale" means: the file lies under the destination root, its path
//! relative to that root matches the pattern's relative glob (the *shape* of
//! the pattern), and no currently-matching source maps onto it. Directories
//! emptied by a removal are pruned upward until a non-empty ancestor or the
//! destination root is reached. The destination root itself is never removed.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::{MirrorError, Result};
use crate::pattern::{relative_str, resolve, Pattern};
use crate::types::{CleanSummary, MappingEntry};

/// Remove every stale file under `dest_root`.
///
/// Stops at the first removal failure; files removed up to that point stay
/// removed. Running it twice without source changes removes nothing the
/// second time.
pub fn clean(pattern: &Pattern, dest_root: &Path) -> Result<CleanSummary> {
    let expected: HashSet<PathBuf> = resolve(pattern)
        .iter()
        .map(|source| pattern.map_to(dest_root, source))
        .collect();

    let mut summary = CleanSummary::default();
    for stale in stale_files(pattern, dest_root, &expected) {
        debug!(path = ?stale, "removing stale destination file");
        remove_file_if_present(&stale)?;
        summary.removed_files.push(stale.clone());
        if let Some(parent) = stale.parent() {
            summary.removed_dirs.extend(prune_empty_dirs(dest_root, parent)?);
        }
    }

    info!(
        pattern = %pattern.raw(),
        dest = ?dest_root,
        removed = summary.removed_files.len(),
        "clean finished"
    );
    Ok(summary)
}

/// Delete the destination of `entry` and prune the directories it leaves
/// empty. Used by the watcher when a mirrored source disappears.
pub fn remove_destination(dest_root: &Path, entry: &MappingEntry) -> Result<Vec<PathBuf>> {
    remove_file_if_present(&entry.destination)?;
    match entry.destination.parent() {
        Some(parent) => prune_empty_dirs(dest_root, parent),
        None => Ok(Vec::new()),
    }
}

/// Remove `start` and its ancestors while they are empty, stopping below
/// `dest_root`. Returns the directories removed, deepest first.
pub fn prune_empty_dirs(dest_root: &Path, start: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let mut dir = start.to_path_buf();

    while dir != dest_root && dir.starts_with(dest_root) {
        match fs::read_dir(&dir) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
                match fs::remove_dir(&dir) {
                    Ok(()) => {
                        debug!(dir = ?dir, "pruned empty directory");
                        removed.push(dir.clone());
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(MirrorError::file_io(&dir, e)),
                }
            }
            // Already gone; keep walking up.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(MirrorError::file_io(&dir, e)),
        }

        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }

    Ok(removed)
}

fn remove_file_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MirrorError::file_io(path, e)),
    }
}

fn stale_files(pattern: &Pattern, dest_root: &Path, expected: &HashSet<PathBuf>) -> Vec<PathBuf> {
    if !dest_root.is_dir() {
        return Vec::new();
    }

    let mut stale: Vec<PathBuf> = WalkDir::new(dest_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .filter(|path| {
            relative_str(dest_root, path)
                .map(|rel| pattern.matches_relative(&rel))
                .unwrap_or(false)
        })
        .filter(|path| !expected.contains(path))
        .collect();

    stale.sort();
    stale
}
