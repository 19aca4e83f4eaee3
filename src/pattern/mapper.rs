// src/pattern/mapper.rs

use std::path::{Path, PathBuf};

use tracing::warn;

use super::Pattern;
use super::path_utils::relative_str;

/// Map a matched source path to its destination path.
///
/// `destination = dest_root + (source - pattern.base)`; depth and file name
/// below the base are preserved exactly. `source` is expected to be a path
/// produced by matching `pattern`.
pub fn map(pattern: &Pattern, dest_root: &Path, source: &Path) -> PathBuf {
    if let Ok(rel) = source.strip_prefix(pattern.base()) {
        return dest_root.join(rel);
    }

    // Same directory spelled differently (symlinked roots); go through the
    // canonical forms.
    if let Some(rel) = relative_str(pattern.base(), source) {
        return dest_root.join(rel);
    }

    warn!(
        source = ?source,
        base = ?pattern.base(),
        "path outside pattern base; mapping by file name only"
    );
    dest_root.join(source.file_name().unwrap_or_default())
}

impl Pattern {
    /// See [`map`].
    pub fn map_to(&self, dest_root: &Path, source: &Path) -> PathBuf {
        map(self, dest_root, source)
    }
}
