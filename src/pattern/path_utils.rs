// src/pattern/path_utils.rs

//! Path helpers shared by the matcher, cleaner and watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (symlinked temp dirs, `/private/var` vs `/var` on macOS),
///   both paths are canonicalized and we try again.
///
/// Returns `None` if the path does not lie beneath `root`, or if it *is*
/// `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return non_empty(rel);
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), canonicalize_lenient(path)) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return non_empty(rel);
        }
    }

    None
}

/// Canonicalize `path`, falling back to canonicalizing its parent when the
/// path itself no longer exists (e.g. the subject of a remove event).
fn canonicalize_lenient(path: &Path) -> std::io::Result<std::path::PathBuf> {
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(err) => match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => Ok(parent.canonicalize()?.join(name)),
            _ => Err(err),
        },
    }
}

fn non_empty(rel: &Path) -> Option<String> {
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_plain_prefix() {
        let root = PathBuf::from("/work/src");
        let path = PathBuf::from("/work/src/a/b.txt");
        assert_eq!(relative_str(&root, &path).as_deref(), Some("a/b.txt"));
    }

    #[test]
    fn root_itself_and_outside_paths_have_no_relative_form() {
        let root = PathBuf::from("/definitely/not/here");
        assert_eq!(relative_str(&root, &root), None);
        assert_eq!(relative_str(&root, Path::new("/elsewhere/x.txt")), None);
    }

    #[cfg(unix)]
    #[test]
    fn resolves_removed_paths_through_canonical_parent() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        // Root spelled through the symlink, event path spelled canonically,
        // leaf already gone.
        let gone = real.canonicalize().unwrap().join("gone.txt");
        assert_eq!(relative_str(&link, &gone).as_deref(), Some("gone.txt"));
    }
}
