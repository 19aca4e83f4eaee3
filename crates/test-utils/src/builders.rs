#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A throwaway source/destination layout under one temp directory.
///
/// ```text
/// <tmp>/src/...   source files, written with `write`
/// <tmp>/out/...   destination root (not created up front)
/// ```
pub struct TestTree {
    dir: TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("src")).expect("create src dir");
        Self { dir }
    }

    /// The `{src/a.txt: "hi", src/b/c.txt: "yo"}` tree.
    pub fn hi_yo() -> Self {
        Self::new().with_file("a.txt", "hi").with_file("b/c.txt", "yo")
    }

    pub fn with_file(self, rel: &str, contents: &str) -> Self {
        self.write(rel, contents);
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn src(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Glob rooted at the source directory, e.g. `glob("**/*.txt")`.
    pub fn glob(&self, rel_glob: &str) -> String {
        format!("{}/{}", self.src().display(), rel_glob)
    }

    /// Write a source file, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.src().join(rel), contents)
    }

    /// Write a file directly under the destination root.
    pub fn write_out(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(&self.out().join(rel), contents)
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.src().join(rel)).expect("remove source file");
    }

    pub fn rename(&self, from: &str, to: &str) {
        let to = self.src().join(to);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).expect("create rename target dir");
        }
        fs::rename(self.src().join(from), to).expect("rename source");
    }

    /// Contents of a destination file, or `None` if it does not exist.
    pub fn read_out(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.out().join(rel)).ok()
    }

    pub fn out_exists(&self, rel: &str) -> bool {
        self.out().join(rel).exists()
    }

    /// Every file under the destination root as `(relative path, contents)`,
    /// sorted by path.
    pub fn out_snapshot(&self) -> Vec<(String, Vec<u8>)> {
        snapshot(&self.out())
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, contents: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
    path.to_path_buf()
}

/// Recursively list `root` as sorted `(relative path, contents)` pairs.
pub fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    collect(root, root, &mut files);
    files.sort();
    files
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(String, Vec<u8>)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let rel = path
                .strip_prefix(root)
                .expect("walked path under root")
                .to_string_lossy()
                .replace('\\', "/");
            files.push((rel, fs::read(&path).expect("read file")));
        }
    }
}
