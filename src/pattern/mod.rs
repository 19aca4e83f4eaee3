// src/pattern/mod.rs

//! Glob patterns, matching, and source → destination path mapping.
//!
//! A [`Pattern`] splits a glob such as `src/**/*.txt` into:
//! - a *base directory* (`src`): the longest leading run of path components
//!   without glob metacharacters. It anchors the mapping and roots the watcher.
//! - a *relative glob* (`**/*.txt`) evaluated against paths relative to the base.
//!
//! `*` never crosses a `/`; only `**` spans directories.

pub mod mapper;
pub mod matcher;
pub mod path_utils;

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::errors::{MirrorError, Result};

pub use mapper::map;
pub use matcher::{resolve, resolve_under, MatchSet};
pub use path_utils::relative_str;

/// Immutable, compiled source pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    base: PathBuf,
    relative_glob: String,
    matcher: GlobMatcher,
    ignore: Option<GlobSet>,
    dereference: bool,
}

impl Pattern {
    /// Compile `glob`. `ignore` globs are relative to the base directory.
    ///
    /// The base directory is made absolute against the current working
    /// directory without touching the filesystem.
    pub fn new(glob: &str, dereference: bool, ignore: &[String]) -> Result<Self> {
        let (base, relative_glob) = split_base(glob);
        let matcher = compile_glob(glob, &relative_glob)?.compile_matcher();
        let ignore = build_ignore_set(ignore)?;
        let base = std::path::absolute(&base)?;

        Ok(Self {
            raw: glob.to_string(),
            base,
            relative_glob,
            matcher,
            ignore,
            dereference,
        })
    }

    /// The glob as given by the caller.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Absolute non-glob base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The glob part below [`Pattern::base`], e.g. `**/*.txt`.
    pub fn relative_glob(&self) -> &str {
        &self.relative_glob
    }

    pub fn dereference(&self) -> bool {
        self.dereference
    }

    /// Returns true if `rel_path` (forward slashes, relative to the base)
    /// matches the glob and no ignore pattern.
    pub fn matches_relative(&self, rel_path: &str) -> bool {
        if !self.matcher.is_match(rel_path) {
            return false;
        }
        if let Some(ignore) = &self.ignore {
            if ignore.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Path of `path` relative to the base directory, if it lies beneath it.
    pub fn relative_of(&self, path: &Path) -> Option<String> {
        relative_str(&self.base, path)
    }
}

fn is_glob_component(component: &str) -> bool {
    component
        .chars()
        .any(|c| matches!(c, '*' | '?' | '[' | ']' | '{' | '}'))
}

/// Split a glob into `(base directory, relative glob)`.
///
/// A glob without metacharacters (a plain file path) is anchored at its
/// parent directory.
pub(crate) fn split_base(glob: &str) -> (String, String) {
    let parts: Vec<&str> = glob
        .split('/')
        .enumerate()
        .filter(|(i, part)| *i == 0 || !part.is_empty())
        .map(|(_, part)| part)
        .collect();

    let split_at = parts
        .iter()
        .position(|part| is_glob_component(part))
        .unwrap_or(parts.len().saturating_sub(1));

    let (base_parts, glob_parts) = parts.split_at(split_at);

    let base = match base_parts {
        [] => ".".to_string(),
        [""] => "/".to_string(),
        parts => parts.join("/"),
    };

    (base, glob_parts.join("/"))
}

fn compile_glob(raw: &str, relative: &str) -> Result<Glob> {
    GlobBuilder::new(relative)
        .literal_separator(true)
        .build()
        .map_err(|source| MirrorError::Match {
            pattern: raw.to_string(),
            source,
        })
}

fn build_ignore_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat, pat)?);
    }
    let set = builder.build().map_err(|source| MirrorError::Match {
        pattern: patterns.join(", "),
        source,
    })?;
    Ok(Some(set))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_stops_at_first_glob_component() {
        assert_eq!(
            split_base("src/**/*.txt"),
            ("src".to_string(), "**/*.txt".to_string())
        );
        assert_eq!(
            split_base("a/b/c*/d.txt"),
            ("a/b".to_string(), "c*/d.txt".to_string())
        );
        assert_eq!(split_base("*.txt"), (".".to_string(), "*.txt".to_string()));
        assert_eq!(
            split_base("/abs/{x,y}/*.md"),
            ("/abs".to_string(), "{x,y}/*.md".to_string())
        );
        assert_eq!(split_base("/*.md"), ("/".to_string(), "*.md".to_string()));
    }

    #[test]
    fn literal_path_is_anchored_at_parent() {
        assert_eq!(
            split_base("src/dir/file.txt"),
            ("src/dir".to_string(), "file.txt".to_string())
        );
        assert_eq!(
            split_base("file.txt"),
            (".".to_string(), "file.txt".to_string())
        );
    }

    #[test]
    fn duplicate_separators_are_collapsed() {
        assert_eq!(
            split_base("src//b/*.txt"),
            ("src/b".to_string(), "*.txt".to_string())
        );
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let p = Pattern::new("src/*.txt", false, &[]).unwrap();
        assert!(p.matches_relative("a.txt"));
        assert!(!p.matches_relative("b/c.txt"));

        let p = Pattern::new("src/**/*.txt", false, &[]).unwrap();
        assert!(p.matches_relative("a.txt"));
        assert!(p.matches_relative("b/c.txt"));
        assert!(!p.matches_relative("b/c.md"));
    }

    #[test]
    fn ignore_patterns_exclude_matches() {
        let p = Pattern::new("src/**/*.txt", false, &["tmp/**".to_string()]).unwrap();
        assert!(p.matches_relative("keep.txt"));
        assert!(!p.matches_relative("tmp/drop.txt"));
    }

    #[test]
    fn base_is_absolute() {
        let p = Pattern::new("src/**/*.txt", true, &[]).unwrap();
        assert!(p.base().is_absolute());
        assert!(p.base().ends_with("src"));
        assert!(p.dereference());
        assert_eq!(p.raw(), "src/**/*.txt");
        assert_eq!(p.relative_glob(), "**/*.txt");
    }

    #[test]
    fn invalid_glob_is_a_match_error() {
        let err = Pattern::new("src/[a.txt", false, &[]).unwrap_err();
        assert!(matches!(err, MirrorError::Match { .. }));

        let err = Pattern::new("src/*.txt", false, &["{unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, MirrorError::Match { .. }));
    }
}
