// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::errors::Result;
use crate::transform::{TransformConfig, TransformSpec, TransformStage};

/// Default upper bound on concurrent copies in a one-shot batch.
pub const DEFAULT_MAX_CONCURRENT_COPIES: usize = 16;

/// Options recognised by every mirror operation.
///
/// Deserializable so the same struct can be filled from TOML; unknown keys
/// are ignored. Programmatic transform stages go in `stages` and run after
/// the declarative `transform` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MirrorOptions {
    /// Prune stale destination files before copying / watching.
    pub clean: bool,
    /// Follow symlinks while matching.
    pub dereference: bool,
    /// Leave destinations that are at least as new as their source.
    pub update: bool,
    /// Run the baseline copy when a watch session starts.
    pub initial_copy: bool,
    /// Globs, relative to the pattern's base directory, that never match.
    pub ignore: Vec<String>,
    /// Fail a one-shot copy when the pattern matches nothing.
    pub require_match: bool,
    pub max_concurrent_copies: usize,
    pub transform: Vec<TransformConfig>,
    #[serde(skip)]
    pub stages: Vec<Arc<dyn TransformStage>>,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            clean: false,
            dereference: false,
            update: false,
            initial_copy: true,
            ignore: Vec::new(),
            require_match: false,
            max_concurrent_copies: DEFAULT_MAX_CONCURRENT_COPIES,
            transform: Vec::new(),
            stages: Vec::new(),
        }
    }
}

impl MirrorOptions {
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn dereference(mut self, dereference: bool) -> Self {
        self.dereference = dereference;
        self
    }

    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn initial_copy(mut self, initial_copy: bool) -> Self {
        self.initial_copy = initial_copy;
        self
    }

    pub fn ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn require_match(mut self, require_match: bool) -> Self {
        self.require_match = require_match;
        self
    }

    /// Append a programmatic transform stage.
    pub fn stage(mut self, stage: impl TransformStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Compile declarative transforms and append the programmatic ones.
    pub fn transform_spec(&self) -> Result<TransformSpec> {
        let mut spec = TransformSpec::default();
        for decl in &self.transform {
            spec.push(decl.build()?);
        }
        for stage in &self.stages {
            spec.push(Arc::clone(stage));
        }
        Ok(spec)
    }
}

/// Raw config file as read from TOML, before validation.
///
/// ```toml
/// [default]
/// clean = true
/// ignore = ["**/*.tmp"]
///
/// [mirror.assets]
/// source = "assets/**/*.{png,svg}"
/// dest = "dist/assets"
///
/// [mirror.docs]
/// source = "docs/**/*.md"
/// dest = "dist/docs"
/// update = true
///
/// [[mirror.docs.transform]]
/// kind = "replace"
/// pattern = "__VERSION__"
/// replacement = "1.0.0"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub default: DefaultSection,

    /// Keys are mirror names.
    #[serde(default)]
    pub mirror: BTreeMap<String, MirrorConfig>,
}

/// Validated configuration. Build via `ConfigFile::try_from(raw)` or
/// [`load_and_validate`](crate::config::load_and_validate).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub default: DefaultSection,
    pub mirror: BTreeMap<String, MirrorConfig>,
    /// Directory relative `source` / `dest` values are resolved against.
    root_dir: PathBuf,
}

/// `[default]` section: option values shared by every mirror.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    #[serde(default)]
    pub clean: Option<bool>,
    #[serde(default)]
    pub dereference: Option<bool>,
    #[serde(default)]
    pub update: Option<bool>,
    #[serde(default)]
    pub initial_copy: Option<bool>,
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub require_match: Option<bool>,
    #[serde(default)]
    pub max_concurrent_copies: Option<usize>,
}

/// `[mirror.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Source glob.
    pub source: String,
    /// Destination directory.
    pub dest: PathBuf,

    #[serde(default)]
    pub clean: Option<bool>,
    #[serde(default)]
    pub dereference: Option<bool>,
    #[serde(default)]
    pub update: Option<bool>,
    #[serde(default)]
    pub initial_copy: Option<bool>,
    /// If `None`, the mirror uses `default.ignore`; otherwise both lists apply.
    #[serde(default)]
    pub ignore: Option<Vec<String>>,
    #[serde(default)]
    pub require_match: Option<bool>,
    #[serde(default)]
    pub max_concurrent_copies: Option<usize>,
    #[serde(default)]
    pub transform: Vec<TransformConfig>,
}

impl MirrorConfig {
    /// Per-mirror values win; unset values fall back to `[default]`, then to
    /// [`MirrorOptions::default`].
    pub fn effective_options(&self, defaults: &DefaultSection) -> MirrorOptions {
        let base = MirrorOptions::default();

        let mut ignore = defaults.ignore.clone();
        if let Some(own) = &self.ignore {
            ignore.extend(own.iter().cloned());
        }

        MirrorOptions {
            clean: self.clean.or(defaults.clean).unwrap_or(base.clean),
            dereference: self
                .dereference
                .or(defaults.dereference)
                .unwrap_or(base.dereference),
            update: self.update.or(defaults.update).unwrap_or(base.update),
            initial_copy: self
                .initial_copy
                .or(defaults.initial_copy)
                .unwrap_or(base.initial_copy),
            ignore,
            require_match: self
                .require_match
                .or(defaults.require_match)
                .unwrap_or(base.require_match),
            max_concurrent_copies: self
                .max_concurrent_copies
                .or(defaults.max_concurrent_copies)
                .unwrap_or(base.max_concurrent_copies),
            transform: self.transform.clone(),
            stages: Vec::new(),
        }
    }
}

/// One fully-resolved mirror ready to hand to the engine.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    pub name: String,
    pub source: String,
    pub dest: PathBuf,
    pub options: MirrorOptions,
}

impl ConfigFile {
    /// Construct without validation; used by the validating `TryFrom`.
    pub(crate) fn new_unchecked(
        default: DefaultSection,
        mirror: BTreeMap<String, MirrorConfig>,
    ) -> Self {
        Self {
            default,
            mirror,
            root_dir: PathBuf::from("."),
        }
    }

    /// Resolve relative sources and destinations against `root_dir`.
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// All mirrors with effective options and root-resolved paths, in name
    /// order.
    pub fn jobs(&self) -> Vec<MirrorJob> {
        self.mirror
            .iter()
            .map(|(name, m)| MirrorJob {
                name: name.clone(),
                source: resolve_glob(&self.root_dir, &m.source),
                dest: self.root_dir.join(&m.dest),
                options: m.effective_options(&self.default),
            })
            .collect()
    }
}

fn resolve_glob(root: &Path, glob: &str) -> String {
    if Path::new(glob).is_absolute() || root == Path::new(".") {
        glob.to_string()
    } else {
        format!("{}/{}", root.to_string_lossy().trim_end_matches('/'), glob)
    }
}
