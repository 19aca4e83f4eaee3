// src/engine/mirror.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::clean;
use crate::config::MirrorOptions;
use crate::copy::CopyExecutor;
use crate::errors::{MirrorError, Result};
use crate::pattern::{resolve, MatchSet, Pattern};
use crate::types::{CleanSummary, CopySummary};
use crate::watch::{self, WatchHandle};

use super::{MirrorEvent, Notifier};

/// One source pattern mirrored into one destination root.
///
/// Construction compiles the pattern and the transforms, so every error a
/// caller can fix up front surfaces here, before anything touches the
/// filesystem. Clones share the in-flight copy table.
#[derive(Clone)]
pub struct Mirror {
    pattern: Arc<Pattern>,
    dest_root: PathBuf,
    options: MirrorOptions,
    executor: CopyExecutor,
}

impl fmt::Debug for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mirror")
            .field("pattern", &self.pattern.raw())
            .field("dest_root", &self.dest_root)
            .finish_non_exhaustive()
    }
}

impl Mirror {
    pub fn new(source: &str, dest: impl AsRef<Path>, options: MirrorOptions) -> Result<Self> {
        let pattern = Arc::new(Pattern::new(source, options.dereference, &options.ignore)?);
        let dest_root = std::path::absolute(dest.as_ref())?;
        let transforms = options.transform_spec()?;
        let executor = CopyExecutor::new(Arc::clone(&pattern), dest_root.clone(), transforms)
            .with_update(options.update);

        debug!(
            pattern = %pattern.raw(),
            base = ?pattern.base(),
            dest = ?dest_root,
            "mirror configured"
        );

        Ok(Self {
            pattern,
            dest_root,
            options,
            executor,
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    pub(crate) fn shared_pattern(&self) -> Arc<Pattern> {
        Arc::clone(&self.pattern)
    }

    pub(crate) fn executor(&self) -> &CopyExecutor {
        &self.executor
    }

    /// Start an asynchronous one-shot copy (preceded by a clean when the
    /// `clean` option is set). Must be called within a tokio runtime.
    pub fn copy(&self) -> CopyTask {
        let (notifier, events) = Notifier::channel();
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_copy(notifier).await });
        CopyTask { events, handle }
    }

    async fn run_copy(self, notifier: Notifier) -> Result<CopySummary> {
        if self.options.clean {
            self.clean().await?;
        }

        let pattern = self.shared_pattern();
        let matches = run_blocking(move || resolve(&pattern)).await?;
        self.require_match(&matches)?;

        info!(pattern = %self.pattern.raw(), files = matches.len(), "copying");
        let summary = self
            .executor
            .with_notifier(notifier)
            .copy_all(matches, self.options.max_concurrent_copies)
            .await;
        log_summary(&self.pattern, &summary);
        Ok(summary)
    }

    /// Copy every matching file sequentially on the calling thread.
    ///
    /// Per-file failures are collected in the summary; only a clean failure,
    /// or an empty match while `require_match` is set, returns `Err`.
    pub fn copy_sync(&self) -> Result<CopySummary> {
        if self.options.clean {
            self.clean_sync()?;
        }

        let matches = resolve(&self.pattern);
        self.require_match(&matches)?;

        info!(pattern = %self.pattern.raw(), files = matches.len(), "copying");
        let summary = self.executor.copy_all_blocking(matches);
        log_summary(&self.pattern, &summary);
        Ok(summary)
    }

    /// Start a watch session. Returns once the session is `Active`.
    pub async fn watch(&self) -> Result<WatchHandle> {
        watch::start(self).await
    }

    pub async fn clean(&self) -> Result<CleanSummary> {
        let pattern = self.shared_pattern();
        let dest_root = self.dest_root.clone();
        run_blocking(move || clean::clean(&pattern, &dest_root)).await?
    }

    pub fn clean_sync(&self) -> Result<CleanSummary> {
        clean::clean(&self.pattern, &self.dest_root)
    }

    fn require_match(&self, matches: &MatchSet) -> Result<()> {
        if self.options.require_match && matches.is_empty() {
            return Err(MirrorError::NoMatch(self.pattern.raw().to_string()));
        }
        Ok(())
    }
}

fn log_summary(pattern: &Pattern, summary: &CopySummary) {
    info!(
        pattern = %pattern.raw(),
        copied = summary.copied,
        skipped = summary.skipped,
        failed = summary.failed(),
        "copy finished"
    );
}

/// Run blocking filesystem work off the async worker threads.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| MirrorError::Other(anyhow::Error::new(err)))
}

/// Handle to a running one-shot copy.
///
/// Notifications (`Copied`, `Error`) arrive on [`CopyTask::next_event`] while
/// the batch runs; the channel closes once the batch has finished.
#[derive(Debug)]
pub struct CopyTask {
    events: mpsc::UnboundedReceiver<MirrorEvent>,
    handle: JoinHandle<Result<CopySummary>>,
}

impl CopyTask {
    pub async fn next_event(&mut self) -> Option<MirrorEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<MirrorEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the batch and return its summary.
    pub async fn wait(self) -> Result<CopySummary> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(MirrorError::Other(anyhow::Error::new(err))),
        }
    }

    /// Wait for the batch, also returning every notification it emitted
    /// that was not consumed through [`CopyTask::next_event`].
    pub async fn wait_with_events(mut self) -> (Result<CopySummary>, Vec<MirrorEvent>) {
        let mut collected = Vec::new();
        while let Some(event) = self.events.recv().await {
            collected.push(event);
        }
        (self.wait().await, collected)
    }
}
