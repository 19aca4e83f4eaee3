// src/copy/mod.rs

//! Copy executor and batch copies.
//!
//! - [`CopyExecutor::copy_one`] copies a single mapping, de-duplicating
//!   concurrent requests for the same source.
//! - [`CopyExecutor::copy_all`] copies a whole match set with bounded
//!   concurrency; [`CopyExecutor::copy_all_blocking`] does the same
//!   sequentially on the calling thread.
//!
//! Per-file failures never abort a batch; they are collected in the
//! [`CopySummary`](crate::types::CopySummary).

pub mod executor;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::pattern::MatchSet;
use crate::types::{CopyOutcome, CopySummary};

pub use executor::CopyExecutor;

impl CopyExecutor {
    /// Copy every path in `matches`, at most `max_concurrent` at a time.
    pub async fn copy_all(&self, matches: MatchSet, max_concurrent: usize) -> CopySummary {
        let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for source in matches {
            let entry = self.mapping_for(source);
            let this = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let outcome = this.copy_one(entry.clone()).await;
                (entry.source, outcome)
            });
        }

        let mut summary = CopySummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, outcome)) => summary.record(source, outcome),
                // copy_one absorbs panics from the blocking pool, so this only
                // happens when the runtime is shutting down.
                Err(err) => warn!(error = %err, "copy task ended abnormally"),
            }
        }

        finish(summary)
    }

    /// Copy every path in `matches` sequentially on the calling thread.
    pub fn copy_all_blocking(&self, matches: MatchSet) -> CopySummary {
        let mut summary = CopySummary::default();
        for source in matches {
            let entry = self.mapping_for(source);
            let outcome: CopyOutcome = self.copy_one_blocking(&entry);
            summary.record(entry.source, outcome);
        }
        finish(summary)
    }
}

fn finish(mut summary: CopySummary) -> CopySummary {
    summary.failures.sort_by(|a, b| a.source.cmp(&b.source));
    debug!(
        copied = summary.copied,
        skipped = summary.skipped,
        failed = summary.failed(),
        "batch copy finished"
    );
    summary
}
