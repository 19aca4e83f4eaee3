// src/lib.rs

//! Mirror the files matched by a glob into a destination tree, once or
//! continuously.
//!
//! ```no_run
//! # async fn demo() -> globmirror::errors::Result<()> {
//! use globmirror::{config::MirrorOptions, engine::Mirror};
//!
//! let mirror = Mirror::new("src/**/*.txt", "out", MirrorOptions::default().clean(true))?;
//! let summary = mirror.copy().wait().await?;
//! assert!(summary.is_success());
//!
//! let mut session = mirror.watch().await?;
//! while let Some(event) = session.next_event().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod clean;
pub mod cli;
pub mod config;
pub mod copy;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod pattern;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::Path;

use anyhow::{bail, Result};
use tokio::sync::watch as signal;
use tracing::{error, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, MirrorOptions};
use crate::engine::{CopyTask, Mirror, MirrorEvent};
use crate::types::{CleanSummary, CopySummary};
use crate::watch::WatchHandle;

/// Start an asynchronous one-shot copy of `source` into `dest`.
///
/// Pattern and transform errors are returned before anything is touched.
pub fn copy(source: &str, dest: impl AsRef<Path>, options: MirrorOptions) -> errors::Result<CopyTask> {
    Ok(Mirror::new(source, dest, options)?.copy())
}

/// Blocking one-shot copy.
pub fn copy_sync(
    source: &str,
    dest: impl AsRef<Path>,
    options: MirrorOptions,
) -> errors::Result<CopySummary> {
    Mirror::new(source, dest, options)?.copy_sync()
}

/// Start a watch session.
pub async fn watch(
    source: &str,
    dest: impl AsRef<Path>,
    options: MirrorOptions,
) -> errors::Result<WatchHandle> {
    Mirror::new(source, dest, options)?.watch().await
}

/// Prune stale files under `dest`.
pub async fn clean(source: &str, dest: impl AsRef<Path>) -> errors::Result<CleanSummary> {
    Mirror::new(source, dest, MirrorOptions::default())?
        .clean()
        .await
}

pub fn clean_sync(source: &str, dest: impl AsRef<Path>) -> errors::Result<CleanSummary> {
    Mirror::new(source, dest, MirrorOptions::default())?.clean_sync()
}

/// High-level entry point used by `main.rs`.
///
/// Builds one mirror from SOURCE/DEST or one per `[mirror.<name>]` in the
/// config file, then either copies once or watches until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let mirrors = build_mirrors(&args)?;

    if args.watch {
        watch_until_interrupted(mirrors).await
    } else {
        copy_once(mirrors).await
    }
}

fn build_mirrors(args: &CliArgs) -> Result<Vec<(String, Mirror)>> {
    if let Some(config_path) = &args.config {
        let cfg = load_and_validate(config_path)?;
        return cfg
            .jobs()
            .into_iter()
            .map(|job| -> Result<(String, Mirror)> {
                let options = args.overlay(job.options);
                let mirror = Mirror::new(&job.source, &job.dest, options)?;
                Ok((job.name, mirror))
            })
            .collect();
    }

    match (&args.source, &args.dest) {
        (Some(source), Some(dest)) => {
            let mirror = Mirror::new(source, dest, args.mirror_options())?;
            Ok(vec![(source.clone(), mirror)])
        }
        _ => bail!("SOURCE and DEST are required unless --config is given"),
    }
}

async fn copy_once(mirrors: Vec<(String, Mirror)>) -> Result<()> {
    let mut failed = 0;
    for (name, mirror) in mirrors {
        let mut task = mirror.copy();
        while let Some(event) = task.next_event().await {
            log_event(&name, &event);
        }
        let summary = task.wait().await?;
        for failure in &summary.failures {
            error!(mirror = %name, source = ?failure.source, error = %failure.error, "file not copied");
        }
        failed += summary.failed();
    }

    if failed > 0 {
        bail!("{failed} file(s) could not be copied");
    }
    Ok(())
}

async fn watch_until_interrupted(mirrors: Vec<(String, Mirror)>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = signal::channel(false);

    let mut sessions = Vec::with_capacity(mirrors.len());
    for (name, mirror) in mirrors {
        let handle = mirror.watch().await?;
        sessions.push(tokio::spawn(pump_events(name, handle, shutdown_rx.clone())));
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; stopping now");
    }
    info!("shutting down watch sessions");
    let _ = shutdown_tx.send(true);

    for session in sessions {
        if let Err(err) = session.await {
            warn!(error = %err, "watch session task ended abnormally");
        }
    }
    Ok(())
}

async fn pump_events(name: String, mut handle: WatchHandle, mut shutdown: signal::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = handle.next_event() => match event {
                Some(event) => log_event(&name, &event),
                None => return,
            },
        }
    }

    handle.stop().await;
    while let Some(event) = handle.try_next_event() {
        log_event(&name, &event);
    }
}

fn log_event(name: &str, event: &MirrorEvent) {
    match event {
        MirrorEvent::Copied(entry) => info!(mirror = %name, "copied {entry}"),
        MirrorEvent::Removed(entry) => info!(mirror = %name, "removed {}", entry.destination.display()),
        MirrorEvent::Ready => info!(mirror = %name, "watching for changes"),
        MirrorEvent::Error(err) => warn!(mirror = %name, error = %err, "mirror error"),
    }
}
