// src/watch/mod.rs

//! File watching and incremental mirroring.
//!
//! This module is responsible for:
//! - Wiring up a cross-platform filesystem watcher (`notify`) on the
//!   pattern's base directory.
//! - Turning raw notifications into added / changed / removed paths.
//! - Keeping the destination in step with those changes for as long as the
//!   session runs.
//!
//! A session goes `Starting → Active → Stopped`. It only reaches `Stopped`
//! through [`WatchHandle::stop`] or by dropping the handle; errors are
//! reported as [`MirrorEvent::Error`] and leave the session `Active`.

pub mod event_handler;
pub mod session;
pub mod watcher;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clean;
use crate::engine::mirror::run_blocking;
use crate::engine::{Mirror, MirrorEvent, Notifier};
use crate::errors::Result;
use crate::pattern::resolve;
use crate::types::WatchState;

pub use event_handler::{classify, FileChange};
pub use watcher::{subscribe, EventStream, Subscription};

use session::WatchSession;

/// Caller's side of a running watch session.
///
/// Dropping the handle stops the session.
#[derive(Debug)]
pub struct WatchHandle {
    events: mpsc::UnboundedReceiver<MirrorEvent>,
    state: watch::Receiver<WatchState>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Next notification. `None` once the session has stopped and every
    /// pending notification was delivered.
    pub async fn next_event(&mut self) -> Option<MirrorEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<MirrorEvent> {
        self.events.try_recv().ok()
    }

    pub fn state(&self) -> WatchState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<WatchState> {
        self.state.clone()
    }

    /// Close the subscription and wait for in-flight work to finish.
    /// Idempotent.
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "watch session task ended abnormally");
            }
        }
    }
}

/// Run the `Starting` phase and hand back a handle to the `Active` session.
///
/// Order: optional clean, baseline copy (unless `initial_copy` is off), then
/// the subscription. A failure in any of these is returned and nothing keeps
/// running.
pub(crate) async fn start(mirror: &Mirror) -> Result<WatchHandle> {
    let pattern = mirror.shared_pattern();
    let options = mirror.options();
    let (state_tx, state_rx) = watch::channel(WatchState::Starting);
    let (notifier, events) = Notifier::channel();
    let executor = mirror.executor().with_notifier(notifier.clone());

    info!(pattern = %pattern.raw(), dest = ?mirror.dest_root(), "starting watch session");

    if options.clean {
        let pattern = mirror.shared_pattern();
        let dest_root = mirror.dest_root().to_path_buf();
        run_blocking(move || clean::clean(&pattern, &dest_root)).await??;
    }

    let matches = {
        let pattern = mirror.shared_pattern();
        run_blocking(move || resolve(&pattern)).await?
    };

    if options.initial_copy {
        let summary = executor
            .copy_all(matches.clone(), options.max_concurrent_copies)
            .await;
        debug!(
            copied = summary.copied,
            skipped = summary.skipped,
            failed = summary.failed(),
            "baseline copy finished"
        );
    }

    // Canonicalize once so paths reported by the OS share our prefix.
    let watch_root = pattern
        .base()
        .canonicalize()
        .unwrap_or_else(|_| pattern.base().to_path_buf());
    let (subscription, stream) = subscribe(&watch_root, pattern.dereference())?;

    let mut session = WatchSession::new(
        pattern,
        mirror.dest_root().to_path_buf(),
        watch_root,
        executor,
        notifier.clone(),
    );
    session.seed(&matches);

    let (stop_tx, stop_rx) = oneshot::channel();
    state_tx.send_replace(WatchState::Active);
    notifier.emit(MirrorEvent::Ready);

    let task = tokio::spawn(session.run(subscription, stream, stop_rx, state_tx));

    Ok(WatchHandle {
        events,
        state: state_rx,
        stop_tx: Some(stop_tx),
        task: Some(task),
    })
}
