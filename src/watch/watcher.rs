// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::Result;

/// Raw notifications from the OS watcher, errors included.
pub type EventStream = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Handle for the filesystem subscription.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle stops file watching and closes the
/// paired [`EventStream`].
pub struct Subscription {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("root", &self.root)
            .finish()
    }
}

/// Watch `root` recursively. Linked directories beneath it are only
/// watched when `follow_symlinks` is set.
///
/// `root` must exist; failure to open the watch is returned as
/// [`MirrorError::Subscription`](crate::errors::MirrorError::Subscription).
pub fn subscribe(root: &Path, follow_symlinks: bool) -> Result<(Subscription, EventStream)> {
    // Channel from the blocking notify callback into the async world.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // Receiver gone means the session is shutting down.
            let _ = event_tx.send(res);
        },
        Config::default().with_follow_symlinks(follow_symlinks),
    )?;

    watcher.watch(root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    Ok((
        Subscription {
            _inner: watcher,
            root: root.to_path_buf(),
        },
        event_rx,
    ))
}
