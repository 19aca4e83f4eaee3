// src/watch/session.rs

//! The per-session event loop.
//!
//! Events are taken one at a time in arrival order. Each one updates the set
//! of known entries immediately and then hands the filesystem work to a
//! task keyed by the source's relative path. A task waits for the previous
//! task with the same key before it starts, so work for one path is applied
//! in order while different paths proceed concurrently.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clean::remove_destination;
use crate::copy::CopyExecutor;
use crate::engine::{MirrorEvent, Notifier};
use crate::errors::MirrorError;
use crate::pattern::matcher::matches_file;
use crate::pattern::{relative_str, resolve, resolve_under, MatchSet, Pattern};
use crate::types::{MappingEntry, WatchState};

use super::event_handler::{classify, FileChange};
use super::watcher::{EventStream, Subscription};

enum Job {
    Copy(MappingEntry),
    Remove(MappingEntry),
}

pub(crate) struct WatchSession {
    pattern: Arc<Pattern>,
    dest_root: PathBuf,
    /// Canonical form of the pattern base; the root the OS reports paths under.
    watch_root: PathBuf,
    /// Destination root relative to the pattern base, when nested inside it.
    dest_prefix: Option<String>,
    executor: CopyExecutor,
    notifier: Notifier,
    known: BTreeMap<String, MappingEntry>,
    active: HashMap<String, JoinHandle<()>>,
}

impl WatchSession {
    pub(crate) fn new(
        pattern: Arc<Pattern>,
        dest_root: PathBuf,
        watch_root: PathBuf,
        executor: CopyExecutor,
        notifier: Notifier,
    ) -> Self {
        let dest_prefix =
            relative_str(&watch_root, &dest_root).or_else(|| pattern.relative_of(&dest_root));
        if let Some(prefix) = &dest_prefix {
            debug!(%prefix, "destination lies inside the watched tree; its events are ignored");
        }

        Self {
            pattern,
            dest_root,
            watch_root,
            dest_prefix,
            executor,
            notifier,
            known: BTreeMap::new(),
            active: HashMap::new(),
        }
    }

    /// Record the baseline match set as known entries.
    pub(crate) fn seed(&mut self, matches: &MatchSet) {
        for source in matches.iter() {
            if let Some(rel) = self.relative_key(source) {
                if !self.is_inside_dest(&rel) {
                    let entry = self.entry_for(&rel, source.clone());
                    self.known.insert(rel, entry);
                }
            }
        }
        debug!(known = self.known.len(), "seeded watch session");
    }

    /// Drive the session until `stop_rx` fires (or its sender is dropped).
    pub(crate) async fn run(
        mut self,
        subscription: Subscription,
        mut events: EventStream,
        mut stop_rx: oneshot::Receiver<()>,
        state_tx: watch::Sender<WatchState>,
    ) {
        let mut subscription = Some(subscription);

        loop {
            tokio::select! {
                biased;

                _ = &mut stop_rx => {
                    debug!("stop requested");
                    break;
                }

                received = events.recv(), if subscription.is_some() => match received {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(err)) => {
                        let lost = matches!(err.kind, notify::ErrorKind::MaxFilesWatch);
                        warn!(error = %err, lost, "file watch error");
                        self.notifier
                            .emit(MirrorEvent::Error(Arc::new(MirrorError::Subscription(err))));
                        if lost {
                            // Stays Active; the caller decides whether to restart.
                            subscription = None;
                        }
                    }
                    None => {
                        warn!("file watch subscription closed unexpectedly");
                        self.notifier.emit(MirrorEvent::Error(Arc::new(MirrorError::Subscription(
                            notify::Error::generic("subscription closed"),
                        ))));
                        subscription = None;
                    }
                },
            }
        }

        drop(subscription);
        self.drain().await;
        state_tx.send_replace(WatchState::Stopped);
        info!(pattern = %self.pattern.raw(), "watch session stopped");
    }

    async fn handle_event(&mut self, event: notify::Event) {
        debug!(?event, "received notify event");

        if event.need_rescan() {
            self.rescan().await;
            return;
        }

        for change in classify(&event) {
            match change {
                FileChange::Added(path) => self.on_present(path, true).await,
                FileChange::Changed(path) => self.on_present(path, false).await,
                FileChange::Removed(path) => self.on_removed(&path),
            }
        }

        self.active.retain(|_, handle| !handle.is_finished());
    }

    async fn on_present(&mut self, path: PathBuf, added: bool) {
        let Some(rel) = self.relative_key(&path) else {
            return;
        };
        if self.is_inside_dest(&rel) {
            return;
        }

        if is_directory(&path, self.pattern.dereference()) {
            if !added {
                return;
            }
            // A directory appeared (created or moved in): its contents
            // may predate the OS watch on it.
            let pattern = Arc::clone(&self.pattern);
            let dir = path.clone();
            let found = match tokio::task::spawn_blocking(move || resolve_under(&pattern, &dir)).await
            {
                Ok(found) => found,
                Err(err) => {
                    warn!(dir = ?path, error = %err, "directory scan did not complete");
                    return;
                }
            };
            for source in found {
                if let Some(rel) = self.relative_key(&source) {
                    if !self.is_inside_dest(&rel) {
                        self.schedule_copy(rel, source);
                    }
                }
            }
            return;
        }

        if matches_file(&self.pattern, &rel, &path) {
            self.schedule_copy(rel, path);
        }
    }

    fn on_removed(&mut self, path: &Path) {
        let Some(rel) = self.relative_key(path) else {
            return;
        };

        // The path may have been a directory: every known entry beneath it
        // goes too.
        let dir_prefix = format!("{rel}/");
        let gone: Vec<String> = self
            .known
            .keys()
            .filter(|key| **key == rel || key.starts_with(&dir_prefix))
            .cloned()
            .collect();

        for key in gone {
            if let Some(entry) = self.known.remove(&key) {
                self.dispatch(key, Job::Remove(entry));
            }
        }
    }

    /// The OS dropped events; reconcile against a fresh match.
    async fn rescan(&mut self) {
        warn!("watcher requested a rescan; re-resolving pattern");
        let pattern = Arc::clone(&self.pattern);
        let matches = match tokio::task::spawn_blocking(move || resolve(&pattern)).await {
            Ok(matches) => matches,
            Err(err) => {
                warn!(error = %err, "rescan did not complete");
                return;
            }
        };

        let mut current = BTreeMap::new();
        for source in matches {
            if let Some(rel) = self.relative_key(&source) {
                if !self.is_inside_dest(&rel) {
                    current.insert(rel, source);
                }
            }
        }

        let vanished: Vec<String> = self
            .known
            .keys()
            .filter(|key| !current.contains_key(*key))
            .cloned()
            .collect();
        for key in vanished {
            if let Some(entry) = self.known.remove(&key) {
                self.dispatch(key, Job::Remove(entry));
            }
        }
        for (rel, source) in current {
            self.schedule_copy(rel, source);
        }
    }

    fn schedule_copy(&mut self, rel: String, source: PathBuf) {
        let entry = self.entry_for(&rel, source);
        self.known.insert(rel.clone(), entry.clone());
        self.dispatch(rel, Job::Copy(entry));
    }

    fn dispatch(&mut self, key: String, job: Job) {
        let previous = self.active.remove(&key);
        let executor = self.executor.clone();
        let notifier = self.notifier.clone();
        let dest_root = self.dest_root.clone();

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            match job {
                Job::Copy(entry) => {
                    executor.copy_one(entry).await;
                }
                Job::Remove(entry) => remove(dest_root, entry, notifier).await,
            }
        });
        self.active.insert(key, handle);
    }

    /// Let every dispatched task finish.
    async fn drain(&mut self) {
        let pending: Vec<JoinHandle<()>> = self.active.drain().map(|(_, h)| h).collect();
        if !pending.is_empty() {
            debug!(tasks = pending.len(), "waiting for in-flight work");
        }
        for handle in pending {
            if let Err(err) = handle.await {
                warn!(error = %err, "watch task ended abnormally");
            }
        }
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        relative_str(&self.watch_root, path).or_else(|| self.pattern.relative_of(path))
    }

    fn is_inside_dest(&self, rel: &str) -> bool {
        match &self.dest_prefix {
            Some(prefix) => {
                rel == prefix.as_str()
                    || rel
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => false,
        }
    }

    fn entry_for(&self, rel: &str, source: PathBuf) -> MappingEntry {
        MappingEntry {
            source,
            destination: self.dest_root.join(rel),
        }
    }
}

/// A directory the walker would enter. Linked directories only count when
/// links are followed.
fn is_directory(path: &Path, dereference: bool) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_dir() => true,
        Ok(meta) if meta.file_type().is_symlink() && dereference => path.is_dir(),
        _ => false,
    }
}

async fn remove(dest_root: PathBuf, entry: MappingEntry, notifier: Notifier) {
    let target = entry.clone();
    let result =
        tokio::task::spawn_blocking(move || remove_destination(&dest_root, &target)).await;

    match result {
        Ok(Ok(pruned)) => {
            debug!(%entry, pruned = pruned.len(), "removed destination");
            notifier.emit(MirrorEvent::Removed(entry));
        }
        Ok(Err(err)) => {
            warn!(%entry, error = %err, "failed to remove destination");
            notifier.emit(MirrorEvent::Error(Arc::new(err)));
        }
        Err(err) => {
            warn!(%entry, error = %err, "removal task did not complete");
            notifier.emit(MirrorEvent::Error(Arc::new(MirrorError::Interrupted(
                entry.source.clone(),
            ))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::transform::TransformSpec;
    use crate::watch::watcher::subscribe;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn session_for(src: &Path, out: &Path) -> WatchSession {
        session_with(src, out, Notifier::disabled())
    }

    fn session_with(src: &Path, out: &Path, notifier: Notifier) -> WatchSession {
        let pattern = Arc::new(Pattern::new(&format!("{}/**/*.txt", src.display()), false, &[]).unwrap());
        let executor = CopyExecutor::new(Arc::clone(&pattern), out, TransformSpec::default());
        let watch_root = src.canonicalize().unwrap();
        WatchSession::new(pattern, out.to_path_buf(), watch_root, executor, notifier)
    }

    #[tokio::test]
    async fn removing_a_directory_forgets_everything_beneath_it() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        for rel in ["a/x.txt", "a/y.txt", "ab.txt"] {
            write(&src.join(rel), rel);
            write(&out.join(rel), rel);
        }

        let mut session = session_for(&src, &out);
        session.seed(&resolve(&session.pattern));
        assert_eq!(session.known.len(), 3);

        fs::remove_dir_all(src.join("a")).unwrap();
        session.on_removed(&src.join("a"));
        session.drain().await;

        assert_eq!(session.known.keys().collect::<Vec<_>>(), vec!["ab.txt"]);
        assert!(!out.join("a").exists());
        assert!(out.join("ab.txt").exists());
    }

    #[test]
    fn nested_destination_is_recognised() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let session = session_for(&src, &src.join("mirror"));

        assert!(session.is_inside_dest("mirror"));
        assert!(session.is_inside_dest("mirror/a.txt"));
        assert!(!session.is_inside_dest("mirrored.txt"));
        assert!(!session.is_inside_dest("a/mirror/b.txt"));
    }

    /// Run a session over a hand-fed event stream. The stream ends after
    /// `feed` has been sent.
    async fn lose_subscription_after(feed: Vec<notify::Result<notify::Event>>) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();

        let (notifier, mut notes) = Notifier::channel();
        let session = session_with(&src, &dir.path().join("out"), notifier);
        let (subscription, _os_events) = subscribe(&src, false).unwrap();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (state_tx, mut state_rx) = watch::channel(WatchState::Active);

        let task = tokio::spawn(session.run(subscription, events, stop_rx, state_tx));
        for event in feed {
            event_tx.send(event).unwrap();
        }
        drop(event_tx);

        match notes.recv().await {
            Some(MirrorEvent::Error(err)) => {
                assert!(matches!(err.as_ref(), MirrorError::Subscription(_)))
            }
            other => panic!("expected a subscription error, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*state_rx.borrow(), WatchState::Active);
        assert!(!task.is_finished());
        assert!(notes.try_recv().is_err(), "only one error per lost subscription");

        stop_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(*state_rx.borrow_and_update(), WatchState::Stopped);
    }

    #[tokio::test]
    async fn watch_limit_keeps_session_active_until_stopped() {
        lose_subscription_after(vec![Err(notify::Error::new(
            notify::ErrorKind::MaxFilesWatch,
        ))])
        .await;
    }

    #[tokio::test]
    async fn closed_event_stream_keeps_session_active_until_stopped() {
        lose_subscription_after(Vec::new()).await;
    }
}
