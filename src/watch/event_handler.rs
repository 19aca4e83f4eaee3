// src/watch/event_handler.rs

//! Turn raw `notify` events into per-path changes.

use std::path::PathBuf;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// What happened to one path, as far as mirroring is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &PathBuf {
        match self {
            FileChange::Added(p) | FileChange::Changed(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Classify one `notify` event.
///
/// A rename reported as a single event (`RenameMode::Both`, paths `[from,
/// to]`) becomes a removal of the old path followed by an addition of the
/// new one. Rename halves that the backend cannot pair, and events of
/// unknown kind, are decided by whether the path still exists.
pub fn classify(event: &Event) -> Vec<FileChange> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(FileChange::Added).collect(),

        EventKind::Remove(_) => event.paths.iter().cloned().map(FileChange::Removed).collect(),

        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() >= 2 => vec![
                FileChange::Removed(event.paths[0].clone()),
                FileChange::Added(event.paths[1].clone()),
            ],
            RenameMode::From => event.paths.iter().cloned().map(FileChange::Removed).collect(),
            RenameMode::To => event.paths.iter().cloned().map(FileChange::Added).collect(),
            _ => by_existence(&event.paths),
        },

        EventKind::Modify(_) => event.paths.iter().cloned().map(FileChange::Changed).collect(),

        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            event.paths.iter().cloned().map(FileChange::Changed).collect()
        }
        EventKind::Access(_) => Vec::new(),

        EventKind::Any | EventKind::Other => by_existence(&event.paths),
    }
}

fn by_existence(paths: &[PathBuf]) -> Vec<FileChange> {
    paths
        .iter()
        .map(|p| {
            if p.exists() {
                FileChange::Added(p.clone())
            } else {
                FileChange::Removed(p.clone())
            }
        })
        .collect()
}
