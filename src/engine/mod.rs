// src/engine/mod.rs

//! Orchestration engine for globmirror.
//!
//! This module ties together:
//! - the pattern matcher and path mapper
//! - the copy executor and the cleaner
//! - watch sessions (see [`crate::watch`])
//!
//! and exposes the result as a [`Mirror`] plus the notifications its
//! operations emit.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::errors::MirrorError;
use crate::types::MappingEntry;

pub mod mirror;

pub use mirror::{CopyTask, Mirror};

/// Notifications emitted by a running operation.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    /// A file was copied to its destination.
    Copied(MappingEntry),
    /// A destination file was removed because its source went away.
    Removed(MappingEntry),
    /// A watch session entered `Active`.
    Ready,
    /// Non-fatal error: a per-file failure, or a problem with the
    /// filesystem subscription.
    Error(Arc<MirrorError>),
}

/// Sending half of an operation's notification channel.
///
/// The receiving half lives in the handle returned to the caller. A
/// disabled notifier drops everything; so does one whose receiver is gone.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<MirrorEvent>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MirrorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: MirrorEvent) {
        if let Some(tx) = &self.tx {
            // Receiver dropped: the caller stopped listening.
            let _ = tx.send(event);
        }
    }
}
