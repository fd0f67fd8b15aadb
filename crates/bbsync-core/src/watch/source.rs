//! Filesystem watch primitive
//!
//! A [`WatchSource`] turns a [`WatchSpec`] into a live [`Subscription`]
//! that sends [`WatchNotification`]s until it is dropped.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::classify::FileClassifier;
use crate::error::SyncResult;
use crate::path::collapse_separators;
use crate::remote::SyncKind;
use crate::settings::SyncConfig;

/// What happened to a watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchEventKind {
    Created,
    Changed,
    Deleted,
}

impl WatchEventKind {
    /// The sync action a notification of this kind triggers
    pub fn sync_kind(self) -> SyncKind {
        match self {
            WatchEventKind::Created => SyncKind::Create,
            WatchEventKind::Changed => SyncKind::Update,
            WatchEventKind::Deleted => SyncKind::Delete,
        }
    }
}

/// A single create/change/delete notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchNotification {
    /// Id of the session that produced it
    pub session: u64,
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

/// What a session should watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub session: u64,
    /// Script-root directory inside every workspace root
    pub directories: Vec<PathBuf>,
    /// Display form, e.g. `/ws/scripts/**/*.{js,script,ns,txt}`
    pub globs: Vec<String>,
    pub classifier: FileClassifier,
}

impl WatchSpec {
    pub fn new(session: u64, config: &SyncConfig, workspace_roots: &[PathBuf]) -> Self {
        let relative_root = config.script_root.trim_matches('/');

        let directories: Vec<PathBuf> = workspace_roots
            .iter()
            .map(|root| {
                if relative_root.is_empty() {
                    root.clone()
                } else {
                    root.join(relative_root)
                }
            })
            .collect();

        let globs = directories
            .iter()
            .map(|dir| {
                collapse_separators(&format!(
                    "{}/**/*.{{{}}}",
                    dir.to_string_lossy(),
                    config.classifier.glob_alternatives()
                ))
            })
            .collect();

        Self {
            session,
            directories,
            globs,
            classifier: config.classifier.clone(),
        }
    }
}

/// Live subscription; dropping it stops the notifications
pub struct Subscription {
    session: u64,
    _guard: Box<dyn Any + Send>,
}

impl Subscription {
    pub fn new(session: u64, guard: impl Any + Send) -> Self {
        Self {
            session,
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Something that can watch directories
pub trait WatchSource: Send {
    fn subscribe(
        &mut self,
        spec: &WatchSpec,
        tx: mpsc::UnboundedSender<WatchNotification>,
    ) -> SyncResult<Subscription>;
}
