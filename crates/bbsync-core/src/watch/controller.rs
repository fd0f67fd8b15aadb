//! Watch lifecycle
//!
//! Two states, DISABLED (initial) and ENABLED. At most one session is live:
//! enabling while a session exists tears the old one down before the new
//! subscription is created.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::info;

use super::source::{Subscription, WatchNotification, WatchSource, WatchSpec};
use crate::error::SyncResult;
use crate::settings::SyncConfig;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Disabled,
    Enabled,
}

/// The single live subscription
#[derive(Debug)]
pub struct WatchSession {
    pub id: u64,
    /// Config version the session was created from
    pub config_version: u64,
    pub globs: Vec<String>,
    _subscription: Subscription,
}

/// Owns the watch subscription
pub struct WatchController<S: WatchSource> {
    source: S,
    tx: mpsc::UnboundedSender<WatchNotification>,
    session: Option<WatchSession>,
    next_id: u64,
}

impl<S: WatchSource> WatchController<S> {
    /// Notifications of every session are sent on `tx`
    pub fn new(source: S, tx: mpsc::UnboundedSender<WatchNotification>) -> Self {
        Self {
            source,
            tx,
            session: None,
            next_id: 1,
        }
    }

    pub fn state(&self) -> WatchState {
        if self.session.is_some() {
            WatchState::Enabled
        } else {
            WatchState::Disabled
        }
    }

    pub fn session(&self) -> Option<&WatchSession> {
        self.session.as_ref()
    }

    /// Start a session for `config`, replacing any live one.
    ///
    /// Refuses without an auth token. If subscribing fails the controller
    /// ends up DISABLED.
    pub fn enable(
        &mut self,
        config: &SyncConfig,
        workspace_roots: &[PathBuf],
    ) -> SyncResult<&WatchSession> {
        config.require_token()?;

        // The previous subscription is gone before the next one exists
        self.disable();

        let id = self.next_id;
        self.next_id += 1;

        let spec = WatchSpec::new(id, config, workspace_roots);
        let subscription = self.source.subscribe(&spec, self.tx.clone())?;

        info!("Watch session {} enabled for config v{}", id, config.version);
        Ok(&*self.session.insert(WatchSession {
            id,
            config_version: config.version,
            globs: spec.globs,
            _subscription: subscription,
        }))
    }

    /// Stop the live session. Returns whether there was one.
    pub fn disable(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                info!("Watch session {} disabled", session.id);
                drop(session);
                true
            }
            None => false,
        }
    }

    /// Whether a notification came from the live session
    pub fn is_current(&self, notification: &WatchNotification) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.id == notification.session)
    }
}
