//! Resolved sync settings
//!
//! [`ConfigResolver::refresh`] turns a [`RawHostConfig`] into an immutable,
//! versioned [`SyncConfig`]. It runs on startup and again on every host
//! configuration change; the previous config is replaced wholesale.

use std::fmt;

use tracing::{debug, warn};

use crate::classify::FileClassifier;
use crate::config::RawHostConfig;
use crate::error::SyncError;
use crate::path::normalize_script_root;

/// Immutable snapshot of the user configuration
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Increases by one on every refresh
    pub version: u64,
    /// Workspace-relative script directory, e.g. `scripts/`, or `/`
    pub script_root: String,
    /// Bearer token without the `Bearer ` prefix
    pub auth_token: Option<String>,
    pub notify_on_success: bool,
    pub notify_on_watch_enable: bool,
    pub classifier: FileClassifier,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("version", &self.version)
            .field("script_root", &self.script_root)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("notify_on_success", &self.notify_on_success)
            .field("notify_on_watch_enable", &self.notify_on_watch_enable)
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: 0,
            script_root: "/".to_string(),
            auth_token: None,
            notify_on_success: true,
            notify_on_watch_enable: true,
            classifier: FileClassifier::default(),
        }
    }
}

impl SyncConfig {
    /// Auth token, or the error that blocks pushing without one
    pub fn require_token(&self) -> Result<&str, SyncError> {
        self.auth_token.as_deref().ok_or(SyncError::AuthNotConfigured)
    }

    pub fn has_token(&self) -> bool {
        self.auth_token.is_some()
    }
}

/// What a refresh means for the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherDirective {
    /// Leave the watcher as it is
    Unchanged,
    /// The enabled flag took effect with this value
    Set(bool),
}

/// Result of one refresh
#[derive(Debug)]
pub struct Resolution {
    pub config: SyncConfig,
    pub watcher: WatcherDirective,
    /// Non-fatal problems to surface to the user
    pub warnings: Vec<SyncError>,
}

/// Remembers what earlier refreshes resolved
#[derive(Debug, Default)]
pub struct ConfigResolver {
    version: u64,
    previous_enabled: Option<bool>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refreshes performed so far
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Build a new config from raw host settings
    pub fn refresh(&mut self, raw: &RawHostConfig) -> Resolution {
        self.version += 1;
        let mut warnings = Vec::new();

        let auth_token = raw.auth_token.as_deref().and_then(sanitize_token);

        let enabled = raw.file_watcher_enabled();
        if enabled.global.is_some() {
            warn!("Ignoring file_watcher_enabled set in global scope");
            warnings.push(SyncError::Configuration(
                "`file_watcher_enabled` is only honoured in workspace or folder settings; the global value is ignored.".to_string(),
            ));
        }
        let resolved_enabled = enabled.folder.or(enabled.workspace).unwrap_or(enabled.default);

        let first_resolution = self.previous_enabled.is_none();
        let changed = self.previous_enabled != Some(resolved_enabled);
        let watcher = if first_resolution || auth_token.is_none() || changed {
            WatcherDirective::Set(resolved_enabled)
        } else {
            WatcherDirective::Unchanged
        };
        self.previous_enabled = Some(resolved_enabled);

        let config = SyncConfig {
            version: self.version,
            script_root: normalize_script_root(raw.script_root().effective()),
            auth_token,
            notify_on_success: *raw.notify_on_success().effective(),
            notify_on_watch_enable: *raw.notify_on_watch_enable().effective(),
            classifier: FileClassifier::new(raw.valid_extensions().effective().iter().cloned()),
        };

        debug!(
            "Resolved configuration v{}: {:?}, watcher {:?}",
            config.version, config, watcher
        );
        Resolution {
            config,
            watcher,
            warnings,
        }
    }
}

/// Trim a user-supplied token and strip a leading `bearer` prefix.
///
/// Returns `None` when nothing is left.
pub fn sanitize_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let prefix_len = "bearer".len();

    let token = match trimmed.get(..prefix_len) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer") => trimmed[prefix_len..].trim(),
        _ => trimmed,
    };

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
