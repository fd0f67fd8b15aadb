//! Typed request outcomes

use serde::Serialize;

use super::payload::SyncKind;
use crate::error::SyncError;
use crate::notification::Notification;

/// How the game answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// HTTP 200
    Success,
    /// HTTP 401
    AuthRejected,
    /// Any other HTTP status
    Failed { code: u16, body: String },
    /// No HTTP response at all
    Transport { message: String },
}

/// Terminal result of one request. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub kind: SyncKind,
    pub filename: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl SyncOutcome {
    /// Map an HTTP status code and body onto an outcome
    pub fn from_response(kind: SyncKind, filename: String, code: u16, body: String) -> Self {
        let status = match code {
            200 => OutcomeStatus::Success,
            401 => OutcomeStatus::AuthRejected,
            _ => OutcomeStatus::Failed { code, body },
        };
        Self {
            kind,
            filename,
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }

    /// The failure as an error, if there was one
    pub fn error(&self) -> Option<SyncError> {
        let filename = self.filename.clone();
        match &self.status {
            OutcomeStatus::Success => None,
            OutcomeStatus::AuthRejected => Some(SyncError::RemoteAuthRejected { filename }),
            OutcomeStatus::Failed { code, body } => Some(SyncError::RemoteRequestFailed {
                filename,
                status: *code,
                body: body.clone(),
            }),
            OutcomeStatus::Transport { message } => Some(SyncError::Transport {
                filename,
                message: message.clone(),
            }),
        }
    }

    /// Message to show the user, if any.
    ///
    /// Failures are always shown. Successes only when success notifications
    /// are on or the push was explicitly requested (`force_show`).
    pub fn notification(&self, notify_on_success: bool, force_show: bool) -> Option<Notification> {
        if let Some(err) = self.error() {
            return Some(Notification::error(err.to_string()));
        }

        if !(notify_on_success || force_show) {
            return None;
        }

        let message = match self.kind {
            SyncKind::Delete => format!("{} has been deleted!", self.filename),
            _ => format!("{} has been uploaded!", self.filename),
        };
        Some(Notification::info(message))
    }
}
