//! Request building
//!
//! Turning a [`SyncEvent`] into a [`RemoteRequest`] is pure: no I/O happens
//! until the request is handed to the client.

use std::fmt;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::error::SyncResult;
use crate::path::{canonicalize_for_wire, normalize_filename};
use crate::settings::SyncConfig;

/// The CRUD action a sync performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncKind {
    Create,
    Update,
    Upsert,
    Delete,
}

impl SyncKind {
    pub fn method(self) -> HttpMethod {
        match self {
            SyncKind::Delete => HttpMethod::Delete,
            _ => HttpMethod::Post,
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncKind::Create => "CREATE",
            SyncKind::Update => "UPDATE",
            SyncKind::Upsert => "UPSERT",
            SyncKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// HTTP method used against the file API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Delete,
}

/// One local change to mirror into the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub kind: SyncKind,
    pub absolute_path: PathBuf,
    /// File contents; `None` for deletes
    pub content: Option<Vec<u8>>,
}

impl SyncEvent {
    pub fn write(kind: SyncKind, absolute_path: PathBuf, content: Vec<u8>) -> Self {
        Self {
            kind,
            absolute_path,
            content: Some(content),
        }
    }

    pub fn delete(absolute_path: PathBuf) -> Self {
        Self {
            kind: SyncKind::Delete,
            absolute_path,
            content: None,
        }
    }
}

/// JSON body the game expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFilePayload {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A fully built request, ready to send
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub kind: SyncKind,
    pub method: HttpMethod,
    /// Wire filename, already canonicalized
    pub filename: String,
    pub body: Vec<u8>,
    pub token: String,
}

impl fmt::Debug for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteRequest")
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("filename", &self.filename)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl RemoteRequest {
    /// Build the request for `event`.
    ///
    /// Fails with `AuthNotConfigured` when no token is set.
    pub fn build(
        event: &SyncEvent,
        config: &SyncConfig,
        workspace_roots: &[PathBuf],
    ) -> SyncResult<Self> {
        let token = config.require_token()?.to_string();
        let payload = build_payload(event, &config.script_root, workspace_roots);

        // Serializing a struct of strings cannot fail
        let body = serde_json::to_vec(&payload).unwrap_or_default();

        Ok(Self {
            kind: event.kind,
            method: event.kind.method(),
            filename: payload.filename,
            body,
            token,
        })
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Derive the wire payload for an event
pub fn build_payload(
    event: &SyncEvent,
    script_root: &str,
    workspace_roots: &[PathBuf],
) -> RemoteFilePayload {
    let filename = normalize_filename(&event.absolute_path, script_root, workspace_roots);
    let code = match event.kind {
        SyncKind::Delete => None,
        _ => Some(STANDARD.encode(event.content.as_deref().unwrap_or_default())),
    };

    RemoteFilePayload {
        filename: canonicalize_for_wire(&filename),
        code,
    }
}
