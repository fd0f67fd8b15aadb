//! Command handlers

pub mod auth;
pub mod config;
pub mod push;
pub mod status;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use bbsync_core::{
    load_auth_token, ConfigPaths, Engine, FileSecretStore, NotifySource, RawHostConfig, SyncClient,
};

use crate::output::Output;

/// Workspace roots plus the files that configure them
#[derive(Debug, Clone)]
pub struct Workspace {
    pub roots: Vec<PathBuf>,
    pub paths: ConfigPaths,
    pub secrets: FileSecretStore,
}

impl Workspace {
    /// Resolve `--workspace` / `--workspace-file` against the current directory
    pub fn discover(roots: Vec<PathBuf>, workspace_file: Option<PathBuf>) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read the current directory")?;

        let roots = if roots.is_empty() {
            vec![cwd.clone()]
        } else {
            roots.iter().map(|root| absolute(&cwd, root)).collect()
        };
        let workspace_file = workspace_file.map(|file| absolute(&cwd, &file));

        Ok(Self {
            paths: ConfigPaths::discover(&roots, workspace_file),
            roots,
            secrets: FileSecretStore::open_default(),
        })
    }

    /// Load every settings scope plus the stored auth token
    pub fn load(&self) -> Result<RawHostConfig> {
        let raw = self.paths.load().context("Failed to load configuration")?;
        let token = load_auth_token(&self.secrets).context("Failed to read the auth token")?;
        Ok(raw.with_auth_token(token))
    }

    /// Files whose changes should trigger a configuration refresh
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let mut files = self.paths.watched_files();
        files.push(self.secrets.path().to_path_buf());
        files
    }

    /// Engine for a one-shot command. The persisted watcher flag is
    /// ignored so nothing gets subscribed.
    pub fn one_shot_engine(&self, output: Arc<Output>) -> Result<Engine<NotifySource>> {
        let mut raw = self.load()?;
        raw.workspace.file_watcher_enabled = None;
        raw.folder.file_watcher_enabled = None;

        Ok(Engine::new(
            &raw,
            self.roots.clone(),
            NotifySource::default(),
            SyncClient::new(),
            output,
        ))
    }
}

/// Make `path` absolute against `cwd` without touching the filesystem
pub fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
