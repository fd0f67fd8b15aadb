//! Secret storage
//!
//! The auth token is kept out of the settings files. [`FileSecretStore`]
//! keeps secrets in a TOML table readable only by the owner;
//! BBSYNC_AUTH_TOKEN overrides whatever is stored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

/// Key the auth token is stored under
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Environment variable that overrides the stored auth token
pub const AUTH_TOKEN_ENV: &str = "BBSYNC_AUTH_TOKEN";

/// Key/value store for credentials
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> SyncResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> SyncResult<()>;
    fn delete(&self, key: &str) -> SyncResult<()>;
}

/// Read the auth token, preferring the environment override
pub fn load_auth_token(store: &dyn SecretStore) -> SyncResult<Option<String>> {
    if let Ok(val) = std::env::var(AUTH_TOKEN_ENV) {
        if !val.trim().is_empty() {
            return Ok(Some(val));
        }
    }
    store.get(AUTH_TOKEN_KEY)
}

/// Secrets persisted to a single TOML file
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store inside the default data directory
    pub fn open_default() -> Self {
        Self::new(crate::config::data_dir().join("secrets.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> SyncResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| self.file_error(e))?;
        toml::from_str(&content).map_err(|e| self.file_error(e))
    }

    fn write_all(&self, secrets: &BTreeMap<String, String>) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.file_error(e))?;
        }
        let content = toml::to_string(secrets).map_err(|e| self.file_error(e))?;
        std::fs::write(&self.path, content).map_err(|e| self.file_error(e))?;
        restrict_permissions(&self.path).map_err(|e| self.file_error(e))
    }

    fn file_error(&self, details: impl ToString) -> SyncError {
        SyncError::ConfigFile {
            path: self.path.clone(),
            details: details.to_string(),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut secrets = self.read_all()?;
        secrets.insert(key.to_string(), value.to_string());
        self.write_all(&secrets)
    }

    fn delete(&self, key: &str) -> SyncResult<()> {
        let mut secrets = self.read_all()?;
        if secrets.remove(key).is_some() {
            self.write_all(&secrets)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
