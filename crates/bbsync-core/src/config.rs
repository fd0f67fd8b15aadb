//! Host configuration
//!
//! Settings resolve through four scopes, lowest to highest precedence:
//! 1. Default values
//! 2. Global file (~/.config/bbsync/config.toml or BBSYNC_CONFIG)
//! 3. Workspace file (passed explicitly, like a multi-root workspace file)
//! 4. Folder file (`.bbsync.toml` in the first workspace root)
//!
//! Environment variables (BBSYNC_* prefix) are applied on top of the folder
//! scope. Every scope is kept separately because some settings are only
//! honoured at certain scopes (see [`crate::settings`]).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::DEFAULT_EXTENSIONS;
use crate::error::{SyncError, SyncResult};

/// Environment variable prefix
const ENV_PREFIX: &str = "BBSYNC";

/// Name of the folder-scoped settings file
pub const FOLDER_CONFIG_FILE: &str = ".bbsync.toml";

/// Keys accepted by `config set`
pub const KEYS: &[&str] = &[
    "script_root",
    "notify_on_success",
    "notify_on_watch_enable",
    "file_watcher_enabled",
    "valid_extensions",
];

/// Where a setting value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    Default,
    Global,
    Workspace,
    Folder,
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigScope::Default => "default",
            ConfigScope::Global => "global",
            ConfigScope::Workspace => "workspace",
            ConfigScope::Folder => "folder",
        };
        f.write_str(name)
    }
}

/// Contents of one settings file. Absent keys defer to lower scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_on_success: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_on_watch_enable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_watcher_enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_extensions: Option<Vec<String>>,
}

impl SettingsFile {
    /// Load a settings file, treating a missing file as empty
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| SyncError::ConfigFile {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        Self::parse(&content).map_err(|details| SyncError::ConfigFile {
            path: path.to_path_buf(),
            details,
        })
    }

    /// Parse settings from a TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Write the settings back, creating parent directories as needed
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let to_config_err = |details: String| SyncError::ConfigFile {
            path: path.to_path_buf(),
            details,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| to_config_err(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| to_config_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| to_config_err(e.to_string()))
    }

    /// Set a single key from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let clear = value.is_empty() || value == "none";
        match key {
            "script_root" => {
                self.script_root = (!clear).then(|| value.to_string());
            }
            "notify_on_success" => {
                self.notify_on_success = parse_bool_opt(key, value, clear)?;
            }
            "notify_on_watch_enable" => {
                self.notify_on_watch_enable = parse_bool_opt(key, value, clear)?;
            }
            "file_watcher_enabled" => {
                self.file_watcher_enabled = parse_bool_opt(key, value, clear)?;
            }
            "valid_extensions" => {
                self.valid_extensions = (!clear).then(|| split_list(value));
            }
            _ => {
                return Err(format!(
                    "Unknown configuration key: '{}'\nValid keys: {}",
                    key,
                    KEYS.join(", ")
                ));
            }
        }
        Ok(())
    }

    /// Apply BBSYNC_* environment variable overrides
    fn apply_env_overrides(&mut self) {
        // BBSYNC_SCRIPT_ROOT
        if let Ok(val) = std::env::var(format!("{}_SCRIPT_ROOT", ENV_PREFIX)) {
            self.script_root = Some(val);
        }

        // BBSYNC_NOTIFY_ON_SUCCESS
        if let Ok(val) = std::env::var(format!("{}_NOTIFY_ON_SUCCESS", ENV_PREFIX)) {
            self.notify_on_success = Some(env_bool(&val));
        }

        // BBSYNC_NOTIFY_ON_WATCH_ENABLE
        if let Ok(val) = std::env::var(format!("{}_NOTIFY_ON_WATCH_ENABLE", ENV_PREFIX)) {
            self.notify_on_watch_enable = Some(env_bool(&val));
        }

        // BBSYNC_FILE_WATCHER_ENABLED
        if let Ok(val) = std::env::var(format!("{}_FILE_WATCHER_ENABLED", ENV_PREFIX)) {
            self.file_watcher_enabled = Some(env_bool(&val));
        }

        // BBSYNC_VALID_EXTENSIONS (comma separated)
        if let Ok(val) = std::env::var(format!("{}_VALID_EXTENSIONS", ENV_PREFIX)) {
            self.valid_extensions = if val.is_empty() {
                None
            } else {
                Some(split_list(&val))
            };
        }
    }
}

/// A setting with its value at every scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoped<T> {
    pub default: T,
    pub global: Option<T>,
    pub workspace: Option<T>,
    pub folder: Option<T>,
}

impl<T> Scoped<T> {
    /// The highest-precedence value that is set
    pub fn effective(&self) -> &T {
        self.folder
            .as_ref()
            .or(self.workspace.as_ref())
            .or(self.global.as_ref())
            .unwrap_or(&self.default)
    }

    /// Scope the effective value came from
    pub fn effective_scope(&self) -> ConfigScope {
        if self.folder.is_some() {
            ConfigScope::Folder
        } else if self.workspace.is_some() {
            ConfigScope::Workspace
        } else if self.global.is_some() {
            ConfigScope::Global
        } else {
            ConfigScope::Default
        }
    }
}

/// Unresolved host configuration: every scope, plus the stored auth token
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawHostConfig {
    pub global: SettingsFile,
    pub workspace: SettingsFile,
    pub folder: SettingsFile,
    pub auth_token: Option<String>,
}

impl fmt::Debug for RawHostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHostConfig")
            .field("global", &self.global)
            .field("workspace", &self.workspace)
            .field("folder", &self.folder)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RawHostConfig {
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    fn scoped<T: Clone>(&self, default: T, get: impl Fn(&SettingsFile) -> Option<T>) -> Scoped<T> {
        Scoped {
            default,
            global: get(&self.global),
            workspace: get(&self.workspace),
            folder: get(&self.folder),
        }
    }

    pub fn script_root(&self) -> Scoped<String> {
        self.scoped("./".to_string(), |s| s.script_root.clone())
    }

    pub fn notify_on_success(&self) -> Scoped<bool> {
        self.scoped(true, |s| s.notify_on_success)
    }

    pub fn notify_on_watch_enable(&self) -> Scoped<bool> {
        self.scoped(true, |s| s.notify_on_watch_enable)
    }

    pub fn file_watcher_enabled(&self) -> Scoped<bool> {
        self.scoped(false, |s| s.file_watcher_enabled)
    }

    pub fn valid_extensions(&self) -> Scoped<Vec<String>> {
        let default = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        self.scoped(default, |s| s.valid_extensions.clone())
    }
}

/// Locations of the settings files for one workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub global: PathBuf,
    pub workspace: Option<PathBuf>,
    pub folder: Option<PathBuf>,
}

impl ConfigPaths {
    /// Derive the settings file locations for a set of workspace roots
    pub fn discover(workspace_roots: &[PathBuf], workspace_file: Option<PathBuf>) -> Self {
        Self {
            global: global_config_path(),
            workspace: workspace_file,
            folder: workspace_roots.first().map(|root| root.join(FOLDER_CONFIG_FILE)),
        }
    }

    /// Load every scope and apply environment overrides
    pub fn load(&self) -> SyncResult<RawHostConfig> {
        let global = SettingsFile::load(&self.global)?;
        let workspace = match &self.workspace {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::default(),
        };
        let mut folder = match &self.folder {
            Some(path) => SettingsFile::load(path)?,
            None => SettingsFile::default(),
        };
        folder.apply_env_overrides();

        debug!("Loaded host configuration from {:?}", self);
        Ok(RawHostConfig {
            global,
            workspace,
            folder,
            auth_token: None,
        })
    }

    /// File backing a writable scope
    pub fn path_for(&self, scope: ConfigScope) -> Option<&Path> {
        match scope {
            ConfigScope::Default => None,
            ConfigScope::Global => Some(self.global.as_path()),
            ConfigScope::Workspace => self.workspace.as_deref(),
            ConfigScope::Folder => self.folder.as_deref(),
        }
    }

    /// Set one key in the file backing `scope`
    pub fn set(&self, scope: ConfigScope, key: &str, value: &str) -> SyncResult<PathBuf> {
        let path = self
            .path_for(scope)
            .ok_or_else(|| SyncError::Configuration(format!("No {} settings file to write to", scope)))?
            .to_path_buf();

        let mut settings = SettingsFile::load(&path)?;
        settings.set(key, value).map_err(SyncError::Configuration)?;
        settings.save(&path)?;
        Ok(path)
    }

    /// Every existing file that can affect the configuration
    pub fn watched_files(&self) -> Vec<PathBuf> {
        std::iter::once(self.global.clone())
            .chain(self.workspace.clone())
            .chain(self.folder.clone())
            .collect()
    }
}

/// Get the global config file path
///
/// Can be overridden with the BBSYNC_CONFIG environment variable
pub fn global_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bbsync")
        .join("config.toml")
}

/// Get the data directory (secrets live here)
///
/// Can be overridden with the BBSYNC_DATA_DIR environment variable
pub fn data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
        return PathBuf::from(path);
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bbsync")
}

fn env_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn parse_bool_opt(key: &str, value: &str, clear: bool) -> Result<Option<bool>, String> {
    if clear {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("Invalid value for {}. Use 'true' or 'false'.", key))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "BBSYNC_SCRIPT_ROOT",
        "BBSYNC_NOTIFY_ON_SUCCESS",
        "BBSYNC_NOTIFY_ON_WATCH_ENABLE",
        "BBSYNC_FILE_WATCHER_ENABLED",
        "BBSYNC_VALID_EXTENSIONS",
        "BBSYNC_CONFIG",
    ];

    #[test]
    fn test_defaults() {
        let raw = RawHostConfig::default();
        assert_eq!(raw.script_root().effective(), "./");
        assert!(*raw.notify_on_success().effective());
        assert!(*raw.notify_on_watch_enable().effective());
        assert!(!*raw.file_watcher_enabled().effective());
        assert_eq!(raw.valid_extensions().effective().len(), 4);
        assert_eq!(raw.script_root().effective_scope(), ConfigScope::Default);
    }

    #[test]
    fn test_scope_precedence() {
        let raw = RawHostConfig {
            global: SettingsFile {
                script_root: Some("global".to_string()),
                notify_on_success: Some(false),
                ..Default::default()
            },
            workspace: SettingsFile {
                script_root: Some("workspace".to_string()),
                ..Default::default()
            },
            folder: SettingsFile {
                script_root: Some("folder".to_string()),
                ..Default::default()
            },
            auth_token: None,
        };

        assert_eq!(raw.script_root().effective(), "folder");
        assert_eq!(raw.script_root().effective_scope(), ConfigScope::Folder);
        assert!(!*raw.notify_on_success().effective());
        assert_eq!(raw.notify_on_success().effective_scope(), ConfigScope::Global);
    }

    #[test]
    fn test_settings_parse() {
        let settings = SettingsFile::parse(
            r#"
            script_root = "src/scripts"
            notify_on_success = false
            valid_extensions = [".js", ".txt"]
        "#,
        )
        .unwrap();

        assert_eq!(settings.script_root.as_deref(), Some("src/scripts"));
        assert_eq!(settings.notify_on_success, Some(false));
        assert_eq!(settings.file_watcher_enabled, None);
        assert_eq!(
            settings.valid_extensions,
            Some(vec![".js".to_string(), ".txt".to_string()])
        );
    }

    #[test]
    fn test_settings_set() {
        let mut settings = SettingsFile::default();

        settings.set("script_root", "scripts").unwrap();
        settings.set("file_watcher_enabled", "true").unwrap();
        settings.set("valid_extensions", ".js, .ns").unwrap();
        assert_eq!(settings.script_root.as_deref(), Some("scripts"));
        assert_eq!(settings.file_watcher_enabled, Some(true));
        assert_eq!(
            settings.valid_extensions,
            Some(vec![".js".to_string(), ".ns".to_string()])
        );

        settings.set("script_root", "none").unwrap();
        assert!(settings.script_root.is_none());

        assert!(settings.set("notify_on_success", "maybe").is_err());
        assert!(settings.set("port", "9990").is_err());
    }

    #[test]
    fn test_load_missing_and_invalid_files() {
        let temp_dir = TempDir::new().unwrap();

        let missing = SettingsFile::load(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(missing, SettingsFile::default());

        let bad = temp_dir.path().join("bad.toml");
        std::fs::write(&bad, "script_root = [").unwrap();
        assert!(matches!(
            SettingsFile::load(&bad),
            Err(SyncError::ConfigFile { .. })
        ));
    }

    #[test]
    fn test_paths_load_and_set() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();

        let paths = ConfigPaths {
            global: temp_dir.path().join("global.toml"),
            workspace: None,
            folder: Some(root.join(FOLDER_CONFIG_FILE)),
        };

        paths.set(ConfigScope::Global, "script_root", "global-scripts").unwrap();
        paths.set(ConfigScope::Folder, "file_watcher_enabled", "true").unwrap();

        let raw = paths.load().unwrap();
        assert_eq!(raw.script_root().effective(), "global-scripts");
        assert_eq!(raw.file_watcher_enabled().folder, Some(true));
        assert!(raw.auth_token.is_none());

        assert!(paths.set(ConfigScope::Workspace, "script_root", "x").is_err());
    }

    #[test]
    fn test_env_overrides_land_in_folder_scope() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();

        let paths = ConfigPaths {
            global: temp_dir.path().join("global.toml"),
            workspace: None,
            folder: Some(temp_dir.path().join(FOLDER_CONFIG_FILE)),
        };

        env::set_var("BBSYNC_SCRIPT_ROOT", "env-scripts");
        env::set_var("BBSYNC_NOTIFY_ON_SUCCESS", "0");
        env::set_var("BBSYNC_FILE_WATCHER_ENABLED", "TRUE");
        env::set_var("BBSYNC_VALID_EXTENSIONS", ".js,.ns");

        let raw = paths.load().unwrap();
        assert_eq!(raw.folder.script_root.as_deref(), Some("env-scripts"));
        assert_eq!(raw.folder.notify_on_success, Some(false));
        assert_eq!(raw.folder.file_watcher_enabled, Some(true));
        assert_eq!(raw.valid_extensions().effective().len(), 2);
    }

    #[test]
    fn test_global_config_path_override() {
        let _guard = EnvGuard::new(ENV_VARS);

        assert!(global_config_path().ends_with("bbsync/config.toml"));

        env::set_var("BBSYNC_CONFIG", "/tmp/bbsync-test.toml");
        assert_eq!(global_config_path(), PathBuf::from("/tmp/bbsync-test.toml"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let raw = RawHostConfig::default().with_auth_token(Some("s3cret".to_string()));
        let debug = format!("{:?}", raw);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("redacted"));
    }
}
