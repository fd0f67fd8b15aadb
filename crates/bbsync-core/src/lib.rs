//! bbsync Core Library
//!
//! This crate pushes local script files to a running game's file API
//! (`http://localhost:9990/`), either on demand or whenever the files change.
//!
//! # Architecture
//!
//! - **Dispatch**: every command or event maps to a pure handler returning
//!   actions
//! - **Engine**: executes those actions, owning the current config and the
//!   single live watch session
//!
//! Each push or delete is an independent request; the game's answer becomes
//! a user-visible notification.
//!
//! # Quick Start
//!
//! ```text
//! let raw = ConfigPaths::discover(&roots, None).load()?
//!     .with_auth_token(load_auth_token(&FileSecretStore::open_default())?);
//! let mut engine = Engine::new(&raw, roots, NotifySource::default(), SyncClient::new(), sink);
//!
//! engine.handle(Command::PushAll).await;
//! engine.drain().await;
//! ```
//!
//! # Modules
//!
//! - `engine`: Command execution (main entry point)
//! - `dispatch`: Pure command handlers
//! - `config`: Scoped settings files and environment overrides
//! - `settings`: Resolution into a versioned `SyncConfig`
//! - `secrets`: Auth token storage
//! - `remote`: HTTP client for the game's file API
//! - `watch`: File watch sessions
//! - `path`, `classify`, `lister`: Filename and file selection helpers

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod lister;
pub mod notification;
pub mod path;
pub mod remote;
pub mod secrets;
pub mod settings;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use classify::FileClassifier;
pub use config::{ConfigPaths, ConfigScope, RawHostConfig, SettingsFile};
pub use dispatch::{Action, Command};
pub use engine::{Engine, Report};
pub use error::{SyncError, SyncResult};
pub use notification::{Level, Notification, NotificationSink};
pub use remote::{SyncClient, SyncKind, SyncOutcome};
pub use secrets::{load_auth_token, FileSecretStore, SecretStore};
pub use settings::{ConfigResolver, SyncConfig};
pub use watch::{NotifySource, WatchController, WatchSource, WatchState};
