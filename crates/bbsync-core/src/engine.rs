//! Sync engine
//!
//! Owns the current [`SyncConfig`] and watch session, executes the actions
//! produced by [`crate::dispatch`], and runs every sync request as its own
//! task. Requests are independent: completions may arrive in any order and
//! nothing is retried or coalesced.
//!
//! All state is mutated from the single task that calls [`Engine::handle`]
//! (or [`Engine::run`]), so no locking is needed around the config/session
//! pair.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::RawHostConfig;
use crate::dispatch::{self, Action, Command};
use crate::error::SyncError;
use crate::lister::list_files;
use crate::notification::{Notification, NotificationSink};
use crate::remote::{SyncClient, SyncEvent, SyncKind, SyncOutcome};
use crate::settings::{ConfigResolver, Resolution, SyncConfig, WatcherDirective};
use crate::watch::{WatchController, WatchNotification, WatchSession, WatchSource, WatchState};

/// Result of one finished request
#[derive(Debug, Clone)]
pub struct Report {
    /// `None` when the request could not even be built
    pub outcome: Option<SyncOutcome>,
    /// What was shown to the user, if anything
    pub notification: Option<Notification>,
}

impl Report {
    pub fn is_error(&self) -> bool {
        match &self.outcome {
            Some(outcome) => !outcome.is_success(),
            None => true,
        }
    }
}

/// The file-sync engine
pub struct Engine<S: WatchSource> {
    resolver: ConfigResolver,
    config: Arc<SyncConfig>,
    workspace_roots: Arc<Vec<PathBuf>>,
    controller: WatchController<S>,
    watch_rx: mpsc::UnboundedReceiver<WatchNotification>,
    client: SyncClient,
    sink: Arc<dyn NotificationSink>,
    in_flight: JoinSet<Report>,
    /// Watching was asked for and not withdrawn since
    watch_requested: bool,
}

impl<S: WatchSource> Engine<S> {
    /// Resolve the initial configuration and, if the persisted watcher flag
    /// says so, start watching.
    pub fn new(
        raw: &RawHostConfig,
        workspace_roots: Vec<PathBuf>,
        source: S,
        client: SyncClient,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (tx, watch_rx) = mpsc::unbounded_channel();

        let mut engine = Self {
            resolver: ConfigResolver::new(),
            config: Arc::new(SyncConfig::default()),
            workspace_roots: Arc::new(workspace_roots),
            controller: WatchController::new(source, tx),
            watch_rx,
            client,
            sink,
            in_flight: JoinSet::new(),
            watch_requested: false,
        };

        let resolution = engine.refresh(raw);
        for action in dispatch::config_changed(&resolution, WatchState::Disabled, false) {
            engine.execute_control(action);
        }
        engine
    }

    pub fn config(&self) -> &Arc<SyncConfig> {
        &self.config
    }

    pub fn workspace_roots(&self) -> &[PathBuf] {
        &self.workspace_roots
    }

    pub fn watch_state(&self) -> WatchState {
        self.controller.state()
    }

    pub fn session(&self) -> Option<&WatchSession> {
        self.controller.session()
    }

    /// Number of requests still waiting for a response
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Handle one command or event to completion.
    ///
    /// Sync requests it starts keep running; collect them with
    /// [`Engine::next_report`] or [`Engine::drain`].
    pub async fn handle(&mut self, command: Command) {
        debug!("Handling {}", command.id());

        let actions = match command {
            Command::EnableWatcher => {
                self.watch_requested = true;
                dispatch::enable_watcher(&self.config)
            }
            Command::DisableWatcher => {
                self.watch_requested = false;
                dispatch::disable_watcher(self.controller.state())
            }
            Command::PushFile(path) => dispatch::push_file(&self.config, path),
            Command::PushAll => dispatch::push_all(&self.config),
            Command::DeleteFile(path) => dispatch::delete_file(&self.config, path),
            Command::ConfigChanged(raw) => {
                let state = self.controller.state();
                let resolution = self.refresh(&raw);
                dispatch::config_changed(&resolution, state, self.watch_requested)
            }
            Command::Watch(notification) => {
                if self.controller.is_current(&notification) {
                    dispatch::watch_notification(&self.config, notification)
                } else {
                    debug!(
                        "Dropping notification from stale session {}",
                        notification.session
                    );
                    Vec::new()
                }
            }
        };

        for action in actions {
            self.execute(action).await;
        }
    }

    /// Wait for the next request to finish and show its notification.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_report(&mut self) -> Option<Report> {
        loop {
            match self.in_flight.join_next().await? {
                Ok(report) => {
                    self.deliver(&report);
                    return Some(report);
                }
                Err(e) => warn!("Sync task failed: {}", e),
            }
        }
    }

    /// Wait for every in-flight request
    pub async fn drain(&mut self) -> Vec<Report> {
        let mut reports = Vec::new();
        while let Some(report) = self.next_report().await {
            reports.push(report);
        }
        reports
    }

    /// Process commands, watch notifications and finished requests until
    /// the command channel closes, then wait for outstanding requests.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> Vec<Report> {
        let mut reports = Vec::new();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle(command).await,
                        None => break,
                    }
                }
                Some(notification) = self.watch_rx.recv() => {
                    self.handle(Command::Watch(notification)).await;
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    match joined {
                        Ok(report) => {
                            self.deliver(&report);
                            reports.push(report);
                        }
                        Err(e) => warn!("Sync task failed: {}", e),
                    }
                }
            }
        }

        self.controller.disable();
        reports.extend(self.drain().await);
        reports
    }

    fn refresh(&mut self, raw: &RawHostConfig) -> Resolution {
        let resolution = self.resolver.refresh(raw);
        self.config = Arc::new(resolution.config.clone());

        // Without a token the directive only echoes the flag, it is not a
        // decision to stop watching
        match resolution.watcher {
            WatcherDirective::Set(true) => self.watch_requested = true,
            WatcherDirective::Set(false) if resolution.config.has_token() => {
                self.watch_requested = false
            }
            _ => {}
        }
        resolution
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Push {
                kind,
                path,
                force_show,
            } => self.push(kind, path, force_show).await,
            Action::Delete { path, force_show } => {
                self.spawn_sync(SyncEvent::delete(path), force_show);
            }
            Action::PushTree => self.push_tree().await,
            control => self.execute_control(control),
        }
    }

    /// Actions that need no I/O beyond the watch primitive
    fn execute_control(&mut self, action: Action) {
        match action {
            Action::StartWatch => self.start_watch(),
            Action::StopWatch => {
                self.controller.disable();
            }
            Action::Notify(notification) => self.emit(&notification),
            other => warn!("Unexpected action outside the sync path: {:?}", other),
        }
    }

    fn start_watch(&mut self) {
        let enabled = self
            .controller
            .enable(&self.config, &self.workspace_roots)
            .map(|session| session.globs.join(", "));

        let message = match enabled {
            Ok(globs) => format!(
                "File Watcher Enabled For {} files within the {} path(s).",
                self.config.classifier.describe(),
                globs
            ),
            Err(e) => {
                self.emit_error(e);
                return;
            }
        };

        if self.config.notify_on_watch_enable {
            self.emit(&Notification::info(message));
        }
    }

    async fn push(&mut self, kind: SyncKind, path: PathBuf, force_show: bool) {
        match tokio::fs::read(&path).await {
            Ok(content) => self.spawn_sync(SyncEvent::write(kind, path, content), force_show),
            Err(e) => self.emit_error(SyncError::from_read(e, path)),
        }
    }

    async fn push_tree(&mut self) {
        let relative_root = self.config.script_root.trim_matches('/').to_string();
        let roots = Arc::clone(&self.workspace_roots);

        for root in roots.iter() {
            let dir = if relative_root.is_empty() {
                root.clone()
            } else {
                root.join(&relative_root)
            };

            let listed = {
                let dir = dir.clone();
                tokio::task::spawn_blocking(move || list_files(&dir)).await
            };
            let files = match listed {
                Ok(Ok(files)) => files,
                Ok(Err(e)) => {
                    self.emit_error(e);
                    continue;
                }
                Err(e) => {
                    warn!("Listing {:?} failed: {}", dir, e);
                    continue;
                }
            };

            let actions: Vec<Action> = files
                .into_iter()
                .filter_map(|file| dispatch::push_listed_file(&self.config, file))
                .collect();

            info!("Pushing {} file(s) from {:?}", actions.len(), dir);
            self.emit(&Notification::info(format!(
                "Pushing {} file(s) from {}",
                actions.len(),
                dir.display()
            )));

            for action in actions {
                if let Action::Push {
                    kind,
                    path,
                    force_show,
                } = action
                {
                    self.push(kind, path, force_show).await;
                }
            }
        }
    }

    fn spawn_sync(&mut self, event: SyncEvent, force_show: bool) {
        let client = self.client.clone();
        let config = Arc::clone(&self.config);
        let roots = Arc::clone(&self.workspace_roots);

        self.in_flight.spawn(async move {
            match client.sync(&event, &config, &roots).await {
                Ok(outcome) => {
                    let notification = outcome.notification(config.notify_on_success, force_show);
                    Report {
                        outcome: Some(outcome),
                        notification,
                    }
                }
                Err(e) => Report {
                    outcome: None,
                    notification: Some(Notification {
                        level: e.level(),
                        message: e.to_string(),
                    }),
                },
            }
        });
    }

    fn deliver(&self, report: &Report) {
        if let Some(notification) = &report.notification {
            self.emit(notification);
        }
    }

    fn emit_error(&self, err: SyncError) {
        self.emit(&Notification {
            level: err.level(),
            message: err.to_string(),
        });
    }

    fn emit(&self, notification: &Notification) {
        self.sink.notify(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsFile;
    use crate::notification::{CollectingSink, Level};
    use crate::remote::OutcomeStatus;
    use crate::test_support::{spawn_responder, FakeSource};
    use crate::watch::WatchEventKind;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        root: PathBuf,
        source: FakeSource,
        sink: Arc<CollectingSink>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path().to_path_buf();
            std::fs::create_dir_all(root.join("scripts/lib")).unwrap();
            std::fs::write(root.join("scripts/main.js"), "main()").unwrap();
            std::fs::write(root.join("scripts/lib/My Helper.js"), "help()").unwrap();
            std::fs::write(root.join("scripts/lib/notes.md"), "# notes").unwrap();

            Self {
                _temp_dir: temp_dir,
                root,
                source: FakeSource::new(),
                sink: Arc::new(CollectingSink::new()),
            }
        }

        fn raw(&self, token: Option<&str>) -> RawHostConfig {
            RawHostConfig {
                folder: SettingsFile {
                    script_root: Some("scripts".to_string()),
                    notify_on_success: Some(false),
                    ..Default::default()
                },
                auth_token: token.map(str::to_string),
                ..Default::default()
            }
        }

        fn engine(&self, raw: &RawHostConfig, endpoint: &str) -> Engine<FakeSource> {
            Engine::new(
                raw,
                vec![self.root.clone()],
                self.source.clone(),
                SyncClient::with_endpoint(endpoint),
                self.sink.clone(),
            )
        }
    }

    const UNUSED_ENDPOINT: &str = "http://127.0.0.1:9/";

    #[tokio::test]
    async fn test_enable_without_token_surfaces_auth_error() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(None), UNUSED_ENDPOINT);

        engine.handle(Command::EnableWatcher).await;

        assert_eq!(engine.watch_state(), WatchState::Disabled);
        assert!(fixture.source.log().is_empty());
        let notifications = fixture.sink.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, Level::Error);
        assert!(notifications[0].message.contains("auth token"));
    }

    #[tokio::test]
    async fn test_enable_announces_globs() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);

        engine.handle(Command::EnableWatcher).await;

        assert_eq!(engine.watch_state(), WatchState::Enabled);
        let notifications = fixture.sink.notifications();
        assert_eq!(notifications[0].level, Level::Information);
        assert!(notifications[0].message.contains("scripts/**/*.{js,script,ns,txt}"));
    }

    #[tokio::test]
    async fn test_startup_honours_persisted_flag() {
        let fixture = Fixture::new();
        let mut raw = fixture.raw(Some("tok"));
        raw.folder.file_watcher_enabled = Some(true);

        let engine = fixture.engine(&raw, UNUSED_ENDPOINT);
        assert_eq!(engine.watch_state(), WatchState::Enabled);
        assert_eq!(fixture.source.log(), vec!["subscribe 1"]);
    }

    #[tokio::test]
    async fn test_push_file_uses_wire_filename() {
        let fixture = Fixture::new();
        let (endpoint, server) = spawn_responder(vec![(200, "")]).await;
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), &endpoint);

        engine
            .handle(Command::PushFile(fixture.root.join("scripts/lib/My Helper.js")))
            .await;
        let reports = engine.drain().await;

        assert_eq!(reports.len(), 1);
        let outcome = reports[0].outcome.as_ref().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.filename, "/lib/My-Helper.js");

        // Manual pushes show success even with success notifications off
        let notifications = fixture.sink.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].level, Level::Information);

        let requests = server.await.unwrap();
        assert_eq!(requests[0].json()["filename"], "/lib/My-Helper.js");
    }

    #[tokio::test]
    async fn test_push_invalid_file_type() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);

        engine
            .handle(Command::PushFile(fixture.root.join("scripts/lib/notes.md")))
            .await;

        assert_eq!(engine.in_flight(), 0);
        assert_eq!(fixture.sink.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_reported() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);

        engine
            .handle(Command::PushFile(fixture.root.join("scripts/missing.js")))
            .await;

        assert_eq!(engine.in_flight(), 0);
        let notifications = fixture.sink.notifications();
        assert_eq!(notifications[0].level, Level::Error);
        assert!(notifications[0].message.contains("missing.js"));
    }

    #[tokio::test]
    async fn test_auth_rejection_always_shown() {
        let fixture = Fixture::new();
        let (endpoint, _server) = spawn_responder(vec![(401, "")]).await;
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), &endpoint);
        engine.handle(Command::EnableWatcher).await;

        assert!(fixture
            .source
            .emit(1, WatchEventKind::Changed, fixture.root.join("scripts/main.js")));
        let notification = engine.watch_rx.recv().await.unwrap();
        engine.handle(Command::Watch(notification)).await;
        let reports = engine.drain().await;

        assert_eq!(
            reports[0].outcome.as_ref().unwrap().status,
            OutcomeStatus::AuthRejected
        );
        assert_eq!(fixture.sink.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn test_watch_success_is_quiet_when_disabled() {
        let fixture = Fixture::new();
        let (endpoint, server) = spawn_responder(vec![(200, "")]).await;
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), &endpoint);
        engine.handle(Command::EnableWatcher).await;
        let before = fixture.sink.notifications().len();

        let notification = WatchNotification {
            session: 1,
            kind: WatchEventKind::Deleted,
            path: fixture.root.join("scripts/main.js"),
        };
        engine.handle(Command::Watch(notification)).await;
        let reports = engine.drain().await;

        assert!(reports[0].outcome.as_ref().unwrap().is_success());
        assert_eq!(fixture.sink.notifications().len(), before);

        let requests = server.await.unwrap();
        assert_eq!(requests[0].method, "DELETE");
        assert_eq!(requests[0].json(), serde_json::json!({ "filename": "main.js" }));
    }

    #[tokio::test]
    async fn test_push_all_pushes_only_syncable_files() {
        let fixture = Fixture::new();
        let (endpoint, server) = spawn_responder(vec![(200, ""), (200, "")]).await;
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), &endpoint);

        engine.handle(Command::PushAll).await;
        let reports = engine.drain().await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| !r.is_error()));

        let mut filenames: Vec<String> = server
            .await
            .unwrap()
            .iter()
            .map(|r| r.json()["filename"].as_str().unwrap().to_string())
            .collect();
        filenames.sort();
        assert_eq!(filenames, vec!["/lib/My-Helper.js", "main.js"]);
    }

    #[tokio::test]
    async fn test_push_all_missing_script_root() {
        let fixture = Fixture::new();
        let mut raw = fixture.raw(Some("tok"));
        raw.folder.script_root = Some("nope".to_string());
        let mut engine = fixture.engine(&raw, UNUSED_ENDPOINT);

        engine.handle(Command::PushAll).await;

        assert_eq!(engine.in_flight(), 0);
        assert_eq!(fixture.sink.count(Level::Error), 1);
    }

    #[tokio::test]
    async fn test_config_change_replaces_session_without_overlap() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);
        engine.handle(Command::EnableWatcher).await;
        assert_eq!(engine.config().version, 1);

        let mut raw = fixture.raw(Some("tok"));
        raw.folder.script_root = Some("scripts/lib".to_string());
        engine.handle(Command::ConfigChanged(raw)).await;

        assert_eq!(engine.config().version, 2);
        assert_eq!(engine.config().script_root, "scripts/lib/");
        assert_eq!(
            fixture.source.log(),
            vec!["subscribe 1", "unsubscribe 1", "subscribe 2"]
        );
        assert_eq!(fixture.source.max_live(), 1);
        assert_eq!(engine.session().unwrap().config_version, 2);

        // The old session can no longer emit
        assert!(!fixture
            .source
            .emit(1, WatchEventKind::Changed, fixture.root.join("scripts/main.js")));
    }

    #[tokio::test]
    async fn test_stale_notification_is_dropped() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);
        engine.handle(Command::EnableWatcher).await;
        engine.handle(Command::EnableWatcher).await;

        let stale = WatchNotification {
            session: 1,
            kind: WatchEventKind::Changed,
            path: fixture.root.join("scripts/main.js"),
        };
        engine.handle(Command::Watch(stale)).await;
        assert_eq!(engine.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_watcher_starts_once_token_is_added() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(None), UNUSED_ENDPOINT);

        engine.handle(Command::EnableWatcher).await;
        assert_eq!(engine.watch_state(), WatchState::Disabled);

        engine
            .handle(Command::ConfigChanged(fixture.raw(Some("tok"))))
            .await;
        assert_eq!(engine.watch_state(), WatchState::Enabled);
        assert_eq!(fixture.source.log(), vec!["subscribe 1"]);
    }

    #[tokio::test]
    async fn test_watcher_survives_token_clear_and_set() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);
        engine.handle(Command::EnableWatcher).await;

        engine.handle(Command::ConfigChanged(fixture.raw(None))).await;
        assert_eq!(engine.watch_state(), WatchState::Disabled);

        engine
            .handle(Command::ConfigChanged(fixture.raw(Some("tok2"))))
            .await;
        assert_eq!(engine.watch_state(), WatchState::Enabled);
        assert_eq!(
            fixture.source.log(),
            vec!["subscribe 1", "unsubscribe 1", "subscribe 2"]
        );
    }

    #[tokio::test]
    async fn test_disabled_watcher_stays_off_on_config_change() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);
        engine.handle(Command::EnableWatcher).await;
        engine.handle(Command::DisableWatcher).await;

        engine
            .handle(Command::ConfigChanged(fixture.raw(Some("tok"))))
            .await;
        assert_eq!(engine.watch_state(), WatchState::Disabled);
    }

    #[tokio::test]
    async fn test_disable_watcher() {
        let fixture = Fixture::new();
        let mut engine = fixture.engine(&fixture.raw(Some("tok")), UNUSED_ENDPOINT);
        engine.handle(Command::EnableWatcher).await;
        engine.handle(Command::DisableWatcher).await;

        assert_eq!(engine.watch_state(), WatchState::Disabled);
        assert_eq!(fixture.source.live(), 0);
        let last = fixture.sink.notifications().pop().unwrap();
        assert_eq!(last.message, "File Watcher Disabled");
    }

    #[tokio::test]
    async fn test_run_until_commands_close() {
        let fixture = Fixture::new();
        let (endpoint, _server) = spawn_responder(vec![(500, "boom")]).await;
        let engine = fixture.engine(&fixture.raw(Some("tok")), &endpoint);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Command::DeleteFile(fixture.root.join("scripts/main.js")))
            .unwrap();
        drop(tx);

        let reports = engine.run(rx).await;
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_error());

        let errors: Vec<_> = fixture
            .sink
            .notifications()
            .into_iter()
            .filter(|n| n.level == Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("500"));
        assert!(errors[0].message.contains("boom"));
    }
}
