//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)
//!
//! [`Output`] is also the engine's notification sink, so pushes and watcher
//! events are shown the same way as command results.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Local;

use bbsync_core::{Level, Notification, NotificationSink};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - errors only
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
    /// Prefix human output with the local time (long-running watch mode)
    timestamps: bool,
    errors: AtomicUsize,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            timestamps: false,
            errors: AtomicUsize::new(0),
        }
    }

    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    /// Number of error notifications shown so far
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    fn prefix(&self) -> String {
        if self.timestamps {
            format!("[{}] ", Local::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

impl NotificationSink for Output {
    fn notify(&self, notification: &Notification) {
        if notification.level == Level::Error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }

        match self.format {
            OutputFormat::Human => {
                let line = format!("{}{}", self.prefix(), format_human(notification));
                match notification.level {
                    Level::Information => println!("{}", line),
                    _ => eprintln!("{}", line),
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "level": notification.level,
                        "message": notification.message,
                        "timestamp": Local::now().to_rfc3339(),
                    })
                );
            }
            OutputFormat::Quiet => {
                if notification.level == Level::Error {
                    eprintln!("{}", format_human(notification));
                }
            }
        }
    }
}

/// One-line human rendering of a notification
fn format_human(notification: &Notification) -> String {
    match notification.level {
        Level::Information => notification.message.clone(),
        Level::Warning => format!("warning: {}", notification.message),
        Level::Error => format!("error: {}", notification.message),
    }
}
