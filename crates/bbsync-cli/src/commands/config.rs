//! Config command handlers

use anyhow::{Context, Result};
use serde::Serialize;

use bbsync_core::config::{Scoped, KEYS};
use bbsync_core::ConfigScope;

use super::Workspace;
use crate::output::{Output, OutputFormat};

/// One effective setting and the scope it came from
#[derive(Debug, Serialize)]
struct Entry {
    key: &'static str,
    value: serde_json::Value,
    scope: ConfigScope,
}

impl Entry {
    fn new<T: Serialize>(key: &'static str, scoped: Scoped<T>) -> Self {
        Self {
            key,
            value: serde_json::to_value(scoped.effective()).unwrap_or_default(),
            scope: scoped.effective_scope(),
        }
    }

    fn display_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        }
    }
}

/// Show the effective configuration
pub fn show(workspace: &Workspace, output: &Output) -> Result<()> {
    let raw = workspace
        .paths
        .load()
        .context("Failed to load configuration")?;

    // The watcher flag is never read from the global scope
    let mut watcher = raw.file_watcher_enabled();
    watcher.global = None;

    let entries = vec![
        Entry::new("script_root", raw.script_root()),
        Entry::new("notify_on_success", raw.notify_on_success()),
        Entry::new("notify_on_watch_enable", raw.notify_on_watch_enable()),
        Entry::new("file_watcher_enabled", watcher),
        Entry::new("valid_extensions", raw.valid_extensions()),
    ];

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "settings": entries,
                    "files": {
                        "global": workspace.paths.global,
                        "workspace": workspace.paths.workspace,
                        "folder": workspace.paths.folder,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            for entry in &entries {
                println!("{}={}", entry.key, entry.display_value());
            }
        }
        OutputFormat::Human => {
            println!("Configuration:");
            for entry in &entries {
                println!(
                    "  {:<24}{:<32}({})",
                    entry.key,
                    entry.display_value(),
                    entry.scope
                );
            }
            println!();
            println!("Global config:    {}", workspace.paths.global.display());
            if let Some(ref path) = workspace.paths.workspace {
                println!("Workspace config: {}", path.display());
            }
            if let Some(ref path) = workspace.paths.folder {
                println!("Folder config:    {}", path.display());
            }
        }
    }

    Ok(())
}

/// Set a configuration value in the folder (or global) settings file
pub fn set(
    workspace: &Workspace,
    key: String,
    value: String,
    global: bool,
    output: &Output,
) -> Result<()> {
    let scope = if global {
        ConfigScope::Global
    } else {
        ConfigScope::Folder
    };

    let path = workspace
        .paths
        .set(scope, &key, &value)
        .with_context(|| format!("Failed to set {} (valid keys: {})", key, KEYS.join(", ")))?;

    output.success(&format!("Set {} = {} in {}", key, value, path.display()));
    if global && key == "file_watcher_enabled" {
        output.message("Note: file_watcher_enabled is ignored in the global scope");
    }

    Ok(())
}
