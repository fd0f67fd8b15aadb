//! Status command handler

use anyhow::Result;

use bbsync_core::remote::DEFAULT_ENDPOINT;
use bbsync_core::watch::WatchSpec;
use bbsync_core::ConfigResolver;

use super::Workspace;
use crate::output::{Output, OutputFormat};

/// Show the resolved configuration and what `watch` would watch
pub fn show(workspace: &Workspace, output: &Output) -> Result<()> {
    let raw = workspace.load()?;
    let resolution = ConfigResolver::new().refresh(&raw);
    let config = &resolution.config;
    let spec = WatchSpec::new(0, config, &workspace.roots);

    let watcher_enabled = raw
        .file_watcher_enabled()
        .folder
        .or(raw.file_watcher_enabled().workspace)
        .unwrap_or(false);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "endpoint": DEFAULT_ENDPOINT,
                    "auth_configured": config.has_token(),
                    "workspace_roots": workspace.roots,
                    "script_root": config.script_root,
                    "valid_extensions": config.classifier.extensions(),
                    "file_watcher_enabled": watcher_enabled,
                    "watch_globs": spec.globs,
                    "warnings": resolution
                        .warnings
                        .iter()
                        .map(|w| w.to_string())
                        .collect::<Vec<_>>(),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.has_token());
        }
        OutputFormat::Human => {
            println!("bbsync Status");
            println!("=============");
            println!();
            println!("Game API:");
            println!("  Endpoint: {}", DEFAULT_ENDPOINT);
            println!(
                "  Auth:     {}",
                if config.has_token() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            println!();
            println!("Workspace:");
            for root in &workspace.roots {
                println!("  Root:        {}", root.display());
            }
            println!("  Script root: {}", config.script_root);
            println!("  Extensions:  {}", config.classifier.describe());
            println!();
            println!("Watcher:");
            println!(
                "  Persisted: {}",
                if watcher_enabled { "enabled" } else { "disabled" }
            );
            for glob in &spec.globs {
                println!("  Glob:      {}", glob);
            }
            for warning in &resolution.warnings {
                println!();
                println!("warning: {}", warning);
            }
        }
    }

    Ok(())
}
