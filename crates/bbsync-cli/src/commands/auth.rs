//! Auth token commands

use anyhow::{bail, Context, Result};

use bbsync_core::secrets::{AUTH_TOKEN_ENV, AUTH_TOKEN_KEY};
use bbsync_core::settings::sanitize_token;
use bbsync_core::SecretStore;

use super::Workspace;
use crate::output::{Output, OutputFormat};

/// Store the auth token shown in the game's API server options
pub fn set(workspace: &Workspace, token: String, output: &Output) -> Result<()> {
    let Some(token) = sanitize_token(&token) else {
        bail!("The auth token is empty");
    };

    workspace
        .secrets
        .set(AUTH_TOKEN_KEY, &token)
        .context("Failed to store the auth token")?;

    output.success(&format!(
        "Auth token saved to {}",
        workspace.secrets.path().display()
    ));
    Ok(())
}

/// Remove the stored auth token
pub fn clear(workspace: &Workspace, output: &Output) -> Result<()> {
    workspace
        .secrets
        .delete(AUTH_TOKEN_KEY)
        .context("Failed to remove the auth token")?;

    output.success("Auth token removed");
    if std::env::var(AUTH_TOKEN_ENV).is_ok() {
        output.message(&format!("Note: {} is still set in the environment", AUTH_TOKEN_ENV));
    }
    Ok(())
}

/// Show whether a token is configured, and where it comes from
pub fn status(workspace: &Workspace, output: &Output) -> Result<()> {
    let from_env = std::env::var(AUTH_TOKEN_ENV)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let stored = workspace
        .secrets
        .get(AUTH_TOKEN_KEY)
        .context("Failed to read the auth token")?
        .is_some();

    let source = if from_env {
        Some("environment")
    } else if stored {
        Some("secret store")
    } else {
        None
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "configured": source.is_some(),
                    "source": source,
                    "secrets_file": workspace.secrets.path(),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", source.is_some());
        }
        OutputFormat::Human => match source {
            Some(source) => println!("Auth token: configured ({})", source),
            None => {
                println!("Auth token: not configured");
                println!();
                println!("Copy the token from the game's API server options, then run:");
                println!("  bbsync auth set <TOKEN>");
            }
        },
    }

    Ok(())
}
