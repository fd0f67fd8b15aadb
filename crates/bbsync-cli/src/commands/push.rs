//! One-shot push, push-all and delete

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use bbsync_core::Command;

use super::{absolute, Workspace};
use crate::output::Output;

/// Push a single file (UPSERT)
pub async fn push(workspace: &Workspace, file: PathBuf, output: Arc<Output>) -> Result<()> {
    let file = absolute(&std::env::current_dir()?, &file);
    run(workspace, Command::PushFile(file), output).await
}

/// Delete a single file from the game
pub async fn delete(workspace: &Workspace, file: PathBuf, output: Arc<Output>) -> Result<()> {
    let file = absolute(&std::env::current_dir()?, &file);
    run(workspace, Command::DeleteFile(file), output).await
}

/// Push every syncable file under the script root
pub async fn push_all(workspace: &Workspace, output: Arc<Output>) -> Result<()> {
    run(workspace, Command::PushAll, output).await
}

async fn run(workspace: &Workspace, command: Command, output: Arc<Output>) -> Result<()> {
    let mut engine = workspace.one_shot_engine(output.clone())?;

    engine.handle(command).await;
    let reports = engine.drain().await;

    let failed = output.error_count();
    if failed > 0 {
        bail!(
            "{} of {} operation(s) failed",
            failed,
            reports.len().max(failed)
        );
    }
    Ok(())
}
