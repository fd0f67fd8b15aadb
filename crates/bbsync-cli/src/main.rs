//! bbsync CLI
//!
//! Command-line interface for bbsync - pushes local scripts to the game.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::Workspace;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "bbsync")]
#[command(about = "bbsync - Push local scripts to the game's file API")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Workspace root directory (repeatable, defaults to the current directory)
    #[arg(long = "workspace", global = true, value_name = "DIR")]
    workspaces: Vec<PathBuf>,

    /// Workspace-scoped settings file
    #[arg(long, global = true, value_name = "FILE")]
    workspace_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the script root and push changes until Ctrl-C
    Watch,
    /// Push one file to the game
    Push {
        /// File to push
        file: PathBuf,
    },
    /// Push every script under the script root
    PushAll,
    /// Delete one file from the game
    #[command(alias = "rm")]
    Delete {
        /// File to delete
        file: PathBuf,
    },
    /// Manage the API auth token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Show status (auth, script root, watch globs)
    Status,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store the auth token
    Set {
        /// Token from the game's API server options
        token: String,
    },
    /// Remove the stored token
    Clear,
    /// Show whether a token is configured
    Status,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (script_root, notify_on_success, notify_on_watch_enable,
        /// file_watcher_enabled, valid_extensions)
        key: String,
        /// Configuration value ("none" clears it)
        value: String,
        /// Write to the global settings file instead of the folder one
        #[arg(long)]
        global: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = OutputFormat::from_flags(cli.json, cli.quiet);
    let output = match cli.command {
        Commands::Watch => Output::new(format).with_timestamps(),
        _ => Output::new(format),
    };
    let output = Arc::new(output);

    let workspace = Workspace::discover(cli.workspaces, cli.workspace_file)?;

    match cli.command {
        Commands::Watch => commands::watch::run(&workspace, output).await,
        Commands::Push { file } => commands::push::push(&workspace, file, output).await,
        Commands::PushAll => commands::push::push_all(&workspace, output).await,
        Commands::Delete { file } => commands::push::delete(&workspace, file, output).await,
        Commands::Auth { command } => handle_auth_command(command, &workspace, &output),
        Commands::Config { command } => handle_config_command(command, &workspace, &output),
        Commands::Status => commands::status::show(&workspace, &output),
    }
}

fn handle_auth_command(command: AuthCommands, workspace: &Workspace, output: &Output) -> Result<()> {
    match command {
        AuthCommands::Set { token } => commands::auth::set(workspace, token, output),
        AuthCommands::Clear => commands::auth::clear(workspace, output),
        AuthCommands::Status => commands::auth::status(workspace, output),
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    workspace: &Workspace,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(workspace, output),
        Some(ConfigCommands::Set { key, value, global }) => {
            commands::config::set(workspace, key, value, global, output)
        }
    }
}

/// Log to stderr so stdout stays clean for --json
fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("bbsync_core={},bbsync_cli={}", log_level, log_level))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
