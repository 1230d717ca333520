//! Mnemo CLI entry point.
//!
//! Binary name: `mnemo`
//!
//! Parses CLI arguments, initializes storage and services, then dispatches
//! to the appropriate command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{BackupCommands, Cli, Commands, MemoryCommands, SessionCommands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,mnemo=debug",
        _ => "trace",
    };
    mnemo_observe::tracing_setup::init_tracing(cli.otel, filter)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init().await?;

    let result = match cli.command {
        Commands::Chat { message, session } => {
            cli::chat::run_chat(&state, &message, session, cli.json).await
        }

        Commands::Session { command } => match command {
            SessionCommands::List => cli::session::list_sessions(&state, cli.json).await,
            SessionCommands::Delete { id } => cli::session::delete_session(&state, id, cli.json).await,
            SessionCommands::Search { query } => {
                cli::session::search_sessions(&state, &query, cli.json).await
            }
        },

        Commands::Memory { command } => match command {
            MemoryCommands::List => cli::memory::list_memories(&state, cli.json).await,
            MemoryCommands::Add { fact } => cli::memory::add_memory(&state, &fact, cli.json).await,
            MemoryCommands::Delete { id } => cli::memory::delete_memory(&state, id, cli.json).await,
        },

        Commands::Backup { command } => match command {
            BackupCommands::Create { description } => {
                cli::backup::create_backup(&state, description.as_deref().unwrap_or(""), cli.json)
                    .await
            }
            BackupCommands::List => cli::backup::list_backups(&state, cli.json).await,
            BackupCommands::Restore { id } => cli::backup::restore_backup(&state, &id, cli.json).await,
            BackupCommands::Rollback => cli::backup::rollback(&state, cli.json).await,
        },
    };

    mnemo_observe::tracing_setup::shutdown_tracing();
    result
}
