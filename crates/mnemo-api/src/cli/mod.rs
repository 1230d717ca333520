//! CLI argument definitions and command handlers.

pub mod backup;
pub mod chat;
pub mod memory;
pub mod session;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Mnemo -- a conversational agent with persistent three-tier memory.
#[derive(Parser)]
#[command(name = "mnemo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export OpenTelemetry spans to stdout
    #[arg(long, global = true)]
    pub otel: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message through the agent and print the response
    Chat {
        /// The message to send
        message: String,

        /// Continue an existing session instead of starting a new one
        #[arg(long)]
        session: Option<Uuid>,
    },

    /// Manage chat sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Manage long-term memories
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },

    /// Manage backups of the transcript and memory stores
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List sessions, most recently updated first
    List,

    /// Delete a session, its messages, and its memories
    Delete { id: Uuid },

    /// Full-text search across session transcripts
    Search { query: String },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// List stored memories
    List,

    /// Store a fact directly
    Add { fact: String },

    /// Delete one memory by id
    Delete { id: Uuid },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Optional description recorded in the manifest
        #[arg(long)]
        description: Option<String>,
    },

    /// List backups, newest first
    List,

    /// Restore a specific backup by id
    Restore { id: String },

    /// Restore the most recent backup
    Rollback,
}
