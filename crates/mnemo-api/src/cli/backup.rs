//! Backup commands: create, list, restore, rollback.

use std::sync::Arc;

use comfy_table::{presets, Cell, ContentArrangement, Table};

use mnemo_infra::backup::manager::BackupManager;
use mnemo_infra::sqlite::transcript::SqliteTranscriptStore;
use mnemo_infra::vector::memories::LanceMemoryStore;

use crate::state::AppState;

fn manager(state: &AppState) -> BackupManager<SqliteTranscriptStore, LanceMemoryStore> {
    BackupManager::new(
        Arc::clone(&state.transcripts),
        Arc::clone(&state.vectors),
        state.db_path(),
        state.backups_dir(),
        state.config.environment.0.clone(),
        state.config.backup.retention,
        state.config.backup.auto_backup_before_restore,
    )
}

pub async fn create_backup(state: &AppState, description: &str, json: bool) -> anyhow::Result<()> {
    let entry = manager(state).create_backup(description).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!("Backup created: {}", entry.id);
        println!(
            "  sessions: {}, messages: {}, memories: {}",
            entry.session_count, entry.message_count, entry.memory_count
        );
    }
    Ok(())
}

pub async fn list_backups(state: &AppState, json: bool) -> anyhow::Result<()> {
    let entries = manager(state).list_backups().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No backups.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id"),
        Cell::new("Created"),
        Cell::new("Sessions"),
        Cell::new("Messages"),
        Cell::new("Memories"),
        Cell::new("Description"),
    ]);

    for entry in &entries {
        table.add_row(vec![
            Cell::new(&entry.id),
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.session_count),
            Cell::new(entry.message_count),
            Cell::new(entry.memory_count),
            Cell::new(if entry.description.is_empty() {
                "-"
            } else {
                &entry.description
            }),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub async fn restore_backup(state: &AppState, id: &str, json: bool) -> anyhow::Result<()> {
    manager(state).restore_backup(id).await?;

    if json {
        println!("{}", serde_json::json!({"restored": id}));
    } else {
        println!("Restored backup {id}");
    }
    Ok(())
}

pub async fn rollback(state: &AppState, json: bool) -> anyhow::Result<()> {
    let id = manager(state).rollback_latest().await?;

    if json {
        println!("{}", serde_json::json!({"restored": id}));
    } else {
        println!("Rolled back to backup {id}");
    }
    Ok(())
}
