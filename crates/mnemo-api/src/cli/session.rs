//! Session management commands: list, delete, search.

use comfy_table::{presets, Cell, ContentArrangement, Table};
use uuid::Uuid;

use mnemo_core::chat::repository::TranscriptStore;
use mnemo_core::memory::vector::VectorStore;
use mnemo_types::chat::SessionRecord;
use mnemo_types::memory::MemoryFilter;

use crate::state::AppState;

pub async fn list_sessions(state: &AppState, json: bool) -> anyhow::Result<()> {
    let sessions = state
        .transcripts
        .list_sessions(&state.config.owner_id.0)
        .await?;

    print_sessions(&sessions, json)
}

/// Delete a session, its messages (SQLite cascade), and its vector
/// memories (filter cascade).
pub async fn delete_session(state: &AppState, id: Uuid, json: bool) -> anyhow::Result<()> {
    let removed = state.transcripts.delete_session(&id).await?;
    if !removed {
        anyhow::bail!("session {id} not found");
    }

    let memories_removed = state
        .vectors
        .delete_by_filter(&MemoryFilter::owner_session(
            state.config.owner_id.0.clone(),
            id,
        ))
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": id, "memories_removed": memories_removed})
        );
    } else {
        println!("Deleted session {id} ({memories_removed} memories removed)");
    }
    Ok(())
}

pub async fn search_sessions(state: &AppState, query: &str, json: bool) -> anyhow::Result<()> {
    let sessions = state
        .transcripts
        .search_sessions(&state.config.owner_id.0, query)
        .await?;

    print_sessions(&sessions, json)
}

fn print_sessions(sessions: &[SessionRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id"),
        Cell::new("Title"),
        Cell::new("Summary"),
        Cell::new("Updated"),
    ]);

    for session in sessions {
        let summary = session.summary.as_deref().unwrap_or("-");
        let summary_display = if summary.len() > 60 {
            format!("{}...", &summary[..57])
        } else {
            summary.to_string()
        };
        table.add_row(vec![
            Cell::new(session.id),
            Cell::new(session.title.as_deref().unwrap_or("-")),
            Cell::new(summary_display),
            Cell::new(session.updated_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    println!("{table}");
    Ok(())
}
