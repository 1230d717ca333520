//! Memory management commands: list, add, delete.

use chrono::Utc;
use comfy_table::{presets, Cell, ContentArrangement, Table};
use secrecy::SecretString;
use std::time::Duration;
use uuid::Uuid;

use mnemo_core::memory::embedder::Embedder;
use mnemo_core::memory::vector::{scroll_all_for, VectorStore};
use mnemo_infra::embed::OpenAiCompatEmbedder;
use mnemo_types::memory::{MemoryFilter, MemoryKind, MemoryPayload, MemoryPoint};

use crate::state::AppState;

pub async fn list_memories(state: &AppState, json: bool) -> anyhow::Result<()> {
    let filter = MemoryFilter::owner(state.config.owner_id.0.clone());
    let points = scroll_all_for(state.vectors.as_ref(), &filter, 100).await?;

    if json {
        let view: Vec<_> = points
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "text": p.payload.text,
                    "kind": p.payload.kind,
                    "session_id": p.payload.session_id,
                    "created_at": p.payload.created_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if points.is_empty() {
        println!("No memories. Memories are extracted from conversations.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id"),
        Cell::new("Memory"),
        Cell::new("Kind"),
        Cell::new("Date"),
    ]);

    for point in &points {
        let text = if point.payload.text.len() > 70 {
            format!("{}...", &point.payload.text[..67])
        } else {
            point.payload.text.clone()
        };
        table.add_row(vec![
            Cell::new(point.id),
            Cell::new(text),
            Cell::new(point.payload.kind),
            Cell::new(point.payload.created_at.format("%Y-%m-%d")),
        ]);
    }

    println!("{table}");
    println!("{} memories", points.len());
    Ok(())
}

/// Embed and store a user-supplied fact directly.
pub async fn add_memory(state: &AppState, fact: &str, json: bool) -> anyhow::Result<()> {
    let config = &state.config;

    let embedder = OpenAiCompatEmbedder::new(
        config.embedding.base_url.clone(),
        SecretString::from(config.embedding.api_key.clone()),
        config.embedding.model.clone(),
        config.embedding.dimension,
        Duration::from_secs(config.embedding.timeout_secs),
    );

    let mut vectors = embedder.embed(&[fact.to_string()]).await?;
    let vector = vectors
        .pop()
        .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))?;

    let point = MemoryPoint {
        id: Uuid::now_v7(),
        vector,
        payload: MemoryPayload {
            owner_id: config.owner_id.0.clone(),
            session_id: None,
            text: fact.to_string(),
            kind: MemoryKind::ExtractedFact,
            created_at: Utc::now(),
        },
    };

    state.vectors.upsert(std::slice::from_ref(&point)).await?;

    if json {
        println!("{}", serde_json::json!({"id": point.id}));
    } else {
        println!("Remembered ({})", point.id);
    }
    Ok(())
}

pub async fn delete_memory(state: &AppState, id: Uuid, json: bool) -> anyhow::Result<()> {
    state.vectors.delete(&[id]).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": id}));
    } else {
        println!("Deleted memory {id}");
    }
    Ok(())
}
