//! Shared application state for CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use mnemo_infra::config::{
    backups_dir, database_path, database_url, default_data_dir, load_config, vector_store_path,
};
use mnemo_infra::sqlite::pool::DatabasePool;
use mnemo_infra::sqlite::transcript::SqliteTranscriptStore;
use mnemo_infra::vector::lance::LanceVectorStore;
use mnemo_infra::vector::memories::LanceMemoryStore;
use mnemo_types::config::MnemoConfig;

/// Initialized stores and configuration shared by all commands.
pub struct AppState {
    pub config: MnemoConfig,
    pub data_dir: PathBuf,
    pub transcripts: Arc<SqliteTranscriptStore>,
    pub vectors: Arc<LanceMemoryStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = default_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;

        let pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open transcript database")?;
        let transcripts = Arc::new(SqliteTranscriptStore::new(pool));

        let lance = LanceVectorStore::new(vector_store_path(&data_dir))
            .await
            .context("failed to open vector store")?;
        let vectors = Arc::new(LanceMemoryStore::new(lance, config.embedding.dimension));

        Ok(Self {
            config,
            data_dir,
            transcripts,
            vectors,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        database_path(&self.data_dir)
    }

    pub fn backups_dir(&self) -> PathBuf {
        backups_dir(&self.data_dir)
    }
}
