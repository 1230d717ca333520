//! Point-in-time snapshots of the transcript store and vector memory.
//!
//! `create_backup` checkpoints the WAL, copies the SQLite file, exports
//! every vector point via exhaustive paginated scroll into a JSON snapshot,
//! prepends a manifest entry, and enforces retention. `restore_backup`
//! optionally takes a safety backup first, copies the DB snapshot back, and
//! rebuilds the vector collection sized to the dimension detected from the
//! first exported point. `rollback_latest` restores the newest entry.
//!
//! All three operations are all-or-nothing from the caller's perspective:
//! any error aborts with `BackupError` and the manifest is only written as
//! the final step.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use mnemo_core::chat::repository::TranscriptStore;
use mnemo_core::memory::vector::{VectorStore, scroll_all};
use mnemo_types::backup::BackupManifestEntry;
use mnemo_types::error::BackupError;
use mnemo_types::memory::MemoryPoint;

/// Page size for the export scroll and the reimport batches.
const BATCH_SIZE: usize = 100;

/// Durability manager over a transcript store and a vector store.
pub struct BackupManager<T, V> {
    transcripts: Arc<T>,
    vectors: Arc<V>,
    db_path: PathBuf,
    backups_dir: PathBuf,
    environment: String,
    retention: usize,
    auto_backup_before_restore: bool,
}

impl<T, V> BackupManager<T, V>
where
    T: TranscriptStore,
    V: VectorStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transcripts: Arc<T>,
        vectors: Arc<V>,
        db_path: PathBuf,
        backups_dir: PathBuf,
        environment: String,
        retention: usize,
        auto_backup_before_restore: bool,
    ) -> Self {
        Self {
            transcripts,
            vectors,
            db_path,
            backups_dir,
            environment,
            retention,
            auto_backup_before_restore,
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.backups_dir.join("manifest.json")
    }

    async fn load_manifest(&self) -> Result<Vec<BackupManifestEntry>, BackupError> {
        match tokio::fs::read_to_string(self.manifest_path()).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| BackupError::Manifest(format!("invalid manifest: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_manifest(&self, entries: &[BackupManifestEntry]) -> Result<(), BackupError> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| BackupError::Manifest(format!("serialize manifest: {e}")))?;
        tokio::fs::write(self.manifest_path(), json).await?;
        Ok(())
    }

    /// Create a new backup of the transcript store and vector memory.
    #[tracing::instrument(name = "create_backup", skip(self))]
    pub async fn create_backup(
        &self,
        description: &str,
    ) -> Result<BackupManifestEntry, BackupError> {
        let now = Utc::now();
        let backup_id = format!("{}_{}", now.format("%Y%m%d_%H%M%S"), self.environment);

        tokio::fs::create_dir_all(&self.backups_dir).await?;

        // Flush the WAL so the file copy captures all committed state.
        self.transcripts
            .checkpoint()
            .await
            .map_err(|e| BackupError::Store(e.to_string()))?;

        let db_file = format!("{backup_id}_mnemo.db");
        if tokio::fs::try_exists(&self.db_path).await? {
            tokio::fs::copy(&self.db_path, self.backups_dir.join(&db_file)).await?;
        }

        // Export every vector point. A failed export degrades to a
        // vectors-less backup entry rather than failing the whole backup.
        let vectors_file = format!("{backup_id}_vectors.json");
        let vectors_file = match self.export_vectors(&vectors_file).await {
            Ok(()) => Some(vectors_file),
            Err(e) => {
                tracing::warn!(error = %e, "Vector export failed; backup carries no vector snapshot");
                None
            }
        };

        let session_count = self
            .transcripts
            .session_count()
            .await
            .map_err(|e| BackupError::Store(e.to_string()))?;
        let message_count = self
            .transcripts
            .total_message_count()
            .await
            .map_err(|e| BackupError::Store(e.to_string()))?;
        let memory_count = self.vectors.count().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Memory count failed; recording 0");
            0
        });

        let entry = BackupManifestEntry {
            id: backup_id,
            timestamp: now,
            environment: self.environment.clone(),
            db_file,
            vectors_file,
            session_count,
            message_count,
            memory_count,
            description: description.to_string(),
        };

        let mut manifest = self.load_manifest().await?;
        manifest.insert(0, entry.clone());

        // Enforce retention: delete over-cap entries and their files.
        if manifest.len() > self.retention {
            for old in manifest.split_off(self.retention) {
                self.remove_snapshot_files(&old).await?;
            }
        }

        self.save_manifest(&manifest).await?;

        tracing::info!(
            backup_id = %entry.id,
            sessions = entry.session_count,
            messages = entry.message_count,
            memories = entry.memory_count,
            "Backup created"
        );

        Ok(entry)
    }

    /// List manifest entries, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupManifestEntry>, BackupError> {
        self.load_manifest().await
    }

    /// Look up one manifest entry.
    pub async fn backup_info(
        &self,
        backup_id: &str,
    ) -> Result<Option<BackupManifestEntry>, BackupError> {
        Ok(self
            .load_manifest()
            .await?
            .into_iter()
            .find(|e| e.id == backup_id))
    }

    /// Restore from a specific backup.
    #[tracing::instrument(name = "restore_backup", skip(self))]
    pub async fn restore_backup(&self, backup_id: &str) -> Result<(), BackupError> {
        let manifest = self.load_manifest().await?;
        let entry = manifest
            .iter()
            .find(|e| e.id == backup_id)
            .cloned()
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;

        // Safety net: the restore itself becomes undoable.
        if self.auto_backup_before_restore {
            tracing::info!("Creating safety backup before restore");
            self.create_backup("auto_before_restore").await?;
        }

        let db_snapshot = self.backups_dir.join(&entry.db_file);
        if tokio::fs::try_exists(&db_snapshot).await? {
            tokio::fs::copy(&db_snapshot, &self.db_path).await?;
            // Stale WAL state would shadow the restored file.
            remove_if_exists(PathBuf::from(format!("{}-wal", self.db_path.display()))).await?;
            remove_if_exists(PathBuf::from(format!("{}-shm", self.db_path.display()))).await?;
            tracing::info!(file = %entry.db_file, "Database restored");
        }

        if let Some(ref vectors_file) = entry.vectors_file {
            let snapshot = self.backups_dir.join(vectors_file);
            if tokio::fs::try_exists(&snapshot).await? {
                self.import_vectors(&snapshot).await?;
                tracing::info!(file = %vectors_file, "Vector memory restored");
            }
        }

        tracing::info!(backup_id, "Restore complete");
        Ok(())
    }

    /// Restore the manifest's most recent entry. Returns its id.
    pub async fn rollback_latest(&self) -> Result<String, BackupError> {
        let manifest = self.load_manifest().await?;
        let latest = manifest
            .first()
            .ok_or_else(|| BackupError::Manifest("no backups available for rollback".to_string()))?
            .id
            .clone();

        tracing::info!(backup_id = %latest, "Rolling back to most recent backup");
        self.restore_backup(&latest).await?;
        Ok(latest)
    }

    async fn export_vectors(&self, filename: &str) -> Result<(), BackupError> {
        let points = scroll_all(self.vectors.as_ref(), BATCH_SIZE)
            .await
            .map_err(|e| BackupError::Store(e.to_string()))?;

        let json = serde_json::to_string(&points)
            .map_err(|e| BackupError::Store(format!("serialize points: {e}")))?;
        tokio::fs::write(self.backups_dir.join(filename), json).await?;

        Ok(())
    }

    async fn import_vectors(&self, snapshot: &PathBuf) -> Result<(), BackupError> {
        let content = tokio::fs::read_to_string(snapshot).await?;
        let points: Vec<MemoryPoint> = serde_json::from_str(&content)
            .map_err(|e| BackupError::Store(format!("invalid vector snapshot: {e}")))?;

        if points.is_empty() {
            return Ok(());
        }

        // The collection is rebuilt at the dimension of the first exported
        // vector, which survives embedding-model changes.
        let dimension = points[0].vector.len();
        self.vectors
            .recreate(dimension)
            .await
            .map_err(|e| BackupError::Store(e.to_string()))?;

        for chunk in points.chunks(BATCH_SIZE) {
            self.vectors
                .upsert(chunk)
                .await
                .map_err(|e| BackupError::Store(e.to_string()))?;
        }

        Ok(())
    }

    async fn remove_snapshot_files(&self, entry: &BackupManifestEntry) -> Result<(), BackupError> {
        remove_if_exists(self.backups_dir.join(&entry.db_file)).await?;
        if let Some(ref vectors_file) = entry.vectors_file {
            remove_if_exists(self.backups_dir.join(vectors_file)).await?;
        }
        Ok(())
    }
}

async fn remove_if_exists(path: PathBuf) -> Result<(), BackupError> {
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
