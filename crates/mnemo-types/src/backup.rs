//! Backup manifest types.
//!
//! The manifest is a JSON array of entries, newest first, persisted
//! alongside the snapshot files in the backups directory and capped at a
//! configured retention count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point-in-time snapshot of the transcript store and vector memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifestEntry {
    /// Timestamp-derived identifier, e.g. `20260807_142501_dev`.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Environment tag the snapshot was taken in (e.g. "dev", "prod").
    pub environment: String,
    /// Filename of the SQLite snapshot, relative to the backups dir.
    pub db_file: String,
    /// Filename of the vector snapshot; None if the export failed or the
    /// store was empty at export time and nothing was written.
    pub vectors_file: Option<String>,
    pub session_count: u64,
    pub message_count: u64,
    pub memory_count: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_entry_roundtrip() {
        let entry = BackupManifestEntry {
            id: "20260807_120000_dev".to_string(),
            timestamp: Utc::now(),
            environment: "dev".to_string(),
            db_file: "20260807_120000_dev_mnemo.db".to_string(),
            vectors_file: Some("20260807_120000_dev_vectors.json".to_string()),
            session_count: 3,
            message_count: 42,
            memory_count: 17,
            description: "before upgrade".to_string(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: BackupManifestEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_manifest_entry_empty_description_skipped() {
        let entry = BackupManifestEntry {
            id: "b1".to_string(),
            timestamp: Utc::now(),
            environment: "dev".to_string(),
            db_file: "b1.db".to_string(),
            vectors_file: None,
            session_count: 0,
            message_count: 0,
            memory_count: 0,
            description: String::new(),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("description"));
        // Deserializing without the field restores the empty default
        let parsed: BackupManifestEntry = serde_json::from_str(&json).unwrap();
        assert!(parsed.description.is_empty());
    }
}
