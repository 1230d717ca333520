use thiserror::Error;

/// Errors from repository operations (used by trait definitions in mnemo-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from tool execution.
///
/// A disabled tool is not an error: it returns its sentinel string instead.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("tool '{0}' timed out")]
    Timeout(String),

    #[error("no tool named '{0}' is registered")]
    Unknown(String),
}

/// Errors from backup, restore, and rollback operations.
///
/// This is the only error class that is fatal to its caller: a failed
/// durability operation returns one of these and leaves the manifest and
/// stores unmodified.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup '{0}' not found in manifest")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("store error: {0}")]
    Store(String),
}

impl From<std::io::Error> for BackupError {
    fn from(e: std::io::Error) -> Self {
        BackupError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_tool_error_display() {
        let err = ToolError::Failed {
            name: "web_search".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert!(err.to_string().contains("web_search"));
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_backup_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err: BackupError = io.into();
        assert!(matches!(err, BackupError::Io(_)));
        assert!(err.to_string().contains("missing file"));
    }
}
