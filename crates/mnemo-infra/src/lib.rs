//! Infrastructure implementations for Mnemo.
//!
//! Concrete backends for the traits defined in mnemo-core: SQLite transcript
//! store, LanceDB vector memory, OpenAI-compatible chat/embedding clients,
//! the web search tool, and the backup manager.

pub mod backup;
pub mod config;
pub mod embed;
pub mod llm;
pub mod search;
pub mod sqlite;
pub mod vector;
