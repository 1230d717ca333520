//! Shared domain types for Mnemo.
//!
//! Pure data types used across the workspace: LLM request/response shapes,
//! transcript records, memory records, context bundles, backup manifest
//! entries, configuration, and error enums. No I/O lives here.

pub mod backup;
pub mod chat;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod memory;
