//! Core orchestration logic for Mnemo.
//!
//! Defines the repository and provider traits (implemented in mnemo-infra)
//! and the turn-processing machinery: intent classification, context
//! assembly, the reason/tools state machine, response synthesis, the memory
//! write path, and background summarization.

pub mod chat;
pub mod context;
pub mod llm;
pub mod memory;
pub mod tool;
pub mod turn;
