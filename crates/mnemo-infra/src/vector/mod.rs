//! LanceDB-backed vector memory.

pub mod lance;
pub mod memories;
pub mod schema;
