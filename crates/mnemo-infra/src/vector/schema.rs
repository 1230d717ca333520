//! Arrow schema for the LanceDB memory table.
//!
//! The vector dimension is a runtime parameter: restores recreate the
//! collection sized to the dimension detected from the first exported
//! point, which may differ from the configured embedding model's.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for
//! lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema for the single `memories` table.
pub fn memory_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("owner_id", DataType::Utf8, false),
        Field::new("session_id", DataType::Utf8, true),
        Field::new("text", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_schema_fields() {
        let schema = memory_schema(768);
        assert_eq!(schema.fields().len(), 7);
        assert!(schema.field_with_name("id").is_ok());
        assert!(schema.field_with_name("owner_id").is_ok());
        assert!(schema.field_with_name("kind").is_ok());

        let vector_field = schema.field_with_name("vector").unwrap();
        match vector_field.data_type() {
            DataType::FixedSizeList(_, size) => assert_eq!(*size, 768),
            other => panic!("Expected FixedSizeList, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_schema_dimension_parameterized() {
        let schema = memory_schema(384);
        let vector_field = schema.field_with_name("vector").unwrap();
        match vector_field.data_type() {
            DataType::FixedSizeList(_, size) => assert_eq!(*size, 384),
            other => panic!("Expected FixedSizeList, got {:?}", other),
        }
    }
}
