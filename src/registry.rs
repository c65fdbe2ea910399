//! Schema Registry
//!
//! Holds the most recently declared schema for each stream. Streams without a
//! declared schema are accepted as-is.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::schema::StreamSchema;

/// Per-stream schemas for the lifetime of a run
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, StreamSchema>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and store a schema, replacing any earlier one for the stream.
    ///
    /// A schema that fails to compile leaves the previous entry in place.
    pub fn declare(&mut self, stream: &str, schema: Value, key_properties: Vec<String>) -> Result<&StreamSchema> {
        let compiled = StreamSchema::compile(stream, schema, key_properties)?;
        if self.schemas.contains_key(stream) {
            tracing::debug!(stream, "replacing schema");
        }
        self.schemas.insert(stream.to_string(), compiled);
        Ok(&self.schemas[stream])
    }

    /// Validate a record against the stream's schema, if it has one.
    pub fn validate(&self, stream: &str, record: &Value) -> Result<()> {
        match self.schemas.get(stream) {
            Some(schema) => schema.validate(record),
            None => Ok(()),
        }
    }

    /// Get the schema declared for a stream
    pub fn get(&self, stream: &str) -> Option<&StreamSchema> {
        self.schemas.get(stream)
    }

    /// Whether a schema has been declared for a stream
    pub fn contains(&self, stream: &str) -> bool {
        self.schemas.contains_key(stream)
    }

    /// Names of all streams with a schema, sorted
    pub fn streams(&self) -> Vec<&str> {
        let mut streams: Vec<_> = self.schemas.keys().map(String::as_str).collect();
        streams.sort();
        streams
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
