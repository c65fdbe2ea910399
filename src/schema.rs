//! Stream schema types

use std::fmt;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{Result, TargetError};

/// The schema declared for one stream, together with its compiled validator.
pub struct StreamSchema {
    /// Name of the stream (e.g., "users", "orders")
    pub stream: String,
    /// The raw JSON Schema document as declared
    pub content: Value,
    /// Primary key fields announced alongside the schema
    pub key_properties: Vec<String>,
    compiled: JSONSchema,
}

impl StreamSchema {
    /// Compile a schema document for a stream.
    ///
    /// Singer taps emit Draft 4 schemas, so that draft is always used.
    pub fn compile(stream: impl Into<String>, content: Value, key_properties: Vec<String>) -> Result<Self> {
        let stream = stream.into();
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft4)
            .compile(&content)
            .map_err(|e| TargetError::Schema {
                stream: stream.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            stream,
            content,
            key_properties,
            compiled,
        })
    }

    /// Validate a record, reporting the first violation found.
    pub fn validate(&self, record: &Value) -> Result<()> {
        let Err(mut errors) = self.compiled.validate(record) else {
            return Ok(());
        };

        let message = match errors.next() {
            Some(error) if error.instance_path.to_string().is_empty() => error.to_string(),
            Some(error) => format!("{} (at '{}')", error, error.instance_path),
            None => "record does not match schema".to_string(),
        };

        Err(TargetError::Validation {
            stream: self.stream.clone(),
            message,
        })
    }

    /// Whether the stream declares any key properties
    pub fn has_keys(&self) -> bool {
        !self.key_properties.is_empty()
    }
}

impl fmt::Debug for StreamSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSchema")
            .field("stream", &self.stream)
            .field("content", &self.content)
            .field("key_properties", &self.key_properties)
            .finish_non_exhaustive()
    }
}
