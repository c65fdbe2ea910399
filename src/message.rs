//! Singer message types
//!
//! Every input line is one JSON object whose `type` field selects the message
//! kind:
//!
//! ```text
//! {"type":"SCHEMA","stream":"users","schema":{...},"key_properties":["id"]}
//! {"type":"RECORD","stream":"users","record":{...}}
//! {"type":"STATE","value":{...}}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, TargetError};

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// Declares (or redeclares) the schema for a stream
    Schema {
        stream: String,
        schema: Value,
        #[serde(default)]
        key_properties: Vec<String>,
    },
    /// A single data record for a stream
    Record {
        stream: String,
        record: Map<String, Value>,
    },
    /// An opaque checkpoint to echo once everything before it is delivered
    State { value: Value },
}

impl Message {
    /// Parse a raw input line.
    ///
    /// Malformed JSON is a [`TargetError::Parse`]; well-formed JSON that is
    /// not a recognised message is a [`TargetError::Protocol`].
    pub fn parse(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line).map_err(|source| TargetError::Parse {
            line: line.to_string(),
            source,
        })?;

        Self::from_value(value).map_err(|e| match e {
            TargetError::Protocol(message) => TargetError::Protocol(format!("{}: {}", message, line)),
            other => other,
        })
    }

    /// Interpret an already parsed JSON value as a message.
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(TargetError::protocol("Line is not a JSON object"));
        }
        if value.get("type").is_none() {
            return Err(TargetError::protocol("Line is missing required key \"type\""));
        }

        serde_json::from_value(value).map_err(|e| TargetError::protocol(e.to_string()))
    }

    /// The message's `type` tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Schema { .. } => "SCHEMA",
            Message::Record { .. } => "RECORD",
            Message::State { .. } => "STATE",
        }
    }

    /// The stream this message belongs to, if any
    pub fn stream(&self) -> Option<&str> {
        match self {
            Message::Schema { stream, .. } | Message::Record { stream, .. } => Some(stream),
            Message::State { .. } => None,
        }
    }
}
