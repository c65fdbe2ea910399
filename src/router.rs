//! Message Router
//!
//! Drives a run: every input message is dispatched in order, and the
//! checkpoints that become safe to emit are handed back to the caller.
//!
//! Ordering rules:
//!
//! - A SCHEMA for a stream must arrive before that stream's first RECORD.
//!   Redeclaring a schema is allowed only while no record has flowed.
//! - RECORDs are validated against their stream's schema (if any),
//!   flattened, and queued for delivery.
//! - A STATE is released straight away when nothing is queued; otherwise it
//!   waits for the next accepted batch, superseding any earlier waiting STATE.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::batch::BatchQueue;
use crate::client::DeliveryClient;
use crate::config::TargetConfig;
use crate::error::{Result, TargetError};
use crate::flatten::flatten;
use crate::message::Message;
use crate::registry::SchemaRegistry;

/// Key under which imported key properties are added to checkpoints
pub const IMPORTED_RECORDS_KEY: &str = "imported_records";

/// The per-run state machine
#[derive(Debug)]
pub struct MessageRouter {
    registry: SchemaRegistry,
    processed_streams: HashSet<String>,
    queue: BatchQueue,
    track_imported_keys: bool,
    imported_keys: Vec<Value>,
    records: u64,
}

impl MessageRouter {
    pub fn new(queue: BatchQueue) -> Self {
        Self {
            registry: SchemaRegistry::new(),
            processed_streams: HashSet::new(),
            queue,
            track_imported_keys: false,
            imported_keys: Vec::new(),
            records: 0,
        }
    }

    pub fn from_config(config: &TargetConfig, client: DeliveryClient) -> Self {
        Self::new(BatchQueue::from_config(config, client)).with_imported_keys(config.track_imported_keys)
    }

    /// Annotate released checkpoints with the key properties of every
    /// record imported so far.
    pub fn with_imported_keys(mut self, enabled: bool) -> Self {
        self.track_imported_keys = enabled;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    /// Whether at least one record has been accepted for the stream
    pub fn is_processed(&self, stream: &str) -> bool {
        self.processed_streams.contains(stream)
    }

    /// Number of records accepted so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Authenticate before any message is processed.
    pub async fn start(&mut self) -> Result<()> {
        self.queue.client_mut().authenticate().await?;
        tracing::info!(base_url = self.queue.client().base_url(), "authenticated");
        Ok(())
    }

    /// Process every line, then flush what is left.
    ///
    /// Returns the released checkpoints in the order they became safe.
    pub async fn run<I, S>(mut self, lines: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut released = Vec::new();
        for line in lines {
            if let Some(state) = self.process_line(line.as_ref()).await? {
                released.push(state);
            }
        }
        if let Some(state) = self.finish().await? {
            released.push(state);
        }
        Ok(released)
    }

    /// Parse and process one raw input line.
    pub async fn process_line(&mut self, line: &str) -> Result<Option<Value>> {
        let message = Message::parse(line)?;
        self.process(message).await
    }

    /// Process one message, returning the checkpoint it released, if any.
    pub async fn process(&mut self, message: Message) -> Result<Option<Value>> {
        tracing::trace!(kind = message.kind(), stream = message.stream(), "message");
        match message {
            Message::Schema {
                stream,
                schema,
                key_properties,
            } => {
                self.declare_schema(&stream, schema, key_properties)?;
                Ok(None)
            }
            Message::Record { stream, record } => self.accept_record(stream, record).await,
            Message::State { value } => Ok(self.checkpoint(value)),
        }
    }

    /// Flush the remaining records at end of input.
    ///
    /// Returns the checkpoint that was waiting on them, if any.
    pub async fn finish(mut self) -> Result<Option<Value>> {
        let released = self.queue.flush().await?;
        tracing::info!(
            records = self.records,
            streams = self.processed_streams.len(),
            batches = self.queue.batch_index(),
            "input exhausted"
        );
        Ok(released)
    }

    fn declare_schema(&mut self, stream: &str, schema: Value, key_properties: Vec<String>) -> Result<()> {
        if self.processed_streams.contains(stream) {
            tracing::error!(stream, "SCHEMA received after RECORD messages for the same stream");
            return Err(TargetError::protocol(format!(
                "SCHEMA for stream '{}' must be sent before its RECORD messages",
                stream
            )));
        }

        self.registry.declare(stream, schema, key_properties)?;
        tracing::debug!(stream, "schema declared");
        Ok(())
    }

    async fn accept_record(&mut self, stream: String, record: Map<String, Value>) -> Result<Option<Value>> {
        let record = Value::Object(record);
        self.registry.validate(&stream, &record)?;

        let keys = if self.track_imported_keys {
            self.key_values(&stream, &record)?
        } else {
            None
        };

        let flattened = record.as_object().map(flatten).unwrap_or_default();
        let enqueued = self.queue.enqueue(&stream, flattened).await?;

        if let Some(keys) = keys {
            self.imported_keys.push(keys);
        }
        self.records += 1;
        self.processed_streams.insert(stream);
        Ok(enqueued.released)
    }

    /// Pick the declared key properties out of a record.
    fn key_values(&self, stream: &str, record: &Value) -> Result<Option<Value>> {
        let Some(schema) = self.registry.get(stream).filter(|s| s.has_keys()) else {
            return Ok(None);
        };

        let mut keys = Map::new();
        for key in &schema.key_properties {
            let value = record.get(key).ok_or_else(|| TargetError::MissingKeyProperty {
                stream: stream.to_string(),
                key: key.clone(),
            })?;
            keys.insert(key.clone(), value.clone());
        }
        Ok(Some(Value::Object(keys)))
    }

    fn checkpoint(&mut self, mut value: Value) -> Option<Value> {
        if self.track_imported_keys {
            if let Value::Object(map) = &mut value {
                map.insert(IMPORTED_RECORDS_KEY.to_string(), Value::Array(self.imported_keys.clone()));
            }
        }

        let released = self.queue.set_checkpoint(value);
        if released.is_none() {
            tracing::debug!(queued = self.queue.len(), "checkpoint held until next batch is accepted");
        }
        released
    }
}
