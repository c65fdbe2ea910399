//! Batch queue
//!
//! Records are queued as [`BatchEntry`] values and uploaded together once the
//! queue reaches `send_threshold`, or when the run ends. A checkpoint that
//! arrives while records are queued is held back until the batch carrying
//! those records has been accepted.

use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::DeliveryClient;
use crate::config::TargetConfig;
use crate::error::Result;

/// One record as sent to the import endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub repository: String,
    /// Stream the record came from
    pub dataset: String,
    /// The flattened record
    pub data: Map<String, Value>,
}

/// Outcome of queueing a record
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    pub entry: BatchEntry,
    /// Checkpoint released by a flush the record triggered
    pub released: Option<Value>,
}

/// Pending records, the held-back checkpoint, and the client that delivers them
#[derive(Debug)]
pub struct BatchQueue {
    repository: String,
    send_threshold: usize,
    entries: Vec<BatchEntry>,
    pending_checkpoint: Option<Value>,
    batch_index: u64,
    client: DeliveryClient,
}

impl BatchQueue {
    pub fn new(repository: impl Into<String>, send_threshold: usize, client: DeliveryClient) -> Self {
        let send_threshold = send_threshold.max(1);
        Self {
            repository: repository.into(),
            send_threshold,
            entries: Vec::with_capacity(send_threshold),
            pending_checkpoint: None,
            batch_index: 0,
            client,
        }
    }

    pub fn from_config(config: &TargetConfig, client: DeliveryClient) -> Self {
        Self::new(config.repository.clone(), config.send_threshold, client)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records waiting for the next flush
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn send_threshold(&self) -> usize {
        self.send_threshold
    }

    /// Number of flushes attempted so far
    pub fn batch_index(&self) -> u64 {
        self.batch_index
    }

    pub fn pending_checkpoint(&self) -> Option<&Value> {
        self.pending_checkpoint.as_ref()
    }

    pub fn client(&self) -> &DeliveryClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut DeliveryClient {
        &mut self.client
    }

    /// Queue a flattened record, flushing when the threshold is reached.
    pub async fn enqueue(&mut self, dataset: &str, data: Map<String, Value>) -> Result<Enqueued> {
        let entry = BatchEntry {
            repository: self.repository.clone(),
            dataset: dataset.to_string(),
            data,
        };
        self.entries.push(entry.clone());

        let released = if self.entries.len() >= self.send_threshold {
            self.flush().await?
        } else {
            None
        };

        Ok(Enqueued { entry, released })
    }

    /// Hold a checkpoint until the queued records are delivered.
    ///
    /// With nothing queued there is nothing to wait for and the value is
    /// handed straight back. Otherwise it replaces any checkpoint still
    /// pending.
    pub fn set_checkpoint(&mut self, value: Value) -> Option<Value> {
        if self.entries.is_empty() {
            return Some(value);
        }
        if self.pending_checkpoint.replace(value).is_some() {
            tracing::debug!("superseding unreleased checkpoint");
        }
        None
    }

    /// Upload everything queued and release the pending checkpoint.
    ///
    /// Does nothing when the queue is empty. On failure the queue and the
    /// pending checkpoint are left untouched.
    pub async fn flush(&mut self) -> Result<Option<Value>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        self.batch_index += 1;
        let started = Instant::now();
        tracing::info!(batch = self.batch_index, records = self.entries.len(), "sending batch");

        self.client.import(&self.entries).await?;

        tracing::info!(
            batch = self.batch_index,
            records = self.entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch accepted"
        );
        self.entries.clear();
        Ok(self.pending_checkpoint.take())
    }
}
