//! Typo Singer Target
//!
//! Reads Singer messages (SCHEMA, RECORD, STATE) line by line, validates and
//! flattens each record, and uploads records in batches to the Typo import
//! API. STATE checkpoints are echoed back only once every record before them
//! has been accepted by the API.
//!
//! ## Features
//!
//! - **Ordering Checks**: a stream's SCHEMA must precede its RECORDs
//! - **Schema Validation**: records are checked against their stream's JSON Schema (Draft 4)
//! - **Batching**: records are sent `send_threshold` at a time, with a final flush at end of input
//! - **Resilient Delivery**: transient network failures back off exponentially; expired tokens are renewed
//! - **Safe Checkpoints**: STATE is held back until the batch covering it is accepted
//!
//! ## Architecture
//!
//! ```text
//! stdin ─► Message::parse ─► MessageRouter ─┬─► SchemaRegistry (validate)
//!                                           ├─► flatten
//!                                           └─► BatchQueue ─► DeliveryClient ─► Transport
//!                                                    │                 POST /token, POST /import
//! stdout ◄──────────── released STATE ◄──────────────┘
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod flatten;
pub mod message;
pub mod registry;
pub mod retry;
pub mod router;
pub mod schema;
pub mod transport;
pub mod usage;

pub use batch::{BatchEntry, BatchQueue, Enqueued};
pub use client::DeliveryClient;
pub use config::TargetConfig;
pub use error::{Result, TargetError};
pub use flatten::flatten;
pub use message::Message;
pub use registry::SchemaRegistry;
pub use retry::{retry, RetryPolicy};
pub use router::MessageRouter;
pub use schema::StreamSchema;
pub use transport::{HttpResponse, HttpTransport, Transport};
