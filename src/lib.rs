//! PW3Query: fan out PublicWWW query packs and store normalised results.
//!
//! The pipeline has two stages connected by an ordered queue:
//! Query packs → Dispatcher → Queue → Worker → Result blobs
//!
//! # Architecture
//!
//! - **Dispatcher**: discovers query packs (from storage notifications or a
//!   prefix sweep) and enqueues one message per named query
//! - **Worker**: takes one message per invocation, validates it, runs the
//!   query against PublicWWW, and writes the results under a time-bucketed
//!   key so repeated runs in the same window overwrite each other
//!
//! Object storage, the queue, and the search provider are injected as
//! traits ([`store::BlobStore`], [`queue::MessageQueue`],
//! [`pw3_search::SearchProvider`]) and constructed once per process.

pub mod bucket;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod pack;
pub mod queue;
pub mod store;
pub mod worker;

pub use bucket::BucketPolicy;
pub use config::{DeletePolicy, PipelineConfig};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{PipelineError, Result};
pub use event::DispatchEvent;
pub use pack::{QueryDefinition, QueryPack, QueueMessage, ValidationError};
pub use worker::{ResultRecord, Worker, WorkerOutcome};
