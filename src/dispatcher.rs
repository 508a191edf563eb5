//! Dispatcher: flattens query packs into one queue message per query.
//!
//! Every failure here is isolated. A pack that cannot be fetched or parsed
//! is skipped, and a query that cannot be enqueued is dropped; both are
//! logged and recorded in the [`DispatchReport`]. Nothing is retried: the
//! next scheduled sweep rediscovers the same packs.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::event::{DispatchEvent, DispatchMode};
use crate::pack::QueryPack;
use crate::queue::MessageQueue;
use crate::store::BlobStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why a pack was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackFailureReason {
    /// The object could not be read.
    Fetch(String),
    /// The object is not a valid pack document.
    Parse(String),
}

impl std::fmt::Display for PackFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "fetch failed: {e}"),
            Self::Parse(e) => write!(f, "parse failed: {e}"),
        }
    }
}

/// A pack that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFailure {
    /// Storage key of the pack.
    pub name: String,
    /// What went wrong.
    pub reason: PackFailureReason,
}

/// A query that could not be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueFailure {
    /// Pack the query came from.
    pub pack: String,
    /// Query identifier.
    pub query_id: String,
    /// Error text.
    pub reason: String,
}

/// Per-pack dispatch counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackDispatch {
    /// Storage key of the pack.
    pub name: String,
    /// Queries in the pack.
    pub queries: usize,
    /// Queries successfully enqueued.
    pub dispatched: usize,
}

/// Summary of one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// How packs were discovered.
    pub mode: DispatchMode,
    /// Packs that loaded, in discovery order.
    pub packs: Vec<PackDispatch>,
    /// Packs that were skipped.
    pub pack_failures: Vec<PackFailure>,
    /// Queries that were dropped.
    pub enqueue_failures: Vec<EnqueueFailure>,
    /// Set when a sweep could not list the packs prefix.
    pub listing_error: Option<String>,
}

impl DispatchReport {
    fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            packs: Vec::new(),
            pack_failures: Vec::new(),
            enqueue_failures: Vec::new(),
            listing_error: None,
        }
    }

    /// Messages enqueued across all packs.
    pub fn total_dispatched(&self) -> usize {
        self.packs.iter().map(|p| p.dispatched).sum()
    }

    /// `true` when nothing was skipped or dropped.
    pub fn is_clean(&self) -> bool {
        self.pack_failures.is_empty()
            && self.enqueue_failures.is_empty()
            && self.listing_error.is_none()
    }
}

/// Loads query packs and enqueues their queries.
pub struct Dispatcher {
    store: Arc<dyn BlobStore>,
    queue: Arc<dyn MessageQueue>,
    packs_prefix: String,
    group_id: String,
}

impl Dispatcher {
    /// Create a dispatcher over injected collaborators.
    pub fn new(
        store: Arc<dyn BlobStore>,
        queue: Arc<dyn MessageQueue>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            store,
            queue,
            packs_prefix: config.packs_prefix.clone(),
            group_id: config.queue.group_id.clone(),
        }
    }

    /// Handle one invocation. Never fails; see the report for what was skipped.
    pub async fn run(&self, event: &DispatchEvent) -> DispatchReport {
        let mut report = DispatchReport::new(event.mode());

        let keys = match self.discover(event).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("unable to list query packs under {}: {e}", self.packs_prefix);
                report.listing_error = Some(e.to_string());
                return report;
            }
        };
        debug!(mode = %report.mode, packs = keys.len(), "query packs discovered");

        let mut packs = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load_pack(&key).await {
                Ok(pack) => packs.push(pack),
                Err(failure) => {
                    warn!("unable to load query pack from {}: {}", failure.name, failure.reason);
                    report.pack_failures.push(failure);
                }
            }
        }

        for pack in &packs {
            let dispatched = self.dispatch_pack(pack, &mut report).await;
            info!(
                "dispatching {} queries found in {}",
                pack.len(),
                pack.name
            );
            report.packs.push(PackDispatch {
                name: pack.name.clone(),
                queries: pack.len(),
                dispatched,
            });
        }

        report
    }

    /// Pack keys to load for `event`.
    ///
    /// # Errors
    ///
    /// Fails only when a sweep cannot list the packs prefix.
    pub async fn discover(&self, event: &DispatchEvent) -> Result<Vec<String>, PipelineError> {
        match event {
            DispatchEvent::Triggered(keys) => Ok(keys.clone()),
            DispatchEvent::Sweep => {
                let keys = self.store.list(&self.packs_prefix, Some("/")).await?;
                Ok(keys
                    .into_iter()
                    .filter(|key| key != &self.packs_prefix)
                    .collect())
            }
        }
    }

    /// Fetch and parse one pack.
    pub async fn load_pack(&self, key: &str) -> Result<QueryPack, PackFailure> {
        let body = self.store.get(key).await.map_err(|e| PackFailure {
            name: key.to_owned(),
            reason: PackFailureReason::Fetch(e.to_string()),
        })?;
        QueryPack::parse(key, &body).map_err(|e| PackFailure {
            name: key.to_owned(),
            reason: PackFailureReason::Parse(e.to_string()),
        })
    }

    /// Enqueue every query in `pack`, returning how many were sent.
    async fn dispatch_pack(&self, pack: &QueryPack, report: &mut DispatchReport) -> usize {
        let mut dispatched = 0;
        for message in pack.messages() {
            let sent = match message.to_body() {
                Ok(body) => self.queue.send(body, &self.group_id).await,
                Err(e) => Err(e.into()),
            };
            match sent {
                Ok(message_id) => {
                    debug!(query_id = %message.query_id, %message_id, "query enqueued");
                    dispatched += 1;
                }
                Err(e) => {
                    warn!(
                        query_id = %message.query_id,
                        pack = %pack.name,
                        "could not dispatch query to queue: {e}"
                    );
                    report.enqueue_failures.push(EnqueueFailure {
                        pack: pack.name.clone(),
                        query_id: message.query_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::queue::{MemoryQueue, ReceivedMessage};
    use crate::store::MemoryBlobStore;
    use async_trait::async_trait;
    use std::time::Duration;

    const PACK_A: &str = r#"{"queries": {
        "a1": {"query": "foo", "category": "c", "notes": "", "snippet": "yes"},
        "a2": {"query": "bar", "category": "c", "notes": "", "snippet": "no"}
    }}"#;
    const PACK_B: &str = r#"{"queries": {
        "b1": {"query": "baz", "category": "d", "notes": "n", "snippet": "no"}
    }}"#;

    fn config() -> PipelineConfig {
        PipelineConfig {
            bucket_name: "bucket".into(),
            ..Default::default()
        }
    }

    async fn seeded_store(objects: &[(&str, &str)]) -> Arc<MemoryBlobStore> {
        let store = Arc::new(MemoryBlobStore::new());
        for (key, body) in objects {
            store
                .put(key, body.as_bytes().to_vec())
                .await
                .expect("seed");
        }
        store
    }

    /// Queue that rejects sends for one query id.
    struct FlakyQueue {
        inner: MemoryQueue,
        reject: &'static str,
    }

    #[async_trait]
    impl MessageQueue for FlakyQueue {
        async fn send(&self, body: String, group_id: &str) -> Result<String> {
            if body.contains(self.reject) {
                return Err(PipelineError::Queue("throttled".into()));
            }
            self.inner.send(body, group_id).await
        }

        async fn receive(
            &self,
            max_messages: usize,
            visibility_timeout: Duration,
            wait_time: Duration,
        ) -> Result<Vec<ReceivedMessage>> {
            self.inner
                .receive(max_messages, visibility_timeout, wait_time)
                .await
        }

        async fn delete(&self, receipt_handle: &str) -> Result<()> {
            self.inner.delete(receipt_handle).await
        }
    }

    #[tokio::test]
    async fn sweep_dispatches_every_query_once() {
        let store = seeded_store(&[
            ("packs/", ""),
            ("packs/a.json", PACK_A),
            ("packs/b.json", PACK_B),
        ])
        .await;
        let queue = Arc::new(MemoryQueue::new());
        let dispatcher = Dispatcher::new(store, queue.clone(), &config());

        let report = dispatcher.run(&DispatchEvent::Sweep).await;

        assert!(report.is_clean());
        assert_eq!(report.mode, DispatchMode::Sweep);
        assert_eq!(report.total_dispatched(), 3);
        let bodies = queue.bodies().await;
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].starts_with(r#"["a1","#));
        assert!(bodies[1].starts_with(r#"["a2","#));
        assert!(bodies[2].starts_with(r#"["b1","#));
    }

    #[tokio::test]
    async fn sweep_is_one_level_and_skips_marker() {
        let store = seeded_store(&[
            ("packs/", ""),
            ("packs/a.json", PACK_A),
            ("packs/archive/b.json", PACK_B),
        ])
        .await;
        let dispatcher = Dispatcher::new(store, Arc::new(MemoryQueue::new()), &config());

        let keys = dispatcher
            .discover(&DispatchEvent::Sweep)
            .await
            .expect("discover");
        assert_eq!(keys, vec!["packs/a.json"]);
    }

    #[tokio::test]
    async fn triggered_loads_only_notified_keys() {
        let store = seeded_store(&[("packs/a.json", PACK_A), ("packs/b.json", PACK_B)]).await;
        let queue = Arc::new(MemoryQueue::new());
        let dispatcher = Dispatcher::new(store, queue.clone(), &config());

        let report = dispatcher
            .run(&DispatchEvent::Triggered(vec!["packs/b.json".into()]))
            .await;

        assert_eq!(report.mode, DispatchMode::Triggered);
        assert_eq!(report.total_dispatched(), 1);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn bad_packs_are_skipped_without_affecting_others() {
        let store = seeded_store(&[
            ("packs/a.json", PACK_A),
            ("packs/broken.json", "{not json"),
            ("packs/noqueries.json", r#"{"other": 1}"#),
        ])
        .await;
        let queue = Arc::new(MemoryQueue::new());
        let dispatcher = Dispatcher::new(store, queue.clone(), &config());

        let report = dispatcher
            .run(&DispatchEvent::Triggered(vec![
                "packs/missing.json".into(),
                "packs/broken.json".into(),
                "packs/a.json".into(),
                "packs/noqueries.json".into(),
            ]))
            .await;

        assert_eq!(report.total_dispatched(), 2);
        assert_eq!(report.pack_failures.len(), 3);
        assert!(matches!(
            report.pack_failures[0].reason,
            PackFailureReason::Fetch(_)
        ));
        assert!(matches!(
            report.pack_failures[1].reason,
            PackFailureReason::Parse(_)
        ));
        assert_eq!(report.pack_failures[2].name, "packs/noqueries.json");
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn enqueue_failure_does_not_stop_the_pack() {
        let store = seeded_store(&[("packs/a.json", PACK_A), ("packs/b.json", PACK_B)]).await;
        let queue = Arc::new(FlakyQueue {
            inner: MemoryQueue::new(),
            reject: "\"a1\"",
        });
        let dispatcher = Dispatcher::new(store, queue.clone(), &config());

        let report = dispatcher.run(&DispatchEvent::Sweep).await;

        assert_eq!(report.enqueue_failures.len(), 1);
        assert_eq!(report.enqueue_failures[0].query_id, "a1");
        assert_eq!(report.packs[0].queries, 2);
        assert_eq!(report.packs[0].dispatched, 1);
        assert_eq!(report.total_dispatched(), 2);
        assert_eq!(queue.inner.len().await, 2);
    }

    #[tokio::test]
    async fn messages_use_the_fixed_group() {
        let store = seeded_store(&[("packs/b.json", PACK_B)]).await;
        let queue = Arc::new(MemoryQueue::new());
        let dispatcher = Dispatcher::new(store, queue.clone(), &config());
        dispatcher.run(&DispatchEvent::Sweep).await;

        let got = queue
            .receive(10, Duration::from_secs(1), Duration::ZERO)
            .await
            .expect("receive");
        assert_eq!(got[0].group_id, "PW3QueryGroup");
    }

    #[tokio::test]
    async fn empty_prefix_dispatches_nothing() {
        let dispatcher = Dispatcher::new(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryQueue::new()),
            &config(),
        );
        let report = dispatcher.run(&DispatchEvent::Sweep).await;
        assert!(report.packs.is_empty());
        assert!(report.is_clean());
    }
}
