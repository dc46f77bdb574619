//! In-memory implementation of the `EventRepository` trait.
//!
//! All state lives behind one `RwLock` per repository instance. The version
//! check and the mutation of an append run under the same write guard, so two
//! appends racing on the same expected version can never both succeed, and
//! readers never observe half of a batch.

use std::collections::HashMap;

use async_trait::async_trait;
use ledger_core::error::DomainError;
use ledger_core::repository::{EventRepository, StoredEvent};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct EventLog {
    streams: HashMap<String, Vec<StoredEvent>>,
    // Every event in global append order; `read_all` sorts a copy of this.
    appended: Vec<StoredEvent>,
}

/// Event repository that keeps every stream in process memory.
///
/// Instances are fully independent of each other. Nothing survives a
/// process restart.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    log: RwLock<EventLog>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current length of an aggregate's stream.
    pub async fn stream_version(&self, aggregate_id: &str) -> i64 {
        let log = self.log.read().await;
        stream_len(&log, aggregate_id)
    }
}

#[allow(clippy::cast_possible_wrap)]
fn stream_len(log: &EventLog, aggregate_id: &str) -> i64 {
    log.streams.get(aggregate_id).map_or(0, Vec::len) as i64
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn append(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let mut log = self.log.write().await;

        let actual = stream_len(&log, aggregate_id);
        if actual != expected_version {
            warn!(
                aggregate_id,
                expected = expected_version,
                actual,
                "rejected append: concurrency conflict"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.to_owned(),
                expected: expected_version,
                actual,
            });
        }

        if events.is_empty() {
            return Ok(());
        }

        log.streams
            .entry(aggregate_id.to_owned())
            .or_default()
            .extend_from_slice(events);
        log.appended.extend_from_slice(events);

        debug!(
            aggregate_id,
            appended = events.len(),
            version = stream_len(&log, aggregate_id),
            "appended events"
        );
        Ok(())
    }

    async fn read(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        let log = self.log.read().await;
        Ok(log.streams.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn read_all(&self) -> Result<Vec<StoredEvent>, DomainError> {
        let mut events = self.log.read().await.appended.clone();
        // `sort_by_key` is stable, so equal timestamps keep append order.
        events.sort_by_key(|event| event.occurred_at);
        Ok(events)
    }
}
