//! Event repository abstraction.
//!
//! The repository is the only component that owns event history. Callers
//! hand it fully formed events and get owned copies back; nothing outside an
//! implementation ever holds a mutable reference into the log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// 1-based position within the aggregate stream.
    pub version: i64,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Repository trait for appending and reading domain events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append new events to an aggregate stream with optimistic concurrency.
    ///
    /// `expected_version` is the stream length the caller last read (0 for a
    /// stream with no events). The batch is appended atomically and in order,
    /// or not at all. Event contents, including their `version` fields, are
    /// taken as given.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if the stream length no
    /// longer equals `expected_version`.
    async fn append(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError>;

    /// Load all events for a given aggregate in append order. An unknown
    /// aggregate yields an empty vector.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the backend cannot be read.
    async fn read(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError>;

    /// Load the events of every aggregate, sorted by `occurred_at` ascending.
    /// Events with equal timestamps keep their relative append order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the backend cannot be read.
    async fn read_all(&self) -> Result<Vec<StoredEvent>, DomainError>;
}
