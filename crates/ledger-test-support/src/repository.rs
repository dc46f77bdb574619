//! Test repositories: mock `EventRepository` implementations for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use ledger_core::error::DomainError;
use ledger_core::repository::{EventRepository, StoredEvent};
use tracing::debug;

/// An appended batch as seen by `RecordingEventRepository`:
/// aggregate ID, expected version, events.
pub type AppendedBatch = (String, i64, Vec<StoredEvent>);

/// An event repository that records all `append` calls. Returns the
/// configured events from every `read` and `read_all` call and always
/// succeeds on `append`. Appends are not visible to later reads.
#[derive(Debug)]
pub struct RecordingEventRepository {
    read_result: Vec<StoredEvent>,
    appended: Mutex<Vec<AppendedBatch>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that will return `read_result`
    /// from every read.
    #[must_use]
    pub fn new(read_result: Vec<StoredEvent>) -> Self {
        Self {
            read_result,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all batches that were appended.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<AppendedBatch> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn append(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended.lock().unwrap().push((
            aggregate_id.to_owned(),
            expected_version,
            events.to_vec(),
        ));
        Ok(())
    }

    async fn read(&self, _aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.read_result.clone())
    }

    async fn read_all(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.read_result.clone())
    }
}

/// An event repository that always returns an empty event list and silently
/// accepts appends. Useful for testing "aggregate not found" scenarios and
/// creation commands.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn append(
        &self,
        _aggregate_id: &str,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn read(&self, _aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn read_all(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn append(
        &self,
        _aggregate_id: &str,
        _expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn read(&self, _aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn read_all(&self) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Wraps another repository and rejects its first `conflicts` appends with a
/// `ConcurrencyConflict`, as if another writer had won each race. Reads and
/// later appends go straight to the inner repository.
#[derive(Debug)]
pub struct ConflictingEventRepository<R> {
    inner: R,
    remaining_conflicts: AtomicU32,
    append_calls: AtomicU32,
}

impl<R: EventRepository> ConflictingEventRepository<R> {
    /// Create a repository that loses the next `conflicts` appends.
    #[must_use]
    pub fn new(inner: R, conflicts: u32) -> Self {
        Self {
            inner,
            remaining_conflicts: AtomicU32::new(conflicts),
            append_calls: AtomicU32::new(0),
        }
    }

    /// Number of `append` calls seen so far, rejected ones included.
    pub fn append_calls(&self) -> u32 {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: EventRepository> EventRepository for ConflictingEventRepository<R> {
    async fn append(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            debug!(aggregate_id, expected_version, "injecting concurrency conflict");
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.to_owned(),
                expected: expected_version,
                actual: expected_version + 1,
            });
        }
        self.inner.append(aggregate_id, expected_version, events).await
    }

    async fn read(&self, aggregate_id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.read(aggregate_id).await
    }

    async fn read_all(&self) -> Result<Vec<StoredEvent>, DomainError> {
        self.inner.read_all().await
    }
}
