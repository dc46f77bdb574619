//! Ledger Event Store: the append-only event log.
//!
//! Provides [`InMemoryEventRepository`], the process-local implementation of
//! the `EventRepository` contract from `ledger-core`.

pub mod in_memory_event_repository;

pub use in_memory_event_repository::InMemoryEventRepository;
