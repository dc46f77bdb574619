//! Shared test doubles and utilities for the account ledger.

mod clock;
mod repository;

pub use clock::{FixedClock, fixed_now};
pub use repository::{
    AppendedBatch, ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    RecordingEventRepository,
};
