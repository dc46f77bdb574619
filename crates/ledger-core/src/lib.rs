//! Ledger Core: shared event-sourcing abstractions.
//!
//! This crate defines the contract between the event log store and
//! everything that reads from or writes to it: the stored event record,
//! the three-operation repository trait, the aggregate trait, and the
//! error taxonomy. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod repository;
