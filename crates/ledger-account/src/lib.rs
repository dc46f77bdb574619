//! Ledger: Account bounded context.
//!
//! Responsible for folding an account's event history into its current
//! state, deciding the outcome of withdrawals, and the command and query
//! handlers that drive the event store.

pub mod application;
pub mod domain;
