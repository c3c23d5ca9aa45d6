//! Persistence engine for the wash recipe aggregate.
//!
//! A recipe spans a header and three child collections (step entries,
//! their chemical dosages, process entries) plus a reference held by the
//! owning order. None of these writes share a transaction, so:
//!
//! 1. Creation runs as a saga. Every id is recorded in a
//!    [`CreationLedger`] before it is written, and any failure, including
//!    an expired deadline, deletes what the ledger holds before the error
//!    is returned.
//! 2. Update reconciles persisted children against the submission by set
//!    difference, keeping the identity of unchanged rows.
//! 3. Delete cascades child-first and is safe to retry.

mod cascade;
pub mod config;
mod creation;
pub mod engine;
pub mod ledger;
mod reconcile;

pub use config::{DEFAULT_DEADLINE, EngineConfig};
pub use engine::WashRecipeEngine;
pub use ledger::CreationLedger;
