// defense-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Persistence
// Description: Durable DeliberationStateStore and UsageCounterStore backends.
// Purpose: Provide production-grade persistence for orchestrator run state
//          and per-tenant quota counters.
// Dependencies: defense-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides `SQLite`-backed implementations of
//! [`defense_core::DeliberationStateStore`] and
//! [`defense_core::UsageCounterStore`], each persisting canonical JSON
//! snapshots verified by stored hashes on load, following the same
//! write-then-verify discipline as a deterministic control-plane store.

pub mod state_store;
pub mod usage_store;

pub use state_store::SqliteDeliberationStateStore;
pub use state_store::SqliteStateStoreConfig;
pub use state_store::SqliteStateStoreError;
pub use usage_store::SqliteUsageCounterStore;
pub use usage_store::SqliteUsageStoreConfig;
pub use usage_store::SqliteUsageStoreError;
