// defense-orchestrator/src/lib.rs
// ============================================================================
// Module: Defense Orchestrator Library
// Description: Composition root assembling a runnable deliberation engine.
// Purpose: Wire a validated `defense-config::Wiring` together with caller-
//          supplied retrieval, model, clock, and persistence ports into an
//          `Orchestrator` ready to admit deliberations. Carries no HTTP
//          surface of its own; callers embed it (CLI, service, test) and
//          drive it directly.
// Dependencies: defense-core, defense-config, tokio, tracing
// ============================================================================

//! ## Overview
//! `defense-core` defines the orchestrator as generic collaborators behind
//! traits; `defense-config` turns a TOML document into validated registry,
//! graph, and plan data. This crate is the glue between the two: one
//! function, [`build_engine`], that takes a [`defense_config::Wiring`] plus
//! a concrete retrieval/model/clock/store/notifier/metrics set and returns
//! a ready-to-use [`Engine`].
//!
//! Concrete backends (SQLite stores, the JSON/HTTP retrieval providers, the
//! filesystem Defense File store) are not dependencies of this crate; they
//! are supplied by the caller, which is why `defense-providers` and
//! `defense-store-sqlite` appear only in `[dev-dependencies]` here, used by
//! this crate's own integration tests.

pub mod engine;

pub use engine::build_engine;
pub use engine::Engine;
pub use engine::EngineCollaborators;
