// defense-providers/src/lib.rs
// ============================================================================
// Module: Defense Providers Library
// Description: Concrete RetrievalPort and ModelPort implementations.
// Purpose: Give a deployment a way to answer evidence queries and run model
//          calls without the core depending on any specific backend.
// Dependencies: defense-core, async-trait, jsonpath_lib, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Two [`defense_core::RetrievalPort`] implementations, each scoped so a
//! query can never return evidence belonging to a company other than
//! `query.company_id`:
//!
//! - [`JsonRetrievalProvider`] reads evidence documents from a local,
//!   tenant-partitioned directory tree.
//! - [`HttpRetrievalProvider`] forwards the query to an external retrieval
//!   backend over HTTP.
//!
//! [`CompositeRetrievalProvider`] tries a primary port and falls back to a
//! secondary one when the primary reports degradation.
//!
//! [`model`] holds the workspace's only [`defense_core::ModelPort`]
//! implementations: [`ScriptedModelPort`] for deterministic tests and demos,
//! and [`HttpModelPort`], a thin stub for an HTTP-backed model backend. A
//! full LLM integration is out of scope; these exist so the orchestrator
//! and CLI have something runnable to compose against.

pub mod composite;
pub mod http;
pub mod json;
pub mod model;

pub use composite::CompositeRetrievalProvider;
pub use http::HttpRetrievalProvider;
pub use http::HttpRetrievalProviderConfig;
pub use json::JsonRetrievalProvider;
pub use json::JsonRetrievalProviderConfig;
pub use model::HttpModelPort;
pub use model::HttpModelPortConfig;
pub use model::ScriptedModelPort;
