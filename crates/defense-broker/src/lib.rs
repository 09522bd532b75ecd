// defense-broker/src/lib.rs
// ============================================================================
// Module: Defense Broker Library
// Description: Concrete Notifier and ArtifactStore implementations.
// Purpose: Give a deployment a way to deliver status notifications and
//          persist uploaded artifacts without the core depending on any
//          specific delivery channel or object-storage backend.
// Dependencies: defense-core, reqwest, tokio, url
// ============================================================================

//! ## Overview
//! Mirrors the teacher's `decision-gate-broker` sink/source split: a
//! notification side ([`HttpNotifier`], [`LogNotifier`]) implementing
//! [`defense_core::Notifier`], an artifact side ([`FilesystemArtifactStore`])
//! implementing [`defense_core::ArtifactStore`], and a Defense File side
//! ([`FilesystemDefenseFileStore`]) implementing [`defense_core::DefenseFileStore`]
//! as one JSON document per project, per spec.md §6's `defense_file_root`
//! layout.

pub mod artifact_store;
pub mod defense_file_store;
pub mod notifier;

pub use artifact_store::FilesystemArtifactStore;
pub use artifact_store::FilesystemArtifactStoreConfig;
pub use defense_file_store::FilesystemDefenseFileStore;
pub use defense_file_store::FilesystemDefenseFileStoreConfig;
pub use notifier::HttpNotifier;
pub use notifier::HttpNotifierConfig;
pub use notifier::LogNotifier;
