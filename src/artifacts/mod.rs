//! Immutable strategy-artifact lifecycle (C4, §4.4).

pub mod canonical;
pub mod state_machine;
pub mod store;

pub use canonical::{canonical_json, compute_hash, verify};
pub use store::ArtifactStore;
