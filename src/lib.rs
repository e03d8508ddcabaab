//! Snapshot bootstrap core for the Meridian proof-of-stake network.
//!
//! A snapshot is a self-contained file that lets a fresh node reach a
//! recent finalized height without replaying history. This crate
//! materializes the serialized world state into a content-addressed state
//! trie ([`state`]), cryptographically verifies the result against a
//! chain of finalized block trios anchored at genesis ([`snapshot`]), and
//! persists the tail blocks the node resumes from. The key/value backend
//! lives behind the [`storage::Database`] trait, validator election in
//! [`consensus`], and the wire/persisted types in [`types`].
//!
//! Applications typically call [`snapshot::load_snapshot`] to populate
//! their own database, or [`snapshot::validate_snapshot`] to check a file
//! against a disposable one.

pub mod codec;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod errors;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod types;

pub use errors::{SnapshotError, SnapshotResult};
pub use snapshot::{
    load_snapshot, load_snapshot_with_params, validate_snapshot, validate_snapshot_with_params,
};
