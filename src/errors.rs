use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("invalid snapshot metadata: {0}")]
    BadMetadata(String),
    #[error("record {record}: scope end without an open state view")]
    UnmatchedEnd { record: u64 },
    #[error("record {record}: leaf outside of any open state view")]
    LeafOutsideView { record: u64 },
    #[error("record {record}: scope closed at height {found} but innermost view opened at {expected}")]
    HeightMismatch {
        record: u64,
        expected: u64,
        found: u64,
    },
    #[error("end of stream with {open} state view(s) still open")]
    UnclosedView { open: usize },
    #[error("record {record}: failed to decode account leaf: {reason}")]
    AccountDecodeFailed { record: u64, reason: String },
    #[error("record {record}: account storage root mismatch at height {height}: {reason}")]
    StorageRootMismatch {
        record: u64,
        height: u64,
        reason: String,
    },
    #[error("state hash mismatch: loaded state hashed to {computed} but tail header declares {declared}")]
    StateHashMismatch { computed: String, declared: String },
    #[error("invalid genesis block: {0}")]
    BadGenesis(String),
    #[error("trio {trio}: invalid parent link")]
    BadParentLink { trio: usize },
    #[error("trio {trio}: invalid highest-committed-certificate link")]
    BadHccLink { trio: usize },
    #[error("trio {trio}: invalid votes: {reason}")]
    InvalidVotes { trio: usize, reason: String },
    #[error("trio {trio}: validator candidate pool proof failed: {reason}")]
    VcpProofFailed { trio: usize, reason: String },
    #[error("proven validator set does not match the validator set recorded in the loaded state")]
    FinalValidatorSetMismatch,
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
