mod account;
mod block;
mod snapshot;
mod vote;

pub use account::{Account, Stake};
pub use block::{BlockHeader, BlockStatus, ExtendedBlock, HighestCommittedCertificate};
pub use snapshot::{
    decode_height, encode_height, BlockTrio, SnapshotFirstBlock, SnapshotMetadata,
    SnapshotSecondBlock, SnapshotThirdBlock, SnapshotTrieRecord, ACCOUNT_KEY_PREFIX,
    BLOCK_TRIO_KEY_PREFIX, SV_END, SV_START,
};
pub use vote::{SignedVote, Vote, VoteSet};

pub type Address = String;

use crate::errors::{SnapshotError, SnapshotResult};

/// Decodes a hex digest string into a fixed 32-byte commitment.
pub fn decode_digest(value: &str) -> SnapshotResult<[u8; 32]> {
    let bytes = hex::decode(value)
        .map_err(|err| SnapshotError::Config(format!("invalid commitment encoding: {err}")))?;
    if bytes.len() != 32 {
        return Err(SnapshotError::Config(
            "commitment must encode exactly 32 bytes".into(),
        ));
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&bytes);
    Ok(digest)
}
