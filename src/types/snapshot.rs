use serde::{Deserialize, Serialize};

use crate::errors::{SnapshotError, SnapshotResult};
use crate::state::trie::MerkleProof;

use super::{BlockHeader, VoteSet};

/// Control key opening a state view; the record value carries the view
/// height as a big-endian `u64`.
pub const SV_START: u8 = 0xF8;
/// Control key closing the innermost open state view.
pub const SV_END: u8 = 0xF9;

/// World-state keys with this prefix decode to [`super::Account`] records.
pub const ACCOUNT_KEY_PREFIX: &[u8] = b"ls/a/";

/// Database key prefix for persisted non-tail block trios.
pub const BLOCK_TRIO_KEY_PREFIX: &str = "btrio/";

/// First record of every snapshot file: the ordered trio chain that
/// proves the loaded state back to genesis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub block_trios: Vec<BlockTrio>,
}

/// Three consecutive finalized blocks; the atom of validator-set
/// evolution. `third` finalizes `second` by the quorum votes carried in
/// its highest-committed certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTrio {
    pub first: SnapshotFirstBlock,
    pub second: SnapshotSecondBlock,
    pub third: SnapshotThirdBlock,
}

/// First block of a trio, carrying a Merkle proof for the validator
/// candidate pool slot of its state root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFirstBlock {
    pub header: BlockHeader,
    pub proof: MerkleProof,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSecondBlock {
    pub header: BlockHeader,
}

/// Third block of a trio, additionally carrying its own vote set so the
/// tail of the chain is itself quorum-certified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotThirdBlock {
    pub header: BlockHeader,
    pub vote_set: VoteSet,
}

/// A single state record: either a control marker or a key/value leaf of
/// the innermost open view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTrieRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

pub fn encode_height(height: u64) -> Vec<u8> {
    height.to_be_bytes().to_vec()
}

pub fn decode_height(bytes: &[u8]) -> SnapshotResult<u64> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
        SnapshotError::Config("control record height must encode exactly 8 bytes".into())
    })?;
    Ok(u64::from_be_bytes(bytes))
}
