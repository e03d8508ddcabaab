use serde::{Deserialize, Serialize};

use crate::crypto::domain_hash;

use super::{Address, VoteSet};

const HEADER_HASH_DOMAIN: &[u8] = b"meridian-block-header";

/// Certificate naming the prior block this header extends by quorum,
/// along with the votes that formed the quorum.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighestCommittedCertificate {
    pub block_hash: String,
    pub votes: VoteSet,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub epoch: u64,
    pub height: u64,
    pub parent: String,
    pub hcc: HighestCommittedCertificate,
    pub tx_root: String,
    pub state_hash: String,
    pub timestamp: u64,
    pub proposer: Address,
}

impl BlockHeader {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("serializing block header")
    }

    pub fn hash(&self) -> [u8; 32] {
        domain_hash(HEADER_HASH_DOMAIN, &self.canonical_bytes())
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }
}

/// Finalization state of a persisted block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockStatus {
    Pending,
    DirectlyFinalized,
    IndirectlyFinalized,
}

/// Block record persisted for the chain tail so the node can resume
/// consensus without replaying history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedBlock {
    pub header: BlockHeader,
    pub status: BlockStatus,
    pub children: Vec<String>,
    pub has_validator_update: bool,
}
