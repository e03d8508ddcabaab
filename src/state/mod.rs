pub mod trie;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::consensus::ValidatorCandidatePool;
use crate::errors::{SnapshotError, SnapshotResult};
use crate::storage::Database;

use trie::{MerkleProof, NodeHash, EMPTY_ROOT};

/// World-state key of the validator candidate pool.
pub const VALIDATOR_CANDIDATE_POOL_KEY: &[u8] = b"ls/vcp";
/// World-state key of the stake transaction height list.
pub const STAKE_HEIGHT_LIST_KEY: &[u8] = b"ls/shl";

/// Heights at which stake transactions changed the candidate pool.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StakeHeightList {
    pub heights: Vec<u64>,
}

impl StakeHeightList {
    pub fn contains(&self, height: u64) -> bool {
        self.heights.contains(&height)
    }
}

/// Mutable builder for a state trie at a given height, backed by a
/// key/value database. `save` finalizes the trie, persists its nodes and
/// seals the view; a sealed view serves reads from the committed root.
pub struct StoreView {
    height: u64,
    root: NodeHash,
    db: Arc<dyn Database>,
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
    sealed: bool,
}

impl StoreView {
    /// Fresh builder. `root` is the prior state root, [`trie::EMPTY_ROOT`]
    /// when there is none; prior leaves are carried into the next commit.
    pub fn new(height: u64, root: NodeHash, db: Arc<dyn Database>) -> Self {
        Self {
            height,
            root,
            db,
            pending: BTreeMap::new(),
            sealed: false,
        }
    }

    /// Read-only view over an already committed root.
    pub fn open(height: u64, root: NodeHash, db: Arc<dyn Database>) -> Self {
        Self {
            height,
            root,
            db,
            pending: BTreeMap::new(),
            sealed: true,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn root(&self) -> NodeHash {
        self.root
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> SnapshotResult<()> {
        if self.sealed {
            return Err(SnapshotError::Config(
                "store view is sealed and can no longer be mutated".into(),
            ));
        }
        self.pending.insert(key, value);
        Ok(())
    }

    /// Finalizes the trie, writes its nodes into the backing database and
    /// returns the resulting root. The view is sealed afterwards.
    pub fn save(&mut self) -> SnapshotResult<NodeHash> {
        if self.sealed {
            return Err(SnapshotError::Config("store view is already sealed".into()));
        }
        let mut leaves = if self.root == EMPTY_ROOT {
            BTreeMap::new()
        } else {
            trie::collect_leaves(self.db.as_ref(), &self.root)?
        };
        leaves.append(&mut self.pending);
        let root = trie::commit(self.db.as_ref(), &leaves)?;
        self.root = root;
        self.sealed = true;
        Ok(root)
    }

    pub fn get(&self, key: &[u8]) -> SnapshotResult<Option<Vec<u8>>> {
        if !self.sealed {
            if let Some(value) = self.pending.get(key) {
                return Ok(Some(value.clone()));
            }
        }
        trie::get(self.db.as_ref(), &self.root, key)
    }

    /// Membership proof for `key` in the committed trie.
    pub fn prove(&self, key: &[u8]) -> SnapshotResult<MerkleProof> {
        trie::prove(self.db.as_ref(), &self.root, key)
    }

    pub fn validator_candidate_pool(&self) -> SnapshotResult<Option<ValidatorCandidatePool>> {
        match self.get(VALIDATOR_CANDIDATE_POOL_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stake height list recorded in this state; absent key means no
    /// stake transaction ever landed.
    pub fn stake_height_list(&self) -> SnapshotResult<StakeHeightList> {
        match self.get(STAKE_HEIGHT_LIST_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(StakeHeightList::default()),
        }
    }
}
