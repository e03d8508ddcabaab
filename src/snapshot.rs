//! Snapshot bootstrap pipeline.
//!
//! Loads a serialized world state into a content-addressed state trie,
//! verifies the result against the quorum-certified trio chain carried in
//! the snapshot metadata, and persists the resume state. The first
//! failure aborts the pipeline; nothing is recovered internally.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::codec;
use crate::config::NetworkParams;
use crate::consensus::{select_top_stake_holders, ValidatorSet};
use crate::errors::{SnapshotError, SnapshotResult};
use crate::state::trie::{self, NodeHash, EMPTY_ROOT};
use crate::state::{StoreView, VALIDATOR_CANDIDATE_POOL_KEY};
use crate::storage::{Database, KvStore, RocksDb};
use crate::types::{
    decode_digest, decode_height, Account, BlockHeader, BlockStatus, ExtendedBlock,
    SnapshotFirstBlock, SnapshotMetadata, SnapshotTrieRecord, VoteSet, ACCOUNT_KEY_PREFIX,
    BLOCK_TRIO_KEY_PREFIX, SV_END, SV_START,
};

/// One open state-view scope. The pending account is the most recent
/// `ls/a/` leaf of this scope whose storage view has not been closed yet.
struct StackFrame {
    view: StoreView,
    pending_account: Option<Account>,
}

/// LIFO of open state-view builders; the record stream dictates nesting.
struct StoreViewStack {
    frames: Vec<StackFrame>,
}

impl StoreViewStack {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    fn push(&mut self, view: StoreView) {
        self.frames.push(StackFrame {
            view,
            pending_account: None,
        });
    }

    fn pop(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    fn peek_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    fn len(&self) -> usize {
        self.frames.len()
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Outermost state view of a fully consumed record stream, plus the root
/// it committed to.
pub(crate) struct LoadedState {
    pub view: StoreView,
    pub root: NodeHash,
}

/// Loads the snapshot at `path` into the caller's database and returns
/// the header of the block from which normal operation resumes.
pub fn load_snapshot(path: &Path, db: Arc<dyn Database>) -> SnapshotResult<BlockHeader> {
    load_snapshot_with_params(path, db, &NetworkParams::mainnet())
}

pub fn load_snapshot_with_params(
    path: &Path,
    db: Arc<dyn Database>,
    params: &NetworkParams,
) -> SnapshotResult<BlockHeader> {
    info!(path = %path.display(), "loading snapshot");
    let header = load_snapshot_inner(path, db, params)?;
    info!(height = header.height, "snapshot loaded");
    Ok(header)
}

/// Validates the snapshot at `path` against a throwaway temporary
/// database; the directory is removed on every exit path.
pub fn validate_snapshot(path: &Path) -> SnapshotResult<BlockHeader> {
    validate_snapshot_with_params(path, &NetworkParams::mainnet())
}

pub fn validate_snapshot_with_params(
    path: &Path,
    params: &NetworkParams,
) -> SnapshotResult<BlockHeader> {
    info!(path = %path.display(), "verifying snapshot");
    let tmpdir = tempfile::Builder::new()
        .prefix("meridian-snapshot-verify")
        .tempdir()?;
    let db: Arc<dyn Database> = Arc::new(RocksDb::open(&tmpdir.path().join("db"))?);
    let header = load_snapshot_inner(path, db, params)?;
    info!(height = header.height, "snapshot verified");
    Ok(header)
}

fn load_snapshot_inner(
    path: &Path,
    db: Arc<dyn Database>,
    params: &NetworkParams,
) -> SnapshotResult<BlockHeader> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let metadata: SnapshotMetadata = match codec::read_record(&mut reader) {
        Ok(Some(metadata)) => metadata,
        Ok(None) => return Err(SnapshotError::BadMetadata("empty snapshot file".into())),
        Err(err) => return Err(SnapshotError::BadMetadata(err.to_string())),
    };
    if metadata.block_trios.is_empty() {
        return Err(SnapshotError::BadMetadata(
            "snapshot metadata carries no block trios".into(),
        ));
    }
    info!(trios = metadata.block_trios.len(), "snapshot metadata loaded");

    let loaded = load_state(&mut reader, &db)?;
    info!(root = %hex::encode(loaded.root), "world state materialized");

    check_snapshot(&loaded, &metadata, &db, params)?;
    info!("trio chain validated");

    let store = KvStore::new(db);
    for (idx, trio) in metadata.block_trios.iter().enumerate() {
        if idx + 1 < metadata.block_trios.len() {
            let key = format!("{}{}", BLOCK_TRIO_KEY_PREFIX, trio.first.header.height);
            store.put(key.as_bytes(), trio)?;
        }
    }
    save_tail_blocks(&metadata, &loaded.view, &store, params)
}

/// Consumes trie records until end of stream, committing every closed
/// view into `db` and checking each account storage view against the
/// root its account leaf declared.
pub(crate) fn load_state<R: Read>(
    reader: &mut R,
    db: &Arc<dyn Database>,
) -> SnapshotResult<LoadedState> {
    let mut stack = StoreViewStack::new();
    let mut last_closed: Option<LoadedState> = None;
    let mut record_index: u64 = 0;

    while let Some(record) = codec::read_record::<_, SnapshotTrieRecord>(reader)? {
        record_index += 1;
        if record.key == [SV_START] {
            let height = decode_height(&record.value)?;
            stack.push(StoreView::new(height, EMPTY_ROOT, db.clone()));
        } else if record.key == [SV_END] {
            let height = decode_height(&record.value)?;
            let mut frame = stack.pop().ok_or(SnapshotError::UnmatchedEnd {
                record: record_index,
            })?;
            if frame.view.height() != height {
                return Err(SnapshotError::HeightMismatch {
                    record: record_index,
                    expected: frame.view.height(),
                    found: height,
                });
            }
            let root = frame.view.save()?;
            if let Some(parent) = stack.peek_mut() {
                if parent.view.height() == height {
                    // A nested view at the enclosing height is the storage
                    // view of the account leaf that preceded it.
                    let account = parent.pending_account.take().ok_or_else(|| {
                        SnapshotError::StorageRootMismatch {
                            record: record_index,
                            height,
                            reason: "storage scope closed without a preceding account leaf".into(),
                        }
                    })?;
                    let declared = decode_digest(&account.storage_root)?;
                    if declared != root {
                        return Err(SnapshotError::StorageRootMismatch {
                            record: record_index,
                            height,
                            reason: format!(
                                "account {} declares root {} but storage hashed to {}",
                                account.address,
                                account.storage_root,
                                hex::encode(root)
                            ),
                        });
                    }
                }
            }
            last_closed = Some(LoadedState {
                view: frame.view,
                root,
            });
        } else {
            let frame = stack.peek_mut().ok_or(SnapshotError::LeafOutsideView {
                record: record_index,
            })?;
            if record.key.starts_with(ACCOUNT_KEY_PREFIX) {
                let account: Account = bincode::deserialize(&record.value).map_err(|err| {
                    SnapshotError::AccountDecodeFailed {
                        record: record_index,
                        reason: err.to_string(),
                    }
                })?;
                frame.pending_account = Some(account);
            }
            frame.view.set(record.key, record.value)?;
        }
    }

    if !stack.is_empty() {
        return Err(SnapshotError::UnclosedView { open: stack.len() });
    }
    last_closed.ok_or_else(|| {
        SnapshotError::BadMetadata("snapshot stream contained no state views".into())
    })
}

/// Validates the trio chain: genesis anchor, parent and HCC links, vote
/// quorums, validator rotation via candidate-pool proofs, and the final
/// proven-versus-recorded set comparison.
fn check_snapshot(
    loaded: &LoadedState,
    metadata: &SnapshotMetadata,
    db: &Arc<dyn Database>,
    params: &NetworkParams,
) -> SnapshotResult<()> {
    let last_idx = metadata.block_trios.len() - 1;
    let tail = &metadata.block_trios[last_idx];

    let declared = decode_digest(&tail.second.header.state_hash)?;
    if declared != loaded.root {
        return Err(SnapshotError::StateHashMismatch {
            computed: hex::encode(loaded.root),
            declared: tail.second.header.state_hash.clone(),
        });
    }

    let mut proven_set =
        validate_genesis_block(&metadata.block_trios[0].second.header, db, params)?;
    for (idx, trio) in metadata.block_trios.iter().enumerate().skip(1) {
        let first = &trio.first.header;
        let second = &trio.second.header;
        let third = &trio.third.header;
        if second.parent != first.hash_hex() || third.parent != second.hash_hex() {
            return Err(SnapshotError::BadParentLink { trio: idx });
        }
        if second.hcc.block_hash != first.hash_hex() || third.hcc.block_hash != second.hash_hex() {
            return Err(SnapshotError::BadHccLink { trio: idx });
        }
        // The third header carries the votes that finalized the second
        // block, checked against the set proven for the previous epoch.
        validate_votes(&proven_set, second, &third.hcc.votes, idx)?;
        proven_set = validator_set_from_proof(&trio.first, idx)?;
    }

    validate_votes(&proven_set, &tail.third.header, &tail.third.vote_set, last_idx)?;

    let retrieved = loaded
        .view
        .validator_candidate_pool()?
        .map(|pool| select_top_stake_holders(&pool))
        .ok_or(SnapshotError::FinalValidatorSetMismatch)?;
    if proven_set != retrieved {
        return Err(SnapshotError::FinalValidatorSetMismatch);
    }
    Ok(())
}

/// The genesis anchor is compiled in; once the header matches it, the
/// genesis state trie is trusted and yields the first validator set.
fn validate_genesis_block(
    header: &BlockHeader,
    db: &Arc<dyn Database>,
    params: &NetworkParams,
) -> SnapshotResult<ValidatorSet> {
    if header.height != params.genesis_height {
        return Err(SnapshotError::BadGenesis(format!(
            "unexpected genesis height {}",
            header.height
        )));
    }
    if header.hash_hex() != params.genesis_hash {
        return Err(SnapshotError::BadGenesis(format!(
            "genesis block hash mismatch, calculated {}",
            header.hash_hex()
        )));
    }
    let root = decode_digest(&header.state_hash)?;
    let view = StoreView::open(header.height, root, db.clone());
    let pool = view.validator_candidate_pool()?.ok_or_else(|| {
        SnapshotError::BadGenesis("genesis state has no validator candidate pool".into())
    })?;
    Ok(select_top_stake_holders(&pool))
}

/// Proves the candidate pool slot of the first block's state root and
/// elects the next validator set from it.
fn validator_set_from_proof(
    first: &SnapshotFirstBlock,
    trio: usize,
) -> SnapshotResult<ValidatorSet> {
    let root = decode_digest(&first.header.state_hash)?;
    let raw = trie::verify_proof(&root, VALIDATOR_CANDIDATE_POOL_KEY, &first.proof).map_err(
        |err| SnapshotError::VcpProofFailed {
            trio,
            reason: err.to_string(),
        },
    )?;
    let pool = bincode::deserialize(&raw).map_err(|err| SnapshotError::VcpProofFailed {
        trio,
        reason: err.to_string(),
    })?;
    Ok(select_top_stake_holders(&pool))
}

fn validate_votes(
    validator_set: &ValidatorSet,
    block: &BlockHeader,
    votes: &VoteSet,
    trio: usize,
) -> SnapshotResult<()> {
    if !validator_set.has_majority(votes) {
        return Err(SnapshotError::InvalidVotes {
            trio,
            reason: "votes fall short of the two-thirds stake quorum".into(),
        });
    }
    let block_hash = block.hash_hex();
    for signed in votes.votes() {
        signed
            .verify()
            .map_err(|err| SnapshotError::InvalidVotes {
                trio,
                reason: err.to_string(),
            })?;
        if signed.vote.block_hash != block_hash {
            return Err(SnapshotError::InvalidVotes {
                trio,
                reason: format!("vote by {} is not for the finalized block", signed.vote.voter),
            });
        }
        if validator_set.validator(&signed.vote.voter).is_none() {
            return Err(SnapshotError::InvalidVotes {
                trio,
                reason: format!("voter {} is not in the proven validator set", signed.vote.voter),
            });
        }
    }
    Ok(())
}

/// Persists the two most recent finalized blocks so consensus can resume,
/// and returns the resume header.
fn save_tail_blocks(
    metadata: &SnapshotMetadata,
    view: &StoreView,
    store: &KvStore,
    params: &NetworkParams,
) -> SnapshotResult<BlockHeader> {
    let tail = &metadata.block_trios[metadata.block_trios.len() - 1];
    let stake_heights = view.stake_height_list()?;
    let second = &tail.second.header;

    if second.height != params.genesis_height {
        let first = &tail.first.header;
        let first_ext = ExtendedBlock {
            header: first.clone(),
            status: BlockStatus::DirectlyFinalized,
            children: vec![second.hash_hex()],
            has_validator_update: stake_heights.contains(first.height),
        };
        store.put(&first.hash(), &first_ext)?;
    }

    let second_ext = ExtendedBlock {
        header: second.clone(),
        status: BlockStatus::DirectlyFinalized,
        children: Vec::new(),
        has_validator_update: stake_heights.contains(second.height),
    };
    if second_ext.has_validator_update {
        warn!(
            height = second.height,
            "tail block carries a validator set update; the resuming node must re-derive its validator set"
        );
    }
    store.put(&second.hash(), &second_ext)?;

    Ok(second.clone())
}
