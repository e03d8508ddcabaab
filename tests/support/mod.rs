//! Fixture builder for snapshot integration tests: constructs fully
//! verifiable snapshot files (states, headers, votes, proofs) around a
//! test network anchored at its own genesis.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ed25519_dalek::Keypair;

use meridian_chain::codec;
use meridian_chain::config::NetworkParams;
use meridian_chain::consensus::{StakeHolder, ValidatorCandidatePool};
use meridian_chain::crypto::{
    address_from_public_key, generate_keypair, sign_message, signature_to_hex,
};
use meridian_chain::state::trie::{MerkleProof, EMPTY_ROOT};
use meridian_chain::state::{
    StakeHeightList, StoreView, STAKE_HEIGHT_LIST_KEY, VALIDATOR_CANDIDATE_POOL_KEY,
};
use meridian_chain::storage::{Database, MemoryDb};
use meridian_chain::types::{
    encode_height, Account, BlockHeader, BlockTrio, HighestCommittedCertificate, SignedVote,
    SnapshotFirstBlock, SnapshotMetadata, SnapshotSecondBlock, SnapshotThirdBlock,
    SnapshotTrieRecord, Vote, VoteSet, ACCOUNT_KEY_PREFIX, SV_END, SV_START,
};

pub const CHAIN_ID: &str = "meridian-test";

pub struct TestValidator {
    pub keypair: Keypair,
    pub address: String,
    pub stake: u128,
}

pub fn make_validators(stakes: &[u128]) -> Vec<TestValidator> {
    stakes
        .iter()
        .map(|stake| {
            let keypair = generate_keypair();
            let address = address_from_public_key(&keypair.public);
            TestValidator {
                keypair,
                address,
                stake: *stake,
            }
        })
        .collect()
}

pub fn candidate_pool(validators: &[TestValidator]) -> ValidatorCandidatePool {
    ValidatorCandidatePool {
        candidates: validators
            .iter()
            .map(|validator| StakeHolder {
                address: validator.address.clone(),
                public_key: hex::encode(validator.keypair.public.to_bytes()),
                stake: meridian_chain::types::Stake::from_u128(validator.stake),
            })
            .collect(),
    }
}

/// Votes by every given validator finalizing `header`.
pub fn finality_votes<'a, I>(validators: I, header: &BlockHeader) -> VoteSet
where
    I: IntoIterator<Item = &'a TestValidator>,
{
    let block_hash = header.hash_hex();
    VoteSet::new(
        validators
            .into_iter()
            .map(|validator| {
                let vote = Vote {
                    block_hash: block_hash.clone(),
                    height: header.height,
                    epoch: header.epoch,
                    voter: validator.address.clone(),
                };
                let signature = sign_message(&validator.keypair, &vote.message_bytes());
                SignedVote {
                    vote,
                    public_key: hex::encode(validator.keypair.public.to_bytes()),
                    signature: signature_to_hex(&signature),
                }
            })
            .collect(),
    )
}

pub fn make_header(height: u64, parent: String, hcc_block_hash: String, state_hash: String) -> BlockHeader {
    BlockHeader {
        chain_id: CHAIN_ID.to_string(),
        epoch: height,
        height,
        parent,
        hcc: HighestCommittedCertificate {
            block_hash: hcc_block_hash,
            votes: VoteSet::default(),
        },
        tx_root: hex::encode([0u8; 32]),
        state_hash,
        timestamp: 1_700_000_000 + height,
        proposer: "proposer".to_string(),
    }
}

/// One record of the state stream, in file order.
#[derive(Clone)]
pub enum Event {
    Start(u64),
    End(u64),
    Leaf(Vec<u8>, Vec<u8>),
}

impl Event {
    fn record(&self) -> SnapshotTrieRecord {
        match self {
            Event::Start(height) => SnapshotTrieRecord {
                key: vec![SV_START],
                value: encode_height(*height),
            },
            Event::End(height) => SnapshotTrieRecord {
                key: vec![SV_END],
                value: encode_height(*height),
            },
            Event::Leaf(key, value) => SnapshotTrieRecord {
                key: key.clone(),
                value: value.clone(),
            },
        }
    }
}

pub fn account_key(address: &str) -> Vec<u8> {
    [ACCOUNT_KEY_PREFIX, address.as_bytes()].concat()
}

pub fn write_snapshot(path: &Path, metadata: &SnapshotMetadata, events: &[Event]) {
    let mut buffer = Vec::new();
    codec::write_record(&mut buffer, metadata).expect("encode metadata");
    for event in events {
        codec::write_record(&mut buffer, &event.record()).expect("encode record");
    }
    fs::write(path, buffer).expect("write snapshot file");
}

/// Commits `leaves` on a scratch database and returns the root together
/// with the database, so proofs can be generated against it.
fn committed_state(height: u64, leaves: &[(Vec<u8>, Vec<u8>)]) -> ([u8; 32], Arc<dyn Database>) {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let mut view = StoreView::new(height, EMPTY_ROOT, db.clone());
    for (key, value) in leaves {
        view.set(key.clone(), value.clone()).expect("set leaf");
    }
    let root = view.save().expect("save scratch view");
    (root, db)
}

/// A complete, loadable snapshot plus the network it is anchored to.
pub struct SnapshotFixture {
    pub metadata: SnapshotMetadata,
    pub events: Vec<Event>,
    pub params: NetworkParams,
    pub validators: Vec<TestValidator>,
}

impl SnapshotFixture {
    pub fn write(&self, path: &Path) {
        write_snapshot(path, &self.metadata, &self.events);
    }

    pub fn tail_second_header(&self) -> &BlockHeader {
        &self.metadata.block_trios[self.metadata.block_trios.len() - 1]
            .second
            .header
    }
}

/// Minimal snapshot: a single trio anchored at, and finalizing, genesis.
pub fn genesis_only_fixture() -> SnapshotFixture {
    let validators = make_validators(&[1_000, 1_000, 1_000]);
    let pool = candidate_pool(&validators);

    let genesis_leaves = vec![
        (
            VALIDATOR_CANDIDATE_POOL_KEY.to_vec(),
            bincode::serialize(&pool).expect("encode pool"),
        ),
        (
            STAKE_HEIGHT_LIST_KEY.to_vec(),
            bincode::serialize(&StakeHeightList::default()).expect("encode heights"),
        ),
        (
            account_key(&validators[0].address),
            bincode::serialize(&Account::new(
                validators[0].address.clone(),
                500,
                hex::encode(EMPTY_ROOT),
            ))
            .expect("encode account"),
        ),
    ];
    let (genesis_root, _) = committed_state(0, &genesis_leaves);

    let genesis = make_header(
        0,
        hex::encode([0u8; 32]),
        hex::encode([0u8; 32]),
        hex::encode(genesis_root),
    );
    let vote_set = finality_votes(&validators, &genesis);

    let metadata = SnapshotMetadata {
        block_trios: vec![BlockTrio {
            first: SnapshotFirstBlock {
                header: genesis.clone(),
                proof: MerkleProof::default(),
            },
            second: SnapshotSecondBlock {
                header: genesis.clone(),
            },
            third: SnapshotThirdBlock {
                header: genesis.clone(),
                vote_set,
            },
        }],
    };

    let params = NetworkParams {
        chain_id: CHAIN_ID.to_string(),
        genesis_height: 0,
        genesis_hash: genesis.hash_hex(),
    };

    let mut events = vec![Event::Start(0)];
    events.extend(
        genesis_leaves
            .into_iter()
            .map(|(key, value)| Event::Leaf(key, value)),
    );
    events.push(Event::End(0));

    SnapshotFixture {
        metadata,
        events,
        params,
        validators,
    }
}

/// Two-trio snapshot exercising a validator rotation: genesis elects
/// {v0, v1, v2}; the tail trio's first block proves a pool electing
/// {v0, v1, v3}. The tail world state carries an account with a nested
/// storage view and records a stake transaction at the first block's
/// height.
pub fn two_trio_fixture() -> SnapshotFixture {
    let validators = make_validators(&[1_000, 1_000, 1_000, 1_000]);
    let genesis_set = &validators[..3];
    let rotated_set = [&validators[0], &validators[1], &validators[3]];

    let genesis_pool = candidate_pool(genesis_set);
    let rotated_pool = ValidatorCandidatePool {
        candidates: rotated_set
            .iter()
            .map(|validator| StakeHolder {
                address: validator.address.clone(),
                public_key: hex::encode(validator.keypair.public.to_bytes()),
                stake: meridian_chain::types::Stake::from_u128(validator.stake),
            })
            .collect(),
    };

    // Genesis state and header.
    let genesis_leaves = vec![
        (
            VALIDATOR_CANDIDATE_POOL_KEY.to_vec(),
            bincode::serialize(&genesis_pool).expect("encode pool"),
        ),
        (
            STAKE_HEIGHT_LIST_KEY.to_vec(),
            bincode::serialize(&StakeHeightList::default()).expect("encode heights"),
        ),
    ];
    let (genesis_root, _) = committed_state(0, &genesis_leaves);
    let genesis = make_header(
        0,
        hex::encode([0u8; 32]),
        hex::encode([0u8; 32]),
        hex::encode(genesis_root),
    );
    let genesis_votes = finality_votes(genesis_set, &genesis);
    let trio0 = BlockTrio {
        first: SnapshotFirstBlock {
            header: genesis.clone(),
            proof: MerkleProof::default(),
        },
        second: SnapshotSecondBlock {
            header: genesis.clone(),
        },
        third: SnapshotThirdBlock {
            header: genesis.clone(),
            vote_set: genesis_votes,
        },
    };

    // First block of the tail trio: its state carries the rotated pool,
    // proven by a Merkle proof against its state root.
    let first_leaves = vec![(
        VALIDATOR_CANDIDATE_POOL_KEY.to_vec(),
        bincode::serialize(&rotated_pool).expect("encode pool"),
    )];
    let (first_root, first_db) = committed_state(10, &first_leaves);
    let first_view = StoreView::open(10, first_root, first_db);
    let vcp_proof = first_view
        .prove(VALIDATOR_CANDIDATE_POOL_KEY)
        .expect("prove candidate pool");
    let first = make_header(
        10,
        hex::encode([0x11u8; 32]),
        hex::encode([0x11u8; 32]),
        hex::encode(first_root),
    );

    // Tail world state: rotated pool, a stake transaction at the first
    // block's height, and an account with a nested storage view.
    let storage_leaves = vec![
        (b"slot-a".to_vec(), b"1".to_vec()),
        (b"slot-b".to_vec(), b"2".to_vec()),
    ];
    let (storage_root, _) = committed_state(11, &storage_leaves);
    let stored_account = Account::new(
        validators[0].address.clone(),
        750,
        hex::encode(storage_root),
    );
    let plain_account = Account::new(validators[1].address.clone(), 250, hex::encode(EMPTY_ROOT));
    let tail_leaves = vec![
        (
            account_key(&stored_account.address),
            bincode::serialize(&stored_account).expect("encode account"),
        ),
        (
            account_key(&plain_account.address),
            bincode::serialize(&plain_account).expect("encode account"),
        ),
        (
            VALIDATOR_CANDIDATE_POOL_KEY.to_vec(),
            bincode::serialize(&rotated_pool).expect("encode pool"),
        ),
        (
            STAKE_HEIGHT_LIST_KEY.to_vec(),
            bincode::serialize(&StakeHeightList { heights: vec![10] }).expect("encode heights"),
        ),
    ];
    let (tail_root, _) = committed_state(11, &tail_leaves);

    let second = make_header(
        11,
        first.hash_hex(),
        first.hash_hex(),
        hex::encode(tail_root),
    );
    let mut third = make_header(
        12,
        second.hash_hex(),
        second.hash_hex(),
        hex::encode([0xEEu8; 32]),
    );
    // The third header carries the votes that finalized the second block,
    // formed under the genesis validator set.
    third.hcc.votes = finality_votes(genesis_set, &second);
    let third_votes = finality_votes(rotated_set, &third);

    let trio1 = BlockTrio {
        first: SnapshotFirstBlock {
            header: first,
            proof: vcp_proof,
        },
        second: SnapshotSecondBlock {
            header: second,
        },
        third: SnapshotThirdBlock {
            header: third,
            vote_set: third_votes,
        },
    };

    let metadata = SnapshotMetadata {
        block_trios: vec![trio0, trio1],
    };
    let params = NetworkParams {
        chain_id: CHAIN_ID.to_string(),
        genesis_height: 0,
        genesis_hash: genesis.hash_hex(),
    };

    let mut events = vec![Event::Start(0)];
    events.extend(
        genesis_leaves
            .into_iter()
            .map(|(key, value)| Event::Leaf(key, value)),
    );
    events.push(Event::End(0));

    events.push(Event::Start(11));
    events.push(Event::Leaf(
        account_key(&stored_account.address),
        bincode::serialize(&stored_account).expect("encode account"),
    ));
    events.push(Event::Start(11));
    events.extend(
        storage_leaves
            .into_iter()
            .map(|(key, value)| Event::Leaf(key, value)),
    );
    events.push(Event::End(11));
    events.push(Event::Leaf(
        account_key(&plain_account.address),
        bincode::serialize(&plain_account).expect("encode account"),
    ));
    events.push(Event::Leaf(
        VALIDATOR_CANDIDATE_POOL_KEY.to_vec(),
        bincode::serialize(&rotated_pool).expect("encode pool"),
    ));
    events.push(Event::Leaf(
        STAKE_HEIGHT_LIST_KEY.to_vec(),
        bincode::serialize(&StakeHeightList { heights: vec![10] }).expect("encode heights"),
    ));
    events.push(Event::End(11));

    SnapshotFixture {
        metadata,
        events,
        params,
        validators,
    }
}
