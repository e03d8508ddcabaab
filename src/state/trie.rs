//! Content-addressed Merkle-Patricia trie over a key/value database.
//!
//! Leaves are addressed by the nibble path of the Blake2s digest of their
//! key, so every path has the same length and no key is a prefix of
//! another. Committed nodes are stored under the hash of their encoding;
//! identical subtrees share storage and the root is deterministic in the
//! multiset of inserted pairs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{blake2s, domain_hash};
use crate::errors::{SnapshotError, SnapshotResult};
use crate::storage::Database;

pub type NodeHash = [u8; 32];

/// Root of the empty trie; also the "no prior state" marker for fresh
/// store views.
pub const EMPTY_ROOT: NodeHash = [0u8; 32];

const TRIE_NODE_DOMAIN: &[u8] = b"meridian-trie-node";
const PATH_NIBBLES: usize = 64;

#[derive(Clone, Debug, Serialize, Deserialize)]
enum TrieNode {
    Leaf {
        path: Vec<u8>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Branch {
        children: [Option<NodeHash>; 16],
    },
}

/// Chain of encoded nodes from the root down to a leaf, sufficient to
/// verify a single key/value binding without database access.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub nodes: Vec<Vec<u8>>,
}

fn nibble_path(key: &[u8]) -> Vec<u8> {
    let digest = blake2s(key);
    let mut nibbles = Vec::with_capacity(PATH_NIBBLES);
    for byte in digest {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    nibbles
}

fn node_hash(bytes: &[u8]) -> NodeHash {
    domain_hash(TRIE_NODE_DOMAIN, bytes)
}

fn store_node(db: &dyn Database, node: &TrieNode) -> SnapshotResult<NodeHash> {
    let bytes = bincode::serialize(node)?;
    let hash = node_hash(&bytes);
    db.put(&hash, &bytes)?;
    Ok(hash)
}

fn load_node(db: &dyn Database, hash: &NodeHash) -> SnapshotResult<TrieNode> {
    let bytes = db
        .get(hash)?
        .ok_or_else(|| SnapshotError::Config(format!("missing trie node {}", hex::encode(hash))))?;
    Ok(bincode::deserialize(&bytes)?)
}

struct TrieItem {
    path: Vec<u8>,
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Commits `leaves` as a fresh trie, writing every node to `db`, and
/// returns the root. An empty leaf set commits to [`EMPTY_ROOT`].
pub fn commit(db: &dyn Database, leaves: &BTreeMap<Vec<u8>, Vec<u8>>) -> SnapshotResult<NodeHash> {
    if leaves.is_empty() {
        return Ok(EMPTY_ROOT);
    }
    let items = leaves
        .iter()
        .map(|(key, value)| TrieItem {
            path: nibble_path(key),
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    build_node(db, 0, items)
}

fn build_node(db: &dyn Database, depth: usize, mut items: Vec<TrieItem>) -> SnapshotResult<NodeHash> {
    if items.len() == 1 {
        let item = items.swap_remove(0);
        let node = TrieNode::Leaf {
            path: item.path[depth..].to_vec(),
            key: item.key,
            value: item.value,
        };
        return store_node(db, &node);
    }
    if depth >= PATH_NIBBLES {
        return Err(SnapshotError::Config(
            "trie path exhausted while keys still collide".into(),
        ));
    }
    let mut buckets: Vec<Vec<TrieItem>> = (0..16).map(|_| Vec::new()).collect();
    for item in items {
        let nibble = item.path[depth] as usize;
        buckets[nibble].push(item);
    }
    let mut children: [Option<NodeHash>; 16] = [None; 16];
    for (nibble, bucket) in buckets.into_iter().enumerate() {
        if !bucket.is_empty() {
            children[nibble] = Some(build_node(db, depth + 1, bucket)?);
        }
    }
    store_node(db, &TrieNode::Branch { children })
}

/// Looks up `key` in the committed trie at `root`.
pub fn get(db: &dyn Database, root: &NodeHash, key: &[u8]) -> SnapshotResult<Option<Vec<u8>>> {
    if *root == EMPTY_ROOT {
        return Ok(None);
    }
    let path = nibble_path(key);
    let mut current = *root;
    let mut depth = 0;
    loop {
        match load_node(db, &current)? {
            TrieNode::Leaf {
                path: rest,
                key: leaf_key,
                value,
            } => {
                if rest == path[depth..] && leaf_key == key {
                    return Ok(Some(value));
                }
                return Ok(None);
            }
            TrieNode::Branch { children } => {
                if depth >= PATH_NIBBLES {
                    return Err(SnapshotError::Config("malformed trie: branch below leaf depth".into()));
                }
                match children[path[depth] as usize] {
                    Some(child) => {
                        current = child;
                        depth += 1;
                    }
                    None => return Ok(None),
                }
            }
        }
    }
}

/// Builds the membership proof for `key`; errors if the key is absent.
pub fn prove(db: &dyn Database, root: &NodeHash, key: &[u8]) -> SnapshotResult<MerkleProof> {
    if *root == EMPTY_ROOT {
        return Err(SnapshotError::Config("cannot prove against an empty trie".into()));
    }
    let path = nibble_path(key);
    let mut nodes = Vec::new();
    let mut current = *root;
    let mut depth = 0;
    loop {
        let bytes = db.get(&current)?.ok_or_else(|| {
            SnapshotError::Config(format!("missing trie node {}", hex::encode(current)))
        })?;
        let node: TrieNode = bincode::deserialize(&bytes)?;
        nodes.push(bytes);
        match node {
            TrieNode::Leaf {
                path: rest,
                key: leaf_key,
                ..
            } => {
                if rest == path[depth..] && leaf_key == key {
                    return Ok(MerkleProof { nodes });
                }
                return Err(SnapshotError::Config("key not present in trie".into()));
            }
            TrieNode::Branch { children } => {
                if depth >= PATH_NIBBLES {
                    return Err(SnapshotError::Config("malformed trie: branch below leaf depth".into()));
                }
                match children[path[depth] as usize] {
                    Some(child) => {
                        current = child;
                        depth += 1;
                    }
                    None => {
                        return Err(SnapshotError::Config("key not present in trie".into()));
                    }
                }
            }
        }
    }
}

/// Verifies `proof` against `root` and returns the value bound to `key`.
/// Runs entirely in memory; each node must hash to the commitment the
/// previous node (or the root) declared for it.
pub fn verify_proof(root: &NodeHash, key: &[u8], proof: &MerkleProof) -> SnapshotResult<Vec<u8>> {
    let path = nibble_path(key);
    let mut expected = *root;
    let mut depth = 0;
    for bytes in &proof.nodes {
        if node_hash(bytes) != expected {
            return Err(SnapshotError::Config(
                "proof node does not match its commitment".into(),
            ));
        }
        match bincode::deserialize::<TrieNode>(bytes)? {
            TrieNode::Leaf {
                path: rest,
                key: leaf_key,
                value,
            } => {
                if rest == path[depth..] && leaf_key == key {
                    return Ok(value);
                }
                return Err(SnapshotError::Config("proof resolves to a different key".into()));
            }
            TrieNode::Branch { children } => {
                if depth >= PATH_NIBBLES {
                    return Err(SnapshotError::Config("malformed proof: branch below leaf depth".into()));
                }
                expected = children[path[depth] as usize].ok_or_else(|| {
                    SnapshotError::Config("proof branch has no child on the key path".into())
                })?;
                depth += 1;
            }
        }
    }
    Err(SnapshotError::Config("incomplete proof".into()))
}

/// Walks the committed trie at `root` and returns every key/value pair.
pub fn collect_leaves(
    db: &dyn Database,
    root: &NodeHash,
) -> SnapshotResult<BTreeMap<Vec<u8>, Vec<u8>>> {
    let mut leaves = BTreeMap::new();
    if *root == EMPTY_ROOT {
        return Ok(leaves);
    }
    let mut pending = vec![*root];
    while let Some(hash) = pending.pop() {
        match load_node(db, &hash)? {
            TrieNode::Leaf { key, value, .. } => {
                leaves.insert(key, value);
            }
            TrieNode::Branch { children } => {
                pending.extend(children.into_iter().flatten());
            }
        }
    }
    Ok(leaves)
}
