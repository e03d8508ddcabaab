use serde::{Deserialize, Serialize};

use crate::errors::SnapshotResult;
use crate::types::decode_digest;

pub const GENESIS_HEIGHT: u64 = 0;

pub const MAINNET_CHAIN_ID: &str = "meridian-mainnet";

/// Hash of the main network's genesis block header. Snapshots loaded
/// through the default entry points must anchor their trio chain here.
pub const MAINNET_GENESIS_HASH: &str =
    "7e9a5cc0d1b4f83a6d2e48b1c05f7aa9313e6f0d8c24b97e5a1d40c3f68b29e4";

/// Build-time network identity: which chain a snapshot belongs to and
/// where its proof chain must be anchored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkParams {
    pub chain_id: String,
    pub genesis_height: u64,
    pub genesis_hash: String,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            chain_id: MAINNET_CHAIN_ID.to_string(),
            genesis_height: GENESIS_HEIGHT,
            genesis_hash: MAINNET_GENESIS_HASH.to_string(),
        }
    }

    pub fn genesis_hash_bytes(&self) -> SnapshotResult<[u8; 32]> {
        decode_digest(&self.genesis_hash)
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
