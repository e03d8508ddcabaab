use serde::{Deserialize, Serialize};

use crate::crypto::{
    address_from_public_key, public_key_from_hex, signature_from_hex, verify_signature,
};
use crate::errors::{SnapshotError, SnapshotResult};

use super::Address;

const VOTE_MESSAGE_DOMAIN: &[u8] = b"meridian-finality-vote";

/// A finality vote on a single block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub block_hash: String,
    pub height: u64,
    pub epoch: u64,
    pub voter: Address,
}

impl Vote {
    pub fn message_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(VOTE_MESSAGE_DOMAIN);
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.epoch.to_le_bytes());
        data.extend_from_slice(self.block_hash.as_bytes());
        data.extend_from_slice(self.voter.as_bytes());
        data
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedVote {
    pub vote: Vote,
    pub public_key: String,
    pub signature: String,
}

impl SignedVote {
    /// Checks the signature over the vote's canonical encoding and that
    /// the signing key belongs to the claimed voter.
    pub fn verify(&self) -> SnapshotResult<()> {
        let public_key = public_key_from_hex(&self.public_key)?;
        let derived = address_from_public_key(&public_key);
        if derived != self.vote.voter {
            return Err(SnapshotError::Crypto(
                "vote public key does not match voter address".into(),
            ));
        }
        let signature = signature_from_hex(&self.signature)?;
        verify_signature(&public_key, &self.vote.message_bytes(), &signature)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSet {
    votes: Vec<SignedVote>,
}

impl VoteSet {
    pub fn new(votes: Vec<SignedVote>) -> Self {
        Self { votes }
    }

    pub fn votes(&self) -> &[SignedVote] {
        &self.votes
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.votes.truncate(len);
    }
}
