use std::collections::HashSet;

use malachite::Natural;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Stake, VoteSet};

/// Upper bound on the number of elected validators per epoch.
pub const MAX_VALIDATORS: usize = 31;

/// A staked candidate recorded in world state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeHolder {
    pub address: Address,
    pub public_key: String,
    pub stake: Stake,
}

/// The candidate set stored under the well-known world-state key; the
/// source of truth for validator election.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCandidatePool {
    pub candidates: Vec<StakeHolder>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub public_key: String,
    pub stake: Stake,
}

/// Ordered validator set for one epoch, as produced by
/// [`select_top_stake_holders`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self { validators }
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn validator(&self, address: &str) -> Option<&Validator> {
        self.validators
            .iter()
            .find(|validator| validator.address == address)
    }

    pub fn total_stake(&self) -> Natural {
        self.validators
            .iter()
            .fold(Natural::from(0u32), |acc, validator| {
                acc + validator.stake.as_natural().clone()
            })
    }

    pub fn quorum_threshold(&self) -> Natural {
        quorum_threshold(&self.total_stake())
    }

    /// Whether `votes` carries at least two thirds of the set's stake
    /// from distinct, resolvable voters. Signatures are not checked here;
    /// each vote is verified individually by the chain validator.
    pub fn has_majority(&self, votes: &VoteSet) -> bool {
        let threshold = self.quorum_threshold();
        if threshold == Natural::from(0u32) {
            return false;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut weight = Natural::from(0u32);
        for signed in votes.votes() {
            let Some(validator) = self.validator(&signed.vote.voter) else {
                continue;
            };
            if !seen.insert(signed.vote.voter.as_str()) {
                continue;
            }
            weight += validator.stake.as_natural().clone();
        }
        weight >= threshold
    }
}

/// Stake weight required for a two-thirds quorum over `total`, computed
/// in exact integer arithmetic.
fn quorum_threshold(total: &Natural) -> Natural {
    if *total == Natural::from(0u32) {
        return Natural::from(0u32);
    }
    let numerator = total.clone() * Natural::from(2u32);
    let denominator = Natural::from(3u32);
    let mut threshold = numerator.clone() / denominator.clone();
    if numerator % denominator != Natural::from(0u32) {
        threshold += Natural::from(1u32);
    }
    threshold += Natural::from(1u32);
    threshold
}

/// Deterministically elects the validator set from a candidate pool:
/// stake descending, ties broken by ascending address, zero-stake
/// candidates excluded, capped at [`MAX_VALIDATORS`].
pub fn select_top_stake_holders(pool: &ValidatorCandidatePool) -> ValidatorSet {
    let mut candidates: Vec<&StakeHolder> = pool
        .candidates
        .iter()
        .filter(|candidate| !candidate.stake.is_zero())
        .collect();
    candidates.sort_by(|a, b| {
        b.stake
            .as_natural()
            .cmp(a.stake.as_natural())
            .then_with(|| a.address.cmp(&b.address))
    });
    candidates.truncate(MAX_VALIDATORS);
    ValidatorSet::new(
        candidates
            .into_iter()
            .map(|candidate| Validator {
                address: candidate.address.clone(),
                public_key: candidate.public_key.clone(),
                stake: candidate.stake.clone(),
            })
            .collect(),
    )
}
