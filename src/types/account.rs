use std::fmt;
use std::str::FromStr;

use malachite::Natural;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Address;

/// Staked amount, serialized as a decimal string so arbitrarily large
/// deposits survive every codec unchanged.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stake {
    inner: Natural,
}

impl Stake {
    pub fn zero() -> Self {
        Self {
            inner: Natural::from(0u32),
        }
    }

    pub fn from_natural(inner: Natural) -> Self {
        Self { inner }
    }

    pub fn from_u128(value: u128) -> Self {
        Self {
            inner: Natural::from(value),
        }
    }

    pub fn as_natural(&self) -> &Natural {
        &self.inner
    }

    pub fn is_zero(&self) -> bool {
        self.inner == Natural::from(0u32)
    }
}

impl Default for Stake {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Stake {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Natural::from_str(s).map(Stake::from_natural)
    }
}

impl Serialize for Stake {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.inner.to_string())
    }
}

impl<'de> Deserialize<'de> for Stake {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Natural::from_str(&value)
            .map(Stake::from_natural)
            .map_err(|_| serde::de::Error::custom("invalid stake value"))
    }
}

impl fmt::Display for Stake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// World-state account record. `storage_root` is the Merkle root the
/// account's nested storage view must hash to when the snapshot carries
/// one; accounts without storage declare the zero root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub nonce: u64,
    pub balance: u128,
    pub storage_root: String,
}

impl Account {
    pub fn new(address: Address, balance: u128, storage_root: String) -> Self {
        Self {
            address,
            nonce: 0,
            balance,
            storage_root,
        }
    }
}
