//! Transfer events emitted per transaction.

use crate::transfers::asset::AssetId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Placeholder address for transfers with several senders and receivers.
pub const MULTI_ACCOUNT: &str = "multiAccount";

/// One side of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Party {
    Account(String),
    /// No counterparty: mint source, burn/fee sink, reward source.
    Nobody,
    /// Aggregate of several accounts that cannot be paired.
    Multi,
}

impl Party {
    pub fn account(addr: impl Into<String>) -> Self {
        Party::Account(addr.into())
    }

    pub fn as_account(&self) -> Option<&str> {
        match self {
            Party::Account(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Party::Account(a) => a,
            Party::Nobody => "",
            Party::Multi => MULTI_ACCOUNT,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Party {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Party {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "" => Party::Nobody,
            MULTI_ACCOUNT => Party::Multi,
            _ => Party::Account(s),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferKind {
    Transfer,
    Mint,
    Burn,
    Stake,
    WithdrawStake,
    Fee,
}

/// Token-list metadata attached to events of a non-native asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub decimals: Option<u32>,
    pub ticker: Option<String>,
    pub name: Option<String>,
    /// Absolute logo URL.
    pub logo: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEvent {
    pub from: Party,
    pub to: Party,
    pub amount: u128,
    pub asset: AssetId,
    pub kind: TransferKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TokenMetadata>,
}

impl TransferEvent {
    pub fn new(from: Party, to: Party, amount: u128, asset: AssetId, kind: TransferKind) -> Self {
        Self {
            from,
            to,
            amount,
            asset,
            kind,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<TokenMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn token_mint(&self) -> &str {
        self.asset.token_mint()
    }

    pub fn token_symbol(&self) -> &str {
        self.asset.token_symbol()
    }

    /// Fees sort ahead of every other instruction of the same transaction.
    pub fn instruction_order(&self) -> i32 {
        if self.kind == TransferKind::Fee {
            -1
        } else {
            0
        }
    }
}
