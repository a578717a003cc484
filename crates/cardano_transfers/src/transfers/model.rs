//! Domain transaction types with parsed quantities.
//!
//! Built from Koios responses by [`crate::chain::normalize_tx`]; the parser
//! never sees raw strings.

use serde::{Deserialize, Serialize};

/// A transaction as consumed by the parser. Supplied whole, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub block_height: Option<u64>,
    pub timestamp: Option<i64>,
    /// Fee in lovelace.
    pub fee: i128,
    /// Positive for stake registration deposits, negative for refunds.
    pub deposit: i128,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Utxo>,
    pub withdrawals: Vec<StakeWithdrawal>,
    pub assets_minted: Vec<MintedAsset>,
}

impl Transaction {
    /// Inputs followed by outputs.
    pub fn utxos(&self) -> impl Iterator<Item = &Utxo> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn is_minted(&self, policy_id: &str, asset_name: &str) -> bool {
        self.assets_minted
            .iter()
            .any(|a| a.policy_id == policy_id && a.asset_name == asset_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Bech32 payment address of the owner.
    pub address: String,
    pub stake_address: Option<String>,
    pub lovelace: i128,
    pub assets: Vec<UtxoAsset>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoAsset {
    pub policy_id: String,
    /// Hex-encoded asset name, possibly empty.
    pub asset_name: String,
    pub quantity: i128,
    pub decimals: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeWithdrawal {
    pub stake_address: String,
    pub amount: i128,
}

/// Asset minted (positive quantity) or burned (negative) by the transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedAsset {
    pub policy_id: String,
    pub asset_name: String,
    pub quantity: i128,
}
