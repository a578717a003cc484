//! Per-account balance snapshots and the before/after diff.

use crate::transfers::asset::{AssetCatalog, AssetId, AssetNameDecoder};
use crate::transfers::model::Utxo;
use crate::transfers::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// account address -> asset -> balance
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAssetLedger {
    accounts: BTreeMap<String, BTreeMap<AssetId, i128>>,
}

impl AccountAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, account: &str, asset: &AssetId) -> i128 {
        self.accounts
            .get(account)
            .and_then(|assets| assets.get(asset))
            .copied()
            .unwrap_or(0)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub fn assets_of(&self, account: &str) -> impl Iterator<Item = (&AssetId, &i128)> {
        self.accounts.get(account).into_iter().flat_map(|m| m.iter())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn entry(&mut self, account: &str) -> &mut BTreeMap<AssetId, i128> {
        self.accounts
            .entry(account.to_string())
            .or_insert_with(|| BTreeMap::from([(AssetId::Native, 0)]))
    }

    fn add(&mut self, account: &str, asset: AssetId, amount: i128) -> Result<(), ParseError> {
        let slot = self.entry(account).entry(asset).or_insert(0);
        *slot = slot.checked_add(amount).ok_or_else(|| ParseError::Overflow {
            account: account.to_string(),
        })?;
        Ok(())
    }
}

/// Fold `utxos` into `ledger`, registering every token in `catalog`.
///
/// Not idempotent: folding the same list twice doubles every balance.
pub fn accumulate_utxos(
    utxos: &[Utxo],
    ledger: &mut AccountAssetLedger,
    catalog: &mut AssetCatalog,
    decoder: &dyn AssetNameDecoder,
) -> Result<(), ParseError> {
    for utxo in utxos {
        ledger.add(&utxo.address, AssetId::Native, utxo.lovelace)?;
        for asset in &utxo.assets {
            let id = AssetId::token(&asset.policy_id, &asset.asset_name);
            catalog.register(&id, asset.decimals, decoder);
            ledger.add(&utxo.address, id, asset.quantity)?;
        }
    }
    Ok(())
}

/// Nonzero balance changes of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChanges {
    /// account -> asset -> nonzero delta. Accounts without any nonzero delta are absent.
    deltas: BTreeMap<String, BTreeMap<AssetId, i128>>,
    /// Every account that appears in the inputs or outputs.
    participants: BTreeSet<String>,
    /// Assets with at least one nonzero delta.
    assets: BTreeSet<AssetId>,
}

impl BalanceChanges {
    pub fn delta(&self, account: &str, asset: &AssetId) -> i128 {
        self.deltas
            .get(account)
            .and_then(|m| m.get(asset))
            .copied()
            .unwrap_or(0)
    }

    pub fn deltas(&self) -> impl Iterator<Item = (&str, &AssetId, i128)> {
        self.deltas
            .iter()
            .flat_map(|(acc, m)| m.iter().map(move |(asset, d)| (acc.as_str(), asset, *d)))
    }

    pub fn participants(&self) -> &BTreeSet<String> {
        &self.participants
    }

    /// The account, if exactly one participated in the transaction.
    pub fn sole_participant(&self) -> Option<&str> {
        if self.participants.len() == 1 {
            self.participants.iter().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn assets(&self) -> &BTreeSet<AssetId> {
        &self.assets
    }

    /// Accounts whose balance of `asset` went down, with their (negative) delta.
    pub fn senders(&self, asset: &AssetId) -> Vec<(&str, i128)> {
        self.filter_by_sign(asset, |d| d < 0)
    }

    /// Accounts whose balance of `asset` went up, with their delta.
    pub fn receivers(&self, asset: &AssetId) -> Vec<(&str, i128)> {
        self.filter_by_sign(asset, |d| d > 0)
    }

    /// Sum of all deltas of `asset`; nonzero only if it was minted or burned.
    pub fn net(&self, asset: &AssetId) -> i128 {
        self.deltas
            .values()
            .filter_map(|m| m.get(asset))
            .fold(0i128, |acc, d| acc.saturating_add(*d))
    }

    fn filter_by_sign(&self, asset: &AssetId, keep: impl Fn(i128) -> bool) -> Vec<(&str, i128)> {
        self.deltas
            .iter()
            .filter_map(|(acc, m)| m.get(asset).map(|d| (acc.as_str(), *d)))
            .filter(|(_, d)| keep(*d))
            .collect()
    }
}

/// Diff `after` against `before`, keeping only nonzero results.
pub fn resolve_balance_changes(
    after: &AccountAssetLedger,
    before: &AccountAssetLedger,
) -> Result<BalanceChanges, ParseError> {
    let mut changes = BalanceChanges::default();
    let accounts: BTreeSet<&str> = after.accounts().chain(before.accounts()).collect();
    for account in accounts {
        changes.participants.insert(account.to_string());
        let assets: BTreeSet<&AssetId> = after
            .assets_of(account)
            .chain(before.assets_of(account))
            .map(|(a, _)| a)
            .collect();
        for asset in assets {
            let delta = after
                .balance(account, asset)
                .checked_sub(before.balance(account, asset))
                .ok_or_else(|| ParseError::Overflow {
                    account: account.to_string(),
                })?;
            if delta != 0 {
                changes
                    .deltas
                    .entry(account.to_string())
                    .or_default()
                    .insert(asset.clone(), delta);
                changes.assets.insert(asset.clone());
            }
        }
    }
    Ok(changes)
}
