//! Attribution of stake reward withdrawals to a payment address.
//!
//! A withdrawal names only a stake address; the reward lands at some payment
//! address of the transaction. The heuristics below pick that address when
//! the public data allows it and otherwise report the withdrawal as
//! unattributable instead of guessing.

use crate::transfers::asset::AssetId;
use crate::transfers::events::{Party, TransferEvent, TransferKind};
use crate::transfers::ledger::BalanceChanges;
use crate::transfers::model::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Which heuristic picked the address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionRule {
    /// Only one payment address carries the stake address.
    SingleCandidate,
    /// Only one account's ADA balance changed, and it carries the stake address.
    SoleAdaAccount,
    /// The transaction's only withdrawal, matched by the sign of the ADA residual.
    ResidualBalance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnattributedReason {
    /// Fee, deposit, and ADA deltas already balance; nothing left to explain.
    Balanced,
    /// The residual points at senders/receivers none of which carry the stake address.
    NoMatchingCandidate,
    /// Several withdrawals and several candidates: the data cannot decide.
    Ambiguous,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Attribution {
    Attributed {
        address: String,
        rule: AttributionRule,
    },
    Unattributable {
        reason: UnattributedReason,
    },
    /// Zero-amount withdrawal; no event expected.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalOutcome {
    pub stake_address: String,
    pub amount: i128,
    pub attribution: Attribution,
}

/// Attribute every declared withdrawal and append a WITHDRAW_STAKE event for
/// each one that resolves. Existing events are left untouched.
pub fn attribute_withdrawals(
    tx: &Transaction,
    changes: &BalanceChanges,
    transfers: &mut Vec<TransferEvent>,
) -> Vec<WithdrawalOutcome> {
    let nonzero = tx.withdrawals.iter().filter(|w| w.amount > 0).count();
    let ada_accounts: Vec<&str> = changes
        .deltas()
        .filter(|(_, asset, _)| asset.is_native())
        .map(|(acc, _, _)| acc)
        .collect();
    let senders = changes.senders(&AssetId::Native);
    let receivers = changes.receivers(&AssetId::Native);

    let mut outcomes = Vec::with_capacity(tx.withdrawals.len());
    for w in &tx.withdrawals {
        let attribution = if w.amount <= 0 {
            Attribution::Skipped
        } else {
            let candidates: BTreeSet<&str> = tx
                .utxos()
                .filter(|u| u.stake_address.as_deref() == Some(w.stake_address.as_str()))
                .map(|u| u.address.as_str())
                .collect();
            attribute_one(
                tx,
                changes,
                &candidates,
                &ada_accounts,
                &senders,
                &receivers,
                nonzero,
            )
        };
        if let Attribution::Attributed { address, rule } = &attribution {
            debug!(tx = %tx.hash, stake = %w.stake_address, %address, ?rule, "withdrawal attributed");
            transfers.push(TransferEvent::new(
                Party::Nobody,
                Party::account(address.clone()),
                w.amount.unsigned_abs(),
                AssetId::Native,
                TransferKind::WithdrawStake,
            ));
        } else {
            debug!(tx = %tx.hash, stake = %w.stake_address, ?attribution, "withdrawal not attributed");
        }
        outcomes.push(WithdrawalOutcome {
            stake_address: w.stake_address.clone(),
            amount: w.amount,
            attribution,
        });
    }
    outcomes
}

fn attribute_one(
    tx: &Transaction,
    changes: &BalanceChanges,
    candidates: &BTreeSet<&str>,
    ada_accounts: &[&str],
    senders: &[(&str, i128)],
    receivers: &[(&str, i128)],
    withdrawal_count: usize,
) -> Attribution {
    let attributed = |address: &str, rule| Attribution::Attributed {
        address: address.to_string(),
        rule,
    };
    if candidates.len() == 1 {
        if let Some(only) = candidates.iter().next() {
            return attributed(only, AttributionRule::SingleCandidate);
        }
    }
    if let [only] = ada_accounts {
        if candidates.contains(only) {
            return attributed(only, AttributionRule::SoleAdaAccount);
        }
    }
    if withdrawal_count != 1 {
        return Attribution::Unattributable {
            reason: UnattributedReason::Ambiguous,
        };
    }
    let residual = changes
        .deltas()
        .filter(|(_, asset, _)| asset.is_native())
        .fold(tx.fee.saturating_add(tx.deposit), |acc, (_, _, d)| {
            acc.saturating_add(d)
        });
    let pool = match residual {
        0 => {
            return Attribution::Unattributable {
                reason: UnattributedReason::Balanced,
            }
        }
        r if r > 0 => senders,
        _ => receivers,
    };
    pool.iter()
        .find(|(acc, _)| candidates.contains(acc))
        .map(|(acc, _)| attributed(acc, AttributionRule::ResidualBalance))
        .unwrap_or(Attribution::Unattributable {
            reason: UnattributedReason::NoMatchingCandidate,
        })
}
