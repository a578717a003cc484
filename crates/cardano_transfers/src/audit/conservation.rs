//! Conservation check: emitted flows against resolver deltas.

use crate::transfers::{AssetId, ParsedTransaction, TransferKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An account whose emitted TRANSFER/MINT/BURN flows of one token do not add
/// up to its balance change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetImbalance {
    pub account: String,
    pub asset: AssetId,
    /// Change computed from the balance snapshots.
    pub expected: i128,
    /// Change implied by the emitted events.
    pub emitted: i128,
}

/// Check every (account, token) pair of `parsed`. An empty result means each
/// account's signed legs of each token equal its resolver delta. Legs to or
/// from the multi-party marker or nobody count only on the real account side.
///
/// ADA is skipped: fees, deposits and rewards move it in and out of the
/// ledger, so its transfer events do not sum to its net change.
pub fn conservation_report(parsed: &ParsedTransaction) -> Vec<AssetImbalance> {
    let mut emitted: BTreeMap<(&str, &AssetId), i128> = BTreeMap::new();
    for event in &parsed.transfers {
        if event.asset.is_native()
            || !matches!(
                event.kind,
                TransferKind::Transfer | TransferKind::Mint | TransferKind::Burn
            )
        {
            continue;
        }
        let amount = i128::try_from(event.amount).unwrap_or(i128::MAX);
        if let Some(from) = event.from.as_account() {
            let net = emitted.entry((from, &event.asset)).or_insert(0);
            *net = net.saturating_sub(amount);
        }
        if let Some(to) = event.to.as_account() {
            let net = emitted.entry((to, &event.asset)).or_insert(0);
            *net = net.saturating_add(amount);
        }
    }

    let mut expected: BTreeMap<(&str, &AssetId), i128> = parsed
        .changes
        .deltas()
        .filter(|(_, asset, _)| !asset.is_native())
        .map(|(acc, asset, d)| ((acc, asset), d))
        .collect();
    for key in emitted.keys() {
        expected.entry(*key).or_insert(0);
    }

    expected
        .into_iter()
        .filter_map(|((account, asset), want)| {
            let got = emitted.get(&(account, asset)).copied().unwrap_or(0);
            (want != got).then(|| AssetImbalance {
                account: account.to_string(),
                asset: asset.clone(),
                expected: want,
                emitted: got,
            })
        })
        .collect()
}
