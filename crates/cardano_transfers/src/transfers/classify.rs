//! Per-asset transfer classification.
//!
//! Each changed asset is split into senders (negative delta) and receivers
//! (positive delta), then matched against [`RULES`] in order. The first rule
//! whose predicate holds emits the events for that asset; if none holds the
//! asset produces nothing. Fee and stake deposit events are added afterwards.

use crate::metadata::TokenMetadataLookup;
use crate::transfers::asset::AssetId;
use crate::transfers::events::{Party, TokenMetadata, TransferEvent, TransferKind};
use crate::transfers::ledger::BalanceChanges;
use crate::transfers::model::Transaction;
use tracing::{debug, warn};

/// Senders and receivers of one asset within a transaction.
#[derive(Clone, Debug)]
pub struct AssetFlows<'a> {
    pub asset: &'a AssetId,
    pub senders: Vec<(&'a str, i128)>,
    pub receivers: Vec<(&'a str, i128)>,
    /// The asset appears in the transaction's minted/burned list.
    pub minted: bool,
}

impl<'a> AssetFlows<'a> {
    pub fn from_changes(tx: &Transaction, changes: &'a BalanceChanges, asset: &'a AssetId) -> Self {
        let minted = match asset {
            AssetId::Native => false,
            AssetId::Token {
                policy_id,
                asset_name,
            } => tx.is_minted(policy_id, asset_name),
        };
        Self {
            asset,
            senders: changes.senders(asset),
            receivers: changes.receivers(asset),
            minted,
        }
    }

    fn event(&self, from: Party, to: Party, delta: i128, kind: TransferKind) -> TransferEvent {
        TransferEvent::new(from, to, delta.unsigned_abs(), self.asset.clone(), kind)
    }
}

/// A named predicate/action pair of the classification table.
pub struct Rule {
    pub name: &'static str,
    pub applies: fn(&AssetFlows<'_>) -> bool,
    pub emit: fn(&AssetFlows<'_>) -> Vec<TransferEvent>,
}

/// Classification rules in priority order.
pub const RULES: [Rule; 5] = [
    Rule {
        name: "single_sender",
        applies: single_sender_applies,
        emit: single_sender_emit,
    },
    Rule {
        name: "single_receiver",
        applies: single_receiver_applies,
        emit: single_receiver_emit,
    },
    Rule {
        name: "mint",
        applies: mint_applies,
        emit: mint_emit,
    },
    Rule {
        name: "burn",
        applies: burn_applies,
        emit: burn_emit,
    },
    Rule {
        name: "many_to_many",
        applies: many_to_many_applies,
        emit: many_to_many_emit,
    },
];

fn single_sender_applies(f: &AssetFlows<'_>) -> bool {
    f.senders.len() == 1 && !f.receivers.is_empty()
}

fn single_sender_emit(f: &AssetFlows<'_>) -> Vec<TransferEvent> {
    let &[(sender, _)] = f.senders.as_slice() else {
        return Vec::new();
    };
    f.receivers
        .iter()
        .map(|(receiver, delta)| {
            f.event(
                Party::account(sender),
                Party::account(*receiver),
                *delta,
                TransferKind::Transfer,
            )
        })
        .collect()
}

fn single_receiver_applies(f: &AssetFlows<'_>) -> bool {
    f.receivers.len() == 1 && !f.senders.is_empty()
}

fn single_receiver_emit(f: &AssetFlows<'_>) -> Vec<TransferEvent> {
    let &[(receiver, _)] = f.receivers.as_slice() else {
        return Vec::new();
    };
    f.senders
        .iter()
        .map(|(sender, delta)| {
            f.event(
                Party::account(*sender),
                Party::account(receiver),
                *delta,
                TransferKind::Transfer,
            )
        })
        .collect()
}

fn mint_applies(f: &AssetFlows<'_>) -> bool {
    f.senders.is_empty() && !f.receivers.is_empty() && f.minted
}

fn mint_emit(f: &AssetFlows<'_>) -> Vec<TransferEvent> {
    f.receivers
        .iter()
        .map(|(receiver, delta)| {
            f.event(
                Party::Nobody,
                Party::account(*receiver),
                *delta,
                TransferKind::Mint,
            )
        })
        .collect()
}

fn burn_applies(f: &AssetFlows<'_>) -> bool {
    f.receivers.is_empty() && !f.senders.is_empty() && f.minted
}

fn burn_emit(f: &AssetFlows<'_>) -> Vec<TransferEvent> {
    f.senders
        .iter()
        .map(|(sender, delta)| {
            f.event(
                Party::account(*sender),
                Party::Nobody,
                *delta,
                TransferKind::Burn,
            )
        })
        .collect()
}

fn many_to_many_applies(f: &AssetFlows<'_>) -> bool {
    f.senders.len() > 1 && f.receivers.len() > 1
}

fn many_to_many_emit(f: &AssetFlows<'_>) -> Vec<TransferEvent> {
    let sent = f.senders.iter().map(|(sender, delta)| {
        f.event(
            Party::account(*sender),
            Party::Multi,
            *delta,
            TransferKind::Transfer,
        )
    });
    let received = f.receivers.iter().map(|(receiver, delta)| {
        f.event(
            Party::Multi,
            Party::account(*receiver),
            *delta,
            TransferKind::Transfer,
        )
    });
    sent.chain(received).collect()
}

/// Apply [`RULES`] to one asset. Returns the matching rule's name and its events.
pub fn classify_asset(flows: &AssetFlows<'_>) -> Option<(&'static str, Vec<TransferEvent>)> {
    RULES
        .iter()
        .find(|rule| (rule.applies)(flows))
        .map(|rule| (rule.name, (rule.emit)(flows)))
}

/// Look up and reduce token-list metadata. Lookup errors count as absence.
pub async fn lookup_metadata(
    asset: &AssetId,
    lookup: &dyn TokenMetadataLookup,
    logo_base_url: &str,
) -> Option<TokenMetadata> {
    let subject = asset.subject()?;
    match lookup.lookup(&subject).await {
        Ok(token) => token.map(|t| t.snapshot(logo_base_url)),
        Err(e) => {
            warn!(subject = %subject, error = %e, "token metadata lookup failed");
            None
        }
    }
}

/// Classify every changed asset, then append the fee and stake deposit events.
pub async fn classify_transfers(
    tx: &Transaction,
    changes: &BalanceChanges,
    lookup: &dyn TokenMetadataLookup,
    logo_base_url: &str,
) -> Vec<TransferEvent> {
    let mut transfers = Vec::new();
    for asset in changes.assets() {
        let metadata = lookup_metadata(asset, lookup, logo_base_url).await;
        let flows = AssetFlows::from_changes(tx, changes, asset);
        match classify_asset(&flows) {
            Some((rule, events)) => {
                debug!(tx = %tx.hash, %asset, rule, events = events.len(), "classified");
                transfers.extend(
                    events
                        .into_iter()
                        .map(|e| e.with_metadata(metadata.clone())),
                );
            }
            None => debug!(tx = %tx.hash, %asset, "no rule matched"),
        }
        if asset.is_native() {
            if let Some(fee) = fee_event(tx, changes, &flows) {
                transfers.push(fee);
            }
        }
    }
    if let Some(deposit) = deposit_event(tx, changes) {
        transfers.push(deposit);
    }
    transfers
}

/// FEE event, paid by the sole participant or else the sole ADA sender.
fn fee_event(
    tx: &Transaction,
    changes: &BalanceChanges,
    flows: &AssetFlows<'_>,
) -> Option<TransferEvent> {
    let payer = match changes.sole_participant() {
        Some(account) => account,
        None if flows.senders.len() == 1 => flows.senders[0].0,
        None => return None,
    };
    Some(TransferEvent::new(
        Party::account(payer),
        Party::Nobody,
        tx.fee.unsigned_abs(),
        AssetId::Native,
        TransferKind::Fee,
    ))
}

/// STAKE or WITHDRAW_STAKE for a nonzero deposit in a single-account transaction.
fn deposit_event(tx: &Transaction, changes: &BalanceChanges) -> Option<TransferEvent> {
    let account = changes.sole_participant()?;
    let (from, to, kind) = match tx.deposit {
        0 => return None,
        d if d > 0 => (Party::account(account), Party::Nobody, TransferKind::Stake),
        _ => (
            Party::Nobody,
            Party::account(account),
            TransferKind::WithdrawStake,
        ),
    };
    Some(TransferEvent::new(
        from,
        to,
        tx.deposit.unsigned_abs(),
        AssetId::Native,
        kind,
    ))
}
