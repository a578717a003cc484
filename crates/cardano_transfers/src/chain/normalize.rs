//! Conversion of Koios rows into parser transactions.
//!
//! Koios returns every quantity as a decimal string. A transaction with any
//! missing or non-numeric quantity is rejected as a whole; other rows of the
//! same response are unaffected.

use crate::chain::fetch::{KoiosAsset, KoiosTx, KoiosUtxo, KoiosWithdrawal};
use crate::transfers::model::{MintedAsset, StakeWithdrawal, Transaction, Utxo, UtxoAsset};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("tx {tx}: invalid {field}: {value:?}")]
    InvalidQuantity {
        tx: String,
        field: &'static str,
        value: String,
    },
    #[error("tx {tx}: missing {field}")]
    Missing { tx: String, field: &'static str },
}

/// Parse a decimal quantity. Accepts an optional leading `-` (burns, refunds).
pub fn parse_quantity(s: &str) -> Option<i128> {
    let s = s.trim();
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i128>().ok()
}

struct Ctx<'a> {
    tx: &'a str,
}

impl Ctx<'_> {
    fn quantity(&self, field: &'static str, value: Option<&str>) -> Result<i128, NormalizeError> {
        let value = value.ok_or_else(|| NormalizeError::Missing {
            tx: self.tx.to_string(),
            field,
        })?;
        parse_quantity(value).ok_or_else(|| NormalizeError::InvalidQuantity {
            tx: self.tx.to_string(),
            field,
            value: value.to_string(),
        })
    }

    /// Quantities that can never be negative on chain.
    fn unsigned(&self, field: &'static str, value: Option<&str>) -> Result<i128, NormalizeError> {
        match self.quantity(field, value)? {
            q if q < 0 => Err(NormalizeError::InvalidQuantity {
                tx: self.tx.to_string(),
                field,
                value: q.to_string(),
            }),
            q => Ok(q),
        }
    }

    fn utxo(&self, u: &KoiosUtxo) -> Result<Utxo, NormalizeError> {
        let assets = u
            .asset_list
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|a| self.utxo_asset(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Utxo {
            address: u.payment_addr.bech32.clone(),
            stake_address: u.stake_addr.clone(),
            lovelace: self.unsigned("utxo value", u.value.as_deref())?,
            assets,
        })
    }

    fn utxo_asset(&self, a: &KoiosAsset) -> Result<UtxoAsset, NormalizeError> {
        Ok(UtxoAsset {
            policy_id: a.policy_id.clone(),
            asset_name: a.asset_name.clone().unwrap_or_default(),
            quantity: self.unsigned("asset quantity", a.quantity.as_deref())?,
            decimals: a.decimals.unwrap_or(0),
        })
    }

    fn withdrawal(&self, w: &KoiosWithdrawal) -> Result<StakeWithdrawal, NormalizeError> {
        Ok(StakeWithdrawal {
            stake_address: w.stake_addr.clone(),
            amount: self.unsigned("withdrawal amount", w.amount.as_deref())?,
        })
    }

    fn minted(&self, a: &KoiosAsset) -> Result<MintedAsset, NormalizeError> {
        Ok(MintedAsset {
            policy_id: a.policy_id.clone(),
            asset_name: a.asset_name.clone().unwrap_or_default(),
            quantity: self.quantity("minted quantity", a.quantity.as_deref())?,
        })
    }
}

/// Convert a `tx_info` row. Fails on the first malformed quantity.
pub fn normalize_tx(tx: &KoiosTx) -> Result<Transaction, NormalizeError> {
    let ctx = Ctx { tx: &tx.tx_hash };
    let inputs = tx
        .inputs
        .iter()
        .map(|u| ctx.utxo(u))
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = tx
        .outputs
        .iter()
        .map(|u| ctx.utxo(u))
        .collect::<Result<Vec<_>, _>>()?;
    let withdrawals = tx
        .withdrawals
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|w| ctx.withdrawal(w))
        .collect::<Result<Vec<_>, _>>()?;
    let assets_minted = tx
        .assets_minted
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .map(|a| ctx.minted(a))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Transaction {
        hash: tx.tx_hash.clone(),
        block_height: tx.block_height,
        timestamp: tx.tx_timestamp,
        fee: ctx.unsigned("fee", tx.fee.as_deref())?,
        deposit: ctx.quantity("deposit", tx.deposit.as_deref())?,
        inputs,
        outputs,
        withdrawals,
        assets_minted,
    })
}
