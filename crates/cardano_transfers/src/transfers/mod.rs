//! Transaction parsing: balance snapshots, deltas, and transfer classification.
//!
//! [`TransferParser::parse`] runs the stages in order:
//! accumulate inputs and outputs, resolve deltas, classify per asset (plus
//! fee and deposit), then attribute stake withdrawals. Everything is local to
//! one call; the only await point is the token metadata lookup.

mod asset;
mod classify;
pub(crate) mod events;
mod ledger;
pub(crate) mod model;
mod withdrawal;

pub use asset::{
    decode_asset_name, AssetCatalog, AssetId, AssetInfo, AssetNameDecoder, Utf8HexDecoder,
    ADA_DECIMALS, ADA_SYMBOL,
};
pub use classify::{classify_asset, classify_transfers, lookup_metadata, AssetFlows, Rule, RULES};
pub use events::{Party, TokenMetadata, TransferEvent, TransferKind, MULTI_ACCOUNT};
pub use ledger::{accumulate_utxos, resolve_balance_changes, AccountAssetLedger, BalanceChanges};
pub use model::{MintedAsset, StakeWithdrawal, Transaction, Utxo, UtxoAsset};
pub use withdrawal::{
    attribute_withdrawals, Attribution, AttributionRule, UnattributedReason, WithdrawalOutcome,
};

use crate::chain::{normalize_tx, KoiosTx, NormalizeError};
use crate::metadata::{NoTokenMetadata, TokenMetadataLookup, DEFAULT_LOGO_BASE_URL};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed transaction: {0}")]
    Malformed(#[from] NormalizeError),
    #[error("balance overflow for account {account}")]
    Overflow { account: String },
}

/// Everything derived from one transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub tx_hash: String,
    pub block_height: Option<u64>,
    pub timestamp: Option<i64>,
    pub catalog: AssetCatalog,
    pub before: AccountAssetLedger,
    pub after: AccountAssetLedger,
    pub changes: BalanceChanges,
    pub transfers: Vec<TransferEvent>,
    pub withdrawals: Vec<WithdrawalOutcome>,
}

/// Parser with its injected capabilities. Cheap to clone and share.
#[derive(Clone)]
pub struct TransferParser {
    metadata: Arc<dyn TokenMetadataLookup>,
    decoder: Arc<dyn AssetNameDecoder>,
    logo_base_url: String,
}

impl Default for TransferParser {
    fn default() -> Self {
        Self::new(Arc::new(NoTokenMetadata))
    }
}

impl TransferParser {
    pub fn new(metadata: Arc<dyn TokenMetadataLookup>) -> Self {
        Self {
            metadata,
            decoder: Arc::new(Utf8HexDecoder),
            logo_base_url: DEFAULT_LOGO_BASE_URL.to_string(),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn AssetNameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_logo_base_url(mut self, url: impl Into<String>) -> Self {
        self.logo_base_url = url.into();
        self
    }

    /// Parse one transaction. Either every event is produced or an error is returned.
    pub async fn parse(&self, tx: &Transaction) -> Result<ParsedTransaction, ParseError> {
        let span = info_span!("parse_tx", tx = %tx.hash);
        self.parse_inner(tx).instrument(span).await
    }

    /// Normalize a Koios `tx_info` row and parse it.
    pub async fn parse_koios(&self, tx: &KoiosTx) -> Result<ParsedTransaction, ParseError> {
        let tx = normalize_tx(tx)?;
        self.parse(&tx).await
    }

    async fn parse_inner(&self, tx: &Transaction) -> Result<ParsedTransaction, ParseError> {
        let mut catalog = AssetCatalog::new();
        let mut before = AccountAssetLedger::new();
        let mut after = AccountAssetLedger::new();
        accumulate_utxos(&tx.inputs, &mut before, &mut catalog, self.decoder.as_ref())?;
        accumulate_utxos(&tx.outputs, &mut after, &mut catalog, self.decoder.as_ref())?;

        let changes = resolve_balance_changes(&after, &before)?;
        let mut transfers =
            classify_transfers(tx, &changes, self.metadata.as_ref(), &self.logo_base_url).await;
        let withdrawals = attribute_withdrawals(tx, &changes, &mut transfers);

        debug!(
            accounts = changes.participants().len(),
            assets = changes.assets().len(),
            transfers = transfers.len(),
            "parsed"
        );
        Ok(ParsedTransaction {
            tx_hash: tx.hash.clone(),
            block_height: tx.block_height,
            timestamp: tx.timestamp,
            catalog,
            before,
            after,
            changes,
            transfers,
            withdrawals,
        })
    }
}
