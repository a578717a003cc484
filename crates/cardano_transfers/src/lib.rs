//! cardano_transfers: normalized transfer events from Cardano UTxO transactions.
//!
//! Diffs each transaction's inputs against its outputs per account and asset,
//! then classifies the deltas into transfer, mint, burn, stake, withdrawal and
//! fee events using only public ledger data.

pub mod audit;
pub mod chain;
pub mod config;
pub mod metadata;
pub mod report;
pub mod transfers;

pub use audit::{conservation_report, reproducibility_hash, AuditBundle, VerificationResult};
pub use chain::{normalize_tx, Cache, FetchConfig, Fetcher, KoiosAddressTx, KoiosTx, KoiosUtxo};
pub use config::TransfersConfig;
pub use metadata::{
    CardanoToken, NoTokenMetadata, StaticTokenList, TokenListStore, TokenMetadataLookup,
};
pub use report::{ReportData, TxImbalances};
pub use transfers::{
    AssetId, ParseError, ParsedTransaction, Party, TransferEvent, TransferKind, TransferParser,
};
