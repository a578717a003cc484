//! Koios fetching, response caching, and normalization into parser types.

mod cache;
pub(crate) mod fetch;
mod normalize;

pub use cache::{Cache, CacheError, Namespace};
pub use fetch::{
    FetchConfig, FetchError, Fetcher, KoiosAddressTx, KoiosAsset, KoiosTx, KoiosUtxo,
    KoiosWithdrawal, DEFAULT_KOIOS_URL,
};
pub use normalize::{normalize_tx, parse_quantity, NormalizeError};
