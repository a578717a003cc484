//! Koios API client with rate limiting, retries, and a response cache.

use crate::chain::cache::Cache;
use crate::metadata::CardanoToken;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const DEFAULT_KOIOS_URL: &str = "https://api.koios.rest/api/v1";
const RATE_LIMIT_MS: u64 = 200;
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 500;
/// Koios caps pages at 1000 rows.
pub const TX_HASHES_LIMIT: usize = 1000;
/// Smaller than the Koios maximum to avoid response timeouts.
pub const TX_LIMIT: usize = 100;

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub base_url: String,
    pub rate_limit_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub offline: bool,
    pub tx_hashes_limit: usize,
    pub tx_limit: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_KOIOS_URL.to_string(),
            rate_limit_ms: RATE_LIMIT_MS,
            max_retries: MAX_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
            offline: false,
            tx_hashes_limit: TX_HASHES_LIMIT,
            tx_limit: TX_LIMIT,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cache: {0}")]
    Cache(#[from] crate::chain::cache::CacheError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("offline mode: no cached data for key")]
    OfflineMiss,
}

/// Row of `address_txs`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KoiosAddressTx {
    pub tx_hash: String,
    pub epoch_no: Option<u64>,
    pub block_height: Option<u64>,
    pub block_time: Option<i64>,
}

/// Row of `tx_info`. Only the fields the parser needs are kept.
///
/// Quantities are optional: a row missing one is rejected by
/// [`normalize_tx`](crate::chain::normalize_tx), not here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KoiosTx {
    pub tx_hash: String,
    pub block_height: Option<u64>,
    pub tx_timestamp: Option<i64>,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub deposit: Option<String>,
    #[serde(default)]
    pub inputs: Vec<KoiosUtxo>,
    #[serde(default)]
    pub outputs: Vec<KoiosUtxo>,
    pub withdrawals: Option<Vec<KoiosWithdrawal>>,
    pub assets_minted: Option<Vec<KoiosAsset>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KoiosPaymentAddr {
    pub bech32: String,
    pub cred: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KoiosUtxo {
    pub payment_addr: KoiosPaymentAddr,
    pub stake_addr: Option<String>,
    pub tx_hash: Option<String>,
    pub tx_index: Option<u32>,
    #[serde(default)]
    pub value: Option<String>,
    pub asset_list: Option<Vec<KoiosAsset>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KoiosAsset {
    pub policy_id: String,
    pub asset_name: Option<String>,
    pub fingerprint: Option<String>,
    pub decimals: Option<u32>,
    #[serde(default)]
    pub quantity: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KoiosWithdrawal {
    #[serde(default)]
    pub amount: Option<String>,
    pub stake_addr: String,
}

#[derive(Deserialize)]
struct TokenListResponse {
    tokens: Vec<CardanoToken>,
}

/// Fetcher with rate limiting and optional SQLite cache.
pub struct Fetcher {
    config: FetchConfig,
    client: Option<reqwest::Client>,
    cache: Option<Cache>,
    last_request: std::sync::Mutex<Option<OffsetDateTime>>,
    request_count: AtomicU64,
}

impl Fetcher {
    pub fn new(config: FetchConfig, cache: Option<Cache>) -> Result<Self, FetchError> {
        let client = if config.offline {
            None
        } else {
            Some(
                reqwest::Client::builder()
                    .use_rustls_tls()
                    .timeout(Duration::from_secs(30))
                    .build()?,
            )
        };
        Ok(Self {
            config,
            client,
            cache,
            last_request: std::sync::Mutex::new(None),
            request_count: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn rate_limit(&self) {
        let prev = match self.last_request.lock() {
            Ok(last) => *last,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let sleep_ms = match prev {
            Some(prev) => {
                let elapsed = (OffsetDateTime::now_utc() - prev).whole_milliseconds();
                let need = self.config.rate_limit_ms as i128;
                if elapsed < need {
                    (need - elapsed).max(0) as u64
                } else {
                    0
                }
            }
            None => 0,
        };
        if sleep_ms > 0 {
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(OffsetDateTime::now_utc());
        }
    }

    /// POST `body` to a Koios endpoint, going through the response cache.
    async fn post_json(
        &self,
        path: &str,
        cache_key: &str,
        body: serde_json::Value,
    ) -> Result<String, FetchError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get_json(cache_key)? {
                debug!(key = %cache_key, "cache hit");
                return Ok(cached);
            }
            if self.config.offline {
                return Err(FetchError::OfflineMiss);
            }
        }
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let body = self.request(&url, Some(body)).await?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set_json(cache_key, &body) {
                warn!(error = %e, "cache write failed");
            }
        }
        Ok(body)
    }

    /// Send with retries and exponential backoff. Uncached.
    async fn request(
        &self,
        url: &str,
        post_body: Option<serde_json::Value>,
    ) -> Result<String, FetchError> {
        let client = self.client.as_ref().ok_or(FetchError::OfflineMiss)?;
        self.rate_limit().await;

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            let res = match &post_body {
                Some(body) => client.post(url).json(body).send().await,
                None => client.get(url).send().await,
            };
            match res {
                Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    if status.is_success() {
                        self.request_count.fetch_add(1, Ordering::Relaxed);
                        return Ok(body);
                    }
                    last_err = Some(FetchError::Api(status.as_u16(), body));
                }
                Err(e) => last_err = Some(FetchError::Request(e)),
            }
            if attempt < self.config.max_retries {
                let ms = backoff_ms(self.config.retry_backoff_ms, attempt);
                warn!(attempt, ms, url, "retry after error");
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }
        Err(last_err.unwrap_or(FetchError::Api(0, "unknown".to_string())))
    }

    /// One page of transactions touching `address` after `after_block`, oldest first.
    pub async fn address_txs(
        &self,
        address: &str,
        after_block: u64,
        offset: usize,
    ) -> Result<Vec<KoiosAddressTx>, FetchError> {
        let limit = self.config.tx_hashes_limit;
        let req = serde_json::json!({
            "address_txs": address,
            "after": after_block,
            "offset": offset,
            "limit": limit
        });
        let cache_key = Cache::key_for(&serde_json::to_string(&req)?);
        let path = format!(
            "address_txs?offset={}&limit={}&order=block_height.asc",
            offset, limit
        );
        let body = serde_json::json!({
            "_addresses": [address],
            "_after_block_height": after_block
        });
        let raw = self.post_json(&path, &cache_key, body).await?;
        let parsed: Vec<KoiosAddressTx> = serde_json::from_str(&raw)?;
        info!(address, after_block, offset, count = parsed.len(), "address_txs");
        Ok(parsed)
    }

    /// All transactions after `after_block`, paging until a short page.
    pub async fn all_address_txs(
        &self,
        address: &str,
        after_block: u64,
    ) -> Result<Vec<KoiosAddressTx>, FetchError> {
        let mut all = Vec::new();
        loop {
            let page = self.address_txs(address, after_block, all.len()).await?;
            let full = page.len() == self.config.tx_hashes_limit;
            all.extend(page);
            if !full {
                break;
            }
        }
        Ok(all)
    }

    /// Transaction bodies for `hashes`, requested in chunks of `tx_limit`.
    /// Hashes Koios does not know are dropped, as are rows that are not
    /// transaction objects; neither fails the rest of the chunk.
    pub async fn tx_info(&self, hashes: &[String]) -> Result<Vec<KoiosTx>, FetchError> {
        let mut txs = Vec::with_capacity(hashes.len());
        for chunk in hashes.chunks(self.config.tx_limit.max(1)) {
            let req = serde_json::json!({ "tx_info": chunk });
            let cache_key = Cache::key_for(&serde_json::to_string(&req)?);
            let body = serde_json::json!({ "_tx_hashes": chunk });
            let raw = self.post_json("tx_info", &cache_key, body).await?;
            let rows: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
            txs.extend(rows.into_iter().filter_map(tx_row));
        }
        info!(requested = hashes.len(), found = txs.len(), "tx_info");
        Ok(txs)
    }

    /// Download the token list at `url`. Never served from the response cache.
    pub async fn token_list(&self, url: &str) -> Result<Vec<CardanoToken>, FetchError> {
        let raw = self.request(url, None).await?;
        let parsed: TokenListResponse = serde_json::from_str(&raw)?;
        info!(count = parsed.tokens.len(), "token list");
        Ok(parsed.tokens)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

/// Exponential backoff delay for retry `attempt`, saturating instead of overflowing.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
}

/// One `tx_info` row. `null` and rows without a transaction shape are skipped.
fn tx_row(row: serde_json::Value) -> Option<KoiosTx> {
    if row.is_null() {
        return None;
    }
    match serde_json::from_value::<KoiosTx>(row) {
        Ok(tx) => Some(tx),
        Err(e) => {
            warn!(error = %e, "skipping unreadable tx_info row");
            None
        }
    }
}
