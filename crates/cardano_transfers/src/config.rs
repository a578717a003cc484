//! Service configuration: Koios endpoint, token list source, paging limits.
//!
//! Load from: env `CARDANO_TRANSFERS_CONFIG_PATH`, or
//! `./config/cardano_transfers.json`, or `./cardano_transfers.json`.
//! Missing fields take their defaults.

use crate::chain::{FetchConfig, DEFAULT_KOIOS_URL};
use crate::metadata::{DEFAULT_LOGO_BASE_URL, DEFAULT_TOKEN_LIST_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "CARDANO_TRANSFERS_CONFIG_PATH";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransfersConfig {
    pub koios_url: String,
    pub token_list_url: String,
    /// Prefix for token logo paths in attached metadata.
    pub logo_base_url: String,
    /// Page size for `address_txs`.
    pub tx_hashes_limit: usize,
    /// Chunk size for `tx_info`.
    pub tx_limit: usize,
}

impl Default for TransfersConfig {
    fn default() -> Self {
        let fetch = FetchConfig::default();
        Self {
            koios_url: DEFAULT_KOIOS_URL.to_string(),
            token_list_url: DEFAULT_TOKEN_LIST_URL.to_string(),
            logo_base_url: DEFAULT_LOGO_BASE_URL.to_string(),
            tx_hashes_limit: fetch.tx_hashes_limit,
            tx_limit: fetch.tx_limit,
        }
    }
}

impl TransfersConfig {
    /// Load from `path`. Returns defaults on a missing or unreadable file.
    pub fn load_from_path(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Self::default()
        })
    }

    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let p = Path::new(&path);
            if p.exists() {
                return Self::load_from_path(p);
            }
        }
        for candidate in [
            Path::new("./config/cardano_transfers.json"),
            Path::new("./cardano_transfers.json"),
        ] {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }
        Self::default()
    }

    pub fn fetch_config(&self, offline: bool) -> FetchConfig {
        FetchConfig {
            base_url: self.koios_url.clone(),
            offline,
            tx_hashes_limit: self.tx_hashes_limit.max(1),
            tx_limit: self.tx_limit.max(1),
            ..Default::default()
        }
    }
}
