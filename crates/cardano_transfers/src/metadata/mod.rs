//! Token metadata lookup: the capability the classifier consults per asset.

mod token_list;

pub use token_list::TokenListStore;

use crate::transfers::events::TokenMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_TOKEN_LIST_URL: &str = "https://spectrum.fi/cardano-token-list.json";
pub const DEFAULT_LOGO_BASE_URL: &str = "https://spectrum.fi/";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("cache: {0}")]
    Cache(#[from] crate::chain::CacheError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("fetch: {0}")]
    Fetch(#[from] crate::chain::FetchError),
}

/// Entry of the Spectrum Cardano token list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardanoToken {
    pub policy_id: String,
    /// Policy id followed by the hex asset name.
    pub subject: String,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    /// Logo path relative to the list's host.
    #[serde(default)]
    pub logo: Option<String>,
}

impl CardanoToken {
    /// The reduced form attached to transfer events.
    pub fn snapshot(&self, logo_base_url: &str) -> TokenMetadata {
        TokenMetadata {
            decimals: self.decimals,
            ticker: self.ticker.clone(),
            name: self.name.clone(),
            logo: self
                .logo
                .as_deref()
                .filter(|l| !l.is_empty())
                .map(|l| format!("{}{}", logo_base_url, l)),
        }
    }
}

/// Metadata source keyed by token subject. `Ok(None)` is a normal outcome.
///
/// Implementations must be safe to call concurrently and must not observe
/// parser state.
#[async_trait]
pub trait TokenMetadataLookup: Send + Sync {
    async fn lookup(&self, subject: &str) -> Result<Option<CardanoToken>, MetadataError>;
}

/// Lookup that never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTokenMetadata;

#[async_trait]
impl TokenMetadataLookup for NoTokenMetadata {
    async fn lookup(&self, _subject: &str) -> Result<Option<CardanoToken>, MetadataError> {
        Ok(None)
    }
}

/// In-memory token list.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenList {
    tokens: HashMap<String, CardanoToken>,
}

impl StaticTokenList {
    pub fn new(tokens: impl IntoIterator<Item = CardanoToken>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|t| (t.subject.clone(), t))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenMetadataLookup for StaticTokenList {
    async fn lookup(&self, subject: &str) -> Result<Option<CardanoToken>, MetadataError> {
        Ok(self.tokens.get(subject).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_token() -> CardanoToken {
        serde_json::from_value(serde_json::json!({
            "policyId": "29d2",
            "subject": "29d24d494e",
            "decimals": 6,
            "ticker": "MIN",
            "name": "Minswap",
            "verified": true,
            "logo": "logos/min.png"
        }))
        .unwrap()
    }

    #[test]
    fn snapshot_prefixes_logo() {
        let snap = min_token().snapshot(DEFAULT_LOGO_BASE_URL);
        assert_eq!(snap.decimals, Some(6));
        assert_eq!(snap.ticker.as_deref(), Some("MIN"));
        assert_eq!(snap.logo.as_deref(), Some("https://spectrum.fi/logos/min.png"));
    }

    #[test]
    fn snapshot_without_logo() {
        let token = CardanoToken {
            logo: None,
            ..min_token()
        };
        assert_eq!(token.snapshot(DEFAULT_LOGO_BASE_URL).logo, None);
    }

    #[tokio::test]
    async fn static_list_lookup() {
        let list = StaticTokenList::new([min_token()]);
        assert_eq!(list.len(), 1);
        assert!(list.lookup("29d24d494e").await.unwrap().is_some());
        assert!(list.lookup("nope").await.unwrap().is_none());
        assert!(NoTokenMetadata.lookup("29d24d494e").await.unwrap().is_none());
    }
}
