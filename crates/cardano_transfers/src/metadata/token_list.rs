//! Token list persisted in the SQLite store, refreshed from the remote list.

use crate::chain::{Cache, Fetcher, Namespace};
use crate::metadata::{CardanoToken, MetadataError, TokenMetadataLookup};
use async_trait::async_trait;
use tracing::{debug, info};

/// Token metadata backed by [`Cache`] under [`Namespace::TokenList`].
pub struct TokenListStore {
    cache: Cache,
}

impl TokenListStore {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    pub fn save(&self, token: &CardanoToken) -> Result<(), MetadataError> {
        let json = serde_json::to_vec(token)?;
        self.cache
            .set_in(Namespace::TokenList, &token.subject, &json)?;
        Ok(())
    }

    pub fn get(&self, subject: &str) -> Result<Option<CardanoToken>, MetadataError> {
        match self.cache.get_in(Namespace::TokenList, subject)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn token_count(&self) -> Result<u64, MetadataError> {
        Ok(self.cache.count(Namespace::TokenList)?)
    }

    /// Download the list at `url` and store every token. Returns the count.
    pub async fn refresh(&self, fetcher: &Fetcher, url: &str) -> Result<usize, MetadataError> {
        debug!(url, "refreshing token list");
        let tokens = fetcher.token_list(url).await?;
        for token in &tokens {
            self.save(token)?;
        }
        info!(count = tokens.len(), "token list stored");
        Ok(tokens.len())
    }
}

#[async_trait]
impl TokenMetadataLookup for TokenListStore {
    async fn lookup(&self, subject: &str) -> Result<Option<CardanoToken>, MetadataError> {
        self.get(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(subject: &str, ticker: &str) -> CardanoToken {
        CardanoToken {
            policy_id: subject[..4].to_string(),
            subject: subject.to_string(),
            ticker: Some(ticker.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_then_lookup() {
        let store = TokenListStore::new(Cache::in_memory().unwrap());
        store.save(&token("abcd01", "AAA")).unwrap();
        store.save(&token("abcd02", "BBB")).unwrap();
        let found = store.lookup("abcd02").await.unwrap().unwrap();
        assert_eq!(found.ticker.as_deref(), Some("BBB"));
        assert!(store.lookup("ffff").await.unwrap().is_none());
        assert_eq!(store.token_count().unwrap(), 2);
    }

    #[test]
    fn save_overwrites_subject() {
        let store = TokenListStore::new(Cache::in_memory().unwrap());
        store.save(&token("abcd01", "OLD")).unwrap();
        store.save(&token("abcd01", "NEW")).unwrap();
        let found = store.get("abcd01").unwrap().unwrap();
        assert_eq!(found.ticker.as_deref(), Some("NEW"));
        assert_eq!(store.token_count().unwrap(), 1);
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let cache = Cache::in_memory().unwrap();
        cache.set_in(Namespace::TokenList, "bad", b"not json").unwrap();
        let store = TokenListStore::new(cache);
        assert!(matches!(store.get("bad"), Err(MetadataError::Json(_))));
    }
}
