//! SQLite store for Koios responses and token-list entries.

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Partition of the store. Responses are content-addressed; token entries
/// are keyed by subject and overwritten on every refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    Koios,
    TokenList,
}

impl Namespace {
    fn as_str(self) -> &'static str {
        match self {
            Namespace::Koios => "koios",
            Namespace::TokenList => "cardano-token-list",
        }
    }
}

pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    /// Open or create the store at `path`. Creates parent dirs if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Private in-memory store, dropped with the value.
    pub fn in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                created_utc INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            CREATE INDEX IF NOT EXISTS idx_cache_created ON cache(created_utc);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Io(std::io::Error::other(e.to_string())))
    }

    /// SHA-256 hex of a normalized request (e.g. its JSON string).
    pub fn key_for(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get_in(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM cache WHERE namespace = ?1 AND key = ?2")?;
        let row = stmt
            .query_row([ns.as_str(), key], |r| r.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(row)
    }

    /// Insert or replace.
    pub fn set_in(&self, ns: Namespace, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let created = time::OffsetDateTime::now_utc().unix_timestamp();
        self.conn()?.execute(
            "INSERT OR REPLACE INTO cache (namespace, key, value, created_utc) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![ns.as_str(), key, value, created],
        )?;
        Ok(())
    }

    pub fn count(&self, ns: Namespace) -> Result<u64, CacheError> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM cache WHERE namespace = ?1",
            [ns.as_str()],
            |r| r.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    /// Cached Koios response; `None` if missing or not UTF-8.
    pub fn get_json(&self, key: &str) -> Result<Option<String>, CacheError> {
        let raw = self.get_in(Namespace::Koios, key)?;
        Ok(raw.and_then(|b| String::from_utf8(b).ok()))
    }

    /// Cache a Koios response under `key_for(normalized_request)`.
    pub fn set_json(&self, key: &str, json: &str) -> Result<(), CacheError> {
        self.set_in(Namespace::Koios, key, json.as_bytes())
    }
}
