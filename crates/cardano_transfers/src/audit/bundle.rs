//! Audit bundle and SHA-256 reproducibility hash.

use crate::transfers::ParsedTransaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub const BUNDLE_VERSION: u32 = 1;

/// Parsed transactions plus the snapshots they were derived from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditBundle {
    pub version: u32,
    /// Address or label the transactions were selected by.
    pub source: String,
    /// Excluded from the reproducibility hash.
    pub created_utc_rfc3339: String,
    /// Sorted.
    pub tx_hashes: Vec<String>,
    /// Ordered by block height, then hash.
    pub transactions: Vec<ParsedTransaction>,
}

impl AuditBundle {
    pub fn new(source: String, mut transactions: Vec<ParsedTransaction>) -> Self {
        let created_utc_rfc3339 = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        transactions.sort_by(|a, b| {
            (a.block_height.unwrap_or(0), &a.tx_hash).cmp(&(b.block_height.unwrap_or(0), &b.tx_hash))
        });
        let mut tx_hashes: Vec<String> = transactions.iter().map(|t| t.tx_hash.clone()).collect();
        tx_hashes.sort();
        Self {
            version: BUNDLE_VERSION,
            source,
            created_utc_rfc3339,
            tx_hashes,
            transactions,
        }
    }

    pub fn transfer_count(&self) -> usize {
        self.transactions.iter().map(|t| t.transfers.len()).sum()
    }
}

/// Normalize JSON for hashing: sorted keys, no whitespace.
pub fn normalize_for_hash(value: &serde_json::Value) -> Result<String, VerifyError> {
    Ok(serde_json::to_string(&sort_json_keys(value))?)
}

fn sort_json_keys(v: &serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(m) => {
            let sorted: std::collections::BTreeMap<&String, serde_json::Value> =
                m.iter().map(|(k, v)| (k, sort_json_keys(v))).collect();
            serde_json::Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect(),
            )
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}

/// SHA-256 over the normalized bundle JSON without its creation time.
pub fn reproducibility_hash(bundle: &AuditBundle) -> Result<String, VerifyError> {
    let mut json = serde_json::to_value(bundle)?;
    if let Some(obj) = json.as_object_mut() {
        obj.remove("created_utc_rfc3339");
    }
    let normalized = normalize_for_hash(&json)?;
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationResult {
    pub bundle_hash: String,
    pub expected_hash: Option<String>,
    pub matches: bool,
}

/// Compare a bundle against the contents of its `.sha256` file, if any.
pub fn verify_bundle_hash(
    bundle: &AuditBundle,
    expected_hex: Option<&str>,
) -> Result<VerificationResult, VerifyError> {
    let bundle_hash = reproducibility_hash(bundle)?;
    let expected = expected_hex.map(|e| e.trim().to_lowercase());
    let matches = expected.as_deref() == Some(bundle_hash.as_str());
    Ok(VerificationResult {
        bundle_hash,
        expected_hash: expected,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_deterministic() {
        let a = serde_json::json!({"z":1,"a":{"y":2,"b":3}});
        let b = serde_json::json!({"a":{"b":3,"y":2},"z":1});
        assert_eq!(normalize_for_hash(&a).unwrap(), normalize_for_hash(&b).unwrap());
    }

    #[test]
    fn hash_ignores_creation_time() {
        let a = AuditBundle::new("addr1".into(), vec![]);
        let mut b = a.clone();
        b.created_utc_rfc3339 = "1970-01-01T00:00:00Z".into();
        let h = reproducibility_hash(&a).unwrap();
        assert_eq!(h, reproducibility_hash(&b).unwrap());
        assert_eq!(h.len(), 64);
    }

    #[test]
    fn verify_matches_case_insensitively() {
        let bundle = AuditBundle::new("addr1".into(), vec![]);
        let h = reproducibility_hash(&bundle).unwrap();
        let ok = verify_bundle_hash(&bundle, Some(&format!("{}\n", h.to_uppercase()))).unwrap();
        assert!(ok.matches);
        let missing = verify_bundle_hash(&bundle, None).unwrap();
        assert!(!missing.matches);
        let wrong = verify_bundle_hash(&bundle, Some("00")).unwrap();
        assert!(!wrong.matches);
    }
}
