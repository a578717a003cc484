//! Report data structure (HTML is generated in the cardano_transfers_report crate).

use crate::audit::{
    conservation_report, reproducibility_hash, AssetImbalance, AuditBundle, VerifyError,
};
use serde::{Deserialize, Serialize};

/// Imbalances found in one transaction of the bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxImbalances {
    pub tx_hash: String,
    pub imbalances: Vec<AssetImbalance>,
}

/// Data passed to the HTML report generator: bundle, its hash, and conservation findings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportData {
    pub bundle: AuditBundle,
    pub reproducibility_hash_sha256: String,
    /// Only transactions with at least one imbalance.
    pub imbalances: Vec<TxImbalances>,
}

impl ReportData {
    pub fn new(bundle: AuditBundle) -> Result<Self, VerifyError> {
        let reproducibility_hash_sha256 = reproducibility_hash(&bundle)?;
        let imbalances = bundle
            .transactions
            .iter()
            .filter_map(|tx| {
                let found = conservation_report(tx);
                (!found.is_empty()).then(|| TxImbalances {
                    tx_hash: tx.tx_hash.clone(),
                    imbalances: found,
                })
            })
            .collect();
        Ok(Self {
            bundle,
            reproducibility_hash_sha256,
            imbalances,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bundle_has_no_imbalances() {
        let data = ReportData::new(AuditBundle::new("addr1".into(), vec![])).unwrap();
        assert!(data.imbalances.is_empty());
        assert_eq!(data.reproducibility_hash_sha256.len(), 64);
    }
}
