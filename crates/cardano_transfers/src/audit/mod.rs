//! Audit bundles with reproducibility hashes, and event conservation checks.

mod bundle;
mod conservation;

pub use bundle::{
    normalize_for_hash, reproducibility_hash, verify_bundle_hash, AuditBundle,
    VerificationResult, VerifyError, BUNDLE_VERSION,
};
pub use conservation::{conservation_report, AssetImbalance};
