//! Asset identifiers, name decoding, and the per-transaction asset catalog.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Display symbol of the native currency.
pub const ADA_SYMBOL: &str = "ADA";
pub const ADA_DECIMALS: u32 = 6;

/// Identifies an asset within a ledger. Tokens are keyed by policy id and hex
/// name as separate fields, so a policy id can never collide with a name.
///
/// Serialized as `ADA` or `<policy_id>.<hex_name>` so it can key JSON maps.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetId {
    Native,
    Token {
        policy_id: String,
        asset_name: String,
    },
}

impl AssetId {
    pub fn token(policy_id: impl Into<String>, asset_name: impl Into<String>) -> Self {
        AssetId::Token {
            policy_id: policy_id.into(),
            asset_name: asset_name.into(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }

    /// Policy id; empty for the native currency.
    pub fn token_mint(&self) -> &str {
        match self {
            AssetId::Native => "",
            AssetId::Token { policy_id, .. } => policy_id,
        }
    }

    /// Hex asset name, or [`ADA_SYMBOL`] for the native currency.
    pub fn token_symbol(&self) -> &str {
        match self {
            AssetId::Native => ADA_SYMBOL,
            AssetId::Token { asset_name, .. } => asset_name,
        }
    }

    /// Token-list subject (policy id followed by hex name). `None` for ADA.
    pub fn subject(&self) -> Option<String> {
        match self {
            AssetId::Native => None,
            AssetId::Token {
                policy_id,
                asset_name,
            } => Some(format!("{}{}", policy_id, asset_name)),
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => f.write_str(ADA_SYMBOL),
            AssetId::Token {
                policy_id,
                asset_name,
            } => write!(f, "{}.{}", policy_id, asset_name),
        }
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == ADA_SYMBOL {
            return Ok(AssetId::Native);
        }
        match s.split_once('.') {
            Some((policy_id, asset_name)) if !policy_id.is_empty() => {
                Ok(AssetId::token(policy_id, asset_name))
            }
            _ => Err(de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"ADA or <policy_id>.<hex_name>",
            )),
        }
    }
}

/// Turns a hex asset name into a display string. Must never fail.
pub trait AssetNameDecoder: Send + Sync {
    fn decode(&self, hex_name: &str) -> String;
}

/// Hex decode followed by strict UTF-8; anything invalid becomes `""`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8HexDecoder;

impl AssetNameDecoder for Utf8HexDecoder {
    fn decode(&self, hex_name: &str) -> String {
        decode_asset_name(hex_name)
    }
}

pub fn decode_asset_name(hex_name: &str) -> String {
    let bytes = match hex::decode(hex_name) {
        Ok(b) => b,
        Err(e) => {
            debug!(hex_name, error = %e, "asset name is not hex");
            return String::new();
        }
    };
    String::from_utf8(bytes).unwrap_or_else(|_| {
        debug!(hex_name, "asset name is not utf-8");
        String::new()
    })
}

/// Catalog entry for a token seen in a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub policy_id: String,
    /// Raw hex name.
    pub name: String,
    /// Decoded display name, empty when the name is not valid text.
    pub symbol: String,
    pub decimals: u32,
}

/// Tokens seen in one transaction, keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCatalog {
    assets: BTreeMap<AssetId, AssetInfo>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token if unseen. The first sighting wins.
    pub fn register(
        &mut self,
        id: &AssetId,
        decimals: u32,
        decoder: &dyn AssetNameDecoder,
    ) -> &AssetInfo {
        self.assets.entry(id.clone()).or_insert_with(|| {
            let name = id.token_symbol().to_string();
            AssetInfo {
                policy_id: id.token_mint().to_string(),
                symbol: decoder.decode(&name),
                name,
                decimals,
            }
        })
    }

    pub fn get(&self, id: &AssetId) -> Option<&AssetInfo> {
        self.assets.get(id)
    }

    /// Price-lookup symbol: `ADA` for the native currency, else the decoded name.
    pub fn display_symbol(&self, id: &AssetId) -> Option<&str> {
        match id {
            AssetId::Native => Some(ADA_SYMBOL),
            token => self
                .assets
                .get(token)
                .map(|a| a.symbol.as_str())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, &AssetInfo)> {
        self.assets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_valid_utf8() {
        assert_eq!(decode_asset_name("4d494e"), "MIN");
        assert_eq!(decode_asset_name(""), "");
    }

    #[test]
    fn decode_invalid_is_empty_and_stable() {
        // 0xff 0xfe is not valid UTF-8
        assert_eq!(decode_asset_name("fffe"), "");
        assert_eq!(decode_asset_name("fffe"), decode_asset_name("fffe"));
        assert_eq!(decode_asset_name("zz"), "");
        assert_eq!(decode_asset_name("abc"), "");
    }

    #[test]
    fn native_accessors() {
        assert_eq!(AssetId::Native.token_mint(), "");
        assert_eq!(AssetId::Native.token_symbol(), ADA_SYMBOL);
        assert_eq!(AssetId::Native.subject(), None);
        let t = AssetId::token("p1", "4d494e");
        assert_eq!(t.subject().as_deref(), Some("p14d494e"));
    }

    #[test]
    fn hyphenated_policy_does_not_collide() {
        let a = AssetId::token("ab-cd", "ef");
        let b = AssetId::token("ab", "cd-ef");
        assert_ne!(a, b);
    }

    #[test]
    fn asset_id_as_json_key() {
        let map = BTreeMap::from([
            (AssetId::Native, 1),
            (AssetId::token("p1", ""), 2),
            (AssetId::token("p1", "4d"), 3),
        ]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"ADA":1,"p1.":2,"p1.4d":3}"#);
        let back: BTreeMap<AssetId, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
        assert!(serde_json::from_str::<AssetId>(r#""nodot""#).is_err());
    }

    #[test]
    fn catalog_first_sighting_wins() {
        let mut catalog = AssetCatalog::new();
        let id = AssetId::token("p", "4d494e");
        catalog.register(&id, 6, &Utf8HexDecoder);
        catalog.register(&id, 0, &Utf8HexDecoder);
        let info = catalog.get(&id).unwrap();
        assert_eq!(info.decimals, 6);
        assert_eq!(info.symbol, "MIN");
        assert_eq!(catalog.display_symbol(&AssetId::Native), Some("ADA"));
        assert_eq!(catalog.display_symbol(&id), Some("MIN"));
    }
}
