use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{HypercopyError, Result};
use crate::symbol::coin_of;

/// Wire position and precision of one perpetual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetInfo {
    pub index: u32,
    pub sz_decimals: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniverseEntry {
    name: String,
    sz_decimals: u32,
    #[serde(default)]
    is_delisted: bool,
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    universe: Vec<UniverseEntry>,
}

/// Static market metadata loaded from the `meta` info request.
///
/// This is instrument reference data, not account state.
#[derive(Debug, Clone, Default)]
pub struct AssetDirectory {
    by_coin: HashMap<String, AssetInfo>,
}

impl AssetDirectory {
    pub fn from_meta(value: serde_json::Value) -> Result<Self> {
        let meta: MetaResponse = serde_json::from_value(value)?;
        if meta.universe.is_empty() {
            return Err(HypercopyError::Internal("venue meta has an empty universe".into()));
        }
        let by_coin = meta
            .universe
            .into_iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_delisted)
            .map(|(index, entry)| {
                (
                    entry.name,
                    AssetInfo {
                        index: index as u32,
                        sz_decimals: entry.sz_decimals,
                    },
                )
            })
            .collect();
        Ok(Self { by_coin })
    }

    pub fn from_assets<I, S>(assets: I) -> Self
    where
        I: IntoIterator<Item = (S, AssetInfo)>,
        S: Into<String>,
    {
        Self {
            by_coin: assets.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Look up a venue symbol (`BTC/USDC:USDC`) or bare coin (`BTC`).
    pub fn get(&self, symbol: &str) -> Option<AssetInfo> {
        self.by_coin.get(coin_of(symbol)).copied()
    }

    pub fn require(&self, symbol: &str) -> Result<AssetInfo> {
        self.get(symbol)
            .ok_or_else(|| HypercopyError::SymbolUnavailable(symbol.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_coin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_coin.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AssetDirectory {
        AssetDirectory::from_meta(json!({
            "universe": [
                {"name": "BTC", "szDecimals": 5, "maxLeverage": 50},
                {"name": "ETH", "szDecimals": 4, "maxLeverage": 50},
                {"name": "OLD", "szDecimals": 0, "isDelisted": true},
                {"name": "kPEPE", "szDecimals": 0, "maxLeverage": 10}
            ]
        }))
        .expect("meta")
    }

    #[test]
    fn asset_index_is_universe_position() {
        let assets = sample();
        assert_eq!(
            assets.get("BTC/USDC:USDC"),
            Some(AssetInfo {
                index: 0,
                sz_decimals: 5
            })
        );
        assert_eq!(assets.get("kPEPE/USDC:USDC").map(|a| a.index), Some(3));
        assert_eq!(assets.get("ETH").map(|a| a.sz_decimals), Some(4));
    }

    #[test]
    fn delisted_and_unknown_coins_are_unavailable() {
        let assets = sample();
        assert!(assets.get("OLD/USDC:USDC").is_none());
        assert!(matches!(
            assets.require("NOPE/USDC:USDC"),
            Err(HypercopyError::SymbolUnavailable(_))
        ));
        assert_eq!(assets.len(), 3);
    }
}
