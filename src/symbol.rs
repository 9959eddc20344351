//! External to venue instrument identifiers.
//!
//! Signals quote perpetuals against USDT (`BTC/USDT`); the venue settles in
//! USDC and names the same instrument `BTC/USDC:USDC`.

use std::collections::HashMap;

const EXTERNAL_QUOTE: &str = "/USDT";
const VENUE_QUOTE: &str = "/USDC:USDC";

#[derive(Debug, Clone, Default)]
pub struct SymbolNormalizer {
    overrides: HashMap<String, String>,
}

impl SymbolNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides are keyed by the upper-cased external symbol.
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            overrides: overrides
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_ascii_uppercase(), v.into()))
                .collect(),
        }
    }

    /// Map an external symbol to the venue symbol. Total; never fails.
    pub fn normalize(&self, symbol: &str) -> String {
        let key = symbol.trim().to_ascii_uppercase();
        if let Some(mapped) = self.overrides.get(&key) {
            return mapped.clone();
        }
        match key.strip_suffix(EXTERNAL_QUOTE) {
            Some(base) if !base.is_empty() => format!("{base}{VENUE_QUOTE}"),
            _ => key,
        }
    }
}

/// Venue coin name for a venue symbol: the part before `/`.
pub fn coin_of(symbol: &str) -> &str {
    let symbol = symbol.trim();
    symbol.split('/').next().unwrap_or(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usdt_pairs_map_to_usdc_perps() {
        let n = SymbolNormalizer::new();
        assert_eq!(n.normalize("BTC/USDT"), "BTC/USDC:USDC");
        assert_eq!(n.normalize("eth/usdt"), "ETH/USDC:USDC");
        assert_eq!(n.normalize(" SOL/USDT "), "SOL/USDC:USDC");
    }

    #[test]
    fn other_symbols_pass_through() {
        let n = SymbolNormalizer::new();
        assert_eq!(n.normalize("BTC/USDC:USDC"), "BTC/USDC:USDC");
        assert_eq!(n.normalize("BTC"), "BTC");
        assert_eq!(n.normalize("/USDT"), "/USDT");
    }

    #[test]
    fn overrides_take_precedence() {
        let n = SymbolNormalizer::with_overrides([("PEPE/USDT", "kPEPE/USDC:USDC")]);
        assert_eq!(n.normalize("pepe/usdt"), "kPEPE/USDC:USDC");
        assert_eq!(n.normalize("DOGE/USDT"), "DOGE/USDC:USDC");
    }

    #[test]
    fn coin_is_base_asset() {
        assert_eq!(coin_of("BTC/USDC:USDC"), "BTC");
        assert_eq!(coin_of("kPEPE/USDC:USDC"), "kPEPE");
        assert_eq!(coin_of("ETH"), "ETH");
    }
}
