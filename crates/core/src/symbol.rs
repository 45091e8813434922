//! Ticker symbols and watchlist normalization.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Watchlist seeded on first run: 50 large, stable S&P 500 names.
pub const DEFAULT_WATCHLIST: [&str; 50] = [
    // Tech
    "AAPL", "MSFT", "GOOGL", "META", "NVDA", "TSLA", "ORCL", "CRM", "ADBE", "INTC",
    // Finance
    "JPM", "BAC", "WFC", "GS", "MS", "BLK", "AXP", "USB", "PNC", "COF",
    // Healthcare
    "UNH", "JNJ", "PFE", "ABBV", "TMO", "MDT", "LLY", "BMY", "AMGN", "GILD",
    // Consumer
    "AMZN", "WMT", "HD", "PG", "KO", "PEP", "NKE", "MCD", "SBUX", "TGT",
    // Industrials
    "BA", "CAT", "MMM", "GE", "HON", "UPS", "LMT", "RTX", "DE", "EMR",
];

/// Uppercase ticker symbol (e.g. "AAPL").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(CompactString);

impl Symbol {
    /// Normalize raw user input into a symbol.
    /// Returns None if nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(CompactString::from(trimmed.to_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Normalize a list of raw symbols into a watchlist.
///
/// Each entry is trimmed and uppercased, empty entries are dropped and
/// duplicates collapse to one. The result is sorted.
pub fn normalize_symbols<S: AsRef<str>>(raw: &[S]) -> Vec<Symbol> {
    raw.iter()
        .filter_map(|s| Symbol::parse(s.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The built-in default watchlist as symbols.
pub fn default_watchlist() -> Vec<Symbol> {
    DEFAULT_WATCHLIST
        .iter()
        .filter_map(|s| Symbol::parse(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_symbol_parse_trims_and_uppercases() {
        let symbol = Symbol::parse("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(symbol.to_string(), "AAPL");
    }

    #[test]
    fn test_symbol_parse_rejects_blank() {
        assert!(Symbol::parse("").is_none());
        assert!(Symbol::parse("   ").is_none());
    }

    #[test]
    fn test_normalize_collapses_duplicates() {
        let symbols = normalize_symbols(&["aapl ", "AAPL"]);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].as_str(), "AAPL");
    }

    #[test]
    fn test_normalize_is_order_independent() {
        let a = normalize_symbols(&["msft", "aapl", " ", "MSFT"]);
        let b = normalize_symbols(&["AAPL", "Msft"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_watchlist_is_unique() {
        let defaults = default_watchlist();
        assert_eq!(defaults.len(), 50);
        assert_eq!(normalize_symbols(&DEFAULT_WATCHLIST).len(), 50);
    }

    #[test]
    fn test_symbol_serializes_as_string() {
        let symbol = Symbol::parse("nvda").unwrap();
        assert_eq!(serde_json::to_string(&symbol).unwrap(), "\"NVDA\"");
    }
}
