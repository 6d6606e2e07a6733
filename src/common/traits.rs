//! Trait definitions for external collaborators

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

use super::errors::{EngineError, Result};
use super::types::StandingsSnapshot;

/// Source of current market prices
///
/// Supplied by an external collaborator; the engine treats it as a pure
/// lookup. A missing or non-positive price surfaces as
/// [`EngineError::PriceUnavailable`], never a silent default.
pub trait PriceSource: Send + Sync {
    /// Current price for an instrument symbol
    fn price(&self, symbol: &str) -> Result<Decimal>;
}

/// Point-in-time standings provider used by sessions that have fallen
/// back from streaming to polling.
#[async_trait::async_trait]
pub trait StandingsPoller: Send + Sync {
    async fn poll_standings(&self) -> Result<StandingsSnapshot>;
}

/// Simple in-memory price source
///
/// Holds a symbol -> price table behind a read/write lock. Used by the
/// demo binary and tests; production deployments plug in a real feed.
pub struct InMemoryPriceSource {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Update or insert a price
    pub fn set_price(&self, symbol: impl Into<String>, price: Decimal) {
        self.prices
            .write()
            .expect("price table lock poisoned")
            .insert(symbol.into(), price);
    }

    /// Remove a symbol, making its price unavailable
    pub fn remove_price(&self, symbol: &str) {
        self.prices
            .write()
            .expect("price table lock poisoned")
            .remove(symbol);
    }

    /// Number of priced symbols
    pub fn len(&self) -> usize {
        self.prices.read().expect("price table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceSource for InMemoryPriceSource {
    fn price(&self, symbol: &str) -> Result<Decimal> {
        let prices = self.prices.read().expect("price table lock poisoned");
        match prices.get(symbol) {
            Some(price) if *price > Decimal::ZERO => Ok(*price),
            _ => Err(EngineError::PriceUnavailable(symbol.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_lookup() {
        let source = InMemoryPriceSource::new();
        source.set_price("TCS", dec!(3250.50));

        assert_eq!(source.price("TCS").unwrap(), dec!(3250.50));
        assert!(matches!(
            source.price("INFY"),
            Err(EngineError::PriceUnavailable(_))
        ));
    }

    #[test]
    fn test_non_positive_price_is_unavailable() {
        let source = InMemoryPriceSource::new();
        source.set_price("BAD", dec!(0));
        assert!(source.price("BAD").is_err());
    }

    #[test]
    fn test_removed_price_is_unavailable() {
        let source = InMemoryPriceSource::new();
        source.set_price("TCS", dec!(3250.50));
        source.remove_price("TCS");
        assert!(source.price("TCS").is_err());
    }
}
