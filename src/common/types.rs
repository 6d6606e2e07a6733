//! Core domain types shared across the engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cash balance every account starts with: 100,000.00
pub const STARTING_CASH: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 2);

/// Opaque account identifier supplied by the identity layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        AccountId(s)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A trade intent consumed by `Ledger::execute`
///
/// Ephemeral: a successful execution produces a [`Transaction`] record,
/// the order itself is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub account: AccountId,
    pub symbol: String,
    pub side: Side,
    /// Number of shares, must be positive
    pub shares: u64,
    /// Externally supplied execution price, must be positive
    pub execution_price: Decimal,
}

impl Order {
    pub fn new(
        account: AccountId,
        symbol: impl Into<String>,
        side: Side,
        shares: u64,
        execution_price: Decimal,
    ) -> Self {
        Self {
            account,
            symbol: symbol.into(),
            side,
            shares,
            execution_price,
        }
    }

    /// Check the order preconditions: positive share count and price
    pub fn validate(&self) -> crate::common::errors::Result<()> {
        use crate::common::errors::EngineError;

        if self.symbol.is_empty() {
            return Err(EngineError::InvalidOrder("empty symbol".to_string()));
        }
        if self.shares == 0 {
            return Err(EngineError::InvalidOrder(
                "share count must be positive".to_string(),
            ));
        }
        if self.execution_price <= Decimal::ZERO {
            return Err(EngineError::InvalidOrder(format!(
                "execution price must be positive, got {}",
                self.execution_price
            )));
        }
        Ok(())
    }
}

/// A user's current holding in one symbol
///
/// `average_cost` is the blended per-share cost basis. It is defined only
/// while `shares > 0`; a position whose share count reaches zero is removed
/// from the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    pub average_cost: Decimal,
}

impl Position {
    pub fn new(symbol: impl Into<String>, shares: u64, average_cost: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            average_cost,
        }
    }

    /// Total cost basis of this position (`shares * average_cost`)
    pub fn cost_basis(&self) -> Decimal {
        Decimal::from(self.shares) * self.average_cost
    }

    /// Market value of this position at the given price
    pub fn market_value(&self, price: Decimal) -> Decimal {
        Decimal::from(self.shares) * price
    }
}

/// An immutable record of one successful execution
///
/// Appended to the ledger's history exactly once; never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account: AccountId,
    pub symbol: String,
    pub side: Side,
    pub shares: u64,
    pub price: Decimal,
    pub total_amount: Decimal,
    /// Realized gain/loss on a SELL: `(price - average_cost) * shares`.
    /// Reported but not stored back into the position. Absent on BUY.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_gain: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Read-only view of one account, taken under its execution lock
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub account: AccountId,
    pub cash: Decimal,
    /// Positions sorted by symbol for deterministic iteration
    pub positions: Vec<Position>,
    /// Monotonic creation sequence, used as the deterministic rank tie-break
    pub created_seq: u64,
    pub opened_at: DateTime<Utc>,
}

impl AccountSnapshot {
    /// Total cost basis across all positions
    pub fn invested_value(&self) -> Decimal {
        self.positions.iter().map(|p| p.cost_basis()).sum()
    }

    /// Number of positions with a non-zero share count
    pub fn active_positions(&self) -> usize {
        self.positions.iter().filter(|p| p.shares > 0).count()
    }
}

/// Full portfolio view for one account, priced at current market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub account: AccountId,
    pub cash: Decimal,
    pub positions: Vec<Position>,
    /// Market value of all positions
    pub positions_value: Decimal,
    /// Total cost basis of all positions
    pub invested_value: Decimal,
    /// Cash plus positions value
    pub portfolio_value: Decimal,
    /// Performance versus starting cash
    pub total_return: Decimal,
    pub total_return_percent: Decimal,
    pub active_positions: usize,
}

/// One ranked row in a standings snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsEntry {
    /// 1-based, contiguous rank
    pub rank: u32,
    pub account: AccountId,
    pub portfolio_value: Decimal,
    pub cash: Decimal,
    pub total_return: Decimal,
    pub total_return_percent: Decimal,
    pub active_positions: usize,
}

/// A ranked, point-in-time view of all accounts' portfolio values
///
/// Derived and ephemeral: recomputed on demand from accounts plus current
/// prices, never stored as the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsSnapshot {
    pub entries: Vec<StandingsEntry>,
}

impl StandingsSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for a specific account
    pub fn entry_for(&self, account: &AccountId) -> Option<&StandingsEntry> {
        self.entries.iter().find(|e| &e.account == account)
    }

    /// Copy of this snapshot limited to the top `limit` entries
    pub fn truncated(&self, limit: usize) -> StandingsSnapshot {
        StandingsSnapshot {
            entries: self.entries.iter().take(limit).cloned().collect(),
        }
    }
}

/// Notification that an account committed a mutation, used to trigger
/// re-ranking. Emitted only after a successful commit, never on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountChanged {
    pub account: AccountId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_starting_cash_constant() {
        assert_eq!(STARTING_CASH, dec!(100000.00));
    }

    #[test]
    fn test_order_validation() {
        let order = Order::new(AccountId::from("u1"), "TCS", Side::Buy, 10, dec!(3250.50));
        assert!(order.validate().is_ok());

        let zero_shares = Order::new(AccountId::from("u1"), "TCS", Side::Buy, 0, dec!(10));
        assert!(zero_shares.validate().is_err());

        let bad_price = Order::new(AccountId::from("u1"), "TCS", Side::Sell, 1, dec!(0));
        assert!(bad_price.validate().is_err());

        let no_symbol = Order::new(AccountId::from("u1"), "", Side::Buy, 1, dec!(10));
        assert!(no_symbol.validate().is_err());
    }

    #[test]
    fn test_position_valuation() {
        let pos = Position::new("TCS", 10, dec!(3250.50));
        assert_eq!(pos.cost_basis(), dec!(32505.00));
        assert_eq!(pos.market_value(dec!(3300.00)), dec!(33000.00));
    }

    #[test]
    fn test_side_serde_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
        let side: Side = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(side, Side::Sell);
    }

    #[test]
    fn test_snapshot_lookup_and_truncate() {
        let entry = |rank: u32, id: &str| StandingsEntry {
            rank,
            account: AccountId::from(id),
            portfolio_value: dec!(100000.00),
            cash: dec!(100000.00),
            total_return: dec!(0),
            total_return_percent: dec!(0),
            active_positions: 0,
        };
        let snapshot = StandingsSnapshot {
            entries: vec![entry(1, "a"), entry(2, "b"), entry(3, "c")],
        };

        assert_eq!(
            snapshot.entry_for(&AccountId::from("b")).unwrap().rank,
            2
        );
        assert!(snapshot.entry_for(&AccountId::from("z")).is_none());
        assert_eq!(snapshot.truncated(2).len(), 2);
        assert_eq!(snapshot.truncated(10).len(), 3);
    }
}
