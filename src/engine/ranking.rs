//! Deterministic standings computation

use rust_decimal::Decimal;

use crate::common::errors::Result;
use crate::common::traits::PriceSource;
use crate::common::types::{
    AccountId, AccountSnapshot, PortfolioSummary, StandingsEntry, StandingsSnapshot,
};

/// Derives ranked standings from account snapshots plus current prices
///
/// Pure functions of their inputs: calling them twice with unchanged
/// inputs yields identical results, including rank order.
pub struct RankingEngine;

impl RankingEngine {
    /// Produce an ordered standings snapshot
    ///
    /// Sorted descending by portfolio value; exact ties break by earliest
    /// account creation, making the ordering total. Ranks are 1-based and
    /// contiguous. A missing price fails the whole computation with
    /// `PriceUnavailable` rather than ranking on partial values.
    pub fn compute_standings(
        accounts: &[AccountSnapshot],
        prices: &dyn PriceSource,
        starting_cash: Decimal,
    ) -> Result<StandingsSnapshot> {
        let mut scored: Vec<(u64, StandingsEntry)> = Vec::with_capacity(accounts.len());

        for account in accounts {
            let positions_value = Self::positions_value(account, prices)?;
            let portfolio_value = account.cash + positions_value;
            let total_return = portfolio_value - starting_cash;
            let total_return_percent = if starting_cash > Decimal::ZERO {
                total_return / starting_cash * Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            };

            scored.push((
                account.created_seq,
                StandingsEntry {
                    rank: 0,
                    account: account.account.clone(),
                    portfolio_value,
                    cash: account.cash,
                    total_return,
                    total_return_percent,
                    active_positions: account.active_positions(),
                },
            ));
        }

        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.portfolio_value
                .cmp(&a.portfolio_value)
                .then(seq_a.cmp(seq_b))
        });

        let entries = scored
            .into_iter()
            .enumerate()
            .map(|(i, (_, mut entry))| {
                entry.rank = (i + 1) as u32;
                entry
            })
            .collect();

        Ok(StandingsSnapshot { entries })
    }

    /// Price one account's full portfolio
    pub fn portfolio_summary(
        account: &AccountSnapshot,
        prices: &dyn PriceSource,
        starting_cash: Decimal,
    ) -> Result<PortfolioSummary> {
        let positions_value = Self::positions_value(account, prices)?;
        let invested_value = account.invested_value();
        let portfolio_value = account.cash + positions_value;
        let total_return = portfolio_value - starting_cash;
        let total_return_percent = if starting_cash > Decimal::ZERO {
            total_return / starting_cash * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Ok(PortfolioSummary {
            account: account.account.clone(),
            cash: account.cash,
            positions: account.positions.clone(),
            positions_value,
            invested_value,
            portfolio_value,
            total_return,
            total_return_percent,
            active_positions: account.active_positions(),
        })
    }

    /// One account's rank plus the total ranked count
    pub fn user_rank(snapshot: &StandingsSnapshot, account: &AccountId) -> Option<(u32, usize)> {
        snapshot
            .entry_for(account)
            .map(|entry| (entry.rank, snapshot.len()))
    }

    fn positions_value(account: &AccountSnapshot, prices: &dyn PriceSource) -> Result<Decimal> {
        let mut value = Decimal::ZERO;
        for position in &account.positions {
            value += position.market_value(prices.price(&position.symbol)?);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::InMemoryPriceSource;
    use crate::common::types::{Position, STARTING_CASH};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn account(id: &str, seq: u64, cash: Decimal, positions: Vec<Position>) -> AccountSnapshot {
        AccountSnapshot {
            account: AccountId::from(id),
            cash,
            positions,
            created_seq: seq,
            opened_at: Utc::now(),
        }
    }

    fn prices() -> InMemoryPriceSource {
        let source = InMemoryPriceSource::new();
        source.set_price("TCS", dec!(3300.00));
        source.set_price("INFY", dec!(1500.00));
        source
    }

    #[test]
    fn test_standings_order_and_metrics() {
        let accounts = vec![
            account("flat", 0, dec!(100000.00), vec![]),
            account(
                "winner",
                1,
                dec!(67495.00),
                vec![Position::new("TCS", 10, dec!(3250.50))],
            ),
            account("loser", 2, dec!(90000.00), vec![]),
        ];
        let snapshot =
            RankingEngine::compute_standings(&accounts, &prices(), STARTING_CASH).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.entries[0].account, AccountId::from("winner"));
        assert_eq!(snapshot.entries[0].portfolio_value, dec!(100495.00));
        assert_eq!(snapshot.entries[0].total_return, dec!(495.00));
        assert_eq!(snapshot.entries[0].total_return_percent, dec!(0.495));
        assert_eq!(snapshot.entries[1].account, AccountId::from("flat"));
        assert_eq!(snapshot.entries[2].account, AccountId::from("loser"));
    }

    #[test]
    fn test_ranks_are_contiguous_with_tie_break() {
        // Two accounts with identical value: the earlier-created one wins,
        // and no rank is shared or skipped.
        let accounts = vec![
            account("late", 5, dec!(100000.00), vec![]),
            account("early", 1, dec!(100000.00), vec![]),
            account("rich", 2, dec!(200000.00), vec![]),
        ];
        let snapshot =
            RankingEngine::compute_standings(&accounts, &prices(), STARTING_CASH).unwrap();

        let order: Vec<(&str, u32)> = snapshot
            .entries
            .iter()
            .map(|e| (e.account.as_str(), e.rank))
            .collect();
        assert_eq!(order, vec![("rich", 1), ("early", 2), ("late", 3)]);
    }

    #[test]
    fn test_idempotent_ranking() {
        let accounts = vec![
            account("a", 0, dec!(50000.00), vec![Position::new("INFY", 30, dec!(1400.00))]),
            account("b", 1, dec!(100000.00), vec![]),
        ];
        let prices = prices();
        let first = RankingEngine::compute_standings(&accounts, &prices, STARTING_CASH).unwrap();
        let second = RankingEngine::compute_standings(&accounts, &prices, STARTING_CASH).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_price_fails_whole_computation() {
        let accounts = vec![account(
            "a",
            0,
            dec!(1000.00),
            vec![Position::new("UNPRICED", 1, dec!(10.00))],
        )];
        let result = RankingEngine::compute_standings(&accounts, &prices(), STARTING_CASH);
        assert!(matches!(
            result,
            Err(crate::common::errors::EngineError::PriceUnavailable(_))
        ));
    }

    #[test]
    fn test_portfolio_summary() {
        let snapshot = account(
            "u1",
            0,
            dec!(67495.00),
            vec![Position::new("TCS", 10, dec!(3250.50))],
        );
        let summary =
            RankingEngine::portfolio_summary(&snapshot, &prices(), STARTING_CASH).unwrap();

        assert_eq!(summary.positions_value, dec!(33000.00));
        assert_eq!(summary.invested_value, dec!(32505.00));
        assert_eq!(summary.portfolio_value, dec!(100495.00));
        assert_eq!(summary.total_return, dec!(495.00));
        assert_eq!(summary.active_positions, 1);
    }

    #[test]
    fn test_user_rank_lookup() {
        let accounts = vec![
            account("a", 0, dec!(90000.00), vec![]),
            account("b", 1, dec!(110000.00), vec![]),
        ];
        let snapshot =
            RankingEngine::compute_standings(&accounts, &prices(), STARTING_CASH).unwrap();

        assert_eq!(
            RankingEngine::user_rank(&snapshot, &AccountId::from("a")),
            Some((2, 2))
        );
        assert_eq!(
            RankingEngine::user_rank(&snapshot, &AccountId::from("missing")),
            None
        );
    }
}
