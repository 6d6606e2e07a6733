use rust_decimal::Decimal;

use crate::common::types::Position;

/// Resulting position state after a buy
#[derive(Debug, Clone, PartialEq)]
pub struct BuyOutcome {
    /// Total cash debited: `shares * price`
    pub cost: Decimal,
    /// Share count after the buy
    pub shares: u64,
    /// Blended per-share cost basis after the buy
    pub average_cost: Decimal,
}

/// Resulting position state after a sell
#[derive(Debug, Clone, PartialEq)]
pub struct SellOutcome {
    /// Total cash credited: `shares * price`
    pub proceeds: Decimal,
    /// Share count remaining; zero means the position is removed
    pub remaining_shares: u64,
    /// Realized gain/loss: `(price - average_cost) * shares`
    pub realized_gain: Decimal,
}

/// Average-cost-basis accounting
///
/// Pure, stateless math used by the Ledger. All shares of a symbol share
/// one blended per-share cost, recomputed on every purchase; lot
/// acquisition order is never distinguished (no FIFO/LIFO choice).
///
/// All arithmetic is `rust_decimal` fixed-point. Binary floating point
/// would drift over repeated buy/sell cycles and break the conservation
/// invariant.
pub struct AccountingPolicy;

impl AccountingPolicy {
    /// Cash required to buy `shares` at `price`
    pub fn buy_cost(shares: u64, price: Decimal) -> Decimal {
        Decimal::from(shares) * price
    }

    /// Blend an existing cost basis with a new purchase
    ///
    /// `(old_shares * old_avg + add_shares * price) / (old_shares + add_shares)`
    pub fn blend_average_cost(
        old_shares: u64,
        old_average_cost: Decimal,
        add_shares: u64,
        price: Decimal,
    ) -> Decimal {
        let old_basis = Decimal::from(old_shares) * old_average_cost;
        let added = Decimal::from(add_shares) * price;
        (old_basis + added) / Decimal::from(old_shares + add_shares)
    }

    /// Apply a buy against an optional existing position
    ///
    /// A first purchase opens the position at `average_cost = price`;
    /// a repeat purchase re-blends the basis.
    pub fn apply_buy(existing: Option<&Position>, shares: u64, price: Decimal) -> BuyOutcome {
        let cost = Self::buy_cost(shares, price);
        match existing {
            None => BuyOutcome {
                cost,
                shares,
                average_cost: price,
            },
            Some(position) => BuyOutcome {
                cost,
                shares: position.shares + shares,
                average_cost: Self::blend_average_cost(
                    position.shares,
                    position.average_cost,
                    shares,
                    price,
                ),
            },
        }
    }

    /// Apply a sell against an existing position
    ///
    /// The caller must have verified `position.shares >= shares`. The
    /// remaining shares keep their `average_cost` unchanged; the realized
    /// gain is reported, not stored.
    pub fn apply_sell(position: &Position, shares: u64, price: Decimal) -> SellOutcome {
        let proceeds = Decimal::from(shares) * price;
        let realized_gain = (price - position.average_cost) * Decimal::from(shares);
        SellOutcome {
            proceeds,
            remaining_shares: position.shares - shares,
            realized_gain,
        }
    }
}
