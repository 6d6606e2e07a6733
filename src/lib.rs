//! papertrade
//!
//! A simulated stock-trading engine: accounts hold virtual cash, buy and
//! sell instruments at externally supplied prices using average-cost
//! accounting, and are ranked against each other on a live-streamed
//! leaderboard.

pub mod broadcast;
pub mod common;
pub mod config;
pub mod engine;

// Re-export commonly used types
pub use broadcast::{
    BroadcastHub, Broadcaster, ControlMessage, HubStats, LeaderboardFrame, ReconnectPolicy,
    SessionEvent, SessionFsm, SessionState, StandingsStreamClient, Subscription,
};
pub use common::errors::{EngineError, Result};
pub use common::traits::{InMemoryPriceSource, PriceSource, StandingsPoller};
pub use common::types::{
    AccountChanged, AccountId, AccountSnapshot, Order, PortfolioSummary, Position, Side,
    StandingsEntry, StandingsSnapshot, Transaction, STARTING_CASH,
};
pub use config::types::AppConfig;
pub use engine::{AccountingPolicy, Ledger, RankingEngine, TradingService};
