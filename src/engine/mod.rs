//! Order execution, position accounting, and ranking
//!
//! # Architecture
//!
//! ```text
//! place_order ──> Ledger::execute ──> AccountingPolicy (pure math)
//!                      │
//!                      └─ AccountChanged event ──> Broadcaster
//!                                                      │
//!                     RankingEngine::compute_standings ◄┘
//! ```
//!
//! The [`Ledger`] is the single point of truth for cash and positions;
//! [`AccountingPolicy`] holds the stateless average-cost math;
//! [`RankingEngine`] derives standings; [`TradingService`] is the facade
//! external collaborators call.

pub mod ledger;
pub mod policy;
pub mod ranking;
pub mod service;

pub use ledger::Ledger;
pub use policy::{AccountingPolicy, BuyOutcome, SellOutcome};
pub use ranking::RankingEngine;
pub use service::TradingService;
