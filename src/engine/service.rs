//! Facade combining the ledger, ranking, and broadcast paths

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use super::ledger::Ledger;
use super::ranking::RankingEngine;
use crate::broadcast::broadcaster::Broadcaster;
use crate::broadcast::hub::{BroadcastHub, Subscription};
use crate::common::channels::create_change_channel;
use crate::common::errors::Result;
use crate::common::traits::{PriceSource, StandingsPoller};
use crate::common::types::{
    AccountId, PortfolioSummary, Side, StandingsSnapshot, Transaction,
};
use crate::config::types::AppConfig;

/// The engine's surface for external collaborators
///
/// Route handlers and other web plumbing call into this and render the
/// results; nothing outside this type touches the ledger directly.
pub struct TradingService {
    ledger: Arc<Ledger>,
    prices: Arc<dyn PriceSource>,
    hub: Arc<BroadcastHub>,
    starting_cash: Decimal,
    standings_limit: usize,
    broadcaster: JoinHandle<()>,
}

impl TradingService {
    /// Wire up the ledger, broadcast hub, and re-ranking task
    pub fn new(config: &AppConfig, prices: Arc<dyn PriceSource>) -> Self {
        let (events_tx, events_rx) = create_change_channel();
        let ledger = Arc::new(Ledger::new(&config.engine, events_tx));
        let hub = Arc::new(BroadcastHub::new(config.broadcast.subscriber_buffer));

        let broadcaster = Broadcaster::new(
            ledger.clone(),
            prices.clone(),
            hub.clone(),
            Duration::from_millis(config.broadcast.coalesce_ms),
            config.engine.starting_cash,
        );
        let broadcaster = tokio::spawn(broadcaster.run(events_rx));

        info!("Trading service initialized");
        Self {
            ledger,
            prices,
            hub,
            starting_cash: config.engine.starting_cash,
            standings_limit: config.engine.standings_limit,
            broadcaster,
        }
    }

    /// Open an account with the starting balance; idempotent
    pub async fn open_account(&self, account: AccountId) -> Result<()> {
        self.ledger.open_account(account).await.map(|_| ())
    }

    /// Execute a trade at the price source's current price
    ///
    /// Fails with one of `InsufficientFunds`, `InsufficientShares`,
    /// `PositionNotFound`, `PriceUnavailable`, or `Busy`; failures are
    /// terminal for the request, the caller decides whether to retry.
    #[instrument(skip(self), fields(account = %account, symbol = %symbol))]
    pub async fn place_order(
        &self,
        account: AccountId,
        symbol: &str,
        side: Side,
        shares: u64,
    ) -> Result<Transaction> {
        let price = self.prices.price(symbol)?;
        let order = crate::common::types::Order::new(account, symbol, side, shares, price);
        self.ledger.execute(order).await
    }

    /// One account's portfolio priced at current market
    pub async fn portfolio(&self, account: &AccountId) -> Result<PortfolioSummary> {
        let snapshot = self.ledger.snapshot(account).await?;
        RankingEngine::portfolio_summary(&snapshot, self.prices.as_ref(), self.starting_cash)
    }

    /// Point-in-time standings pull, limited to the configured entry count
    pub async fn standings(&self) -> Result<StandingsSnapshot> {
        self.standings_with_limit(self.standings_limit).await
    }

    /// Point-in-time standings pull with an explicit limit
    pub async fn standings_with_limit(&self, limit: usize) -> Result<StandingsSnapshot> {
        let accounts = self.ledger.snapshot_all().await;
        let snapshot =
            RankingEngine::compute_standings(&accounts, self.prices.as_ref(), self.starting_cash)?;
        Ok(snapshot.truncated(limit))
    }

    /// One account's rank plus the total ranked count
    pub async fn user_rank(&self, account: &AccountId) -> Result<Option<(u32, usize)>> {
        let accounts = self.ledger.snapshot_all().await;
        let snapshot =
            RankingEngine::compute_standings(&accounts, self.prices.as_ref(), self.starting_cash)?;
        Ok(RankingEngine::user_rank(&snapshot, account))
    }

    /// Long-lived push subscription to standings snapshots
    ///
    /// Emits the latest snapshot immediately if one exists, then one per
    /// change.
    pub async fn subscribe_standings(&self) -> Subscription {
        self.hub.subscribe().await
    }

    /// Most recent transactions for one account, newest first
    pub async fn recent_transactions(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Vec<Transaction> {
        self.ledger.recent_transactions(account, limit).await
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }
}

impl Drop for TradingService {
    fn drop(&mut self) {
        self.broadcaster.abort();
    }
}

#[async_trait]
impl StandingsPoller for TradingService {
    async fn poll_standings(&self) -> Result<StandingsSnapshot> {
        self.standings().await
    }
}
