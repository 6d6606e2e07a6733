//! Bridges ledger change events to standings publishes

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use super::hub::BroadcastHub;
use crate::common::errors::EngineError;
use crate::common::traits::PriceSource;
use crate::common::types::AccountChanged;
use crate::engine::ledger::Ledger;
use crate::engine::ranking::RankingEngine;

/// Drives one re-ranking cycle per burst of account changes
///
/// Bursts of trades are coalesced: after the first change event the
/// broadcaster waits out a short quiet window, drains everything that
/// arrived meanwhile, and recomputes once. A `PriceUnavailable` failure
/// skips the cycle so subscribers keep the last good snapshot instead of
/// seeing partial values.
pub struct Broadcaster {
    ledger: Arc<Ledger>,
    prices: Arc<dyn PriceSource>,
    hub: Arc<BroadcastHub>,
    coalesce: Duration,
    starting_cash: Decimal,
}

impl Broadcaster {
    pub fn new(
        ledger: Arc<Ledger>,
        prices: Arc<dyn PriceSource>,
        hub: Arc<BroadcastHub>,
        coalesce: Duration,
        starting_cash: Decimal,
    ) -> Self {
        Self {
            ledger,
            prices,
            hub,
            coalesce,
            starting_cash,
        }
    }

    /// Consume change events until the channel closes
    #[instrument(skip(self, events))]
    pub async fn run(self, mut events: mpsc::Receiver<AccountChanged>) {
        info!("Broadcaster started");

        while let Some(first) = events.recv().await {
            debug!("Re-rank triggered by account {}", first.account);

            // Coalesce the burst: wait out the quiet window, then drain
            // whatever else arrived.
            if !self.coalesce.is_zero() {
                sleep(self.coalesce).await;
            }
            let mut coalesced = 0usize;
            while events.try_recv().is_ok() {
                coalesced += 1;
            }
            if coalesced > 0 {
                debug!("Coalesced {} additional change events", coalesced);
            }

            self.rerank_and_publish().await;
        }

        info!("Broadcaster stopped: change channel closed");
    }

    async fn rerank_and_publish(&self) {
        let accounts = self.ledger.snapshot_all().await;
        match RankingEngine::compute_standings(&accounts, self.prices.as_ref(), self.starting_cash)
        {
            Ok(snapshot) => {
                let delivered = self.hub.publish(snapshot).await;
                debug!("Published standings to {} subscribers", delivered);
            }
            Err(EngineError::PriceUnavailable(symbol)) => {
                // Stale snapshot retained; next change event retries
                warn!(
                    "Skipping ranking cycle, price unavailable for {}",
                    symbol
                );
            }
            Err(e) => {
                error!("Standings computation failed: {}", e);
            }
        }
    }
}
