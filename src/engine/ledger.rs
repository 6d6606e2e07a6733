//! The single point of truth for account cash and positions

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::policy::AccountingPolicy;
use crate::common::errors::{EngineError, Result};
use crate::common::types::{
    AccountChanged, AccountId, AccountSnapshot, Order, Position, Side, Transaction,
};
use crate::config::types::EngineConfig;

/// Largest tolerated rounding residue when re-checking the conservation
/// invariant. Blending the average cost divides at Decimal's 28-digit
/// precision, so the recomputed basis can differ from the cash delta by a
/// sub-cent residue.
const CONSERVATION_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 10);

/// Mutable state guarded by one account's execution lock
struct AccountState {
    cash: Decimal,
    positions: HashMap<String, Position>,
    /// Set when an internal-consistency fault halted this account.
    /// A halted account rejects all further mutation.
    halted: Option<String>,
}

impl AccountState {
    fn cost_basis(&self) -> Decimal {
        self.positions.values().map(|p| p.cost_basis()).sum()
    }
}

/// One account's slot: immutable identity plus the serialized state
struct AccountSlot {
    account: AccountId,
    /// Monotonic creation sequence; the deterministic rank tie-break
    created_seq: u64,
    opened_at: chrono::DateTime<chrono::Utc>,
    state: Mutex<AccountState>,
}

/// Owns every account and the append-only transaction history
///
/// Mutation for one account is mutually exclusive: concurrent orders
/// against the same account serialize behind its lock, while orders
/// against different accounts run independently. There is no global
/// lock across the ledger.
pub struct Ledger {
    accounts: RwLock<HashMap<AccountId, Arc<AccountSlot>>>,
    /// Append-only; the ledger is sole writer, readers observe a prefix
    history: RwLock<Vec<Transaction>>,
    next_seq: AtomicU64,
    starting_cash: Decimal,
    lock_wait: Duration,
    events: mpsc::Sender<AccountChanged>,
}

impl Ledger {
    pub fn new(config: &EngineConfig, events: mpsc::Sender<AccountChanged>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            starting_cash: config.starting_cash,
            lock_wait: Duration::from_millis(config.lock_wait_ms),
            events,
        }
    }

    /// Open an account with the starting cash balance and no positions
    ///
    /// Idempotent: an already-open account is returned unchanged.
    /// Accounts are never deleted.
    #[instrument(skip(self))]
    pub async fn open_account(&self, account: AccountId) -> Result<AccountSnapshot> {
        {
            let accounts = self.accounts.read().await;
            if let Some(slot) = accounts.get(&account) {
                debug!("Account {} already open", account);
                return Ok(Self::snapshot_slot(slot, &*slot.state.lock().await));
            }
        }

        let mut accounts = self.accounts.write().await;
        // Re-check under the write lock; another opener may have won
        if let Some(slot) = accounts.get(&account) {
            return Ok(Self::snapshot_slot(slot, &*slot.state.lock().await));
        }

        let slot = Arc::new(AccountSlot {
            account: account.clone(),
            created_seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            opened_at: Utc::now(),
            state: Mutex::new(AccountState {
                cash: self.starting_cash,
                positions: HashMap::new(),
                halted: None,
            }),
        });
        accounts.insert(account.clone(), slot.clone());
        info!("Opened account {} with cash {}", account, self.starting_cash);

        let state = slot.state.lock().await;
        Ok(Self::snapshot_slot(&slot, &state))
    }

    /// Execute a buy or sell order atomically
    ///
    /// Fails with `Busy` if the account's execution slot cannot be
    /// acquired within the bounded wait. Emits an `AccountChanged`
    /// event only after a successful commit.
    #[instrument(skip(self, order), fields(account = %order.account, symbol = %order.symbol, side = %order.side))]
    pub async fn execute(&self, order: Order) -> Result<Transaction> {
        order.validate()?;

        let slot = self.slot(&order.account).await?;
        let mut state = timeout(self.lock_wait, slot.state.lock())
            .await
            .map_err(|_| EngineError::Busy(order.account.clone()))?;

        if let Some(reason) = &state.halted {
            return Err(EngineError::AccountHalted {
                account: order.account.clone(),
                reason: reason.clone(),
            });
        }

        let old_cash = state.cash;
        let old_basis = state.cost_basis();

        let transaction = match order.side {
            Side::Buy => self.apply_buy(&mut state, &order)?,
            Side::Sell => self.apply_sell(&mut state, &order)?,
        };

        if let Err(fault) = Self::check_conservation(&state, old_cash, old_basis, &transaction) {
            // Money appeared or vanished without a matching transaction.
            // Halt the account rather than absorb the fault.
            error!(
                "Conservation fault on account {}: {}",
                order.account, fault
            );
            state.halted = Some(fault.clone());
            return Err(EngineError::AccountHalted {
                account: order.account.clone(),
                reason: fault,
            });
        }

        self.history.write().await.push(transaction.clone());
        drop(state);

        debug!(
            "Executed {} {} x{} @ {} for {}",
            transaction.side,
            transaction.symbol,
            transaction.shares,
            transaction.price,
            transaction.account
        );

        // Best-effort: a full event channel already has a re-rank pending
        match self.events.try_send(AccountChanged {
            account: order.account.clone(),
        }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Account-change channel full, coalescing with pending events");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Account-change channel closed, broadcast disabled");
            }
        }

        Ok(transaction)
    }

    fn apply_buy(&self, state: &mut AccountState, order: &Order) -> Result<Transaction> {
        let required = AccountingPolicy::buy_cost(order.shares, order.execution_price);
        if state.cash < required {
            return Err(EngineError::InsufficientFunds {
                required,
                available: state.cash,
            });
        }

        let outcome = AccountingPolicy::apply_buy(
            state.positions.get(&order.symbol),
            order.shares,
            order.execution_price,
        );
        state.cash -= outcome.cost;
        state.positions.insert(
            order.symbol.clone(),
            Position::new(order.symbol.clone(), outcome.shares, outcome.average_cost),
        );

        Ok(Self::record(order, outcome.cost, None))
    }

    fn apply_sell(&self, state: &mut AccountState, order: &Order) -> Result<Transaction> {
        let position = state
            .positions
            .get(&order.symbol)
            .cloned()
            .ok_or_else(|| EngineError::PositionNotFound(order.symbol.clone()))?;
        if position.shares < order.shares {
            return Err(EngineError::InsufficientShares {
                requested: order.shares,
                held: position.shares,
            });
        }

        let outcome = AccountingPolicy::apply_sell(&position, order.shares, order.execution_price);
        state.cash += outcome.proceeds;
        if outcome.remaining_shares == 0 {
            state.positions.remove(&order.symbol);
        } else {
            // remaining shares keep their average cost
            let average_cost = position.average_cost;
            state.positions.insert(
                order.symbol.clone(),
                Position::new(order.symbol.clone(), outcome.remaining_shares, average_cost),
            );
        }

        Ok(Self::record(
            order,
            outcome.proceeds,
            Some(outcome.realized_gain),
        ))
    }

    fn record(order: &Order, total_amount: Decimal, realized_gain: Option<Decimal>) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            account: order.account.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            shares: order.shares,
            price: order.execution_price,
            total_amount,
            realized_gain,
            timestamp: Utc::now(),
        }
    }

    /// Verify that cash plus cost basis moved exactly as the transaction
    /// says it did. A BUY converts cash into basis one-for-one; a SELL
    /// removes basis at average cost and credits proceeds, the difference
    /// being the realized gain.
    fn check_conservation(
        state: &AccountState,
        old_cash: Decimal,
        old_basis: Decimal,
        transaction: &Transaction,
    ) -> std::result::Result<(), String> {
        if state.cash < Decimal::ZERO {
            return Err(format!("negative cash balance: {}", state.cash));
        }

        let new_basis = state.cost_basis();
        let expected_basis = match transaction.side {
            Side::Buy => old_basis + transaction.total_amount,
            Side::Sell => {
                old_basis - (transaction.total_amount
                    - transaction.realized_gain.unwrap_or(Decimal::ZERO))
            }
        };
        let expected_cash = match transaction.side {
            Side::Buy => old_cash - transaction.total_amount,
            Side::Sell => old_cash + transaction.total_amount,
        };

        if state.cash != expected_cash {
            return Err(format!(
                "cash moved {} -> {}, expected {}",
                old_cash, state.cash, expected_cash
            ));
        }
        if (new_basis - expected_basis).abs() > CONSERVATION_TOLERANCE {
            return Err(format!(
                "cost basis moved {} -> {}, expected {}",
                old_basis, new_basis, expected_basis
            ));
        }
        Ok(())
    }

    /// Read-only view of one account
    pub async fn snapshot(&self, account: &AccountId) -> Result<AccountSnapshot> {
        let slot = self.slot(account).await?;
        let state = slot.state.lock().await;
        Ok(Self::snapshot_slot(&slot, &state))
    }

    /// Read-only view of every account
    ///
    /// Each account is snapshotted under its own lock; the collection as
    /// a whole is eventually consistent with concurrent writes on other
    /// accounts.
    pub async fn snapshot_all(&self) -> Vec<AccountSnapshot> {
        let slots: Vec<Arc<AccountSlot>> =
            self.accounts.read().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.state.lock().await;
            snapshots.push(Self::snapshot_slot(&slot, &state));
        }
        snapshots.sort_by_key(|s| s.created_seq);
        snapshots
    }

    /// Most recent transactions for one account, newest first
    pub async fn recent_transactions(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Vec<Transaction> {
        let history = self.history.read().await;
        history
            .iter()
            .rev()
            .filter(|t| &t.account == account)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Total number of recorded transactions
    pub async fn transaction_count(&self) -> usize {
        self.history.read().await.len()
    }

    async fn slot(&self, account: &AccountId) -> Result<Arc<AccountSlot>> {
        self.accounts
            .read()
            .await
            .get(account)
            .cloned()
            .ok_or_else(|| EngineError::AccountNotFound(account.clone()))
    }

    fn snapshot_slot(slot: &AccountSlot, state: &AccountState) -> AccountSnapshot {
        let mut positions: Vec<Position> = state.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        AccountSnapshot {
            account: slot.account.clone(),
            cash: state.cash,
            positions,
            created_seq: slot.created_seq,
            opened_at: slot.opened_at,
        }
    }

    #[cfg(test)]
    async fn halt_for_test(&self, account: &AccountId, reason: &str) {
        let slot = self.slot(account).await.unwrap();
        slot.state.lock().await.halted = Some(reason.to_string());
    }
}
