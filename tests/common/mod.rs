//! Common test utilities and fixtures

use papertrade::common::traits::InMemoryPriceSource;
use papertrade::common::types::AccountId;
use papertrade::config::types::AppConfig;
use papertrade::engine::TradingService;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Create a price table seeded with the symbols the suites trade
pub fn sample_prices() -> Arc<InMemoryPriceSource> {
    let prices = Arc::new(InMemoryPriceSource::new());
    prices.set_price("TCS", dec!(3250.50));
    prices.set_price("INFY", dec!(1500.25));
    prices.set_price("RELIANCE", dec!(2410.00));
    prices
}

/// Create a trading service over the sample price table
pub fn sample_service() -> (TradingService, Arc<InMemoryPriceSource>) {
    let prices = sample_prices();
    let service = TradingService::new(&AppConfig::default(), prices.clone());
    (service, prices)
}

/// Open `count` accounts named u0, u1, ...
pub async fn open_accounts(service: &TradingService, count: usize) -> Vec<AccountId> {
    let mut accounts = Vec::with_capacity(count);
    for i in 0..count {
        let account = AccountId::from(format!("u{i}"));
        service.open_account(account.clone()).await.unwrap();
        accounts.push(account);
    }
    accounts
}

/// Sample wire messages for testing parsing
pub mod ws_messages {
    /// Minimal single-row leaderboard frame
    pub const LEADERBOARD: &str = r#"{
        "leaderboard": [
            {
                "rank": 1,
                "user_id": "u1",
                "username": "u1",
                "portfolio_value": "100495.00",
                "cash_balance": "67495.00",
                "total_return": "495.00",
                "total_return_percent": "0.50",
                "active_positions": 1
            }
        ],
        "total_users": 1
    }"#;
}
