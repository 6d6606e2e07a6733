//! Error types for the engine

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::AccountId;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Buy cost exceeds the account's cash balance
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Sell quantity exceeds the held position
    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u64, held: u64 },

    /// Sell against a symbol the account holds no position in
    #[error("no position in symbol: {0}")]
    PositionNotFound(String),

    /// The price source has no usable price for a symbol
    #[error("price unavailable for symbol: {0}")]
    PriceUnavailable(String),

    /// Could not acquire the account's execution slot within the bounded wait
    #[error("account busy: {0}")]
    Busy(AccountId),

    /// Unknown account identifier
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Order failed precondition validation
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// Account mutation halted after an internal-consistency fault
    #[error("account {account} halted: {reason}")]
    AccountHalted { account: AccountId, reason: String },

    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Whether this error is a normal, user-facing trade rejection.
    ///
    /// Recoverable errors are reported verbatim to the caller and never
    /// trigger retries inside the engine itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientFunds { .. }
                | EngineError::InsufficientShares { .. }
                | EngineError::PositionNotFound(_)
                | EngineError::PriceUnavailable(_)
                | EngineError::Busy(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EngineError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        EngineError::WebSocketCommunication(err.to_string())
    }
}
