//! Wire-level framing for the standings push channel
//!
//! Snapshots travel as one JSON object per message, shaped
//! `{"leaderboard": [...]}`. The bare tokens `ping`, `pong`, and
//! `refresh` are reserved as control messages outside the JSON envelope.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::Result;
use crate::common::types::{AccountId, StandingsEntry, StandingsSnapshot};

/// One row of the leaderboard frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub user_id: String,
    /// Display name; the engine has no identity data, so this mirrors
    /// the opaque user id unless the outer layer rewrites it
    pub username: String,
    pub portfolio_value: Decimal,
    pub cash_balance: Decimal,
    pub total_return: Decimal,
    pub total_return_percent: Decimal,
    pub active_positions: usize,
}

/// The JSON envelope pushed for every standings update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardFrame {
    pub leaderboard: Vec<LeaderboardRow>,
    pub total_users: usize,
}

impl LeaderboardFrame {
    /// Build a frame from a standings snapshot, rounding money to cents
    pub fn from_snapshot(snapshot: &StandingsSnapshot) -> Self {
        let leaderboard = snapshot
            .entries
            .iter()
            .map(|entry| LeaderboardRow {
                rank: entry.rank,
                user_id: entry.account.to_string(),
                username: entry.account.to_string(),
                portfolio_value: entry.portfolio_value.round_dp(2),
                cash_balance: entry.cash.round_dp(2),
                total_return: entry.total_return.round_dp(2),
                total_return_percent: entry.total_return_percent.round_dp(2),
                active_positions: entry.active_positions,
            })
            .collect::<Vec<_>>();
        let total_users = leaderboard.len();
        Self {
            leaderboard,
            total_users,
        }
    }

    /// Convert back into the engine's snapshot type (e.g. for sessions
    /// that unify streamed frames with polled snapshots)
    pub fn into_snapshot(self) -> StandingsSnapshot {
        StandingsSnapshot {
            entries: self
                .leaderboard
                .into_iter()
                .map(|row| StandingsEntry {
                    rank: row.rank,
                    account: AccountId::from(row.user_id),
                    portfolio_value: row.portfolio_value,
                    cash: row.cash_balance,
                    total_return: row.total_return,
                    total_return_percent: row.total_return_percent,
                    active_positions: row.active_positions,
                })
                .collect(),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Liveness and request tokens carried outside the JSON envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Ping,
    Pong,
    /// Client asks for an immediate fresh snapshot
    Refresh,
}

impl ControlMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMessage::Ping => "ping",
            ControlMessage::Pong => "pong",
            ControlMessage::Refresh => "refresh",
        }
    }
}

/// A parsed inbound text message
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Control(ControlMessage),
    Leaderboard(LeaderboardFrame),
    /// Anything unrecognized, kept for logging
    Raw(String),
}

/// Parse an incoming text message into a [`WireMessage`]
///
/// Control tokens are matched first; everything else is tried as a JSON
/// leaderboard frame.
pub fn parse_message(text: &str) -> WireMessage {
    match text.trim() {
        "ping" | "PING" => return WireMessage::Control(ControlMessage::Ping),
        "pong" | "PONG" => return WireMessage::Control(ControlMessage::Pong),
        "refresh" => return WireMessage::Control(ControlMessage::Refresh),
        _ => {}
    }

    match serde_json::from_str::<LeaderboardFrame>(text) {
        Ok(frame) => WireMessage::Leaderboard(frame),
        Err(_) => WireMessage::Raw(text.to_string()),
    }
}
