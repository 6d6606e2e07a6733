//! Channel type definitions for inter-task communication

use tokio::sync::mpsc;

use super::types::{AccountChanged, StandingsSnapshot};

/// Default buffer size for the account-change event channel
pub const DEFAULT_EVENT_CHANNEL_SIZE: usize = 1000;

/// Default outbound buffer per standings subscriber
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

/// Create a new account-change event channel with the default buffer size
pub fn create_change_channel() -> (mpsc::Sender<AccountChanged>, mpsc::Receiver<AccountChanged>) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_SIZE)
}

/// Create a bounded per-subscriber snapshot channel
pub fn create_snapshot_channel(
    size: usize,
) -> (
    mpsc::Sender<StandingsSnapshot>,
    mpsc::Receiver<StandingsSnapshot>,
) {
    mpsc::channel(size)
}
