//! Live standings broadcast: fan-out hub, re-ranking task, wire
//! framing, and viewer session lifecycle

pub mod broadcaster;
pub mod hub;
pub mod session;
pub mod wire;

pub use broadcaster::Broadcaster;
pub use hub::{BroadcastHub, HubStats, Subscription};
pub use session::{
    KeepAlive, ReconnectPolicy, SessionAction, SessionEvent, SessionFsm, SessionState,
    StandingsStreamClient,
};
pub use wire::{parse_message, ControlMessage, LeaderboardFrame, LeaderboardRow, WireMessage};
