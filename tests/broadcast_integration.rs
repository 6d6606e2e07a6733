//! End-to-end tests for the standings broadcast path

mod common;

use common::{open_accounts, sample_service, ws_messages};
use papertrade::broadcast::wire::{parse_message, WireMessage};
use papertrade::broadcast::LeaderboardFrame;
use papertrade::common::types::{AccountId, Side};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::time::timeout;

async fn recv_snapshot(
    sub: &mut papertrade::Subscription,
) -> papertrade::StandingsSnapshot {
    timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timed out waiting for snapshot")
        .expect("subscription closed")
}

#[tokio::test]
async fn test_trade_is_pushed_to_subscribers() {
    let (service, _prices) = sample_service();
    let accounts = open_accounts(&service, 2).await;
    let mut sub = service.subscribe_standings().await;

    service
        .place_order(accounts[0].clone(), "TCS", Side::Buy, 10)
        .await
        .unwrap();

    let snapshot = recv_snapshot(&mut sub).await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.entries[0].rank, 1);
    // Execution at the quoted price leaves value flat; ties break by
    // account creation order
    assert_eq!(snapshot.entries[0].account, accounts[0]);
}

#[tokio::test]
async fn test_late_subscriber_gets_initial_snapshot() {
    let (service, _prices) = sample_service();
    let accounts = open_accounts(&service, 1).await;

    service
        .place_order(accounts[0].clone(), "INFY", Side::Buy, 1)
        .await
        .unwrap();
    // Let the broadcaster publish before subscribing
    tokio::time::sleep(Duration::from_millis(300)).await;

    let mut late = service.subscribe_standings().await;
    let snapshot = recv_snapshot(&mut late).await;
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
async fn test_slow_subscriber_does_not_starve_others() {
    // Tight coalescing and a tiny buffer so the slow subscriber fills up
    // within a few rounds
    let mut config = papertrade::AppConfig::default();
    config.broadcast.coalesce_ms = 10;
    config.broadcast.subscriber_buffer = 2;
    let prices = common::sample_prices();
    let service = papertrade::TradingService::new(&config, prices.clone());
    let accounts = open_accounts(&service, 1).await;

    let _slow = service.subscribe_standings().await; // never drained
    let mut fast = service.subscribe_standings().await;

    prices.set_price("PENNY", dec!(1.00));
    for _ in 0..20 {
        service
            .place_order(accounts[0].clone(), "PENNY", Side::Buy, 1)
            .await
            .unwrap();
        // Keep draining so the fast subscriber never backs up
        while fast.receiver.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The fast subscriber still receives a fresh snapshot after the burst
    service
        .place_order(accounts[0].clone(), "PENNY", Side::Buy, 1)
        .await
        .unwrap();
    recv_snapshot(&mut fast).await;

    let stats = service.hub().stats().await;
    assert_eq!(stats.subscribers, 2);
    assert!(stats.published >= 3);
    assert!(stats.dropped >= 1, "slow subscriber was never skipped");
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let (service, _prices) = sample_service();
    let accounts = open_accounts(&service, 1).await;
    let mut sub = service.subscribe_standings().await;

    service.hub().unsubscribe(sub.id).await;
    // Idempotent, also after the channel is gone
    service.hub().unsubscribe(sub.id).await;

    service
        .place_order(accounts[0].clone(), "TCS", Side::Buy, 1)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(sub.receiver.try_recv().is_err());
    assert_eq!(service.hub().stats().await.subscribers, 0);
}

#[tokio::test]
async fn test_refresh_reaches_only_the_requester() {
    let (service, _prices) = sample_service();
    let accounts = open_accounts(&service, 1).await;
    let mut requester = service.subscribe_standings().await;
    let mut other = service.subscribe_standings().await;

    service
        .place_order(accounts[0].clone(), "TCS", Side::Buy, 1)
        .await
        .unwrap();
    recv_snapshot(&mut requester).await;
    recv_snapshot(&mut other).await;

    // A client "refresh" re-delivers the latest snapshot to that
    // subscriber alone
    assert!(service.hub().send_latest_to(requester.id).await);
    recv_snapshot(&mut requester).await;
    assert!(other.receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_published_snapshot_encodes_as_leaderboard_frame() {
    let (service, prices) = sample_service();
    let accounts = open_accounts(&service, 2).await;
    let mut sub = service.subscribe_standings().await;

    service
        .place_order(accounts[1].clone(), "TCS", Side::Buy, 10)
        .await
        .unwrap();
    prices.set_price("TCS", dec!(3300.00));
    service
        .place_order(accounts[1].clone(), "TCS", Side::Sell, 1)
        .await
        .unwrap();

    let mut snapshot = recv_snapshot(&mut sub).await;
    // Drain to the newest snapshot (the sell may publish a second one)
    while let Ok(next) = sub.receiver.try_recv() {
        snapshot = next;
    }

    let frame = LeaderboardFrame::from_snapshot(&snapshot);
    let json = frame.encode().unwrap();
    match parse_message(&json) {
        WireMessage::Leaderboard(parsed) => {
            assert_eq!(parsed.total_users, 2);
            assert_eq!(parsed.leaderboard[0].rank, 1);
            assert_eq!(
                parsed.leaderboard[0].user_id,
                parsed.leaderboard[0].username
            );
        }
        other => panic!("expected leaderboard frame, got {other:?}"),
    }
}

#[test]
fn test_sample_frame_fixture_parses() {
    match parse_message(ws_messages::LEADERBOARD) {
        WireMessage::Leaderboard(frame) => {
            assert_eq!(frame.leaderboard[0].user_id, "u1");
            assert_eq!(frame.leaderboard[0].portfolio_value, dec!(100495.00));
        }
        other => panic!("expected leaderboard frame, got {other:?}"),
    }
}
