//! Integration tests for the live auction view
//!
//! Drives `AuctionPriceSync` through a full auction lifecycle with an
//! in-memory feed and a hand-moved clock under paused tokio time.

#[cfg(test)]
mod auction_sync_integration_tests {
    use nft_client::components::{AuctionPriceSync, AuctionSyncConfig};
    use nft_client::test_utils::{ManualClock, MockAuctionFeed};
    use nft_client::types::{AuctionStatus, Wei, WEI_PER_ETHER};
    use std::sync::Arc;
    use std::time::Duration;

    const ETH: Wei = WEI_PER_ETHER;

    fn wei(n: u64) -> Wei {
        Wei::from(n)
    }

    fn running(price: Wei, remaining: u64) -> AuctionStatus {
        AuctionStatus {
            is_active: true,
            current_price: price,
            time_remaining: remaining,
        }
    }

    fn ended() -> AuctionStatus {
        AuctionStatus {
            is_active: false,
            current_price: Wei::ZERO,
            time_remaining: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auction_ends_and_restarts_as_new_session() {
        let clock = Arc::new(ManualClock::new(50_000));
        let feed = Arc::new(MockAuctionFeed::new(running(ETH, 300), 50_060));
        let handle = AuctionPriceSync::spawn(feed.clone(), clock.clone(), AuctionSyncConfig::default());
        let mut views = handle.subscribe();

        views
            .wait_for(|v| v.is_active && v.next_drop.target_epoch_seconds.is_some())
            .await
            .unwrap();
        assert_eq!(handle.view().session, 1);
        assert_eq!(handle.view().next_drop.display(), "1:00");

        // price steps down within the same session
        feed.set_status(running(wei(900_000_000_000_000_000), 240));
        clock.advance(60);
        tokio::time::sleep(Duration::from_secs(3)).await;
        let view = handle.view();
        assert_eq!(view.price_wei, Some(wei(900_000_000_000_000_000)));
        assert_eq!(view.session, 1);

        // auction over: price and countdowns are cleared
        feed.set_status(ended());
        tokio::time::sleep(Duration::from_secs(3)).await;
        let view = handle.view();
        assert!(!view.is_active);
        assert_eq!(view.price_wei, None);
        assert_eq!(view.next_drop.target_epoch_seconds, None);
        assert_eq!(view.auction_end.target_epoch_seconds, None);

        // a fresh auction at a lower price is still a new session
        feed.set_status(running(wei(500_000_000_000_000_000), 600));
        feed.set_next_drop(50_200);
        tokio::time::sleep(Duration::from_secs(3)).await;
        let view = handle.view();
        assert!(view.is_active);
        assert_eq!(view.session, 2);
        assert_eq!(view.price_wei, Some(wei(500_000_000_000_000_000)));
        assert_eq!(view.next_drop.target_epoch_seconds, Some(50_200));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_keeps_last_price_until_recovery() {
        let clock = Arc::new(ManualClock::new(1_000));
        let feed = Arc::new(MockAuctionFeed::new(running(ETH, 120), 1_030));
        let handle = AuctionPriceSync::spawn(feed.clone(), clock.clone(), AuctionSyncConfig::default());
        let mut views = handle.subscribe();
        views.wait_for(|v| v.price_wei.is_some()).await.unwrap();

        feed.set_failing(true);
        views.wait_for(|v| v.last_error.is_some()).await.unwrap();
        assert_eq!(handle.view().price_wei, Some(ETH));

        // countdowns keep ticking locally through the outage
        clock.advance(10);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.view().next_drop.display_seconds, 20);

        feed.set_failing(false);
        views.wait_for(|v| v.last_error.is_none()).await.unwrap();
        assert_eq!(handle.view().session, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let clock = Arc::new(ManualClock::new(0));
        let feed = Arc::new(MockAuctionFeed::new(running(ETH, 60), 30));
        let handle = AuctionPriceSync::spawn(feed.clone(), clock, AuctionSyncConfig::default());
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = feed.status_calls();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(feed.status_calls(), calls);
    }
}
