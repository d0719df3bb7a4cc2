//! Dutch auction price synchronisation
//!
//! The contract computes the price; the client only samples it. Every
//! `price_poll_interval` the status is polled and the sample replaces the
//! displayed price. Two countdowns (next price drop, auction end) tick
//! locally every `tick_interval` without touching the network.
//!
//! ## Sessions
//!
//! Within one auction session the price never rises. A sample above the
//! previous one, or the auction turning active again, starts a new session:
//! tracking resets and the next-drop target is fetched again. The drop target
//! is also re-fetched once it has elapsed.

use crate::config::Config;
use crate::contract::ContractReader;
use crate::errors::{ClientError, ClientResult};
use crate::format::format_countdown;
use crate::metrics::metrics;
use crate::types::{AuctionStatus, Wei};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Where auction state comes from
#[async_trait]
pub trait AuctionFeed: Send + Sync {
    async fn auction_status(&self) -> ClientResult<AuctionStatus>;

    /// Epoch seconds of the next scheduled price drop
    async fn next_price_drop_time(&self) -> ClientResult<u64>;
}

#[async_trait]
impl AuctionFeed for ContractReader {
    async fn auction_status(&self) -> ClientResult<AuctionStatus> {
        ContractReader::auction_status(self).await
    }

    async fn next_price_drop_time(&self) -> ClientResult<u64> {
        ContractReader::next_price_drop_time(self).await
    }
}

/// Wall clock in epoch seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionPriceSample {
    pub price_wei: Wei,
    pub observed_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Continues the current session
    Accepted,
    /// First sample, or a price rise: tracking restarted
    NewSession,
}

/// Enforces the non-increasing price rule per session
#[derive(Debug, Clone, Default)]
pub struct PriceTracker {
    session: u64,
    latest: Option<AuctionPriceSample>,
}

impl PriceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, sample: AuctionPriceSample) -> SampleOutcome {
        let outcome = match self.latest {
            Some(prev) if sample.price_wei <= prev.price_wei => SampleOutcome::Accepted,
            _ => {
                self.session += 1;
                SampleOutcome::NewSession
            }
        };
        self.latest = Some(sample);
        outcome
    }

    /// Forget the last sample; the next one opens a new session
    pub fn reset(&mut self) {
        self.latest = None;
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn latest(&self) -> Option<AuctionPriceSample> {
        self.latest
    }
}

/// Locally ticking countdown towards an upstream target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown {
    pub target_epoch_seconds: Option<u64>,
    pub display_seconds: u64,
}

impl Countdown {
    /// Replace the target only when it differs by more than `tolerance`
    ///
    /// Returns true when the target changed.
    pub fn retarget(&mut self, target: u64, tolerance: u64, now: u64) -> bool {
        let changed = match self.target_epoch_seconds {
            Some(current) => current.abs_diff(target) > tolerance,
            None => true,
        };
        if changed {
            self.target_epoch_seconds = Some(target);
        }
        self.tick(now);
        changed
    }

    pub fn tick(&mut self, now: u64) {
        self.display_seconds = self
            .target_epoch_seconds
            .map(|target| target.saturating_sub(now))
            .unwrap_or(0);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_elapsed(&self, now: u64) -> bool {
        self.target_epoch_seconds.is_some_and(|target| target <= now)
    }

    /// `m:ss`
    pub fn display(&self) -> String {
        format_countdown(self.display_seconds)
    }
}

/// Snapshot published to views
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuctionView {
    pub is_active: bool,
    pub price_wei: Option<Wei>,
    pub session: u64,
    pub next_drop: Countdown,
    pub auction_end: Countdown,
    /// Most recent poll failure; cleared by the next successful poll
    pub last_error: Option<ClientError>,
}

/// Pure state of the sync engine; the tasks only feed it
#[derive(Debug, Clone)]
pub struct AuctionSyncState {
    tracker: PriceTracker,
    view: AuctionView,
    tolerance: u64,
}

impl AuctionSyncState {
    pub fn new(tolerance: u64) -> Self {
        Self {
            tracker: PriceTracker::new(),
            view: AuctionView::default(),
            tolerance,
        }
    }

    pub fn view(&self) -> &AuctionView {
        &self.view
    }

    /// Apply a polled status; returns true when the drop target must be re-fetched
    pub fn on_status(&mut self, status: AuctionStatus, now: u64) -> bool {
        let was_active = self.view.is_active;
        self.view.is_active = status.is_active;
        self.view.last_error = None;

        if !status.is_active {
            if was_active {
                info!("Auction no longer active");
            }
            self.tracker.reset();
            self.view.price_wei = None;
            self.view.next_drop.clear();
            self.view.auction_end.clear();
            return false;
        }

        if !was_active {
            self.tracker.reset();
        }

        let outcome = self.tracker.observe(AuctionPriceSample {
            price_wei: status.current_price,
            observed_at: now,
        });
        self.view.price_wei = Some(status.current_price);
        self.view.session = self.tracker.session();

        let new_session = outcome == SampleOutcome::NewSession;
        if new_session {
            metrics().auction_sessions.inc();
            info!(
                session = self.view.session,
                price_wei = %status.current_price,
                "🏷️ Auction session started"
            );
            self.view.next_drop.clear();
            self.view.auction_end.clear();
        }

        let end = now.saturating_add(status.time_remaining);
        self.view.auction_end.retarget(end, self.tolerance, now);

        new_session
            || self.view.next_drop.target_epoch_seconds.is_none()
            || self.view.next_drop.is_elapsed(now)
    }

    pub fn on_drop_time(&mut self, target: u64, now: u64) {
        if self.view.next_drop.retarget(target, 0, now) {
            debug!(target, "next price drop retargeted");
        }
    }

    /// Failed polls keep the last known values on screen
    pub fn on_error(&mut self, error: ClientError) {
        self.view.last_error = Some(error);
    }

    pub fn tick(&mut self, now: u64) {
        self.view.next_drop.tick(now);
        self.view.auction_end.tick(now);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionSyncConfig {
    pub price_poll_interval: Duration,
    pub tick_interval: Duration,
    pub resync_tolerance_secs: u64,
}

impl Default for AuctionSyncConfig {
    fn default() -> Self {
        Self {
            price_poll_interval: Duration::from_secs(2),
            tick_interval: Duration::from_secs(1),
            resync_tolerance_secs: 1,
        }
    }
}

impl From<&Config> for AuctionSyncConfig {
    fn from(config: &Config) -> Self {
        Self {
            price_poll_interval: config.price_poll_interval(),
            tick_interval: config.tick_interval(),
            resync_tolerance_secs: config.auction.resync_tolerance_secs,
        }
    }
}

struct SyncContext {
    feed: Arc<dyn AuctionFeed>,
    clock: Arc<dyn Clock>,
    state: Mutex<AuctionSyncState>,
    view_tx: watch::Sender<AuctionView>,
}

impl SyncContext {
    fn publish(&self) {
        let view = self.state.lock().view().clone();
        self.view_tx.send_replace(view);
    }

    async fn poll_once(&self, shutdown: &watch::Receiver<bool>) {
        metrics().auction_polls.inc();
        let status = self.feed.auction_status().await;
        if *shutdown.borrow() {
            return;
        }

        let refresh_drop = {
            let mut state = self.state.lock();
            match status {
                Ok(status) => state.on_status(status, self.clock.now()),
                Err(e) => {
                    metrics().auction_poll_errors.inc();
                    warn!(error = %e, "auction poll failed");
                    state.on_error(e);
                    false
                }
            }
        };
        self.publish();

        if refresh_drop {
            let drop_time = self.feed.next_price_drop_time().await;
            if *shutdown.borrow() {
                return;
            }
            {
                let mut state = self.state.lock();
                match drop_time {
                    Ok(target) => state.on_drop_time(target, self.clock.now()),
                    Err(e) => {
                        warn!(error = %e, "next price drop lookup failed");
                        state.on_error(e);
                    }
                }
            }
            self.publish();
        }
    }

    fn tick(&self) {
        self.state.lock().tick(self.clock.now());
        self.publish();
    }
}

/// Running poller and ticker; stopping (or dropping) cancels both timers
pub struct AuctionSyncHandle {
    view_rx: watch::Receiver<AuctionView>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl AuctionSyncHandle {
    pub fn subscribe(&self) -> watch::Receiver<AuctionView> {
        self.view_rx.clone()
    }

    pub fn view(&self) -> AuctionView {
        self.view_rx.borrow().clone()
    }

    /// Stop both timers; an in-flight poll completes but is not published
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Stop and wait for both tasks to exit
    pub async fn shutdown(mut self) {
        self.stop();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "auction sync task ended abnormally");
            }
        }
    }
}

impl Drop for AuctionSyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// AuctionPriceSync entry point
pub struct AuctionPriceSync;

impl AuctionPriceSync {
    pub fn spawn(
        feed: Arc<dyn AuctionFeed>,
        clock: Arc<dyn Clock>,
        config: AuctionSyncConfig,
    ) -> AuctionSyncHandle {
        let (view_tx, view_rx) = watch::channel(AuctionView::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(SyncContext {
            feed,
            clock,
            state: Mutex::new(AuctionSyncState::new(config.resync_tolerance_secs)),
            view_tx,
        });

        let poller = {
            let ctx = Arc::clone(&ctx);
            let mut shutdown = shutdown_rx.clone();
            let period = config.price_poll_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = interval.tick() => {}
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                    ctx.poll_once(&shutdown).await;
                }
                debug!("auction poller stopped");
            })
        };

        let ticker = {
            let mut shutdown = shutdown_rx;
            let period = config.tick_interval;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = interval.tick() => ctx.tick(),
                    }
                }
                debug!("auction ticker stopped");
            })
        };

        AuctionSyncHandle {
            view_rx,
            shutdown_tx,
            tasks: vec![poller, ticker],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ManualClock, MockAuctionFeed};
    use crate::types::WEI_PER_ETHER;
    use proptest::prelude::*;

    const P: Wei = WEI_PER_ETHER;

    fn wei(n: u64) -> Wei {
        Wei::from(n)
    }

    fn active(price: Wei, remaining: u64) -> AuctionStatus {
        AuctionStatus {
            is_active: true,
            current_price: price,
            time_remaining: remaining,
        }
    }

    #[test]
    fn test_tracker_sessions() {
        let mut tracker = PriceTracker::new();
        let s = |price, at| AuctionPriceSample {
            price_wei: price,
            observed_at: at,
        };
        assert_eq!(tracker.observe(s(wei(100), 0)), SampleOutcome::NewSession);
        assert_eq!(tracker.observe(s(wei(90), 2)), SampleOutcome::Accepted);
        assert_eq!(tracker.observe(s(wei(90), 4)), SampleOutcome::Accepted);
        assert_eq!(tracker.session(), 1);
        assert_eq!(tracker.observe(s(wei(120), 6)), SampleOutcome::NewSession);
        assert_eq!(tracker.session(), 2);
        assert_eq!(tracker.latest().map(|l| l.price_wei), Some(wei(120)));
    }

    #[test]
    fn test_countdown_ticks_and_clamps() {
        let mut c = Countdown::default();
        assert!(c.retarget(1_125, 0, 1_000));
        assert_eq!(c.display_seconds, 125);
        assert_eq!(c.display(), "2:05");

        c.tick(1_080);
        assert_eq!(c.display(), "0:45");

        c.tick(2_000);
        assert_eq!(c.display_seconds, 0);
        assert!(c.is_elapsed(2_000));
    }

    #[test]
    fn test_countdown_retarget_tolerance() {
        let mut c = Countdown::default();
        c.retarget(1_600, 1, 1_000);
        assert!(!c.retarget(1_601, 1, 1_002));
        assert_eq!(c.target_epoch_seconds, Some(1_600));
        assert!(c.retarget(1_700, 1, 1_002));
    }

    #[test]
    fn test_state_requests_drop_refresh_only_when_needed() {
        let mut state = AuctionSyncState::new(1);
        assert!(state.on_status(active(P, 600), 1_000), "first session");
        state.on_drop_time(1_125, 1_000);
        assert_eq!(state.view().next_drop.display_seconds, 125);

        assert!(!state.on_status(active(P, 598), 1_002));
        assert!(!state.on_status(active(wei(500_000_000_000_000_000), 596), 1_004));
        assert_eq!(state.view().price_wei, Some(wei(500_000_000_000_000_000)));

        // drop target elapsed
        assert!(state.on_status(active(wei(500_000_000_000_000_000), 470), 1_130));

        // price rise: new session
        state.on_drop_time(1_250, 1_130);
        assert!(state.on_status(active(wei(2_000_000_000_000_000_000), 900), 1_132));
        assert_eq!(state.view().session, 2);
        assert_eq!(state.view().next_drop.target_epoch_seconds, None);
    }

    #[test]
    fn test_inactive_clears_view_and_reactivation_is_new_session() {
        let mut state = AuctionSyncState::new(1);
        state.on_status(active(P, 600), 1_000);
        assert!(!state.on_status(
            AuctionStatus {
                is_active: false,
                current_price: Wei::ZERO,
                time_remaining: 0
            },
            1_002
        ));
        assert!(!state.view().is_active);
        assert_eq!(state.view().price_wei, None);

        assert!(state.on_status(active(wei(250_000_000_000_000_000), 600), 1_010));
        assert_eq!(state.view().session, 2);
    }

    #[test]
    fn test_error_keeps_last_values() {
        let mut state = AuctionSyncState::new(1);
        state.on_status(active(P, 600), 1_000);
        state.on_error(ClientError::Network("timeout".to_string()));
        assert_eq!(state.view().price_wei, Some(P));
        assert!(state.view().last_error.is_some());

        state.on_status(active(P, 598), 1_002);
        assert!(state.view().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_task_polls_and_ticks() {
        let clock = Arc::new(ManualClock::new(10_000));
        let feed = Arc::new(MockAuctionFeed::new(active(P, 600), 10_125));
        let handle = AuctionPriceSync::spawn(
            feed.clone(),
            clock.clone(),
            AuctionSyncConfig::default(),
        );
        let mut rx = handle.subscribe();

        rx.wait_for(|v| v.next_drop.target_epoch_seconds.is_some())
            .await
            .unwrap();
        let view = handle.view();
        assert_eq!(view.price_wei, Some(P));
        assert_eq!(view.next_drop.display(), "2:05");
        assert_eq!(view.auction_end.display_seconds, 600);

        clock.advance(1);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.view().next_drop.display_seconds, 124);

        // several polls within one session fetch the drop time once
        feed.set_status(active(wei(500_000_000_000_000_000), 590));
        clock.advance(9);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.view().price_wei, Some(wei(500_000_000_000_000_000)));
        assert_eq!(feed.drop_time_calls(), 1);
        assert!(feed.status_calls() >= 3);

        // price rise restarts the session and refetches the drop time
        feed.set_status(active(wei(3_000_000_000_000_000_000), 900));
        feed.set_next_drop(10_300);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.view().session, 2);
        assert_eq!(feed.drop_time_calls(), 2);
        assert_eq!(handle.view().next_drop.target_epoch_seconds, Some(10_300));

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling() {
        let clock = Arc::new(ManualClock::new(0));
        let feed = Arc::new(MockAuctionFeed::new(active(P, 60), 30));
        let handle = AuctionPriceSync::spawn(feed.clone(), clock, AuctionSyncConfig::default());
        tokio::time::sleep(Duration::from_millis(100)).await;
        let calls = feed.status_calls();
        assert!(calls >= 1);

        handle.stop();
        assert!(handle.is_stopped());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(feed.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_reported() {
        let clock = Arc::new(ManualClock::new(0));
        let feed = Arc::new(MockAuctionFeed::new(active(P, 60), 30));
        feed.set_failing(true);
        let handle = AuctionPriceSync::spawn(feed, clock, AuctionSyncConfig::default());
        let mut rx = handle.subscribe();
        let view = rx.wait_for(|v| v.last_error.is_some()).await.unwrap().clone();
        assert_eq!(view.price_wei, None);
        assert!(matches!(view.last_error, Some(ClientError::Network(_))));
    }

    proptest! {
        #[test]
        fn prop_sessions_hold_non_increasing_prices(
            prices in proptest::collection::vec(1u64..1_000, 1..50)
        ) {
            let mut tracker = PriceTracker::new();
            let mut session_prices: Vec<(u64, u64)> = Vec::new();
            for (i, price) in prices.iter().enumerate() {
                tracker.observe(AuctionPriceSample { price_wei: wei(*price), observed_at: i as u64 });
                session_prices.push((tracker.session(), *price));
            }
            for pair in session_prices.windows(2) {
                let (s0, p0) = pair[0];
                let (s1, p1) = pair[1];
                if s0 == s1 {
                    prop_assert!(p1 <= p0);
                } else {
                    prop_assert_eq!(s1, s0 + 1);
                    prop_assert!(p1 > p0);
                }
            }
        }
    }
}
