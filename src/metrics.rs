//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Transaction lifecycle
    pub tx_submitted: IntCounterVec,
    pub tx_confirmed: IntCounterVec,
    pub tx_failed: IntCounterVec,
    pub tx_in_flight_rejections: IntCounter,
    pub tx_still_pending: IntCounter,
    pub tx_in_flight: IntGauge,

    // Read cache
    pub cache_invalidations: IntCounter,
    pub cache_refetches: IntCounter,

    // Auction sync
    pub auction_polls: IntCounter,
    pub auction_poll_errors: IntCounter,
    pub auction_sessions: IntCounter,

    pub metadata_fetch_failures: IntCounter,

    // Histograms
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tx_submitted = IntCounterVec::new(
            Opts::new("tx_submitted_total", "Transactions handed to the signer"),
            &["operation"],
        )?;

        let tx_confirmed = IntCounterVec::new(
            Opts::new("tx_confirmed_total", "Transactions confirmed on chain"),
            &["operation"],
        )?;

        let tx_failed = IntCounterVec::new(
            Opts::new("tx_failed_total", "Transactions that settled as failed"),
            &["operation", "kind"],
        )?;

        let tx_in_flight_rejections = IntCounter::with_opts(Opts::new(
            "tx_in_flight_rejections_total",
            "Submissions refused because another was in flight",
        ))?;

        let tx_still_pending = IntCounter::with_opts(Opts::new(
            "tx_still_pending_total",
            "Transactions that outlived the confirmation deadline",
        ))?;

        let tx_in_flight = IntGauge::with_opts(Opts::new(
            "tx_in_flight",
            "Controllers currently submitting or awaiting confirmation",
        ))?;

        let cache_invalidations = IntCounter::with_opts(Opts::new(
            "cache_invalidations_total",
            "Namespace invalidations applied to the read cache",
        ))?;

        let cache_refetches = IntCounter::with_opts(Opts::new(
            "cache_refetches_total",
            "Read binding fetches performed",
        ))?;

        let auction_polls = IntCounter::with_opts(Opts::new(
            "auction_polls_total",
            "Auction price polls issued",
        ))?;

        let auction_poll_errors = IntCounter::with_opts(Opts::new(
            "auction_poll_errors_total",
            "Auction price polls that failed",
        ))?;

        let auction_sessions = IntCounter::with_opts(Opts::new(
            "auction_sessions_total",
            "Auction price sessions observed",
        ))?;

        let metadata_fetch_failures = IntCounter::with_opts(Opts::new(
            "metadata_fetch_failures_total",
            "Token metadata documents that could not be fetched",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from broadcast to settled receipt",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 180.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(tx_submitted.clone()))?;
        registry.register(Box::new(tx_confirmed.clone()))?;
        registry.register(Box::new(tx_failed.clone()))?;
        registry.register(Box::new(tx_in_flight_rejections.clone()))?;
        registry.register(Box::new(tx_still_pending.clone()))?;
        registry.register(Box::new(tx_in_flight.clone()))?;
        registry.register(Box::new(cache_invalidations.clone()))?;
        registry.register(Box::new(cache_refetches.clone()))?;
        registry.register(Box::new(auction_polls.clone()))?;
        registry.register(Box::new(auction_poll_errors.clone()))?;
        registry.register(Box::new(auction_sessions.clone()))?;
        registry.register(Box::new(metadata_fetch_failures.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            tx_submitted,
            tx_confirmed,
            tx_failed,
            tx_in_flight_rejections,
            tx_still_pending,
            tx_in_flight,
            cache_invalidations,
            cache_refetches,
            auction_polls,
            auction_poll_errors,
            auction_sessions,
            metadata_fetch_failures,
            confirmation_latency,
            rpc_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric
    pub fn export_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
