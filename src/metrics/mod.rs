mod server;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub use server::{routes, MetricsHandle};

// ============================================================================
// Prometheus metrics
// ============================================================================
//
// One registry per service process. Each binary uses the subset of counters
// that matches its tasks; the rest stay at zero.
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    /// Events handed to the broker by the outbox worker
    pub outbox_published: IntCounter,
    /// Inbox rows applied by the inbox worker
    pub inbox_processed: IntCounter,
    /// Batch cycles that rolled back, by worker
    pub worker_cycle_failures: IntCounterVec,
    /// Deliveries taken off the broker, by topic
    pub messages_received: IntCounterVec,
    /// Requests routed by the gateway, by location prefix
    pub requests_routed: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let outbox_published = IntCounter::new(
            "outbox_published_total",
            "Total events published from the outbox table",
        )?;
        registry.register(Box::new(outbox_published.clone()))?;

        let inbox_processed = IntCounter::new(
            "inbox_processed_total",
            "Total inbox rows handled and deleted",
        )?;
        registry.register(Box::new(inbox_processed.clone()))?;

        let worker_cycle_failures = IntCounterVec::new(
            Opts::new(
                "worker_cycle_failures_total",
                "Batch cycles that failed and rolled back",
            ),
            &["worker"],
        )?;
        registry.register(Box::new(worker_cycle_failures.clone()))?;

        let messages_received = IntCounterVec::new(
            Opts::new(
                "broker_messages_received_total",
                "Messages received from the broker",
            ),
            &["topic"],
        )?;
        registry.register(Box::new(messages_received.clone()))?;

        let requests_routed = IntCounterVec::new(
            Opts::new("gateway_requests_routed_total", "Requests routed by prefix"),
            &["prefix"],
        )?;
        registry.register(Box::new(requests_routed.clone()))?;

        Ok(Self {
            registry,
            outbox_published,
            inbox_processed,
            worker_cycle_failures,
            messages_received,
            requests_routed,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
