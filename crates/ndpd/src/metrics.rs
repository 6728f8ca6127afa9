//! Prometheus metrics collection for ndpd

use prometheus::{Counter, Gauge, Opts, Registry};
use std::sync::Arc;

/// Metrics shared by every interface worker
#[derive(Clone)]
pub struct MetricsCollector {
    // Counters
    pub solicitations_received_total: Counter,
    pub advertisements_received_total: Counter,
    pub solicitations_sent_total: Counter,
    pub send_failures_total: Counter,
    pub neighbors_created_total: Counter,
    pub neighbors_evicted_total: Counter,
    pub packets_ignored_total: Counter,
    pub stale_timers_total: Counter,

    // Gauges
    pub neighbors: Gauge,
    pub interfaces: Gauge,

    // Registry for export
    pub registry: Arc<Registry>,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<Counter, prometheus::Error> {
    let c = Counter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        Ok(Self {
            solicitations_received_total: counter(
                &registry,
                "ndpd_solicitations_received_total",
                "Neighbor solicitations accepted from neighbors",
            )?,
            advertisements_received_total: counter(
                &registry,
                "ndpd_advertisements_received_total",
                "Neighbor advertisements accepted from neighbors",
            )?,
            solicitations_sent_total: counter(
                &registry,
                "ndpd_solicitations_sent_total",
                "Neighbor solicitations transmitted",
            )?,
            send_failures_total: counter(
                &registry,
                "ndpd_send_failures_total",
                "Solicitations the transport failed to transmit",
            )?,
            neighbors_created_total: counter(
                &registry,
                "ndpd_neighbors_created_total",
                "Neighbor cache entries created",
            )?,
            neighbors_evicted_total: counter(
                &registry,
                "ndpd_neighbors_evicted_total",
                "Neighbor cache entries removed",
            )?,
            packets_ignored_total: counter(
                &registry,
                "ndpd_packets_ignored_total",
                "Received ND packets that did not touch the cache",
            )?,
            stale_timers_total: counter(
                &registry,
                "ndpd_stale_timers_total",
                "Timer firings discarded because the entry was superseded or gone",
            )?,
            neighbors: gauge(&registry, "ndpd_neighbors", "Current neighbor cache entries")?,
            interfaces: gauge(&registry, "ndpd_interfaces", "Interfaces under management")?,
            registry: Arc::new(registry),
        })
    }

    pub fn record_neighbor_created(&self) {
        self.neighbors_created_total.inc();
        self.neighbors.inc();
    }

    pub fn record_neighbors_evicted(&self, count: usize) {
        self.neighbors_evicted_total.inc_by(count as f64);
        self.neighbors.sub(count as f64);
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, TextEncoder};

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
