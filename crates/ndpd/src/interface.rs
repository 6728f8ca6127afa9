//! Managed network port
//!
//! An [`Interface`] owns its neighbor cache, configuration and counters along
//! with the collaborators the NUD engine talks to. The solicitation scheduler
//! (`scheduler.rs`) and the inbound processor (`inbound.rs`) are further
//! `impl Interface` blocks operating on this state. Nothing here is shared:
//! the interface's worker task is the only caller.

use crate::cache::NeighborCache;
use crate::config::InterfaceConfig;
use crate::entry::TimerKind;
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::packet::Solicitation;
use crate::timer::TimerService;
use crate::transport::NdTransport;
use crate::types::{NeighborInfo, NeighborKey, NeighborSnapshot, PacketCounters};
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Interface {
    pub(crate) config: InterfaceConfig,
    pub(crate) max_unicast_solicit: u32,
    pub(crate) cache: NeighborCache,
    pub(crate) counters: PacketCounters,
    pub(crate) transport: Arc<dyn NdTransport>,
    pub(crate) timers: Box<dyn TimerService>,
    pub(crate) metrics: MetricsCollector,
}

impl Interface {
    pub fn new(
        config: InterfaceConfig,
        max_unicast_solicit: u32,
        transport: Arc<dyn NdTransport>,
        timers: Box<dyn TimerService>,
        metrics: MetricsCollector,
    ) -> Self {
        Self {
            config,
            max_unicast_solicit,
            cache: NeighborCache::new(),
            counters: PacketCounters::default(),
            transport,
            timers,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn ifindex(&self) -> u32 {
        self.config.ifindex
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// Aggregate send/receive counters
    pub fn counters(&self) -> PacketCounters {
        self.counters
    }

    pub fn neighbor_count(&self) -> usize {
        self.cache.len()
    }

    /// Copy of one cached neighbor
    pub fn neighbor(&self, key: &NeighborKey) -> Option<NeighborSnapshot> {
        self.cache.lookup(key).map(|entry| entry.snapshot())
    }

    /// Copies of every cached neighbor
    pub fn neighbors(&self) -> Vec<NeighborSnapshot> {
        self.cache.iter().map(|entry| entry.snapshot()).collect()
    }

    /// Number of timers currently running for this interface
    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// Replace configuration; new intervals apply from the next armed timer.
    ///
    /// Name and index identify the port to handles, the server and every
    /// subscriber, so both are kept from the current configuration.
    pub fn reconfigure(&mut self, mut config: InterfaceConfig) {
        if config.name != self.config.name || config.ifindex != self.config.ifindex {
            warn!(
                interface = %self.config.name,
                requested_name = %config.name,
                requested_ifindex = config.ifindex,
                "Ignoring port identity change in reconfiguration"
            );
        }
        config.name.clone_from(&self.config.name);
        config.ifindex = self.config.ifindex;
        info!(
            interface = %self.config.name,
            reachable_ms = config.reachable_time_ms,
            retrans_ms = config.retrans_time_ms,
            "Interface reconfigured"
        );
        self.config = config;
    }

    /// Drop every neighbor (port down), returning their descriptors
    pub fn flush(&mut self) -> Vec<NeighborInfo> {
        let entries = self.cache.drain();
        for entry in &entries {
            self.timers.cancel(entry.key());
        }
        if !entries.is_empty() {
            self.metrics.record_neighbors_evicted(entries.len());
            info!(interface = %self.config.name, count = entries.len(), "Flushed neighbor cache");
        }
        entries
            .iter()
            .map(|entry| entry.info(&self.config.name))
            .collect()
    }

    /// Multicast a solicitation for `target` to its solicited-node group.
    ///
    /// This asks "who has" without creating a cache entry; the entry appears
    /// only once the neighbor talks to us.
    pub fn resolve(&mut self, target: Ipv6Addr) -> Result<()> {
        let source = match self.config.source_for(&IpAddr::V6(target)) {
            IpAddr::V6(v6) => v6,
            IpAddr::V4(_) => Ipv6Addr::UNSPECIFIED,
        };
        let ns = Solicitation::multicast(self.config.mac, source, target);
        match self.transport.send_solicitation(&ns) {
            Ok(()) => {
                self.counters.send += 1;
                self.metrics.solicitations_sent_total.inc();
                debug!(interface = %self.config.name, %target, "Sent multicast solicitation");
                Ok(())
            }
            Err(e) => {
                self.metrics.send_failures_total.inc();
                Err(e)
            }
        }
    }

    /// Arm the timer of `kind` for `key` with this interface's interval
    pub(crate) fn arm_timer(&mut self, key: NeighborKey, kind: TimerKind) {
        let after = self.config.timer_interval(kind);
        self.timers.arm(key, after);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::NdpError;
    use crate::timer::ManualTimers;
    use crate::types::MacAddress;
    use parking_lot::Mutex;

    pub const OUR_MAC: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x01]);

    /// Transport that records solicitations and can be told to fail
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<Solicitation>>,
        pub fail: Mutex<bool>,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<Solicitation> {
            self.sent.lock().clone()
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    impl NdTransport for RecordingTransport {
        fn send_solicitation(&self, ns: &Solicitation) -> Result<()> {
            if *self.fail.lock() {
                return Err(NdpError::Transport("link down".into()));
            }
            self.sent.lock().push(ns.clone());
            Ok(())
        }
    }

    pub fn config() -> InterfaceConfig {
        InterfaceConfig::new("Ethernet0", 5, OUR_MAC, "fe80::1".parse().unwrap())
            .with_global("2001:db8::1".parse().unwrap())
    }

    pub fn interface() -> (Interface, Arc<RecordingTransport>, ManualTimers) {
        let transport = Arc::new(RecordingTransport::default());
        let timers = ManualTimers::new();
        let intf = Interface::new(
            config(),
            3,
            transport.clone(),
            Box::new(timers.clone()),
            MetricsCollector::new().unwrap(),
        );
        (intf, transport, timers)
    }
}
