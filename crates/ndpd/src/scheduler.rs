//! Solicitation scheduler: timer-driven unicast probes and eviction

use crate::entry::{NeighborEntry, TimerKind};
use crate::interface::Interface;
use crate::packet::Solicitation;
use crate::types::{MacAddress, NdpOperation, NeighborInfo, NeighborKey};
use std::net::IpAddr;
use tracing::{debug, info, trace, warn};

impl Interface {
    /// Send one unicast solicitation to a cached neighbor.
    ///
    /// Unknown neighbors are never probed into existence. When the probe
    /// budget is spent the neighbor is evicted instead and its descriptor is
    /// returned with DELETE. A transport failure leaves state and counters
    /// untouched and re-arms a retransmit timer so the next firing retries.
    ///
    /// # NIST Controls
    /// - SI-4: System Monitoring - Unanswered neighbors are evicted
    pub fn send_unicast_ns(
        &mut self,
        src_mac: MacAddress,
        nbr_mac: MacAddress,
        nbr_ip: IpAddr,
    ) -> (Option<NeighborInfo>, NdpOperation) {
        let key = NeighborKey::new(nbr_ip, nbr_mac);
        let Some(mut entry) = self.cache.lookup(&key) else {
            debug!(interface = %self.config.name, neighbor = %key, "Solicit target not cached");
            return (None, NdpOperation::Ignore);
        };

        if entry.probe_budget_exhausted(self.max_unicast_solicit) {
            let info = self.evict(&entry);
            return (Some(info), NdpOperation::Delete);
        }

        let src_ip = self.config.source_for(&nbr_ip);
        let ns = Solicitation::unicast(src_mac, src_ip, nbr_mac, nbr_ip);
        if let Err(e) = self.transport.send_solicitation(&ns) {
            warn!(
                interface = %self.config.name,
                neighbor = %key,
                error = %e,
                "Failed to send unicast solicitation"
            );
            self.metrics.send_failures_total.inc();
            let retry = entry.retry_scheduled();
            self.arm_timer(key, retry);
            self.cache.upsert(entry);
            return (None, NdpOperation::Ignore);
        }

        let previous = entry.state();
        let next_timer = entry.probe_sent();
        self.counters.send += 1;
        self.metrics.solicitations_sent_total.inc();
        self.arm_timer(key, next_timer);

        debug!(
            interface = %self.config.name,
            neighbor = %key,
            from = %previous,
            to = %entry.state(),
            probes = entry.probes_sent(),
            "Sent unicast solicitation"
        );
        self.cache.upsert(entry);
        (None, NdpOperation::Ignore)
    }

    /// A neighbor timer fired.
    ///
    /// Firings for superseded timers or for neighbors no longer cached are
    /// dropped without touching anything.
    pub fn on_timer_expired(
        &mut self,
        key: NeighborKey,
        generation: u64,
    ) -> (Option<NeighborInfo>, NdpOperation) {
        if !self.timers.fired(&key, generation) {
            trace!(
                interface = %self.config.name,
                neighbor = %key,
                generation,
                "Discarding stale timer"
            );
            self.metrics.stale_timers_total.inc();
            return (None, NdpOperation::Ignore);
        }
        if !self.cache.contains(&key) {
            trace!(interface = %self.config.name, neighbor = %key, "Timer for evicted neighbor");
            self.metrics.stale_timers_total.inc();
            return (None, NdpOperation::Ignore);
        }

        let src_mac = self.config.mac;
        self.send_unicast_ns(src_mac, key.mac, key.ip)
    }

    fn evict(&mut self, entry: &NeighborEntry) -> NeighborInfo {
        let key = *entry.key();
        self.cache.delete(&key);
        self.timers.cancel(&key);
        self.metrics.record_neighbors_evicted(1);
        info!(
            interface = %self.config.name,
            neighbor = %key,
            probes = entry.probes_sent(),
            "Neighbor unreachable, evicted"
        );
        entry.info(&self.config.name)
    }
}
