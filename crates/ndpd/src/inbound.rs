//! Inbound event processor: received solicitations and advertisements

use crate::entry::NeighborEntry;
use crate::interface::Interface;
use crate::packet::{NdInfo, NdMessageType};
use crate::types::{NdpOperation, NeighborInfo, is_all_nodes_multicast};
use tracing::{debug, info, trace};

impl Interface {
    /// Dispatch a decoded ND packet
    pub fn process_packet(&mut self, nd: &NdInfo) -> (Option<NeighborInfo>, NdpOperation) {
        match nd.msg_type {
            NdMessageType::NeighborSolicitation => self.process_ns(nd),
            NdMessageType::NeighborAdvertisement => self.process_na(nd),
        }
    }

    /// Handle a received neighbor solicitation.
    ///
    /// Solicitations from "::" (duplicate address detection, our own probes)
    /// and anything sent to all-nodes never touch the cache. A new neighbor is
    /// created and its descriptor returned with CREATE; a known one is forced
    /// STALE and reported as UPDATE without a descriptor.
    ///
    /// # NIST Controls
    /// - SC-7: Boundary Protection - Only neighbors seen on this link are learned
    pub fn process_ns(&mut self, nd: &NdInfo) -> (Option<NeighborInfo>, NdpOperation) {
        if nd.has_unspecified_source() || is_all_nodes_multicast(&nd.dst_ip) {
            trace!(
                interface = %self.config.name,
                src = %nd.src_ip,
                dst = %nd.dst_ip,
                "Ignoring locally originated or all-nodes solicitation"
            );
            self.metrics.packets_ignored_total.inc();
            return (None, NdpOperation::Ignore);
        }

        let key = nd.neighbor_key();
        self.counters.recv += 1;
        self.metrics.solicitations_received_total.inc();

        match self.cache.lookup(&key) {
            Some(mut entry) => {
                let previous = entry.state();
                let timer = entry.solicitation_received();
                self.arm_timer(key, timer);
                self.cache.upsert(entry);
                debug!(
                    interface = %self.config.name,
                    neighbor = %key,
                    from = %previous,
                    "Solicitation from known neighbor, now STALE"
                );
                (None, NdpOperation::Update)
            }
            None => {
                let has_slla = nd.source_link_layer().is_some();
                let mut entry = NeighborEntry::learned(key, self.config.ifindex, has_slla);
                entry.packet_received();
                if let Some(timer) = entry.timer() {
                    self.arm_timer(key, timer);
                }
                let descriptor = entry.info(&self.config.name);
                self.cache.upsert(entry);
                self.metrics.record_neighbor_created();
                info!(
                    interface = %self.config.name,
                    neighbor = %key,
                    state = %descriptor.state,
                    "Learned neighbor"
                );
                (Some(descriptor), NdpOperation::Create)
            }
        }
    }

    /// Handle a received neighbor advertisement.
    ///
    /// A solicited advertisement from a cached neighbor confirms it
    /// REACHABLE and ends any probing. Advertisements never create entries.
    pub fn process_na(&mut self, nd: &NdInfo) -> (Option<NeighborInfo>, NdpOperation) {
        if nd.has_unspecified_source() {
            self.metrics.packets_ignored_total.inc();
            return (None, NdpOperation::Ignore);
        }

        let key = nd.neighbor_key();
        let Some(mut entry) = self.cache.lookup(&key) else {
            trace!(
                interface = %self.config.name,
                neighbor = %key,
                "Advertisement for unknown neighbor"
            );
            self.metrics.packets_ignored_total.inc();
            return (None, NdpOperation::Ignore);
        };

        self.counters.recv += 1;
        self.metrics.advertisements_received_total.inc();

        if !nd.flags.solicited {
            entry.packet_received();
            self.cache.upsert(entry);
            return (None, NdpOperation::Ignore);
        }

        let previous = entry.state();
        let timer = entry.reachability_confirmed();
        self.arm_timer(key, timer);
        self.cache.upsert(entry);
        debug!(
            interface = %self.config.name,
            neighbor = %key,
            from = %previous,
            "Neighbor confirmed reachable"
        );
        (None, NdpOperation::Update)
    }
}

#[cfg(test)]
mod tests {
    use crate::entry::{NeighborEntry, TimerKind};
    use crate::interface::testing::*;
    use crate::packet::{NaFlags, NdInfo, NdMessageType, NdOption};
    use crate::types::{MacAddress, NdpOperation, NeighborKey, NeighborState};
    use std::net::IpAddr;
    use std::time::Duration;

    const NBR_MAC: MacAddress = MacAddress([0xaa, 0xbb, 0xcc, 0, 0, 1]);

    fn ns(src: &str, dst: &str, with_slla: bool) -> NdInfo {
        NdInfo {
            msg_type: NdMessageType::NeighborSolicitation,
            src_mac: NBR_MAC,
            dst_mac: OUR_MAC,
            src_ip: src.parse().unwrap(),
            dst_ip: dst.parse().unwrap(),
            target: "2001:db8::1".parse().unwrap(),
            flags: NaFlags::default(),
            options: if with_slla {
                vec![NdOption::SourceLinkLayerAddress(NBR_MAC)]
            } else {
                vec![]
            },
        }
    }

    fn na(target: &str, solicited: bool) -> NdInfo {
        NdInfo {
            msg_type: NdMessageType::NeighborAdvertisement,
            src_mac: NBR_MAC,
            dst_mac: OUR_MAC,
            src_ip: target.parse().unwrap(),
            dst_ip: "2001:db8::1".parse().unwrap(),
            target: target.parse().unwrap(),
            flags: NaFlags {
                solicited,
                ..NaFlags::default()
            },
            options: vec![NdOption::TargetLinkLayerAddress(NBR_MAC)],
        }
    }

    fn key(ip: &str) -> NeighborKey {
        NeighborKey::new(ip.parse().unwrap(), NBR_MAC)
    }

    #[test]
    fn test_new_neighbor_with_slla_created_reachable() {
        let (mut intf, _, timers) = interface();
        let (info, op) = intf.process_ns(&ns("2001:db8::2", "ff02::1:ff00:1", true));

        assert_eq!(op, NdpOperation::Create);
        let info = info.unwrap();
        assert_eq!(info.state, NeighborState::Reachable);
        assert_eq!(info.ifindex, 5);
        assert_eq!(info.interface, "Ethernet0");

        let k = key("2001:db8::2");
        assert_eq!(intf.cache.lookup(&k).unwrap().state(), NeighborState::Reachable);
        assert_eq!(timers.armed(&k).unwrap().1, Duration::from_secs(30));
        assert_eq!(intf.counters().recv, 1);
    }

    #[test]
    fn test_new_neighbor_without_slla_is_incomplete() {
        let (mut intf, _, timers) = interface();
        let (info, op) = intf.process_ns(&ns("2001:db8::2", "2001:db8::1", false));

        assert_eq!(op, NdpOperation::Create);
        assert_eq!(info.unwrap().state, NeighborState::Incomplete);
        assert_eq!(timers.armed(&key("2001:db8::2")).unwrap().1, Duration::from_secs(1));
    }

    #[test]
    fn test_known_neighbor_forced_stale() {
        let (mut intf, _, _) = interface();
        let k = key("2001:db8::2");
        intf.cache
            .upsert(NeighborEntry::learned(k, 5, true).with_state(NeighborState::Probe, 2));

        let (info, op) = intf.process_ns(&ns("2001:db8::2", "2001:db8::1", true));
        assert_eq!(op, NdpOperation::Update);
        assert!(info.is_none());

        let entry = intf.cache.lookup(&k).unwrap();
        assert_eq!(entry.state(), NeighborState::Stale);
        assert_eq!(entry.timer(), Some(TimerKind::Reachable));
    }

    #[test]
    fn test_repeated_solicitations_stay_stale() {
        let (mut intf, _, _) = interface();
        intf.process_ns(&ns("2001:db8::2", "2001:db8::1", true));
        for _ in 0..3 {
            let (_, op) = intf.process_ns(&ns("2001:db8::2", "2001:db8::1", true));
            assert_eq!(op, NdpOperation::Update);
        }
        assert_eq!(intf.neighbor_count(), 1);
        let entry = intf.cache.lookup(&key("2001:db8::2")).unwrap();
        assert_eq!(entry.state(), NeighborState::Stale);
        assert_eq!(entry.counters().recv, 4);
    }

    #[test]
    fn test_unspecified_source_ignored() {
        let (mut intf, _, timers) = interface();
        let (info, op) = intf.process_ns(&ns("::", "ff02::1:ff00:1", false));
        assert_eq!(op, NdpOperation::Ignore);
        assert!(info.is_none());
        assert_eq!(intf.neighbor_count(), 0);
        assert_eq!(intf.counters().recv, 0);
        assert_eq!(intf.pending_timers(), 0);
        drop(timers);
    }

    #[test]
    fn test_all_nodes_destination_ignored() {
        let (mut intf, _, _) = interface();
        let (_, op) = intf.process_ns(&ns("2001:db8::2", "ff02::1", true));
        assert_eq!(op, NdpOperation::Ignore);
        assert_eq!(intf.neighbor_count(), 0);
    }

    #[test]
    fn test_slla_overrides_frame_source() {
        let (mut intf, _, _) = interface();
        let mut packet = ns("2001:db8::2", "2001:db8::1", false);
        let other = MacAddress([0xaa, 0xbb, 0xcc, 0, 0, 9]);
        packet.options = vec![NdOption::SourceLinkLayerAddress(other)];
        intf.process_ns(&packet);

        let k = NeighborKey::new("2001:db8::2".parse::<IpAddr>().unwrap(), other);
        assert!(intf.cache.contains(&k));
    }

    #[test]
    fn test_mac_change_creates_second_entry() {
        let (mut intf, _, _) = interface();
        intf.process_ns(&ns("2001:db8::2", "2001:db8::1", true));

        let mut spoofed = ns("2001:db8::2", "2001:db8::1", false);
        spoofed.src_mac = MacAddress([0xde, 0xad, 0, 0, 0, 1]);
        let (info, op) = intf.process_ns(&spoofed);

        assert_eq!(op, NdpOperation::Create);
        assert!(info.is_some());
        assert_eq!(intf.neighbor_count(), 2);
    }

    #[test]
    fn test_solicited_na_confirms_reachable() {
        let (mut intf, _, timers) = interface();
        let k = key("2001:db8::2");
        intf.cache
            .upsert(NeighborEntry::learned(k, 5, true).with_state(NeighborState::Probe, 2));

        let (info, op) = intf.process_packet(&na("2001:db8::2", true));
        assert_eq!(op, NdpOperation::Update);
        assert!(info.is_none());

        let entry = intf.cache.lookup(&k).unwrap();
        assert_eq!(entry.state(), NeighborState::Reachable);
        assert_eq!(entry.probes_sent(), 0);
        assert_eq!(timers.armed(&k).unwrap().1, Duration::from_secs(30));
    }

    #[test]
    fn test_unsolicited_na_leaves_state() {
        let (mut intf, _, _) = interface();
        let k = key("2001:db8::2");
        intf.cache
            .upsert(NeighborEntry::learned(k, 5, true).with_state(NeighborState::Delay, 0));

        let (_, op) = intf.process_na(&na("2001:db8::2", false));
        assert_eq!(op, NdpOperation::Ignore);
        let entry = intf.cache.lookup(&k).unwrap();
        assert_eq!(entry.state(), NeighborState::Delay);
        assert_eq!(entry.counters().recv, 1);
    }

    #[test]
    fn test_na_never_creates() {
        let (mut intf, _, _) = interface();
        let (_, op) = intf.process_na(&na("2001:db8::2", true));
        assert_eq!(op, NdpOperation::Ignore);
        assert_eq!(intf.neighbor_count(), 0);
    }
}
