//! Per-neighbor NUD state machine
//!
//! Transitions driven by probes leaving the box:
//!
//! ```text
//!  REACHABLE/STALE --probe--> DELAY --probe--> PROBE --probe--> PROBE ... (evicted)
//!  INCOMPLETE ------------------------probe--> PROBE
//! ```
//!
//! Any received solicitation forces STALE; a solicited advertisement
//! confirms REACHABLE. Eviction is decided by the scheduler, the entry only
//! reports whether its probe budget is spent.

use crate::types::{NeighborInfo, NeighborKey, NeighborSnapshot, NeighborState, PacketCounters};

/// Which one-shot timer an entry has running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Reachable time elapsed, neighbor needs re-confirmation
    Reachable,
    /// Delay before the first probe
    DelayProbe,
    /// Interval between probes
    Retransmit,
}

/// Neighbor cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    key: NeighborKey,
    state: NeighborState,
    probes_sent: u32,
    timer: Option<TimerKind>,
    counters: PacketCounters,
    /// Owning interface
    ifindex: u32,
}

impl NeighborEntry {
    /// Entry learned from a received solicitation.
    ///
    /// A source link-layer address option proves the neighbor reachable;
    /// without one the entry starts INCOMPLETE and goes straight to probing.
    pub fn learned(key: NeighborKey, ifindex: u32, has_source_link_layer: bool) -> Self {
        let (state, timer) = if has_source_link_layer {
            (NeighborState::Reachable, TimerKind::Reachable)
        } else {
            (NeighborState::Incomplete, TimerKind::Retransmit)
        };
        Self {
            key,
            state,
            probes_sent: 0,
            timer: Some(timer),
            counters: PacketCounters::default(),
            ifindex,
        }
    }

    pub fn key(&self) -> &NeighborKey {
        &self.key
    }

    pub fn state(&self) -> NeighborState {
        self.state
    }

    /// Unicast probes sent since the neighbor was last confirmed
    pub fn probes_sent(&self) -> u32 {
        self.probes_sent
    }

    /// The timer most recently armed for this entry, if any
    pub fn timer(&self) -> Option<TimerKind> {
        self.timer
    }

    pub fn counters(&self) -> PacketCounters {
        self.counters
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    /// Whether the next timer firing must evict instead of probing.
    ///
    /// Only entries that are actively probing spend budget; REACHABLE and
    /// STALE restart the cycle with a fresh counter.
    pub fn probe_budget_exhausted(&self, max_unicast_solicit: u32) -> bool {
        match self.state {
            NeighborState::Delay | NeighborState::Probe | NeighborState::Incomplete => {
                self.probes_sent >= max_unicast_solicit
            }
            NeighborState::Reachable | NeighborState::Stale => false,
        }
    }

    /// Apply the transition for a unicast solicitation that was sent
    /// successfully and return the timer to arm next.
    pub fn probe_sent(&mut self) -> TimerKind {
        let timer = match self.state {
            NeighborState::Reachable | NeighborState::Stale => {
                self.state = NeighborState::Delay;
                self.probes_sent = 0;
                TimerKind::DelayProbe
            }
            NeighborState::Delay | NeighborState::Probe | NeighborState::Incomplete => {
                self.state = NeighborState::Probe;
                self.probes_sent += 1;
                TimerKind::Retransmit
            }
        };
        self.timer = Some(timer);
        self.counters.send += 1;
        timer
    }

    /// Send failed; only the timer changes so the next firing retries
    pub fn retry_scheduled(&mut self) -> TimerKind {
        self.timer = Some(TimerKind::Retransmit);
        TimerKind::Retransmit
    }

    /// Traffic from the neighbor: reachability may be out of date
    pub fn solicitation_received(&mut self) -> TimerKind {
        self.state = NeighborState::Stale;
        self.timer = Some(TimerKind::Reachable);
        self.counters.recv += 1;
        TimerKind::Reachable
    }

    /// Solicited advertisement: neighbor confirmed reachable
    pub fn reachability_confirmed(&mut self) -> TimerKind {
        self.state = NeighborState::Reachable;
        self.probes_sent = 0;
        self.timer = Some(TimerKind::Reachable);
        self.counters.recv += 1;
        TimerKind::Reachable
    }

    /// Packet received that carries no state information
    pub fn packet_received(&mut self) {
        self.counters.recv += 1;
    }

    /// Descriptor for upstream notification
    pub fn info(&self, interface: &str) -> NeighborInfo {
        NeighborInfo {
            ip: self.key.ip,
            mac: self.key.mac,
            ifindex: self.ifindex,
            interface: interface.to_string(),
            state: self.state,
        }
    }

    pub fn snapshot(&self) -> NeighborSnapshot {
        NeighborSnapshot {
            ip: self.key.ip,
            mac: self.key.mac,
            state: self.state,
            probes_sent: self.probes_sent,
            counters: self.counters,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_state(mut self, state: NeighborState, probes_sent: u32) -> Self {
        self.state = state;
        self.probes_sent = probes_sent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MacAddress;

    fn key() -> NeighborKey {
        NeighborKey::new("fe80::2".parse().unwrap(), MacAddress([2, 0, 0, 0, 0, 2]))
    }

    #[test]
    fn test_learned_with_slla_is_reachable() {
        let entry = NeighborEntry::learned(key(), 7, true);
        assert_eq!(entry.state(), NeighborState::Reachable);
        assert_eq!(entry.timer(), Some(TimerKind::Reachable));
        assert_eq!(entry.probes_sent(), 0);
        assert_eq!(entry.ifindex(), 7);
    }

    #[test]
    fn test_learned_without_slla_is_incomplete() {
        let entry = NeighborEntry::learned(key(), 7, false);
        assert_eq!(entry.state(), NeighborState::Incomplete);
        assert_eq!(entry.timer(), Some(TimerKind::Retransmit));
    }

    #[test]
    fn test_probe_cycle_is_monotonic() {
        let mut entry = NeighborEntry::learned(key(), 1, true);

        assert_eq!(entry.probe_sent(), TimerKind::DelayProbe);
        assert_eq!(entry.state(), NeighborState::Delay);
        assert_eq!(entry.probes_sent(), 0);

        assert_eq!(entry.probe_sent(), TimerKind::Retransmit);
        assert_eq!(entry.state(), NeighborState::Probe);
        assert_eq!(entry.probes_sent(), 1);

        assert_eq!(entry.probe_sent(), TimerKind::Retransmit);
        assert_eq!(entry.state(), NeighborState::Probe);
        assert_eq!(entry.probes_sent(), 2);
        assert_eq!(entry.counters().send, 3);
    }

    #[test]
    fn test_budget_only_applies_while_probing() {
        let entry = NeighborEntry::learned(key(), 1, true).with_state(NeighborState::Probe, 3);
        assert!(entry.probe_budget_exhausted(3));
        assert!(!entry.probe_budget_exhausted(4));

        let stale = NeighborEntry::learned(key(), 1, true).with_state(NeighborState::Stale, 3);
        assert!(!stale.probe_budget_exhausted(3));
    }

    #[test]
    fn test_solicitation_forces_stale_from_any_state() {
        for state in [
            NeighborState::Incomplete,
            NeighborState::Reachable,
            NeighborState::Stale,
            NeighborState::Delay,
            NeighborState::Probe,
        ] {
            let mut entry = NeighborEntry::learned(key(), 1, true).with_state(state, 1);
            assert_eq!(entry.solicitation_received(), TimerKind::Reachable);
            assert_eq!(entry.state(), NeighborState::Stale);
            assert_eq!(entry.counters().recv, 1);
        }
    }

    #[test]
    fn test_stale_probe_restarts_cycle() {
        let mut entry = NeighborEntry::learned(key(), 1, true).with_state(NeighborState::Stale, 2);
        entry.probe_sent();
        assert_eq!(entry.state(), NeighborState::Delay);
        assert_eq!(entry.probes_sent(), 0);
    }

    #[test]
    fn test_confirmation_resets_probes() {
        let mut entry = NeighborEntry::learned(key(), 1, true).with_state(NeighborState::Probe, 2);
        entry.reachability_confirmed();
        assert_eq!(entry.state(), NeighborState::Reachable);
        assert_eq!(entry.probes_sent(), 0);
        assert_eq!(entry.timer(), Some(TimerKind::Reachable));
    }

    #[test]
    fn test_info_carries_interface() {
        let entry = NeighborEntry::learned(key(), 9, true);
        let info = entry.info("Ethernet0");
        assert_eq!(info.ifindex, 9);
        assert_eq!(info.interface, "Ethernet0");
        assert_eq!(info.ip, key().ip);
        assert_eq!(info.mac, key().mac);
    }

    #[test]
    fn test_failed_send_only_moves_timer() {
        let mut entry = NeighborEntry::learned(key(), 1, true).with_state(NeighborState::Probe, 1);
        assert_eq!(entry.retry_scheduled(), TimerKind::Retransmit);
        assert_eq!(entry.timer(), Some(TimerKind::Retransmit));
        assert_eq!(entry.state(), NeighborState::Probe);
        assert_eq!(entry.probes_sent(), 1);
        assert_eq!(entry.counters().send, 0);
    }
}
