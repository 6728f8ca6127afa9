//! Core types for neighbor discovery

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::net::{IpAddr, Ipv6Addr};

/// MAC address representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Zero MAC address
    pub const ZERO: Self = Self([0, 0, 0, 0, 0, 0]);

    /// Broadcast MAC address
    pub const BROADCAST: Self = Self([0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check if this is a zero MAC
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO.0
    }

    /// Check if this is a group (multicast or broadcast) MAC
    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Ethernet multicast MAC for an IPv6 multicast group (33:33 + low 32 bits)
    pub fn ipv6_multicast(group: &Ipv6Addr) -> Self {
        let o = group.octets();
        Self([0x33, 0x33, o[12], o[13], o[14], o[15]])
    }

    /// Parse MAC from colon-separated string (e.g., "00:11:22:33:44:55")
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return None;
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return None;
            }
            bytes[i] = u8::from_str_radix(part, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl std::str::FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid MAC address: {}", s))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Neighbor unreachability detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeighborState {
    /// Address resolution in progress, link-layer address not yet confirmed
    Incomplete,
    /// Positively confirmed within the last reachable time
    Reachable,
    /// Reachability unknown until traffic is sent
    Stale,
    /// Waiting before sending the first probe
    Delay,
    /// Actively probing with unicast solicitations
    Probe,
}

impl std::fmt::Display for NeighborState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Incomplete => "INCOMPLETE",
            Self::Reachable => "REACHABLE",
            Self::Stale => "STALE",
            Self::Delay => "DELAY",
            Self::Probe => "PROBE",
        };
        f.write_str(s)
    }
}

/// Outcome of processing one neighbor event, propagated to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NdpOperation {
    Create,
    Update,
    Delete,
    Ignore,
}

/// Neighbor cache key
///
/// The same IP behind a different MAC is a different neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NeighborKey {
    pub ip: IpAddr,
    pub mac: MacAddress,
}

impl NeighborKey {
    pub fn new(ip: IpAddr, mac: MacAddress) -> Self {
        Self { ip, mac }
    }
}

impl std::fmt::Display for NeighborKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.ip, self.mac)
    }
}

/// Send/receive packet counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketCounters {
    pub send: u64,
    pub recv: u64,
}

/// Neighbor descriptor handed to upstream subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborInfo {
    pub ip: IpAddr,
    pub mac: MacAddress,
    pub ifindex: u32,
    /// Owning interface name
    pub interface: String,
    pub state: NeighborState,
}

/// Read-only copy of a cached neighbor for management queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSnapshot {
    pub ip: IpAddr,
    pub mac: MacAddress,
    pub state: NeighborState,
    pub probes_sent: u32,
    pub counters: PacketCounters,
}

/// Check if address is link-local scope (fe80::/10, 169.254.0.0/16)
#[inline]
pub fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
        IpAddr::V4(v4) => v4.is_link_local(),
    }
}

/// Check if address is the IPv6 all-nodes multicast group (ff02::1)
#[inline]
pub fn is_all_nodes_multicast(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V6(v6) => *v6 == Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1),
        IpAddr::V4(_) => false,
    }
}

/// Solicited-node multicast group for a target (ff02::1:ffXX:XXXX)
pub fn solicited_node_multicast(target: &Ipv6Addr) -> Ipv6Addr {
    let o = target.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        1,
        0xff00 | u16::from(o[13]),
        (u16::from(o[14]) << 8) | u16::from(o[15]),
    )
}
