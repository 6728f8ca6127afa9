//! Neighbor discovery packet records and wire codec
//!
//! Frames are Ethernet II carrying IPv6 with an ICMPv6 Neighbor Solicitation
//! (type 135) or Neighbor Advertisement (type 136) payload. Decoding produces a
//! transient [`NdInfo`] record owned by the caller; nothing here is cached.

use crate::error::{NdpError, Result};
use crate::types::{MacAddress, NeighborKey, solicited_node_multicast};
use std::net::{IpAddr, Ipv6Addr};

pub const ETHERTYPE_IPV6: u16 = 0x86dd;
pub const IPPROTO_ICMPV6: u8 = 58;
pub const ICMPV6_NEIGHBOR_SOLICITATION: u8 = 135;
pub const ICMPV6_NEIGHBOR_ADVERTISEMENT: u8 = 136;

/// Hop limit required on every ND message (RFC 4861 7.1.1)
pub const ND_HOP_LIMIT: u8 = 255;

const ETH_HEADER_LEN: usize = 14;
const IPV6_HEADER_LEN: usize = 40;
/// Type, code, checksum, reserved/flags, target
const ND_MESSAGE_LEN: usize = 24;

const OPT_SOURCE_LINK_LAYER: u8 = 1;
const OPT_TARGET_LINK_LAYER: u8 = 2;

/// NA flag bits (first byte of the reserved word)
const NA_FLAG_ROUTER: u8 = 0x80;
const NA_FLAG_SOLICITED: u8 = 0x40;
const NA_FLAG_OVERRIDE: u8 = 0x20;

/// Neighbor discovery message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdMessageType {
    NeighborSolicitation,
    NeighborAdvertisement,
}

/// ND option carried in a received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdOption {
    SourceLinkLayerAddress(MacAddress),
    TargetLinkLayerAddress(MacAddress),
    /// Any other option, kept only so the list reflects the wire
    Unrecognized { kind: u8, len: u8 },
}

/// NA flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaFlags {
    pub router: bool,
    pub solicited: bool,
    pub override_: bool,
}

/// Decoded neighbor discovery message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdInfo {
    pub msg_type: NdMessageType,
    /// Ethernet source
    pub src_mac: MacAddress,
    /// Ethernet destination
    pub dst_mac: MacAddress,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub target: IpAddr,
    /// Only meaningful for advertisements
    pub flags: NaFlags,
    pub options: Vec<NdOption>,
}

impl NdInfo {
    /// Link-layer address from the source link-layer address option, if any
    pub fn source_link_layer(&self) -> Option<MacAddress> {
        self.options.iter().find_map(|opt| match opt {
            NdOption::SourceLinkLayerAddress(mac) => Some(*mac),
            NdOption::TargetLinkLayerAddress(_) | NdOption::Unrecognized { .. } => None,
        })
    }

    /// Link-layer address from the target link-layer address option, if any
    pub fn target_link_layer(&self) -> Option<MacAddress> {
        self.options.iter().find_map(|opt| match opt {
            NdOption::TargetLinkLayerAddress(mac) => Some(*mac),
            NdOption::SourceLinkLayerAddress(_) | NdOption::Unrecognized { .. } => None,
        })
    }

    /// Source address is "::" (or 0.0.0.0)
    pub fn has_unspecified_source(&self) -> bool {
        self.src_ip.is_unspecified()
    }

    /// Cache key of the neighbor this message speaks for.
    ///
    /// Solicitations identify the sender, advertisements the target. The
    /// link-layer option wins over the Ethernet source when present.
    pub fn neighbor_key(&self) -> NeighborKey {
        match self.msg_type {
            NdMessageType::NeighborSolicitation => NeighborKey::new(
                self.src_ip,
                self.source_link_layer().unwrap_or(self.src_mac),
            ),
            NdMessageType::NeighborAdvertisement => NeighborKey::new(
                self.target,
                self.target_link_layer().unwrap_or(self.src_mac),
            ),
        }
    }
}

/// Parameters of an outbound solicitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solicitation {
    pub src_mac: MacAddress,
    pub dst_mac: MacAddress,
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub target: IpAddr,
}

impl Solicitation {
    /// Unicast probe straight to a known neighbor
    pub fn unicast(
        src_mac: MacAddress,
        src_ip: IpAddr,
        dst_mac: MacAddress,
        dst_ip: IpAddr,
    ) -> Self {
        Self {
            src_mac,
            dst_mac,
            src_ip,
            dst_ip,
            target: dst_ip,
        }
    }

    /// Multicast solicitation to the target's solicited-node group
    pub fn multicast(src_mac: MacAddress, src_ip: Ipv6Addr, target: Ipv6Addr) -> Self {
        let group = solicited_node_multicast(&target);
        Self {
            src_mac,
            dst_mac: MacAddress::ipv6_multicast(&group),
            src_ip: IpAddr::V6(src_ip),
            dst_ip: IpAddr::V6(group),
            target: IpAddr::V6(target),
        }
    }
}

fn require_v6(addr: IpAddr, what: &str) -> Result<Ipv6Addr> {
    match addr {
        IpAddr::V6(v6) => Ok(v6),
        IpAddr::V4(v4) => Err(NdpError::Encode(format!(
            "{} {} is not an IPv6 address",
            what, v4
        ))),
    }
}

/// Encode a solicitation as a complete Ethernet frame
pub fn encode_solicitation(ns: &Solicitation) -> Result<Vec<u8>> {
    let src_ip = require_v6(ns.src_ip, "source")?;
    let dst_ip = require_v6(ns.dst_ip, "destination")?;
    let target = require_v6(ns.target, "target")?;

    // An unspecified source must not carry the SLLA option
    let with_slla = !src_ip.is_unspecified();
    let icmp_len = ND_MESSAGE_LEN + if with_slla { 8 } else { 0 };

    let mut frame = Vec::with_capacity(ETH_HEADER_LEN + IPV6_HEADER_LEN + icmp_len);

    frame.extend_from_slice(&ns.dst_mac.octets());
    frame.extend_from_slice(&ns.src_mac.octets());
    frame.extend_from_slice(&ETHERTYPE_IPV6.to_be_bytes());

    frame.extend_from_slice(&[0x60, 0, 0, 0]);
    frame.extend_from_slice(&(icmp_len as u16).to_be_bytes());
    frame.push(IPPROTO_ICMPV6);
    frame.push(ND_HOP_LIMIT);
    frame.extend_from_slice(&src_ip.octets());
    frame.extend_from_slice(&dst_ip.octets());

    let icmp_start = frame.len();
    frame.extend_from_slice(&[ICMPV6_NEIGHBOR_SOLICITATION, 0, 0, 0]);
    frame.extend_from_slice(&[0, 0, 0, 0]);
    frame.extend_from_slice(&target.octets());
    if with_slla {
        frame.push(OPT_SOURCE_LINK_LAYER);
        frame.push(1);
        frame.extend_from_slice(&ns.src_mac.octets());
    }

    let csum = icmpv6_checksum(&src_ip, &dst_ip, &frame[icmp_start..]);
    frame[icmp_start + 2..icmp_start + 4].copy_from_slice(&csum.to_be_bytes());

    Ok(frame)
}

/// Decode an Ethernet frame into an ND record
///
/// Anything that is not a well-formed NS or NA is rejected here so the
/// neighbor cache never sees it.
///
/// # NIST Controls
/// - SI-10: Information Input Validation - Length, next header, hop limit
///   and checksum checked before any field is trusted
pub fn decode(frame: &[u8]) -> Result<NdInfo> {
    if frame.len() < ETH_HEADER_LEN + IPV6_HEADER_LEN + ND_MESSAGE_LEN {
        return Err(NdpError::Decode(format!("frame too short: {} bytes", frame.len())));
    }

    let dst_mac = mac_at(frame, 0);
    let src_mac = mac_at(frame, 6);
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
    if ethertype != ETHERTYPE_IPV6 {
        return Err(NdpError::Decode(format!("unexpected ethertype {:#06x}", ethertype)));
    }

    let ip = &frame[ETH_HEADER_LEN..];
    if ip[0] >> 4 != 6 {
        return Err(NdpError::Decode("not an IPv6 packet".into()));
    }
    let payload_len = u16::from_be_bytes([ip[4], ip[5]]) as usize;
    if ip[6] != IPPROTO_ICMPV6 {
        return Err(NdpError::Decode(format!("unexpected next header {}", ip[6])));
    }
    if ip[7] != ND_HOP_LIMIT {
        return Err(NdpError::Decode(format!("hop limit {} is not 255", ip[7])));
    }
    let src_ip = ipv6_at(ip, 8);
    let dst_ip = ipv6_at(ip, 24);

    let available = ip.len() - IPV6_HEADER_LEN;
    if payload_len < ND_MESSAGE_LEN || payload_len > available {
        return Err(NdpError::Decode(format!(
            "bad payload length {} ({} available)",
            payload_len, available
        )));
    }
    let icmp = &ip[IPV6_HEADER_LEN..IPV6_HEADER_LEN + payload_len];

    let msg_type = match icmp[0] {
        ICMPV6_NEIGHBOR_SOLICITATION => NdMessageType::NeighborSolicitation,
        ICMPV6_NEIGHBOR_ADVERTISEMENT => NdMessageType::NeighborAdvertisement,
        other => return Err(NdpError::Decode(format!("not an ND message: type {}", other))),
    };
    if icmp[1] != 0 {
        return Err(NdpError::Decode(format!("non-zero ICMPv6 code {}", icmp[1])));
    }
    if icmpv6_checksum(&src_ip, &dst_ip, icmp) != 0 {
        return Err(NdpError::Decode("ICMPv6 checksum mismatch".into()));
    }

    let flags = match msg_type {
        NdMessageType::NeighborAdvertisement => NaFlags {
            router: icmp[4] & NA_FLAG_ROUTER != 0,
            solicited: icmp[4] & NA_FLAG_SOLICITED != 0,
            override_: icmp[4] & NA_FLAG_OVERRIDE != 0,
        },
        NdMessageType::NeighborSolicitation => NaFlags::default(),
    };
    let target = ipv6_at(icmp, 8);
    let options = decode_options(&icmp[ND_MESSAGE_LEN..])?;

    Ok(NdInfo {
        msg_type,
        src_mac,
        dst_mac,
        src_ip: IpAddr::V6(src_ip),
        dst_ip: IpAddr::V6(dst_ip),
        target: IpAddr::V6(target),
        flags,
        options,
    })
}

fn decode_options(mut buf: &[u8]) -> Result<Vec<NdOption>> {
    let mut options = Vec::new();
    while !buf.is_empty() {
        if buf.len() < 2 {
            return Err(NdpError::Decode("truncated option header".into()));
        }
        let kind = buf[0];
        let len = buf[1];
        let bytes = len as usize * 8;
        if len == 0 || bytes > buf.len() {
            return Err(NdpError::Decode(format!("invalid option length {}", len)));
        }
        let opt = match kind {
            OPT_SOURCE_LINK_LAYER if bytes >= 8 => NdOption::SourceLinkLayerAddress(mac_at(buf, 2)),
            OPT_TARGET_LINK_LAYER if bytes >= 8 => NdOption::TargetLinkLayerAddress(mac_at(buf, 2)),
            _ => NdOption::Unrecognized { kind, len },
        };
        options.push(opt);
        buf = &buf[bytes..];
    }
    Ok(options)
}

fn mac_at(buf: &[u8], offset: usize) -> MacAddress {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&buf[offset..offset + 6]);
    MacAddress(mac)
}

fn ipv6_at(buf: &[u8], offset: usize) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&buf[offset..offset + 16]);
    Ipv6Addr::from(octets)
}

/// ICMPv6 checksum over the pseudo-header and `data`.
///
/// With the checksum field zeroed this yields the value to store; over a
/// received message it yields 0 when the message is intact.
pub fn icmpv6_checksum(src: &Ipv6Addr, dst: &Ipv6Addr, data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    for chunk in src.octets().chunks(2).chain(dst.octets().chunks(2)) {
        sum += u32::from(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    let len = data.len() as u32;
    sum += len >> 16;
    sum += len & 0xffff;
    sum += u32::from(IPPROTO_ICMPV6);

    for chunk in data.chunks(2) {
        let word = if chunk.len() == 2 {
            u16::from_be_bytes([chunk[0], chunk[1]])
        } else {
            u16::from_be_bytes([chunk[0], 0])
        };
        sum += u32::from(word);
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddress {
        MacAddress([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_encoded_unicast_ns_decodes() {
        let ns = Solicitation::unicast(
            mac(1),
            "fe80::1".parse().unwrap(),
            mac(2),
            "fe80::2".parse().unwrap(),
        );
        let frame = encode_solicitation(&ns).unwrap();
        assert_eq!(frame.len(), 14 + 40 + 24 + 8);

        let info = decode(&frame).unwrap();
        assert_eq!(info.msg_type, NdMessageType::NeighborSolicitation);
        assert_eq!(info.src_mac, mac(1));
        assert_eq!(info.dst_mac, mac(2));
        assert_eq!(info.src_ip, ns.src_ip);
        assert_eq!(info.target, ns.dst_ip);
        assert_eq!(info.source_link_layer(), Some(mac(1)));
        assert_eq!(info.target_link_layer(), None);
    }

    #[test]
    fn test_unspecified_source_omits_slla() {
        let target = "2001:db8::5".parse().unwrap();
        let ns = Solicitation::multicast(mac(1), Ipv6Addr::UNSPECIFIED, target);
        let frame = encode_solicitation(&ns).unwrap();
        let info = decode(&frame).unwrap();
        assert!(info.has_unspecified_source());
        assert!(info.options.is_empty());
        assert_eq!(info.dst_ip, "ff02::1:ff00:5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_encode_rejects_ipv4() {
        let ns = Solicitation::unicast(
            mac(1),
            "10.0.0.2".parse().unwrap(),
            mac(2),
            "10.0.0.1".parse().unwrap(),
        );
        assert!(matches!(encode_solicitation(&ns), Err(NdpError::Encode(_))));
    }

    #[test]
    fn test_decode_rejects_bad_checksum() {
        let ns = Solicitation::unicast(
            mac(1),
            "fe80::1".parse().unwrap(),
            mac(2),
            "fe80::2".parse().unwrap(),
        );
        let mut frame = encode_solicitation(&ns).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xff;
        assert!(matches!(decode(&frame), Err(NdpError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_hop_limit() {
        let ns = Solicitation::unicast(
            mac(1),
            "fe80::1".parse().unwrap(),
            mac(2),
            "fe80::2".parse().unwrap(),
        );
        let mut frame = encode_solicitation(&ns).unwrap();
        frame[14 + 7] = 64;
        assert!(decode(&frame).is_err());
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        assert!(decode(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_decode_advertisement_flags_and_tlla() {
        let src: Ipv6Addr = "fe80::2".parse().unwrap();
        let dst: Ipv6Addr = "fe80::1".parse().unwrap();
        let mut frame = Vec::new();
        frame.extend_from_slice(&mac(1).octets());
        frame.extend_from_slice(&mac(2).octets());
        frame.extend_from_slice(&ETHERTYPE_IPV6.to_be_bytes());
        frame.extend_from_slice(&[0x60, 0, 0, 0, 0, 32, IPPROTO_ICMPV6, ND_HOP_LIMIT]);
        frame.extend_from_slice(&src.octets());
        frame.extend_from_slice(&dst.octets());
        let icmp_start = frame.len();
        frame.extend_from_slice(&[ICMPV6_NEIGHBOR_ADVERTISEMENT, 0, 0, 0]);
        frame.extend_from_slice(&[NA_FLAG_SOLICITED | NA_FLAG_OVERRIDE, 0, 0, 0]);
        frame.extend_from_slice(&src.octets());
        frame.extend_from_slice(&[OPT_TARGET_LINK_LAYER, 1]);
        frame.extend_from_slice(&mac(2).octets());
        let csum = icmpv6_checksum(&src, &dst, &frame[icmp_start..]);
        frame[icmp_start + 2..icmp_start + 4].copy_from_slice(&csum.to_be_bytes());

        let info = decode(&frame).unwrap();
        assert_eq!(info.msg_type, NdMessageType::NeighborAdvertisement);
        assert!(info.flags.solicited);
        assert!(info.flags.override_);
        assert!(!info.flags.router);
        assert_eq!(info.target_link_layer(), Some(mac(2)));
    }

    #[test]
    fn test_zero_length_option_rejected() {
        assert!(decode_options(&[OPT_SOURCE_LINK_LAYER, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_unrecognized_option_kept() {
        let opts = decode_options(&[5, 1, 0, 0, 0, 0, 5, 220]).unwrap();
        assert_eq!(opts, vec![NdOption::Unrecognized { kind: 5, len: 1 }]);
    }
}
