//! Network layer wire formats
//!
//! This module contains the pieces needed to inspect and rewrite raw IP datagrams:
//! - packet: bounds-checked field access over one datagram
//! - protocol: IP protocol number registry
//! - ipv4 / ipv6: fixed header offsets for each address family
//! - icmp: ICMP and ICMPv6 message types and incremental checksum updates

pub mod icmp;
pub mod ipv4;
pub mod ipv6;
pub mod packet;
pub mod protocol;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use packet::{IpVersion, Packet, PacketError};

// Re-export commonly used items
pub use icmp::{EchoProfile, IcmpKind};

/// Fixed field offsets of one IP header layout
///
/// Only the fields the responder touches are described. The ICMP offsets assume a header
/// without options (IPv4) or extension headers (IPv6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub version: IpVersion,
    pub protocol: usize,
    pub src_addr: usize,
    pub dst_addr: usize,
    pub addr_len: usize,
    pub icmp_type: usize,
    pub icmp_checksum: usize,
}

impl HeaderLayout {
    /// Layout used for a packet routed as `version`
    pub fn for_version(version: IpVersion) -> &'static HeaderLayout {
        match version {
            IpVersion::V4 => &ipv4::LAYOUT,
            IpVersion::V6 => &ipv6::LAYOUT,
        }
    }

    /// Protocol (IPv4) or next-header (IPv6) number
    pub fn protocol(&self, packet: &Packet) -> Result<u8, PacketError> {
        packet.u8(self.protocol)
    }

    pub fn src_addr(&self, packet: &Packet) -> Result<IpAddr, PacketError> {
        self.addr(packet, self.src_addr)
    }

    pub fn dst_addr(&self, packet: &Packet) -> Result<IpAddr, PacketError> {
        self.addr(packet, self.dst_addr)
    }

    fn addr(&self, packet: &Packet, offset: usize) -> Result<IpAddr, PacketError> {
        Ok(match self.version {
            IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(packet.array::<4>(offset)?)),
            IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(packet.array::<16>(offset)?)),
        })
    }

    /// Exchange source and destination address in place
    pub fn swap_addresses(&self, packet: &mut Packet) -> Result<(), PacketError> {
        let src = packet.bytes(self.src_addr, self.addr_len)?.to_vec();
        let dst = packet.bytes(self.dst_addr, self.addr_len)?.to_vec();
        packet.set_bytes(self.dst_addr, &src)?;
        packet.set_bytes(self.src_addr, &dst)
    }

    pub fn icmp_type(&self, packet: &Packet) -> Result<u8, PacketError> {
        packet.u8(self.icmp_type)
    }

    pub fn icmp_checksum(&self, packet: &Packet) -> Result<u16, PacketError> {
        packet.u16(self.icmp_checksum)
    }
}


#[cfg(test)]
mod tests {
    use super::packet::IpVersion;
    use super::testutil::*;
    use super::*;

    #[test]
    fn test_checksum_known_value() {
        // Widely used textbook example header, checksum field zeroed
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(checksum(&header), 0xb861);
    }

    #[test]
    fn test_checksum_odd_length_and_carry() {
        assert_eq!(checksum(&[0x01]), 0xFEFF);
        assert_eq!(checksum(&[0x12, 0x34, 0x56]), !0x6834);
        // 0xFFFF + 0x0001 carries around to 0x0001
        assert_eq!(checksum(&[0xFF, 0xFF, 0x00, 0x01]), 0xFFFE);
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_icmpv6_checksum_matches_concatenated_pseudo_header() {
        let (src, dst) = (doc_addr_v6(1), doc_addr_v6(2));
        let message = [128u8, 0, 0, 0, 0, 1, 0, 1, 0x61];
        let mut data = Vec::new();
        data.extend_from_slice(&src);
        data.extend_from_slice(&dst);
        data.extend_from_slice(&[0, 0, 0, message.len() as u8, 0, 0, 0, protocol::IPV6_ICMP]);
        data.extend_from_slice(&message);
        assert_eq!(icmpv6_checksum(&src, &dst, &message), checksum(&data));
    }

    #[test]
    fn test_layout_reads_ipv4_fields() {
        let packet = echo_request_v4([10, 0, 0, 1], [10, 0, 0, 2]);
        let layout = HeaderLayout::for_version(IpVersion::V4);
        assert_eq!(layout.protocol(&packet).unwrap(), protocol::ICMP);
        assert_eq!(layout.src_addr(&packet).unwrap(), "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(layout.dst_addr(&packet).unwrap(), "10.0.0.2".parse::<IpAddr>().unwrap());
        assert_eq!(layout.icmp_type(&packet).unwrap(), icmp::ICMP_TYPE_ECHO_REQUEST);
    }

    #[test]
    fn test_layout_reads_ipv6_fields() {
        let packet = echo_request_v6(doc_addr_v6(1), doc_addr_v6(2));
        let layout = HeaderLayout::for_version(IpVersion::V6);
        assert_eq!(layout.protocol(&packet).unwrap(), protocol::IPV6_ICMP);
        assert_eq!(layout.src_addr(&packet).unwrap(), "2001:db8::1".parse::<IpAddr>().unwrap());
        assert_eq!(layout.dst_addr(&packet).unwrap(), "2001:db8::2".parse::<IpAddr>().unwrap());
        assert_eq!(layout.icmp_type(&packet).unwrap(), icmp::ICMPV6_TYPE_ECHO_REQUEST);
    }

    #[test]
    fn test_swap_addresses_keeps_header_checksum_valid() {
        let mut packet = echo_request_v4([192, 168, 7, 1], [10, 0, 0, 2]);
        ipv4::LAYOUT.swap_addresses(&mut packet).unwrap();
        assert_eq!(&packet.as_bytes()[12..16], &[10, 0, 0, 2]);
        assert_eq!(&packet.as_bytes()[16..20], &[192, 168, 7, 1]);
        // A valid header sums to zero including its checksum field
        assert_eq!(checksum(&packet.as_bytes()[..20]), 0);
    }

    #[test]
    fn test_short_packet_faults() {
        let packet = Packet::new(vec![0x45; 12]);
        assert!(ipv4::LAYOUT.protocol(&packet).is_ok());
        assert!(ipv4::LAYOUT.src_addr(&packet).is_err());
        let packet = Packet::new(vec![0x60; 39]);
        assert!(ipv6::LAYOUT.dst_addr(&packet).is_err());
    }
}
