//! IPv6 header layout
//!
//! Offsets of the fields the responder touches in the fixed 40-byte IPv6 header (RFC 8200).
//! Extension headers are not traversed: the ICMPv6 message is expected right after the base
//! header whenever next-header says ICMPv6.

use super::packet::IpVersion;
use super::HeaderLayout;

pub const IPV6_HEADER_LEN: usize = 40;
pub const IPV6_ADDR_LEN: usize = 16;

pub const OFFSET_NEXT_HEADER: usize = 6;
pub const OFFSET_SRC_ADDR: usize = 8;
pub const OFFSET_DST_ADDR: usize = OFFSET_SRC_ADDR + IPV6_ADDR_LEN;
pub const OFFSET_ICMP_TYPE: usize = OFFSET_DST_ADDR + IPV6_ADDR_LEN;
pub const OFFSET_ICMP_CHECKSUM: usize = OFFSET_ICMP_TYPE + 2;

pub const LAYOUT: HeaderLayout = HeaderLayout {
    version: IpVersion::V6,
    protocol: OFFSET_NEXT_HEADER,
    src_addr: OFFSET_SRC_ADDR,
    dst_addr: OFFSET_DST_ADDR,
    addr_len: IPV6_ADDR_LEN,
    icmp_type: OFFSET_ICMP_TYPE,
    icmp_checksum: OFFSET_ICMP_CHECKSUM,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icmp_follows_base_header() {
        assert_eq!(OFFSET_DST_ADDR, 24);
        assert_eq!(OFFSET_ICMP_TYPE, IPV6_HEADER_LEN);
        assert_eq!(OFFSET_ICMP_CHECKSUM, 42);
    }
}
