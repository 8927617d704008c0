//! IPv4 header layout
//!
//! Offsets of the fields the responder reads and rewrites in a 20-byte IPv4 header
//! (RFC 791) followed directly by an ICMP message.

use super::packet::IpVersion;
use super::HeaderLayout;

/// Header length without options
pub const IPV4_HEADER_LEN: usize = 20;
pub const IPV4_ADDR_LEN: usize = 4;

pub const OFFSET_PROTOCOL: usize = 9;
pub const OFFSET_SRC_ADDR: usize = 12;
pub const OFFSET_DST_ADDR: usize = 16;
pub const OFFSET_ICMP_TYPE: usize = IPV4_HEADER_LEN;
pub const OFFSET_ICMP_CHECKSUM: usize = OFFSET_ICMP_TYPE + 2;

pub const LAYOUT: HeaderLayout = HeaderLayout {
    version: IpVersion::V4,
    protocol: OFFSET_PROTOCOL,
    src_addr: OFFSET_SRC_ADDR,
    dst_addr: OFFSET_DST_ADDR,
    addr_len: IPV4_ADDR_LEN,
    icmp_type: OFFSET_ICMP_TYPE,
    icmp_checksum: OFFSET_ICMP_CHECKSUM,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_fit_minimum_header() {
        assert_eq!(OFFSET_DST_ADDR + IPV4_ADDR_LEN, IPV4_HEADER_LEN);
        assert_eq!(OFFSET_ICMP_CHECKSUM, 22);
    }
}
