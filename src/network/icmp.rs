//! ICMP and ICMPv6 echo handling rules
//!
//! This module knows the message types the responder distinguishes and how the ICMP checksum
//! changes when an Echo Request is retyped into an Echo Reply.
//!
//! The checksum is the one's complement of the one's complement sum of the message (plus the
//! pseudo-header for ICMPv6). The type byte is the high byte of the first 16-bit word, so
//! changing the type by `d` changes the sum by `d * 0x100` and the checksum by the opposite
//! amount. Swapping source and destination leaves every sum unchanged. Neither rewrite needs
//! the payload to be rescanned.

use std::fmt;

use super::packet::IpVersion;
use super::protocol;

/// ICMP message types
pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;

/// ICMPv6 message types
pub const ICMPV6_TYPE_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_TYPE_ECHO_REPLY: u8 = 129;
pub const ICMPV6_TYPE_ROUTER_SOLICITATION: u8 = 133;

/// Checksum of an ICMP Echo Reply derived from its Echo Request (type 8 -> 0, code 0)
pub fn echo_reply_checksum_v4(checksum: u16) -> u16 {
    checksum.wrapping_add(0x0800)
}

/// Checksum of an ICMPv6 Echo Reply derived from its Echo Request (type 128 -> 129)
pub fn echo_reply_checksum_v6(checksum: u16) -> u16 {
    checksum.wrapping_sub(0x0100)
}

/// Message types reported in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpKind {
    EchoRequest,
    EchoReply,
    RouterSolicitation,
    Other(u8),
}

impl IcmpKind {
    pub fn from_icmpv4(msg_type: u8) -> Self {
        match msg_type {
            ICMP_TYPE_ECHO_REQUEST => IcmpKind::EchoRequest,
            ICMP_TYPE_ECHO_REPLY => IcmpKind::EchoReply,
            other => IcmpKind::Other(other),
        }
    }

    pub fn from_icmpv6(msg_type: u8) -> Self {
        match msg_type {
            ICMPV6_TYPE_ECHO_REQUEST => IcmpKind::EchoRequest,
            ICMPV6_TYPE_ECHO_REPLY => IcmpKind::EchoReply,
            ICMPV6_TYPE_ROUTER_SOLICITATION => IcmpKind::RouterSolicitation,
            other => IcmpKind::Other(other),
        }
    }
}

impl fmt::Display for IcmpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcmpKind::EchoRequest => write!(f, "EchoRequest"),
            IcmpKind::EchoReply => write!(f, "EchoReply"),
            IcmpKind::RouterSolicitation => write!(f, "RouterSolicitation"),
            IcmpKind::Other(msg_type) => write!(f, "type={}", msg_type),
        }
    }
}

/// Per-family constants for answering echo requests
#[derive(Debug, Clone, Copy)]
pub struct EchoProfile {
    /// Protocol or next-header number of the ICMP flavour
    pub protocol: u8,
    pub echo_request: u8,
    pub echo_reply: u8,
    /// Checksum update matching the request -> reply type rewrite
    pub reply_checksum: fn(u16) -> u16,
    classify: fn(u8) -> IcmpKind,
}

pub const ICMPV4: EchoProfile = EchoProfile {
    protocol: protocol::ICMP,
    echo_request: ICMP_TYPE_ECHO_REQUEST,
    echo_reply: ICMP_TYPE_ECHO_REPLY,
    reply_checksum: echo_reply_checksum_v4,
    classify: IcmpKind::from_icmpv4,
};

pub const ICMPV6: EchoProfile = EchoProfile {
    protocol: protocol::IPV6_ICMP,
    echo_request: ICMPV6_TYPE_ECHO_REQUEST,
    echo_reply: ICMPV6_TYPE_ECHO_REPLY,
    reply_checksum: echo_reply_checksum_v6,
    classify: IcmpKind::from_icmpv6,
};

impl EchoProfile {
    pub fn for_version(version: IpVersion) -> &'static EchoProfile {
        match version {
            IpVersion::V4 => &ICMPV4,
            IpVersion::V6 => &ICMPV6,
        }
    }

    pub fn classify(&self, msg_type: u8) -> IcmpKind {
        (self.classify)(msg_type)
    }
}
