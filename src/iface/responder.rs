//! ICMP / ICMPv6 echo responder
//!
//! Inspects one datagram and, when it is an Echo Request, turns it into the matching Echo Reply
//! in place and writes it back to the device:
//! 1. swap source and destination address
//! 2. optionally send the swapped request itself first (request-for-request mode)
//! 3. patch the ICMP checksum incrementally
//! 4. rewrite the ICMP type to Echo Reply
//!
//! Every datagram yields a `Summary` describing it for the diagnostic output.

use std::fmt;
use std::net::IpAddr;

use log::debug;

use crate::error::Result;
use crate::iface::device::Device;
use crate::network::icmp::{EchoProfile, IcmpKind};
use crate::network::packet::{IpVersion, Packet};
use crate::network::{protocol, HeaderLayout};

/// Diagnostic description of one processed datagram
///
/// Displays as `<len> IPv<v> <src> -> <dst>  <protocol>[ <icmp>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub len: usize,
    pub version: IpVersion,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub protocol: u8,
    /// Message type when the payload is ICMP of the packet's own family
    pub icmp: Option<IcmpKind>,
    /// Datagrams written back to the device
    pub replies: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:4} {} {} -> {}  {}",
            self.len,
            self.version,
            self.src,
            self.dst,
            protocol::name_of(self.protocol)
        )?;
        if let Some(kind) = self.icmp {
            write!(f, " {}", kind)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResponder {
    req_for_req: bool,
}

impl EchoResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also answer every Echo Request with the request itself, sent before the reply
    pub fn with_request_for_request(mut self, enabled: bool) -> Self {
        self.req_for_req = enabled;
        self
    }

    /// Route by IP version and process
    pub fn handle<D: Device + ?Sized>(&self, device: &D, packet: &mut Packet) -> Result<Summary> {
        let version = packet.ip_version()?;
        self.respond(version, device, packet)
    }

    /// Process a packet known to be IPv4
    pub fn handle_ipv4<D: Device + ?Sized>(
        &self,
        device: &D,
        packet: &mut Packet,
    ) -> Result<Summary> {
        self.respond(IpVersion::V4, device, packet)
    }

    /// Process a packet routed as IPv6
    pub fn handle_ipv6<D: Device + ?Sized>(
        &self,
        device: &D,
        packet: &mut Packet,
    ) -> Result<Summary> {
        self.respond(IpVersion::V6, device, packet)
    }

    fn respond<D: Device + ?Sized>(
        &self,
        version: IpVersion,
        device: &D,
        packet: &mut Packet,
    ) -> Result<Summary> {
        let layout = HeaderLayout::for_version(version);
        let profile = EchoProfile::for_version(version);
        let mut summary = Summary {
            len: packet.len(),
            version: layout.version,
            src: layout.src_addr(packet)?,
            dst: layout.dst_addr(packet)?,
            protocol: layout.protocol(packet)?,
            icmp: None,
            replies: 0,
        };

        if summary.protocol != profile.protocol {
            return Ok(summary);
        }

        let kind = profile.classify(layout.icmp_type(packet)?);
        summary.icmp = Some(kind);
        if kind != IcmpKind::EchoRequest {
            return Ok(summary);
        }

        // Read before any write so a truncated message is left untouched
        let checksum = layout.icmp_checksum(packet)?;

        layout.swap_addresses(packet)?;
        if self.req_for_req {
            device.send(packet)?;
            summary.replies += 1;
        }

        packet.set_u16(layout.icmp_checksum, (profile.reply_checksum)(checksum))?;
        packet.set_u8(layout.icmp_type, profile.echo_reply)?;
        device.send(packet)?;
        summary.replies += 1;

        debug!(
            "{} echo reply {} -> {} checksum {:#06x} -> {:#06x}",
            layout.version,
            summary.dst,
            summary.src,
            checksum,
            layout.icmp_checksum(packet)?
        );
        Ok(summary)
    }
}
