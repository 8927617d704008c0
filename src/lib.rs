//! A minimal packet inspector and ICMP echo responder for TUN interfaces
//!
//! This library reads raw IP datagrams from a point-to-point device and:
//! - classifies them by IP version and protocol
//! - answers ICMP and ICMPv6 Echo Requests by rewriting them in place
//! - patches the ICMP checksum incrementally instead of recomputing it

pub mod error;
pub mod iface;
pub mod network;

// Re-export commonly used types
pub use error::{Error, Result};
pub use iface::{Device, Dispatcher, EchoResponder, MemoryDevice, Shutdown, Summary, TunDevice};
pub use network::packet::{IpVersion, Packet, PacketError};
pub use network::protocol::name_of;
