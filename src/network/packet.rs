//! Raw IP datagram view
//!
//! A `Packet` owns the bytes of exactly one datagram read from the interface and exposes
//! bounds-checked field access at caller-supplied offsets:
//! - 8-bit and 16-bit big-endian reads and writes
//! - fixed-length byte ranges
//! - IP version classification

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Field access outside the datagram
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("field at offset {offset} with width {width} exceeds packet length {len}")]
pub struct PacketError {
    pub offset: usize,
    pub width: usize,
    pub len: usize,
}

/// IP version as needed for routing a packet to its handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "IPv4"),
            IpVersion::V6 => write!(f, "IPv6"),
        }
    }
}

/// One raw IP datagram, exclusively owned for a single read/process/write cycle
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    data: Vec<u8>,
}

impl Packet {
    pub fn new(data: Vec<u8>) -> Self {
        Packet { data }
    }

    /// Copy a received datagram out of a device buffer
    pub fn from_slice(data: &[u8]) -> Self {
        Packet {
            data: data.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw value of the top four bits of the first byte
    pub fn version_nibble(&self) -> Result<u8, PacketError> {
        Ok(self.u8(0)? >> 4)
    }

    /// Classify the packet for dispatch
    ///
    /// Only 4 is recognised explicitly; every other version is handled as IPv6.
    pub fn ip_version(&self) -> Result<IpVersion, PacketError> {
        match self.version_nibble()? {
            4 => Ok(IpVersion::V4),
            _ => Ok(IpVersion::V6),
        }
    }

    fn range(&self, offset: usize, width: usize) -> Result<std::ops::Range<usize>, PacketError> {
        let end = offset.checked_add(width).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => Ok(offset..end),
            None => Err(PacketError {
                offset,
                width,
                len: self.data.len(),
            }),
        }
    }

    pub fn u8(&self, offset: usize) -> Result<u8, PacketError> {
        let range = self.range(offset, 1)?;
        Ok(self.data[range.start])
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) -> Result<(), PacketError> {
        let range = self.range(offset, 1)?;
        self.data[range.start] = value;
        Ok(())
    }

    pub fn u16(&self, offset: usize) -> Result<u16, PacketError> {
        let range = self.range(offset, 2)?;
        Ok(BigEndian::read_u16(&self.data[range]))
    }

    /// Store a big-endian 16-bit value
    ///
    /// Callers doing checksum arithmetic wrap before storing, so the stored value is always
    /// the sum modulo 2^16.
    pub fn set_u16(&mut self, offset: usize, value: u16) -> Result<(), PacketError> {
        let range = self.range(offset, 2)?;
        BigEndian::write_u16(&mut self.data[range], value);
        Ok(())
    }

    pub fn bytes(&self, offset: usize, width: usize) -> Result<&[u8], PacketError> {
        let range = self.range(offset, width)?;
        Ok(&self.data[range])
    }

    /// Fixed-size copy of a byte range, used for addresses
    pub fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], PacketError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), PacketError> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.data.len())
            .field("data", &format_args!("{:02x?}", self.data))
            .finish()
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Packet::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_reads() {
        let packet = Packet::new(vec![0x45, 0x00, 0x12, 0x34, 0xAB]);
        assert_eq!(packet.u8(0).unwrap(), 0x45);
        assert_eq!(packet.u16(2).unwrap(), 0x1234);
        assert_eq!(packet.bytes(1, 3).unwrap(), &[0x00, 0x12, 0x34]);
        assert_eq!(packet.array::<2>(3).unwrap(), [0x34, 0xAB]);
    }

    #[test]
    fn test_field_writes() {
        let mut packet = Packet::new(vec![0u8; 6]);
        packet.set_u8(0, 0x60).unwrap();
        packet.set_u16(2, 0xBEEF).unwrap();
        packet.set_bytes(4, &[1, 2]).unwrap();
        assert_eq!(packet.as_bytes(), &[0x60, 0x00, 0xBE, 0xEF, 1, 2]);
    }

    #[test]
    fn test_checksum_store_wraps() {
        let mut packet = Packet::new(vec![0xFF, 0xFF]);
        let value = packet.u16(0).unwrap().wrapping_add(0x0800);
        packet.set_u16(0, value).unwrap();
        assert_eq!(packet.u16(0).unwrap(), 0x07FF);
    }

    #[test]
    fn test_out_of_bounds_is_reported() {
        let mut packet = Packet::new(vec![0u8; 4]);
        let err = packet.u16(3).unwrap_err();
        assert_eq!(
            err,
            PacketError {
                offset: 3,
                width: 2,
                len: 4
            }
        );
        assert!(packet.u8(4).is_err());
        assert!(packet.bytes(0, 5).is_err());
        assert!(packet.set_bytes(2, &[0; 3]).is_err());
        assert!(packet.u8(usize::MAX).is_err());
        assert!(packet.bytes(usize::MAX, 2).is_err());

        // A failed write leaves the buffer untouched
        assert_eq!(packet.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_ip_version() {
        assert_eq!(Packet::new(vec![0x45]).ip_version().unwrap(), IpVersion::V4);
        assert_eq!(Packet::new(vec![0x60]).ip_version().unwrap(), IpVersion::V6);
        // Anything that is not 4 is routed as IPv6
        assert_eq!(Packet::new(vec![0x50]).ip_version().unwrap(), IpVersion::V6);
        assert_eq!(Packet::new(vec![0x50]).version_nibble().unwrap(), 5);
        assert!(Packet::new(Vec::new()).ip_version().is_err());
    }
}
