//! Error types shared by the packet path and the interface layer

use thiserror::Error;

use crate::network::packet::PacketError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device closed")]
    Closed,

    #[error("malformed packet: {0}")]
    Packet(#[from] PacketError),

    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

impl Error {
    /// Errors raised by the device itself rather than by packet contents.
    ///
    /// These are expected once shutdown has been requested and are swallowed by the dispatch loop.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Closed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
