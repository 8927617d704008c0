//! Packet devices
//!
//! A device exchanges whole IP datagrams with user space: one `recv` returns one packet, one
//! `send` writes one packet. `close` may be called from another thread while a `recv` is
//! blocked; the pending `recv` then returns `Error::Closed`.
//!
//! - `TunDevice`: a kernel TUN interface
//! - `MemoryDevice`: an in-memory device fed by the caller, used to drive the responder in tests

use std::collections::VecDeque;
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info};
use tun_tap::{Iface, Mode};

use crate::error::{Error, Result};
use crate::network::ipv6::IPV6_HEADER_LEN;
use crate::network::packet::Packet;

/// Largest non-jumbo IP datagram
///
/// IPv4 total length and IPv6 payload length are both 16-bit fields; the IPv6 one excludes the
/// fixed header. A shorter read buffer would silently truncate datagrams on a large MTU.
pub const MAX_PACKET_LEN: usize = u16::MAX as usize + IPV6_HEADER_LEN;

/// How long a blocked `recv` waits before checking for a concurrent close
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    /// Block until the next datagram arrives
    fn recv(&self) -> Result<Packet>;

    /// Write the datagram with its exact current length
    fn send(&self, packet: &Packet) -> Result<()>;

    /// Idempotent; unblocks a pending `recv`
    fn close(&self);
}

/// TUN interface without packet information header
pub struct TunDevice {
    iface: Iface,
    closed: AtomicBool,
}

impl TunDevice {
    /// Create or attach a TUN device
    ///
    /// An empty name lets the kernel pick one (`tun0`, `tun1`, ...).
    pub fn open(name: &str) -> Result<Self> {
        let iface = Iface::without_packet_info(name, Mode::Tun)?;
        info!("TUN device created: {}", iface.name());
        Ok(TunDevice {
            iface,
            closed: AtomicBool::new(false),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the device is readable, at most `timeout`
    fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.iface.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd is a single valid pollfd that outlives the call
        let ready = unsafe { libc::poll(&mut pfd, 1, timeout.as_millis() as libc::c_int) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        Ok(ready > 0)
    }
}

impl Device for TunDevice {
    fn name(&self) -> &str {
        self.iface.name()
    }

    fn recv(&self) -> Result<Packet> {
        let mut buf = vec![0u8; MAX_PACKET_LEN];
        loop {
            if self.is_closed() {
                return Err(Error::Closed);
            }
            if !self.wait_readable(CLOSE_POLL_INTERVAL)? {
                continue;
            }
            return match self.iface.recv(&mut buf) {
                Ok(0) => Err(Error::Closed),
                Ok(nbytes) => Ok(Packet::from_slice(&buf[..nbytes])),
                Err(_) if self.is_closed() => Err(Error::Closed),
                Err(e) => Err(e.into()),
            };
        }
    }

    fn send(&self, packet: &Packet) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let written = self.iface.send(packet.as_bytes())?;
        if written != packet.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, packet.len()),
            )
            .into());
        }
        Ok(())
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closing TUN device {}", self.iface.name());
        }
    }
}

#[derive(Default)]
struct MemoryState {
    inbound: VecDeque<Packet>,
    sent: Vec<Packet>,
    closed: bool,
    fail_sends: bool,
}

/// In-memory device
///
/// `recv` hands out pushed packets in order and blocks while none are queued, just like a TUN
/// device; after `close` the remaining queue is dropped and `recv` returns `Error::Closed`.
/// Every successful `send` is recorded.
#[derive(Default)]
pub struct MemoryDevice {
    name: String,
    state: Mutex<MemoryState>,
    ready: Condvar,
}

impl MemoryDevice {
    pub fn new(name: &str) -> Self {
        MemoryDevice {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a datagram for a later `recv`
    pub fn push(&self, packet: impl Into<Packet>) {
        self.state().inbound.push_back(packet.into());
        self.ready.notify_all();
    }

    /// Datagrams written so far, in order
    pub fn sent(&self) -> Vec<Packet> {
        self.state().sent.clone()
    }

    /// Make every following `send` fail with an I/O error
    pub fn fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl Device for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn recv(&self) -> Result<Packet> {
        let mut state = self.state();
        loop {
            if state.closed {
                return Err(Error::Closed);
            }
            if let Some(packet) = state.inbound.pop_front() {
                return Ok(packet);
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn send(&self, packet: &Packet) -> Result<()> {
        let mut state = self.state();
        if state.closed {
            return Err(Error::Closed);
        }
        if state.fail_sends {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "send failed").into());
        }
        state.sent.push(packet.clone());
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        state.inbound.clear();
        self.ready.notify_all();
    }
}
