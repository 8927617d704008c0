//! Packet dispatch loop
//!
//! Reads datagrams from a device one at a time, hands each to the echo responder and prints
//! its diagnostic line. The loop runs until a `Shutdown` is triggered; transport errors that
//! show up after that point are the expected way a blocked read ends and are not reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::iface::device::Device;
use crate::iface::responder::EchoResponder;
use crate::network::packet::Packet;

/// Cancellation token shared between the dispatch loop and whoever stops it
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Enter the shut-down state, then close the device to release a blocked read
    pub fn trigger<D: Device + ?Sized>(&self, device: &D) {
        self.request();
        device.close();
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub packets: u64,
    pub replies: u64,
}

pub struct Dispatcher<D: Device> {
    device: Arc<D>,
    responder: EchoResponder,
    shutdown: Shutdown,
    listen_only: bool,
}

impl<D: Device> Dispatcher<D> {
    pub fn new(device: Arc<D>, responder: EchoResponder, shutdown: Shutdown) -> Self {
        Dispatcher {
            device,
            responder,
            shutdown,
            listen_only: false,
        }
    }

    /// Only report version and size of each packet, never answer
    pub fn listen_only(mut self, enabled: bool) -> Self {
        self.listen_only = enabled;
        self
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Run until shutdown or a fatal error
    pub fn run(&self) -> Result<DispatchStats> {
        let mut stats = DispatchStats::default();

        while !self.shutdown.is_requested() {
            let mut packet = match self.device.recv() {
                Ok(packet) => packet,
                Err(e) => {
                    self.check_expected(e)?;
                    break;
                }
            };
            // Shutdown may have been requested while we were blocked
            if self.shutdown.is_requested() {
                debug!("Dropping {} byte packet received during shutdown", packet.len());
                break;
            }
            stats.packets += 1;

            match self.process(&mut packet) {
                Ok(replies) => stats.replies += replies as u64,
                Err(e) => {
                    self.check_expected(e)?;
                    break;
                }
            }
        }

        info!(
            "Dispatch loop on {} stopped after {} packets ({} replies)",
            self.device.name(),
            stats.packets,
            stats.replies
        );
        Ok(stats)
    }

    /// Process one packet, returning how many datagrams were written back
    pub fn process(&self, packet: &mut Packet) -> Result<usize> {
        if self.listen_only {
            println!(
                "IPv{} packet with {} bytes",
                packet.version_nibble()?,
                packet.len()
            );
            return Ok(0);
        }

        let summary = self.responder.handle(self.device.as_ref(), packet)?;
        println!("{}", summary);
        Ok(summary.replies)
    }

    /// Swallow transport errors once shutdown was requested
    fn check_expected(&self, err: Error) -> Result<()> {
        if self.shutdown.is_requested() && err.is_transport() {
            debug!("Ignoring error during shutdown: {}", err);
            return Ok(());
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::device::MemoryDevice;
    use crate::network::protocol;
    use crate::network::testutil::*;
    use std::io;
    use std::thread;
    use std::time::Duration;

    /// Device whose writes fail after shutdown was requested from within `send`
    struct ShutdownDuringSend {
        inner: MemoryDevice,
        shutdown: Shutdown,
    }

    impl Device for ShutdownDuringSend {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn recv(&self) -> Result<Packet> {
            self.inner.recv()
        }

        fn send(&self, _packet: &Packet) -> Result<()> {
            self.shutdown.request();
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device is going away").into())
        }

        fn close(&self) {
            self.inner.close()
        }
    }

    fn dispatcher(device: &Arc<MemoryDevice>) -> Dispatcher<MemoryDevice> {
        Dispatcher::new(Arc::clone(device), EchoResponder::new(), Shutdown::new())
    }

    #[test]
    fn test_answers_both_families_until_shutdown() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        let mut udp = echo_request_v4([10, 0, 0, 1], [10, 0, 0, 2]);
        udp.set_u8(9, protocol::UDP).unwrap();
        device.push(udp);
        device.push(echo_request_v4([10, 0, 0, 1], [10, 0, 0, 2]));
        device.push(echo_request_v6(doc_addr_v6(1), doc_addr_v6(2)));

        let dispatcher = dispatcher(&device);
        let stopper = {
            let device = Arc::clone(&device);
            let shutdown = dispatcher.shutdown().clone();
            thread::spawn(move || {
                // The last queued packet is the second echo request
                while device.sent().len() < 2 {
                    thread::sleep(Duration::from_millis(10));
                }
                shutdown.trigger(device.as_ref());
            })
        };

        let stats = dispatcher.run().unwrap();
        stopper.join().unwrap();

        assert_eq!(stats, DispatchStats { packets: 3, replies: 2 });
        assert_eq!(device.sent().len(), 2);
    }

    #[test]
    fn test_closed_after_shutdown_is_normal_termination() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        let dispatcher = dispatcher(&device);
        dispatcher.shutdown().trigger(device.as_ref());

        let stats = dispatcher.run().unwrap();
        assert_eq!(stats.packets, 0);
    }

    #[test]
    fn test_blocked_read_released_by_shutdown() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        let dispatcher = dispatcher(&device);
        let shutdown = dispatcher.shutdown().clone();
        let stopper = {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                shutdown.trigger(device.as_ref());
            })
        };

        assert!(dispatcher.run().is_ok());
        stopper.join().unwrap();
    }

    #[test]
    fn test_closed_without_shutdown_is_an_error() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        device.close();
        let err = dispatcher(&device).run().unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        device.push(echo_request_v4([10, 0, 0, 1], [10, 0, 0, 2]));
        device.fail_sends(true);
        let err = dispatcher(&device).run().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_write_failure_after_shutdown_is_suppressed() {
        let shutdown = Shutdown::new();
        let device = Arc::new(ShutdownDuringSend {
            inner: MemoryDevice::new("tun0"),
            shutdown: shutdown.clone(),
        });
        device.inner.push(echo_request_v4([10, 0, 0, 1], [10, 0, 0, 2]));
        device.inner.push(echo_request_v4([10, 0, 0, 3], [10, 0, 0, 4]));

        let dispatcher = Dispatcher::new(Arc::clone(&device), EchoResponder::new(), shutdown);
        let stats = dispatcher.run().unwrap();

        assert!(dispatcher.shutdown().is_requested());
        // The loop stopped at the failed write instead of reading the second request
        assert_eq!(stats, DispatchStats { packets: 1, replies: 0 });
        assert!(device.inner.recv().is_ok());
    }

    #[test]
    fn test_malformed_packet_is_fatal_even_during_shutdown() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        device.push(vec![0x45, 0, 0, 8]);
        let err = dispatcher(&device).run().unwrap_err();
        assert!(matches!(err, Error::Packet(_)));

        let dispatcher = dispatcher(&device);
        dispatcher.shutdown().request();
        let fault = dispatcher
            .process(&mut Packet::new(vec![0x60]))
            .unwrap_err();
        assert!(dispatcher.check_expected(fault).is_err());
    }

    #[test]
    fn test_listen_only_never_replies() {
        let device = Arc::new(MemoryDevice::new("tun0"));
        let dispatcher = dispatcher(&device).listen_only(true);
        let mut packet = echo_request_v4([10, 0, 0, 1], [10, 0, 0, 2]);
        let original = packet.clone();

        assert_eq!(dispatcher.process(&mut packet).unwrap(), 0);
        assert_eq!(packet, original);
        assert!(device.sent().is_empty());
    }
}
