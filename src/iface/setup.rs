//! Host-side interface setup
//!
//! Helpers that configure the TUN interface through the `ip` tool and start a `ping` against
//! it so that the responder has Echo Requests to answer.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::error::{Error, Result};

const IPV4_PREFIX_LEN: u8 = 24;
const IPV6_PREFIX_LEN: u8 = 64;

/// `ip` invocations assigning `addr` to `iface_name` and bringing the link up
pub fn interface_commands(iface_name: &str, addr: IpAddr) -> Vec<Vec<String>> {
    let assign = match addr {
        IpAddr::V4(_) => format!("addr add {}/{} dev {}", addr, IPV4_PREFIX_LEN, iface_name),
        IpAddr::V6(_) => format!("-6 addr add {}/{} dev {}", addr, IPV6_PREFIX_LEN, iface_name),
    };
    let link_up = format!("link set dev {} up", iface_name);
    [assign, link_up]
        .iter()
        .map(|command| command.split(' ').map(str::to_string).collect())
        .collect()
}

pub fn configure_interface(iface_name: &str, addr: IpAddr) -> Result<()> {
    for args in interface_commands(iface_name, addr) {
        run("ip", &args)?;
    }
    info!("Interface {} configured with {} and brought up", iface_name, addr);
    Ok(())
}

fn run(program: &str, args: &[String]) -> Result<()> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Running {}", command);
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| Error::Command {
            command: command.clone(),
            reason: e.to_string(),
        })?;
    if !status.success() {
        return Err(Error::Command {
            command,
            reason: status.to_string(),
        });
    }
    Ok(())
}

/// Address of the simulated peer: the interface address with bit 1 of its last byte flipped
///
/// The kernel routes packets for the peer into the TUN device, where the responder answers them.
pub fn peer_address(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            octets[3] ^= 1 << 1;
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            octets[15] ^= 1 << 1;
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    }
}

/// A running `ping` / `ping6`, killed when dropped
pub struct PingProcess {
    child: Child,
}

impl PingProcess {
    /// Program and arguments sending `count` pings, one per second
    pub fn command(target: IpAddr, count: u32) -> (&'static str, Vec<String>) {
        let program = match target {
            IpAddr::V4(_) => "ping",
            IpAddr::V6(_) => "ping6",
        };
        let args = vec![
            "-c".to_string(),
            count.to_string(),
            "-i".to_string(),
            "1".to_string(),
            target.to_string(),
        ];
        (program, args)
    }

    /// Start pinging; the child's output goes to our stderr
    pub fn spawn(target: IpAddr, count: u32) -> Result<Self> {
        let (program, args) = Self::command(target, count);
        info!("{} {}", program, args.join(" "));
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(io::stderr())
            .stderr(io::stderr())
            .spawn()
            .map_err(|e| Error::Command {
                command: format!("{} {}", program, args.join(" ")),
                reason: e.to_string(),
            })?;
        Ok(PingProcess { child })
    }

    /// Wait for the process to exit, giving up after `timeout`
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(100));
        }
    }

    /// Kill the process if it is still running and reap it
    pub fn stop(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            return Ok(status);
        }
        debug!("Killing ping (pid {})", self.child.id());
        self.child.kill()?;
        Ok(self.child.wait()?)
    }
}

impl Drop for PingProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop ping: {}", e);
        }
    }
}
