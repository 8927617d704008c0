//! tun-echo: answer ping through a TUN device
//!
//! Creates a TUN interface, assigns it an address, optionally starts `ping` against the peer
//! side and answers every Echo Request that arrives. Root privileges (or CAP_NET_ADMIN) are
//! required to create and configure the device.

mod cli;

use std::process;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use cli::Cli;
use tun_echo::iface::setup::{configure_interface, peer_address, PingProcess};
use tun_echo::iface::{Device, Dispatcher, EchoResponder, Shutdown, TunDevice};

/// Pause between ping exiting and shutting the loop down, so late replies still go out
const LINGER: Duration = Duration::from_secs(1);
/// Time the dispatch loop gets to stop before the process is terminated
const GRACE: Duration = Duration::from_secs(1);

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Stop the dispatch loop once ping is done
///
/// Ping is killed and reaped before the loop is shut down. `stopped` is signalled (or dropped)
/// by `main` when the loop returns; if that does not happen within `GRACE` the process exits.
fn spawn_exit_watcher(
    mut ping: PingProcess,
    pings: u32,
    shutdown: Shutdown,
    device: Arc<TunDevice>,
    stopped: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        match ping.wait_timeout(Duration::from_secs(u64::from(pings) + 2)) {
            Ok(Some(status)) => info!("ping finished: {}", status),
            Ok(None) => warn!("ping still running, shutting down anyway"),
            Err(e) => warn!("Failed to wait for ping: {}", e),
        }
        if let Err(e) = ping.stop() {
            warn!("Failed to stop ping: {}", e);
        }
        thread::sleep(LINGER);
        info!("Exiting after ping finished");
        shutdown.trigger(device.as_ref());

        if let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(GRACE) {
            warn!("Dispatch loop did not stop in time, exiting");
            process::exit(0);
        }
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let device = Arc::new(TunDevice::open(&cli.dev).context("failed to create TUN device")?);
    println!("Created tun device {} and assigning {}", device.name(), cli.address);

    if !cli.no_config {
        configure_interface(device.name(), cli.address)
            .with_context(|| format!("failed to configure {}", device.name()))?;
    }

    let shutdown = Shutdown::new();
    let (stopped_tx, stopped_rx) = mpsc::channel();
    let mut _ping = None;
    let mut watcher = None;
    if cli.pings > 0 {
        let ping = PingProcess::spawn(peer_address(cli.address), cli.pings)?;
        if cli.exit_after_ping {
            watcher = Some(spawn_exit_watcher(
                ping,
                cli.pings,
                shutdown.clone(),
                Arc::clone(&device),
                stopped_rx,
            ));
        } else {
            _ping = Some(ping);
        }
    }

    let responder = EchoResponder::new().with_request_for_request(cli.req_for_req);
    let dispatcher = Dispatcher::new(device, responder, shutdown).listen_only(cli.listen_only);

    println!("Waiting...");
    dispatcher.run()?;

    // A clean stop means the watcher already reaped ping and is waiting on us
    drop(stopped_tx);
    if let Some(watcher) = watcher {
        if watcher.join().is_err() {
            warn!("Exit watcher panicked");
        }
    }
    Ok(())
}
