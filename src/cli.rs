use std::net::IpAddr;

use clap::Parser;

/// Create a TUN device, optionally start ping and respond to its Echo Requests
#[derive(Parser, Debug)]
#[command(name = "tun-echo", version, about, long_about = None)]
pub struct Cli {
    /// IP address for the gateway side of the interface
    #[arg(short, long, default_value = "fddf:face:face::5555")]
    pub address: IpAddr,

    /// Name for the TUN device (empty lets the kernel choose)
    #[arg(long, default_value = "")]
    pub dev: String,

    /// Start `ping -c <PINGS>` against the peer address
    #[arg(long, default_value_t = 0)]
    pub pings: u32,

    /// Exit after the ping command terminates
    #[arg(long)]
    pub exit_after_ping: bool,

    /// Answer Echo Request with own request
    #[arg(long)]
    pub req_for_req: bool,

    /// Do not configure the interface
    #[arg(long)]
    pub no_config: bool,

    /// Only print version and size of each packet, never answer
    #[arg(long)]
    pub listen_only: bool,

    #[arg(short, long)]
    pub verbose: bool,
}
