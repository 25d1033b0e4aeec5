use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use clap::Parser;

/// A minimal reliable UDP transport: reads stdin, sends it reliably to a
/// peer, and writes whatever the peer sends back to stdout.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Local address to bind the UDP socket to.
    #[arg(long)]
    listen: SocketAddr,

    /// Remote peer address to exchange segments with.
    #[arg(long)]
    peer: SocketAddr,

    /// Number of in-flight segments each sliding window may hold.
    #[arg(long, default_value_t = 8)]
    window: u32,

    /// Timer interval, in milliseconds, driving retransmission and input polling.
    #[arg(long, default_value_t = 300)]
    tick_ms: u64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let result = rudp::host::run(
        args.listen,
        args.peer,
        args.window,
        Duration::from_millis(args.tick_ms),
    );

    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}
