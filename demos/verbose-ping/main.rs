use echo_ping::{PingOptions, Ttl, Unit};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(argh::FromArgs)]
/// verbose-ping - send ICMP ECHO_REQUEST to a host and report each reply
struct Args {
    #[argh(positional)]
    /// host name or IPv4 address
    address: String,

    #[argh(option, short = 'c', default = "4")]
    /// number of requests, 0 to ping until interrupted
    count: u32,

    #[argh(option, short = 'i', default = "1.0")]
    /// seconds to wait between requests
    interval: f64,

    #[argh(option, short = 'W', default = "4.0")]
    /// seconds to wait for each reply
    timeout: f64,

    #[argh(option, short = 't')]
    /// time to live of outgoing requests
    ttl: Option<u8>,

    #[argh(option, short = 's', default = "56")]
    /// payload size in bytes
    size: usize,

    #[argh(option, short = 'I')]
    /// network interface to send through
    interface: Option<String>,

    #[argh(option, short = 'S')]
    /// source address
    source: Option<Ipv4Addr>,

    #[argh(option, short = 'u', default = "Unit::Milliseconds")]
    /// unit of reported delays, s or ms
    unit: Unit,

    #[argh(switch, short = 'v')]
    /// log what is sent and received
    verbose: bool,
}

/// Negative, NaN and overflowing values are errors rather than panics.
fn seconds(value: f64) -> Result<Duration, GenericError> {
    Duration::try_from_secs_f64(value).map_err(|error| format!("invalid duration {value}: {error}").into())
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = PingOptions {
        timeout: seconds(args.timeout)?,
        unit: args.unit,
        src_addr: args.source,
        ttl: args.ttl.map(Ttl),
        size: args.size,
        interface: args.interface,
        ..PingOptions::default()
    };

    let interval = seconds(args.interval)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let statistics =
        echo_ping::verbose_ping_while(&args.address, args.count, interval, &options, &running, &mut std::io::stdout())?;
    println!("\n--- {} ping statistics ---\n{statistics}", args.address);

    Ok(())
}
