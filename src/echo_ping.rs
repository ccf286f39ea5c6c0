use crate::details::icmp::v4::{identifier, SequenceNumber, Socket, TSocket, Ttl};
use crate::details::records::PingReceiveRecord;
use crate::details::{PingError, PingReceiver, PingResult, PingSender, PingStatistics};
use std::io::Write;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::{fmt, thread};

/// Unit in which delays are reported.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Unit {
    #[default]
    Seconds,
    Milliseconds,
}

impl Unit {
    #[must_use]
    pub fn scale_seconds(self, seconds: f64) -> f64 {
        match self {
            Unit::Seconds => seconds,
            Unit::Milliseconds => seconds * 1000.0,
        }
    }

    fn precision(self) -> usize {
        match self {
            Unit::Seconds => 3,
            Unit::Milliseconds => 0,
        }
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Unit::Seconds),
            "ms" => Ok(Unit::Milliseconds),
            other => Err(format!("unknown unit '{other}', expected 's' or 'ms'")),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Seconds => write!(f, "s"),
            Unit::Milliseconds => write!(f, "ms"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PingOptions {
    /// How long to wait for the reply.
    pub timeout: Duration,
    pub unit: Unit,
    /// Local address to send from.
    pub src_addr: Option<Ipv4Addr>,
    /// Leave unset to keep the system default.
    pub ttl: Option<Ttl>,
    pub sequence: SequenceNumber,
    /// Payload bytes after the ICMP header. Never less than the 8 byte timestamp.
    pub size: usize,
    /// Network interface to send through (`SO_BINDTODEVICE`).
    pub interface: Option<String>,
    /// Return timeouts and failures as `Err` instead of `PingOutcome::Timeout`
    /// and `PingOutcome::Unreachable`.
    pub raise_errors: bool,
}

impl Default for PingOptions {
    fn default() -> Self {
        PingOptions {
            timeout: Duration::from_secs(4),
            unit: Unit::Seconds,
            src_addr: None,
            ttl: None,
            sequence: SequenceNumber::start_value(),
            size: 56,
            interface: None,
            raise_errors: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PingOutcome {
    /// Round trip time in the requested unit.
    Delay(f64),
    Timeout,
    /// Error reply, unknown host or socket failure.
    Unreachable,
}

impl PingOutcome {
    #[must_use]
    pub fn delay(self) -> Option<f64> {
        match self {
            PingOutcome::Delay(delay) => Some(delay),
            PingOutcome::Timeout | PingOutcome::Unreachable => None,
        }
    }
}

/// Sends one ICMP echo request to `dest_addr` and waits for its reply.
///
/// A raw socket is used when permitted, otherwise an unprivileged ICMP
/// datagram socket. The socket lives for this call only.
///
/// Failing to open a socket, to bind it to `options.interface` or to bind it
/// to `options.src_addr` is always an `Err`. Other failures are mapped to
/// `PingOutcome::Timeout` or `PingOutcome::Unreachable` unless
/// `options.raise_errors` is set. A TTL the socket refuses is logged and ignored.
pub fn ping(dest_addr: &str, options: &PingOptions) -> PingResult<PingOutcome> {
    let socket = Socket::open()?;
    ping_with_socket(&socket, dest_addr, options)
}

fn ping_with_socket<S>(socket: &S, dest_addr: &str, options: &PingOptions) -> PingResult<PingOutcome>
where
    S: TSocket,
{
    if let Some(ttl) = options.ttl {
        if let Err(error) = socket.set_ttl(ttl) {
            tracing::warn!("cannot set ttl {ttl}, continuing with the default: {error}");
        }
    }
    if let Some(interface) = &options.interface {
        socket.bind_device(interface)?;
    }
    if let Some(src_addr) = options.src_addr {
        socket.bind(src_addr)?;
    }

    let identifier = identifier();
    let receive_record = PingSender::new(socket)
        .send_to(dest_addr, identifier, options.sequence, options.size)
        .and_then(|send_record| {
            tracing::trace!(
                "{} bytes to {} sent at {:.6}, waiting for the reply",
                send_record.package_size,
                send_record.ip_addr,
                send_record.send_time
            );
            PingReceiver::new(socket).receive(send_record.identifier, send_record.sequence_number, options.timeout)
        });
    into_outcome(receive_record, options)
}

fn into_outcome(receive_record: PingResult<PingReceiveRecord>, options: &PingOptions) -> PingResult<PingOutcome> {
    let error = match receive_record {
        Ok(PingReceiveRecord::Data(data)) => {
            let delay = options.unit.scale_seconds(data.round_trip);
            tracing::debug!(
                "{} bytes from {}: icmp_seq={} ttl={} time={delay}{}",
                data.package_size,
                data.ip_addr,
                data.sequence_number,
                data.ttl.map_or_else(|| "?".to_owned(), |ttl| ttl.to_string()),
                options.unit
            );
            return Ok(PingOutcome::Delay(delay));
        }
        Ok(PingReceiveRecord::Timeout) => PingError::Timeout { timeout: options.timeout },
        Ok(PingReceiveRecord::DestinationUnreachable { ip_header, icmp_header }) => {
            PingError::DestinationUnreachable { ip_header, icmp_header }
        }
        Ok(PingReceiveRecord::TimeToLiveExpired { ip_header, icmp_header }) => {
            PingError::TimeToLiveExpired { ip_header, icmp_header }
        }
        Err(error) => error,
    };
    tracing::debug!("{error}");

    if options.raise_errors {
        return Err(error);
    }
    match error {
        PingError::Timeout { .. } => Ok(PingOutcome::Timeout),
        _ => Ok(PingOutcome::Unreachable),
    }
}

/// Pings `dest_addr` `count` times (forever when `count` is 0), `interval`
/// apart, writing one report line per probe to `out`. Probe `i` uses
/// sequence number `i`; everything else comes from `options`.
pub fn verbose_ping<W>(
    dest_addr: &str,
    count: u32,
    interval: Duration,
    options: &PingOptions,
    out: &mut W,
) -> PingResult<PingStatistics>
where
    W: Write,
{
    verbose_ping_while(dest_addr, count, interval, options, &AtomicBool::new(true), out)
}

/// Like [`verbose_ping`], but also stops before the next probe once `running`
/// is cleared, e.g. from a Ctrl+C handler. The statistics cover the probes made.
pub fn verbose_ping_while<W>(
    dest_addr: &str,
    count: u32,
    interval: Duration,
    options: &PingOptions,
    running: &AtomicBool,
    out: &mut W,
) -> PingResult<PingStatistics>
where
    W: Write,
{
    verbose_ping_with(ping, dest_addr, count, interval, options, running, out)
}

fn verbose_ping_with<F, W>(
    mut probe: F,
    dest_addr: &str,
    count: u32,
    interval: Duration,
    options: &PingOptions,
    running: &AtomicBool,
    out: &mut W,
) -> PingResult<PingStatistics>
where
    F: FnMut(&str, &PingOptions) -> PingResult<PingOutcome>,
    W: Write,
{
    let mut statistics = PingStatistics::new();
    let mut index: u64 = 0;
    while count == 0 || index < u64::from(count) {
        if index > 0 {
            thread::sleep(interval);
        }
        if !running.load(Ordering::SeqCst) {
            tracing::debug!("stopped after {index} probes");
            break;
        }
        let probe_options = PingOptions { sequence: SequenceNumber::from_probe_index(index), ..options.clone() };
        let outcome = probe(dest_addr, &probe_options)?;

        write!(out, "ping '{dest_addr}'")?;
        if let Some(src_addr) = options.src_addr {
            write!(out, " from '{src_addr}'")?;
        }
        match outcome {
            PingOutcome::Delay(delay) => {
                statistics.record_reply(delay);
                writeln!(out, " ... {delay:.precision$}{}", options.unit, precision = options.unit.precision())?;
            }
            PingOutcome::Timeout => {
                statistics.record_lost();
                writeln!(out, " ... Timeout")?;
            }
            PingOutcome::Unreachable => {
                statistics.record_lost();
                writeln!(out, " ... Error")?;
            }
        }
        index += 1;
    }
    Ok(statistics)
}
