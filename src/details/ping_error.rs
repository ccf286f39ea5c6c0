use crate::details::icmp::v4::{IcmpHeader, IpHeader};
use std::time::Duration;
use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum PingError {
    /// The destination name did not resolve to an IPv4 address.
    HostUnknown { dest_addr: String },
    /// Neither a raw nor an unprivileged ICMP socket could be opened. Carries
    /// the error of the raw socket attempt.
    Permission(io::Error),
    Timeout { timeout: Duration },
    DestinationUnreachable { ip_header: Option<IpHeader>, icmp_header: IcmpHeader },
    TimeToLiveExpired { ip_header: Option<IpHeader>, icmp_header: IcmpHeader },
    /// A buffer was too short or malformed to hold the expected header.
    Decode { message: String },
    Io(io::Error),
}

impl PingError {
    pub(crate) fn decode(message: String) -> PingError {
        PingError::Decode { message }
    }
}

fn fmt_responder(f: &mut fmt::Formatter<'_>, ip_header: Option<&IpHeader>) -> Result<(), fmt::Error> {
    match ip_header {
        Some(ip_header) => write!(f, " (reported by {})", ip_header.source),
        None => Ok(()),
    }
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "PingError: ")?;
        match self {
            PingError::HostUnknown { dest_addr } => write!(f, "cannot resolve {dest_addr}: unknown host"),
            PingError::Permission(error) => write!(f, "cannot open ICMP socket: {error}"),
            PingError::Timeout { timeout } => write!(f, "request timed out after {timeout:?}"),
            PingError::DestinationUnreachable { ip_header, icmp_header } => {
                write!(f, "destination unreachable (type {}, code {})", icmp_header.icmp_type, icmp_header.code)?;
                fmt_responder(f, ip_header.as_ref())
            }
            PingError::TimeToLiveExpired { ip_header, icmp_header } => {
                write!(f, "time to live expired (code {})", icmp_header.code)?;
                fmt_responder(f, ip_header.as_ref())
            }
            PingError::Decode { message } => write!(f, "cannot decode packet: {message}"),
            PingError::Io(error) => write!(f, "{error}"),
        }
    }
}

impl Error for PingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PingError::Permission(error) | PingError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for PingError {
    fn from(error: io::Error) -> PingError {
        PingError::Io(error)
    }
}
