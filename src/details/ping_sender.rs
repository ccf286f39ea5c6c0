use crate::details::icmp::v4::{
    new_icmpv4_package, unix_time_now, SequenceNumber, TSocket, ICMP_HEADER_SIZE, TIMESTAMP_SIZE,
};
use crate::details::records::PingSendRecord;
use crate::details::{PingError, PingResult};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

// Raw ICMP ignores the port, but the socket address needs one.
const PLACEHOLDER_PORT: u16 = 1;

pub(crate) struct PingSender<'a, S> {
    socket: &'a S,
}

impl<'a, S> PingSender<'a, S>
where
    S: TSocket,
{
    pub(crate) fn new(socket: &'a S) -> Self {
        PingSender { socket }
    }

    pub(crate) fn send_to(
        &self,
        dest_addr: &str,
        identifier: u16,
        sequence_number: SequenceNumber,
        size: usize,
    ) -> PingResult<PingSendRecord> {
        let ip_addr = resolve(dest_addr)?;
        let package = new_icmpv4_package(identifier, sequence_number, size)?;
        let send_time = timestamp_of(&package).unwrap_or_else(unix_time_now);

        let addr: socket2::SockAddr = SocketAddr::new(IpAddr::V4(ip_addr), PLACEHOLDER_PORT).into();
        self.socket.send_to(&package, &addr)?;
        tracing::debug!("sent {} bytes to {dest_addr} ({ip_addr}), id={identifier} seq={sequence_number}", package.len());

        Ok(PingSendRecord { package_size: package.len(), ip_addr, identifier, sequence_number, send_time })
    }
}

fn timestamp_of(package: &[u8]) -> Option<f64> {
    let bytes = package.get(ICMP_HEADER_SIZE..ICMP_HEADER_SIZE + TIMESTAMP_SIZE)?;
    Some(f64::from_be_bytes(bytes.try_into().ok()?))
}

/// Resolves `dest_addr` to its first IPv4 address through the system resolver.
pub(crate) fn resolve(dest_addr: &str) -> PingResult<Ipv4Addr> {
    if let Ok(ip_addr) = dest_addr.parse::<Ipv4Addr>() {
        return Ok(ip_addr);
    }
    let host_unknown = || PingError::HostUnknown { dest_addr: dest_addr.to_owned() };
    let addrs = (dest_addr, 0).to_socket_addrs().map_err(|error| {
        tracing::debug!("resolving {dest_addr} failed: {error}");
        host_unknown()
    })?;
    addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(ip_addr) => Some(ip_addr),
            IpAddr::V6(_) => None,
        })
        .next()
        .ok_or_else(host_unknown)
}
