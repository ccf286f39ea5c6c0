use super::TSocket;
use crate::details::icmp::v4::Ttl;
use socket2::{Domain, Protocol, Type};
use std::net::{IpAddr, Ipv4Addr};
use std::{io, time::Duration};

/// Unprivileged `SOCK_DGRAM` ICMP socket (Linux `net.ipv4.ping_group_range`,
/// macOS). The kernel strips the IP header from replies and replaces the
/// echo identifier with the socket's local port.
pub(crate) struct DgramSocket {
    socket: socket2::Socket,
}

impl DgramSocket {
    pub(crate) fn new() -> Result<Self, io::Error> {
        tracing::trace!("creating DgramSocket");
        let socket = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4))?;
        Ok(DgramSocket { socket })
    }
}

impl TSocket for DgramSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)> {
        super::recv_from(&self.socket, buf, timeout)
    }

    fn set_ttl(&self, ttl: Ttl) -> io::Result<()> {
        super::set_ttl(&self.socket, ttl)
    }

    fn bind_device(&self, interface: &str) -> io::Result<()> {
        super::bind_device(&self.socket, interface)
    }

    fn bind(&self, addr: Ipv4Addr) -> io::Result<()> {
        super::bind(&self.socket, addr)
    }

    fn has_ip_header(&self) -> bool {
        // Linux hands out the bare ICMP message; macOS keeps the IP header.
        cfg!(not(target_os = "linux"))
    }

    fn kernel_identifier(&self) -> Option<u16> {
        // Only known once the first send has bound the socket.
        if cfg!(target_os = "linux") {
            self.socket.local_addr().ok().and_then(|addr| addr.as_socket_ipv4()).map(|addr| addr.port())
        } else {
            None
        }
    }
}
