use super::TSocket;
use crate::details::icmp::v4::Ttl;
use socket2::{Domain, Protocol, Type};
use std::net::{IpAddr, Ipv4Addr};
use std::{io, time::Duration};

/// `SOCK_RAW` ICMP socket. Needs root or `CAP_NET_RAW`; reads whole IPv4 datagrams.
pub(crate) struct RawSocket {
    socket: socket2::Socket,
}

impl RawSocket {
    pub(crate) fn new() -> Result<Self, io::Error> {
        tracing::trace!("creating RawSocket");
        let socket = socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        Ok(RawSocket { socket })
    }
}

impl TSocket for RawSocket {
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
        true
    }

    fn kernel_identifier(&self) -> Option<u16> {
        None
    }
}
