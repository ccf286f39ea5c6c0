use crate::details::icmp::v4::Ttl;
use crate::details::{PingError, PingResult};
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::{io, time::Duration};

pub(crate) use dgram_socket::DgramSocket;
pub(crate) use raw_socket::RawSocket;

mod dgram_socket;
mod raw_socket;

// socket2 rejects a zero read timeout.
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

pub(crate) trait TSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    /// Waits at most `timeout` for one datagram. Nothing arriving in time is
    /// reported as `WouldBlock` or `TimedOut`, depending on the platform.
    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)>;
    fn set_ttl(&self, ttl: Ttl) -> io::Result<()>;
    fn bind_device(&self, interface: &str) -> io::Result<()>;
    fn bind(&self, addr: Ipv4Addr) -> io::Result<()>;
    /// Whether received datagrams start with the IPv4 header.
    fn has_ip_header(&self) -> bool;
    /// Identifier the kernel put on our echo requests in place of ours, if any.
    fn kernel_identifier(&self) -> Option<u16>;
}

pub(crate) enum Socket {
    Raw(RawSocket),
    Dgram(DgramSocket),
}

impl Socket {
    /// Opens a raw ICMP socket. When that is not permitted, an unprivileged
    /// datagram ICMP socket is tried instead; if that fails as well the
    /// original permission error is returned.
    pub(crate) fn open() -> PingResult<Self> {
        open_with(|| RawSocket::new().map(Socket::Raw), || DgramSocket::new().map(Socket::Dgram))
    }

    fn inner(&self) -> &dyn TSocket {
        match self {
            Socket::Raw(socket) => socket,
            Socket::Dgram(socket) => socket,
        }
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        tracing::trace!("closing socket");
    }
}

impl TSocket for Socket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.inner().send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)> {
        self.inner().recv_from(buf, timeout)
    }

    fn set_ttl(&self, ttl: Ttl) -> io::Result<()> {
        self.inner().set_ttl(ttl)
    }

    fn bind_device(&self, interface: &str) -> io::Result<()> {
        self.inner().bind_device(interface)
    }

    fn bind(&self, addr: Ipv4Addr) -> io::Result<()> {
        self.inner().bind(addr)
    }

    fn has_ip_header(&self) -> bool {
        self.inner().has_ip_header()
    }

    fn kernel_identifier(&self) -> Option<u16> {
        self.inner().kernel_identifier()
    }
}

fn open_with<T>(raw: impl FnOnce() -> io::Result<T>, dgram: impl FnOnce() -> io::Result<T>) -> PingResult<T> {
    match raw() {
        Ok(socket) => Ok(socket),
        Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!("raw socket not permitted ({error}), trying datagram socket");
            dgram().map_err(|fallback_error| {
                tracing::debug!("datagram socket failed as well: {fallback_error}");
                PingError::Permission(error)
            })
        }
        Err(error) => Err(error.into()),
    }
}

fn recv_from(socket: &socket2::Socket, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)> {
    socket.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

    // Socket2 gives a safety guaranty which allows us to do an unsafe cast from `&mut [u8]`
    // to `&mut [std::mem::MaybeUninit<u8>]`: it never writes uninitialized bytes into it.
    // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
    let uninit_buf = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
    let (n_bytes, socket_addr) = socket.recv_from(uninit_buf)?;
    let ip_addr = socket_addr
        .as_socket()
        .map(|addr| addr.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "received from a non-IP address"))?;
    Ok((n_bytes, ip_addr))
}

fn set_ttl(socket: &socket2::Socket, ttl: Ttl) -> io::Result<()> {
    socket.set_ttl(ttl.into())
}

#[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
fn bind_device(socket: &socket2::Socket, interface: &str) -> io::Result<()> {
    socket.bind_device(Some(interface.as_bytes()))
}

#[cfg(not(any(target_os = "android", target_os = "fuchsia", target_os = "linux")))]
fn bind_device(_socket: &socket2::Socket, interface: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("binding to interface {interface} is not supported on this platform"),
    ))
}

fn bind(socket: &socket2::Socket, addr: Ipv4Addr) -> io::Result<()> {
    socket.bind(&SocketAddr::new(IpAddr::V4(addr), 0).into())
}
