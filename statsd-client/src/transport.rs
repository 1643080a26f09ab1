use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
};

use encoding_rs::{Encoding, UTF_8};

use crate::builder::BuildError;

/// A resolved remote address that stats are sent to.
///
/// The endpoint keeps the host text it was resolved from so that diagnostics can show both the name and the address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    addr: SocketAddr,
}

impl Endpoint {
    /// Resolves `host` and `port` into an endpoint.
    ///
    /// When the host resolves to multiple addresses, the first one is used.
    ///
    /// # Errors
    ///
    /// If the host cannot be resolved, or resolves to no addresses at all, an error is returned.
    pub fn resolve(host: &str, port: u16) -> Result<Self, BuildError> {
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| BuildError::Resolve { host: host.to_string(), source })?;

        match addrs.next() {
            Some(addr) => Ok(Endpoint { host: host.to_string(), addr }),
            None => Err(BuildError::NoAddress { host: host.to_string() }),
        }
    }

    /// Returns the host this endpoint was resolved from.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the resolved socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Endpoint { host: addr.ip().to_string(), addr }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host == self.addr.ip().to_string() {
            write!(f, "{}", self.addr)
        } else {
            write!(f, "{}/{}", self.host, self.addr)
        }
    }
}

/// A send-only, connectionless transport for wire lines.
///
/// Sends are fire-and-forget: a successful return only means the line was handed off to the network stack.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Sends a single line as one packet.
    ///
    /// # Errors
    ///
    /// If the underlying socket rejects the packet, an error is returned and the line is lost.
    fn send(&self, line: &str) -> io::Result<()>;
}

/// A UDP transport bound to a single remote endpoint.
pub struct UdpTransport {
    socket: UdpSocket,
    endpoint: Endpoint,
    encoding: &'static Encoding,
}

impl UdpTransport {
    /// Opens a UDP socket for sending to `endpoint`, encoding lines as UTF-8.
    ///
    /// # Errors
    ///
    /// If a local socket cannot be bound, an error is returned.
    pub fn open(endpoint: Endpoint) -> io::Result<Self> {
        Self::open_with_encoding(endpoint, UTF_8)
    }

    /// Opens a UDP socket for sending to `endpoint`, encoding lines with the given character encoding.
    ///
    /// # Errors
    ///
    /// If a local socket cannot be bound, an error is returned.
    pub fn open_with_encoding(endpoint: Endpoint, encoding: &'static Encoding) -> io::Result<Self> {
        let socket = match endpoint.addr() {
            SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?,
            SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
        };

        Ok(UdpTransport { socket, endpoint, encoding })
    }

    /// Returns the endpoint this transport sends to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the local address of the underlying socket.
    ///
    /// # Errors
    ///
    /// If the socket address cannot be queried, an error is returned.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send(&self, line: &str) -> io::Result<()> {
        let (payload, _, _) = self.encoding.encode(line);
        self.socket.send_to(&payload, self.endpoint.addr()).map(|_| ())
    }
}

impl<T> Transport for std::sync::Arc<T>
where
    T: Transport + ?Sized,
{
    fn send(&self, line: &str) -> io::Result<()> {
        std::ops::Deref::deref(self).send(line)
    }
}

impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    fn send(&self, line: &str) -> io::Result<()> {
        std::ops::Deref::deref(self).send(line)
    }
}
