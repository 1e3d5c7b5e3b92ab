//! Datagram sockets the session runs over.
//!
//! The client only needs connected send/recv, so it works against the
//! [`DatagramSocket`] trait. [`UdpDatagramSocket`] is the real transport;
//! [`MemorySocket`] pairs let tests play the device side in-process.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use futures::future::BoxFuture;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::core::{Error, Result};

/// Connected datagram transport
pub trait DatagramSocket: Send + Sync + 'static {
    /// Sends one datagram to the peer
    fn send<'a>(&'a self, datagram: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;

    /// Receives one datagram into `buf`, returning its length
    fn recv<'a>(&'a self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>>;
}

/// UDP socket connected to a single device
#[derive(Debug)]
pub struct UdpDatagramSocket {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpDatagramSocket {
    /// Binds `bind_addr` and connects to `peer`
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr, recv_buffer_size: usize) -> Result<Self> {
        let domain = if peer.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
            debug!(error = %e, size = recv_buffer_size, "could not resize receive buffer");
        }
        socket.set_nonblocking(true)?;
        socket
            .bind(&bind_addr.into())
            .map_err(|e| Error::transport(format!("failed to bind {}: {}", bind_addr, e)))?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket
            .connect(peer)
            .await
            .map_err(|e| Error::transport(format!("failed to connect to {}: {}", peer, e)))?;
        debug!(local = ?socket.local_addr().ok(), %peer, "udp socket ready");

        Ok(UdpDatagramSocket { socket, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramSocket for UdpDatagramSocket {
    fn send<'a>(&'a self, datagram: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            trace!(peer = %self.peer, bytes = datagram.len(), "sending datagram");
            self.socket.send(datagram).await.map(|_| ())
        })
    }

    fn recv<'a>(&'a self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(self.socket.recv(buf))
    }
}

/// One end of an in-memory datagram link
#[derive(Debug)]
pub struct MemorySocket {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl MemorySocket {
    /// Creates two connected ends
    pub fn pair() -> (MemorySocket, MemorySocket) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            MemorySocket {
                tx: a_tx,
                rx: Mutex::new(b_rx),
            },
            MemorySocket {
                tx: b_tx,
                rx: Mutex::new(a_rx),
            },
        )
    }
}

impl DatagramSocket for MemorySocket {
    fn send<'a>(&'a self, datagram: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        let result = self
            .tx
            .send(Bytes::copy_from_slice(datagram))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
        Box::pin(async move { result })
    }

    fn recv<'a>(&'a self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            let datagram = self
                .rx
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionReset, "peer closed"))?;
            // Oversized datagrams are truncated like a real UDP socket would
            let len = datagram.len().min(buf.len());
            buf[..len].copy_from_slice(&datagram[..len]);
            Ok(len)
        })
    }
}
