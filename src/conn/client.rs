//! Active opener.

use std::time::Instant;

use tracing::{debug, info};

use crate::core::EthStreamResult;
use crate::core::constants::CONNECT_RETRY_TIMEOUT;
#[cfg(target_os = "linux")]
use crate::link::LinkSocket;
use crate::link::{FrameLink, PeerSocket};
use crate::wire::{ConnectPacket, MacAddr, Packet, Role};

use super::Connection;

/// Client side of a connection.
///
/// Picks a connection id, repeats CONNECT until the server's handshake
/// acknowledgement arrives, then behaves like any other connection.
pub struct Client<L: FrameLink> {
    conn: Connection<L>,
    service: u16,
    sent_count: u8,
    last_connect: Instant,
}

impl<L: FrameLink> Client<L> {
    /// Open a connection to `server` with a random connection id.
    ///
    /// The first CONNECT goes out immediately; call [`work`](Client::work)
    /// until [`connected`](Client::connected) turns true.
    pub fn new(link: L, server: MacAddr, service: u16) -> EthStreamResult<Self> {
        Self::with_connection_id(link, server, service, rand::random())
    }

    /// Like [`new`](Client::new), with a caller-chosen connection id.
    pub fn with_connection_id(
        link: L,
        server: MacAddr,
        service: u16,
        connection: u32,
    ) -> EthStreamResult<Self> {
        let sock = PeerSocket::new(link, server, connection);
        let mut client = Self {
            conn: Connection::new(sock, Role::Client),
            service,
            sent_count: 0,
            last_connect: Instant::now(),
        };
        client.send_connect()?;
        info!(connection, service, server = %server, "connecting");
        Ok(client)
    }

    fn send_connect(&mut self) -> EthStreamResult<()> {
        self.sent_count = self.sent_count.wrapping_add(1);
        debug!(count = self.sent_count, "send connect");
        let connect = ConnectPacket {
            connection: self.conn.connection_id(),
            sent_count: self.sent_count,
            service: self.service,
            flags: 0,
        };
        self.conn.sock_mut().send_packet(&Packet::Connect(connect))
    }

    /// Drive the connection with the current time.
    pub fn work(&mut self) -> EthStreamResult<()> {
        self.work_at(Instant::now())
    }

    /// Drive the connection; while the handshake is still open, also repeat
    /// CONNECT on its retry interval.
    pub fn work_at(&mut self, now: Instant) -> EthStreamResult<()> {
        self.conn.work_at(now)?;
        if !self.conn.connected()
            && !self.conn.closed()
            && now.duration_since(self.last_connect) >= CONNECT_RETRY_TIMEOUT
        {
            self.send_connect()?;
            self.last_connect = now;
        }
        Ok(())
    }

    /// The connection id this client chose.
    pub fn connection_id(&self) -> u32 {
        self.conn.connection_id()
    }

    /// The hardware address this client sends from.
    pub fn local_addr(&self) -> MacAddr {
        self.conn.local_addr()
    }

    /// The server's hardware address.
    pub fn peer_addr(&self) -> MacAddr {
        self.conn.peer_addr()
    }

    /// Whether the handshake has completed.
    pub fn connected(&self) -> bool {
        self.conn.connected()
    }

    /// Whether the connection has been closed, locally or by the peer.
    pub fn closed(&self) -> bool {
        self.conn.closed()
    }

    /// Queue bytes for transmission.
    pub fn write(&mut self, bytes: &[u8]) {
        self.conn.write(bytes);
    }

    /// Move up to `buf.len()` received bytes into `buf`, returning how many
    /// were moved.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.conn.read(buf)
    }

    /// Received bytes ready to read.
    pub fn available(&self) -> usize {
        self.conn.available()
    }

    /// Whether every written byte has been acknowledged by the server.
    pub fn flushed(&self) -> bool {
        self.conn.flushed()
    }

    /// Send CLOSE and mark the connection closed.
    pub fn close(&mut self) -> EthStreamResult<()> {
        self.conn.close()
    }
}

#[cfg(target_os = "linux")]
impl Client<LinkSocket> {
    /// Open a client on the named network interface.
    pub fn open(interface: &str, server: MacAddr, service: u16) -> EthStreamResult<Self> {
        Self::new(LinkSocket::open(interface)?, server, service)
    }
}
