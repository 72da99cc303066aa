//! Passive side of an accepted connection.

use std::time::Instant;

use tracing::info;

use crate::core::EthStreamResult;
use crate::link::{FrameLink, PeerSocket};
use crate::wire::{ConnectPacket, MacAddr, Role};

use super::Connection;

/// Server side of one accepted connection.
///
/// Created by [`Listener::listen`](crate::conn::Listener::listen). The
/// handshake acknowledgement goes out during acceptance, so the connection
/// starts out connected. Repeated CONNECTs from a client whose
/// acknowledgement was lost are re-answered by [`work`](ServerConnection::work).
pub struct ServerConnection<L: FrameLink> {
    conn: Connection<L>,
}

impl<L: FrameLink> ServerConnection<L> {
    pub(crate) fn accept(
        link: L,
        connect: &ConnectPacket,
        client: MacAddr,
    ) -> EthStreamResult<Self> {
        let sock = PeerSocket::new(link, client, connect.connection);
        let mut conn = Connection::new(sock, Role::Server);
        conn.ack_connect()?;
        conn.set_connected();
        info!(
            connection = connect.connection,
            service = connect.service,
            client = %client,
            "accepted connection"
        );
        Ok(Self { conn })
    }

    /// The connection id the client chose.
    pub fn connection_id(&self) -> u32 {
        self.conn.connection_id()
    }

    /// The hardware address this side sends from.
    pub fn local_addr(&self) -> MacAddr {
        self.conn.local_addr()
    }

    /// The client's hardware address.
    pub fn peer_addr(&self) -> MacAddr {
        self.conn.peer_addr()
    }

    /// Whether the connection is still open.
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

    /// Whether every written byte has been acknowledged by the client.
    pub fn flushed(&self) -> bool {
        self.conn.flushed()
    }

    /// Drive the connection with the current time.
    pub fn work(&mut self) -> EthStreamResult<()> {
        self.conn.work()
    }

    /// Drive the connection with an explicit time.
    pub fn work_at(&mut self, now: Instant) -> EthStreamResult<()> {
        self.conn.work_at(now)
    }

    /// Send CLOSE and mark the connection closed.
    pub fn close(&mut self) -> EthStreamResult<()> {
        self.conn.close()
    }
}
