//! The shared connection engine.

use std::time::Instant;

use tracing::{debug, info};

use crate::core::EthStreamResult;
use crate::link::{FrameLink, PeerSocket};
use crate::stream::{Inbound, Outbound};
use crate::wire::{AckFlags, AckPacket, ClosePacket, MacAddr, Packet, Role};

/// A bidirectional reliable byte stream to one peer.
///
/// The engine is cooperative: nothing happens on the wire outside of
/// [`work`](Connection::work), which the owner calls in a loop. Reads and
/// writes only touch in-memory buffers.
pub struct Connection<L: FrameLink> {
    sock: PeerSocket<L>,
    role: Role,
    outbound: Outbound,
    inbound: Inbound,
    connected: bool,
    closed: bool,
    connects_received: u8,
}

impl<L: FrameLink> Connection<L> {
    pub(crate) fn new(sock: PeerSocket<L>, role: Role) -> Self {
        let connection = sock.connection();
        Self {
            role,
            outbound: Outbound::new(role),
            inbound: Inbound::new(role, connection),
            sock,
            connected: false,
            closed: false,
            connects_received: 0,
        }
    }

    pub(crate) fn set_connected(&mut self) {
        self.connected = true;
    }

    pub(crate) fn sock_mut(&mut self) -> &mut PeerSocket<L> {
        &mut self.sock
    }

    // Acknowledge a CONNECT: sequence 0, counting how many CONNECTs we have
    // answered so the client can see how lossy the handshake was.
    pub(crate) fn ack_connect(&mut self) -> EthStreamResult<()> {
        self.connects_received = self.connects_received.wrapping_add(1);
        let ack = AckPacket {
            connection: self.sock.connection(),
            seq: 0,
            received_count: self.connects_received,
            flags: AckFlags::empty(),
        };
        self.sock.send_packet(&Packet::Ack(ack))
    }

    /// The connection id.
    pub fn connection_id(&self) -> u32 {
        self.sock.connection()
    }

    /// The hardware address this side sends from.
    pub fn local_addr(&self) -> MacAddr {
        self.sock.local_addr()
    }

    /// The peer's hardware address.
    pub fn peer_addr(&self) -> MacAddr {
        self.sock.peer()
    }

    /// Whether the handshake has completed.
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// Whether the connection has been closed, locally or by the peer.
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Queue bytes for transmission.
    pub fn write(&mut self, bytes: &[u8]) {
        self.outbound.submit(bytes);
    }

    /// Move up to `buf.len()` received bytes into `buf`, returning how many
    /// were moved.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.inbound.read(buf)
    }

    /// Received bytes ready to read.
    pub fn available(&self) -> usize {
        self.inbound.available()
    }

    /// Whether every written byte has been acknowledged by the peer.
    pub fn flushed(&self) -> bool {
        self.outbound.flushed()
    }

    /// Drive the connection with the current time.
    pub fn work(&mut self) -> EthStreamResult<()> {
        self.work_at(Instant::now())
    }

    /// Drive the connection: at most one non-blocking receive and dispatch,
    /// then let the send side retransmit or put the next payload slice on
    /// the wire.
    pub fn work_at(&mut self, now: Instant) -> EthStreamResult<()> {
        if let Some(packet) = self.sock.recv_packet()? {
            self.dispatch_at(now, packet)?;
        }
        if self.connected && !self.closed {
            self.outbound.tick_at(now, &mut self.sock)?;
        }
        Ok(())
    }

    fn dispatch_at(&mut self, now: Instant, packet: Packet) -> EthStreamResult<()> {
        if packet.connection() != self.sock.connection() {
            return self.reject_unknown(packet);
        }
        match packet {
            Packet::Connect(connect) => {
                if self.role == Role::Server {
                    // The handshake ACK was lost; repeat it.
                    debug!(
                        connection = connect.connection,
                        sent_count = connect.sent_count,
                        "repeated connect, repeating handshake ack"
                    );
                    self.ack_connect()
                } else {
                    debug!("connect addressed to a client, ignoring");
                    Ok(())
                }
            }
            Packet::Data(data) => {
                if self.closed {
                    let ack = AckPacket {
                        connection: data.connection,
                        seq: data.seq,
                        received_count: 1,
                        flags: AckFlags::CONNECTION_CLOSED | AckFlags::IGNORED,
                    };
                    self.sock.send_packet(&Packet::Ack(ack))
                } else {
                    self.inbound.on_data(&data, &mut self.sock)
                }
            }
            Packet::Ack(ack) => {
                if ack.seq == 0 {
                    // Handshake acknowledgement.
                    if !self.connected {
                        info!(connection = self.connection_id(), "connected");
                    }
                    self.connected = true;
                    Ok(())
                } else {
                    self.outbound.on_ack_at(now, &ack, &mut self.sock)
                }
            }
            Packet::Close(close) => {
                // Never answered; the peer has already torn its side down.
                info!(connection = close.connection, "peer closed connection");
                self.connected = false;
                self.closed = true;
                Ok(())
            }
        }
    }

    // Wrong connection id on our link. DATA gets an error ack so the sender
    // can stop retrying; anything else is dropped.
    fn reject_unknown(&mut self, packet: Packet) -> EthStreamResult<()> {
        debug!(
            connection = packet.connection(),
            expected = self.sock.connection(),
            "packet for unknown connection"
        );
        if let Packet::Data(data) = packet {
            let ack = AckPacket {
                connection: data.connection,
                seq: data.seq,
                received_count: 1,
                flags: AckFlags::UNKNOWN_CONNECTION | AckFlags::IGNORED,
            };
            self.sock.send_packet(&Packet::Ack(ack))?;
        }
        Ok(())
    }

    /// Send CLOSE and mark the connection closed.
    ///
    /// CLOSE is fire-and-forget: it is never acknowledged and never resent.
    /// Only an established connection emits one; closing again, or closing
    /// before the handshake completed, does nothing.
    pub fn close(&mut self) -> EthStreamResult<()> {
        if !self.connected {
            return Ok(());
        }
        let close = ClosePacket {
            connection: self.sock.connection(),
            seq: self.outbound.next_seq(),
        };
        self.sock.send_packet(&Packet::Close(close))?;
        self.connected = false;
        self.closed = true;
        info!(connection = self.connection_id(), "connection closed");
        Ok(())
    }
}
