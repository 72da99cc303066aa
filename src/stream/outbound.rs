//! Send side of a connection.

use std::time::Instant;

use tracing::{debug, trace};

use crate::core::EthStreamResult;
use crate::core::constants::{DATA_RETRY_TIMEOUT, MAX_PAYLOAD};
use crate::link::{FrameLink, PeerSocket};
use crate::wire::{AckPacket, DataPacket, Packet, Role, next_counter, seq_counter};

struct InFlight {
    packet: DataPacket,
    sent_at: Instant,
}

/// Outgoing half of a connection.
///
/// Queues submitted bytes, keeps at most one DATA packet in flight and
/// retransmits it until a clean acknowledgement arrives. Queued bytes leave
/// the buffer only once their packet is acknowledged, so nothing is lost no
/// matter how often the packet has to be resent.
pub struct Outbound {
    role: Role,
    pending: Vec<u8>,
    in_flight: Option<InFlight>,
    // Counter of the last DATA handed to the wire, 0 if none yet.
    last_counter: u16,
}

impl Outbound {
    /// Create an idle send side for the given role.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            pending: Vec::new(),
            in_flight: None,
            last_counter: 0,
        }
    }

    /// Queue bytes for transmission.
    pub fn submit(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Bytes submitted but not yet acknowledged.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether every submitted byte has been acknowledged.
    pub fn flushed(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_empty()
    }

    /// The sequence number the next fresh DATA packet will carry.
    pub fn next_seq(&self) -> u16 {
        self.role.apply(next_counter(self.last_counter))
    }

    /// Drive the send side: retransmit a timed-out packet, or put the next
    /// payload slice on the wire.
    pub fn tick_at<L: FrameLink>(
        &mut self,
        now: Instant,
        sock: &mut PeerSocket<L>,
    ) -> EthStreamResult<()> {
        if let Some(in_flight) = &mut self.in_flight {
            if now.duration_since(in_flight.sent_at) >= DATA_RETRY_TIMEOUT {
                in_flight.packet.sent_count = in_flight.packet.sent_count.wrapping_add(1);
                in_flight.sent_at = now;
                debug!(
                    seq = in_flight.packet.seq,
                    count = in_flight.packet.sent_count,
                    "ack overdue, retransmitting"
                );
                sock.send_packet(&Packet::Data(in_flight.packet.clone()))?;
            }
            return Ok(());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        let len = self.pending.len().min(MAX_PAYLOAD);
        let seq = self.next_seq();
        let packet = DataPacket::new(sock.connection(), seq, self.pending[..len].to_vec());
        self.last_counter = seq_counter(seq);
        trace!(seq, len, "send data");
        sock.send_packet(&Packet::Data(packet.clone()))?;
        self.in_flight = Some(InFlight {
            packet,
            sent_at: now,
        });
        Ok(())
    }

    /// Handle an acknowledgement of our DATA.
    ///
    /// Anything that does not match the packet currently in flight is
    /// ignored; stale and duplicate ACKs carry no information here. A clean
    /// match retires the packet, an error-flagged match triggers an
    /// immediate resend instead of waiting out the timeout.
    pub fn on_ack_at<L: FrameLink>(
        &mut self,
        now: Instant,
        ack: &AckPacket,
        sock: &mut PeerSocket<L>,
    ) -> EthStreamResult<()> {
        let Some(in_flight) = &mut self.in_flight else {
            debug!(seq = ack.seq, "ack with nothing in flight, ignoring");
            return Ok(());
        };
        if ack.seq != in_flight.packet.seq {
            debug!(
                seq = ack.seq,
                expected = in_flight.packet.seq,
                "ack for wrong sequence, ignoring"
            );
            return Ok(());
        }
        if ack.flags.is_empty() {
            let len = in_flight.packet.payload.len();
            trace!(seq = ack.seq, len, "data acknowledged");
            self.pending.drain(..len);
            self.in_flight = None;
        } else {
            in_flight.packet.sent_count = in_flight.packet.sent_count.wrapping_add(1);
            in_flight.sent_at = now;
            debug!(seq = ack.seq, flags = ?ack.flags, "error ack, retransmitting");
            sock.send_packet(&Packet::Data(in_flight.packet.clone()))?;
        }
        Ok(())
    }
}
