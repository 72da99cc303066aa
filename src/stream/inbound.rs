//! Receive side of a connection.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::core::EthStreamResult;
use crate::link::{FrameLink, PeerSocket};
use crate::wire::{AckFlags, AckPacket, DataPacket, Packet, Role, next_counter, seq_counter};

/// Incoming half of a connection.
///
/// Validates, deduplicates and acknowledges DATA packets and assembles their
/// payloads into a byte stream. Exactly one ACK answers every DATA; a
/// rejected packet gets an error-flagged ACK so the sender resends without
/// waiting for its timeout.
pub struct Inbound {
    role: Role,
    assembled: VecDeque<u8>,
    // The last ACK that accepted a packet. Repeated verbatim (with a bumped
    // receive count) when the same packet arrives again.
    last_ack: AckPacket,
    no_data_yet: bool,
}

impl Inbound {
    /// Create an empty receive side for the given role and connection id.
    pub fn new(role: Role, connection: u32) -> Self {
        Self {
            role,
            assembled: VecDeque::new(),
            last_ack: AckPacket {
                connection,
                seq: 0,
                received_count: 0,
                flags: AckFlags::empty(),
            },
            no_data_yet: true,
        }
    }

    // Peer sequence that continues the stream: successor of the last
    // accepted one, with the peer's role bit.
    fn expected_seq(&self) -> u16 {
        self.role
            .peer()
            .apply(next_counter(seq_counter(self.last_ack.seq)))
    }

    /// Handle one incoming DATA packet, replying with the appropriate ACK.
    pub fn on_data<L: FrameLink>(
        &mut self,
        data: &DataPacket,
        sock: &mut PeerSocket<L>,
    ) -> EthStreamResult<()> {
        if !self.role.peer().originated(data.seq) {
            debug!(seq = data.seq, "data with our own role bit, ignoring");
            return Ok(());
        }
        if !self.no_data_yet && data.seq == self.last_ack.seq {
            // Retransmission of a packet we already accepted; our ACK was
            // lost. Repeat it.
            self.last_ack.received_count = self.last_ack.received_count.wrapping_add(1);
            debug!(
                seq = data.seq,
                count = self.last_ack.received_count,
                "duplicate data, repeating ack"
            );
            return sock.send_packet(&Packet::Ack(self.last_ack.clone()));
        }
        let expected = self.expected_seq();
        if data.seq != expected {
            debug!(seq = data.seq, expected, "out of order, rejecting");
            return self.reject(data, AckFlags::OUT_OF_ORDER, sock);
        }
        if !data.checksum_ok() {
            debug!(seq = data.seq, "checksum mismatch, rejecting");
            return self.reject(data, AckFlags::CHECKSUM_ERROR, sock);
        }

        self.assembled.extend(data.payload.iter());
        self.last_ack = AckPacket {
            connection: data.connection,
            seq: data.seq,
            received_count: 1,
            flags: AckFlags::empty(),
        };
        self.no_data_yet = false;
        trace!(seq = data.seq, len = data.payload.len(), "data accepted");
        sock.send_packet(&Packet::Ack(self.last_ack.clone()))
    }

    // Error ACKs are sent but never remembered: only a clean acceptance
    // advances the expected sequence.
    fn reject<L: FrameLink>(
        &self,
        data: &DataPacket,
        flag: AckFlags,
        sock: &mut PeerSocket<L>,
    ) -> EthStreamResult<()> {
        let ack = AckPacket {
            connection: data.connection,
            seq: data.seq,
            received_count: 1,
            flags: flag | AckFlags::IGNORED,
        };
        sock.send_packet(&Packet::Ack(ack))
    }

    /// Bytes assembled and ready to read.
    pub fn available(&self) -> usize {
        self.assembled.len()
    }

    /// Move up to `buf.len()` assembled bytes into `buf`, returning how many
    /// were moved.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.assembled.len());
        for (dst, src) in buf.iter_mut().zip(self.assembled.drain(..n)) {
            *dst = src;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{MemLink, MemSegment};
    use crate::wire::MacAddr;

    fn pair(connection: u32) -> (PeerSocket<MemLink>, PeerSocket<MemLink>) {
        let segment = MemSegment::new();
        let a = MacAddr::from_bytes([0x02, 0, 0, 0, 0, 0x0A]);
        let b = MacAddr::from_bytes([0x02, 0, 0, 0, 0, 0x0B]);
        (
            PeerSocket::new(segment.attach(a), b, connection),
            PeerSocket::new(segment.attach(b), a, connection),
        )
    }

    fn recv_ack(sock: &mut PeerSocket<MemLink>) -> AckPacket {
        match sock.recv_packet().unwrap() {
            Some(Packet::Ack(ack)) => ack,
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_in_order_and_acks() {
        let (mut server_sock, mut client_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Server, 7);

        let data = DataPacket::new(7, 1, b"hello".to_vec());
        inbound.on_data(&data, &mut server_sock).unwrap();

        let ack = recv_ack(&mut client_sock);
        assert_eq!(ack.seq, 1);
        assert_eq!(ack.received_count, 1);
        assert!(ack.flags.is_empty());
        assert_eq!(inbound.available(), 5);

        let next = DataPacket::new(7, 2, b" world".to_vec());
        inbound.on_data(&next, &mut server_sock).unwrap();
        assert!(recv_ack(&mut client_sock).flags.is_empty());

        let mut buf = [0u8; 16];
        let n = inbound.read(&mut buf);
        assert_eq!(&buf[..n], b"hello world");
        assert_eq!(inbound.available(), 0);
    }

    #[test]
    fn test_duplicate_repeats_ack_once_per_copy() {
        let (mut server_sock, mut client_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Server, 7);

        let data = DataPacket::new(7, 1, b"hello".to_vec());
        inbound.on_data(&data, &mut server_sock).unwrap();
        assert_eq!(recv_ack(&mut client_sock).received_count, 1);

        // The same packet again: bytes are not duplicated, the ack is
        // repeated with a bumped count.
        inbound.on_data(&data, &mut server_sock).unwrap();
        let repeat = recv_ack(&mut client_sock);
        assert_eq!(repeat.seq, 1);
        assert_eq!(repeat.received_count, 2);
        assert!(repeat.flags.is_empty());
        assert_eq!(inbound.available(), 5);
    }

    #[test]
    fn test_checksum_error_rejected_and_not_remembered() {
        let (mut server_sock, mut client_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Server, 7);

        let mut corrupted = DataPacket::new(7, 1, b"hello".to_vec());
        corrupted.checksum ^= 0xFFFF;
        inbound.on_data(&corrupted, &mut server_sock).unwrap();

        let nack = recv_ack(&mut client_sock);
        assert_eq!(nack.seq, 1);
        assert!(nack.flags.contains(AckFlags::CHECKSUM_ERROR));
        assert!(nack.flags.contains(AckFlags::IGNORED));
        assert_eq!(inbound.available(), 0);

        // The clean retransmission is still welcome at the same sequence.
        let data = DataPacket::new(7, 1, b"hello".to_vec());
        inbound.on_data(&data, &mut server_sock).unwrap();
        assert!(recv_ack(&mut client_sock).flags.is_empty());
        assert_eq!(inbound.available(), 5);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let (mut server_sock, mut client_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Server, 7);

        let data = DataPacket::new(7, 2, b"hello".to_vec());
        inbound.on_data(&data, &mut server_sock).unwrap();

        let nack = recv_ack(&mut client_sock);
        assert!(nack.flags.contains(AckFlags::OUT_OF_ORDER));
        assert!(nack.flags.contains(AckFlags::IGNORED));
        assert_eq!(inbound.available(), 0);
    }

    #[test]
    fn test_out_of_order_reported_before_checksum() {
        let (mut server_sock, mut client_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Server, 7);

        // Corrupted and out of order at once: the sequence verdict wins.
        let mut bad = DataPacket::new(7, 2, b"hello".to_vec());
        bad.checksum ^= 0xFFFF;
        inbound.on_data(&bad, &mut server_sock).unwrap();

        let nack = recv_ack(&mut client_sock);
        assert!(nack.flags.contains(AckFlags::OUT_OF_ORDER));
        assert!(!nack.flags.contains(AckFlags::CHECKSUM_ERROR));
        assert!(nack.flags.contains(AckFlags::IGNORED));
        assert_eq!(inbound.available(), 0);
    }

    #[test]
    fn test_client_side_expects_server_role_bit() {
        let (mut client_sock, mut server_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Client, 7);

        // Server-originated data carries the role bit.
        let data = DataPacket::new(7, 0x8001, b"hello".to_vec());
        inbound.on_data(&data, &mut client_sock).unwrap();
        assert!(recv_ack(&mut server_sock).flags.is_empty());

        // The same counter without the role bit carries our own role and is
        // dropped without any reply.
        let wrong = DataPacket::new(7, 2, b"again".to_vec());
        inbound.on_data(&wrong, &mut client_sock).unwrap();
        assert!(server_sock.recv_packet().unwrap().is_none());
        assert_eq!(inbound.available(), 5);
    }

    #[test]
    fn test_partial_reads_drain_in_order() {
        let (mut server_sock, _client_sock) = pair(7);
        let mut inbound = Inbound::new(Role::Server, 7);

        let data = DataPacket::new(7, 1, b"abcdef".to_vec());
        inbound.on_data(&data, &mut server_sock).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(inbound.read(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(inbound.read(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(inbound.read(&mut buf), 0);
    }
}
