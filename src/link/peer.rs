//! Packet-level socket bound to one remote peer.

use tracing::{debug, trace};

use crate::core::EthStreamResult;
use crate::wire::{MacAddr, Packet};

use super::FrameLink;

/// Sends and receives packets to and from a single peer.
///
/// Frames from other sources and frames that do not decode are discarded
/// here, so the connection layer above only ever sees well-formed packets
/// from its own peer.
pub struct PeerSocket<L: FrameLink> {
    link: L,
    peer: MacAddr,
    connection: u32,
}

impl<L: FrameLink> PeerSocket<L> {
    /// Bind `link` to one remote peer and connection id.
    pub fn new(link: L, peer: MacAddr, connection: u32) -> Self {
        Self {
            link,
            peer,
            connection,
        }
    }

    /// The hardware address this socket sends from.
    pub fn local_addr(&self) -> MacAddr {
        self.link.local_addr()
    }

    /// The remote peer's hardware address.
    pub fn peer(&self) -> MacAddr {
        self.peer
    }

    /// The connection id this socket serves.
    pub fn connection(&self) -> u32 {
        self.connection
    }

    /// Encode and send one packet to the peer.
    pub fn send_packet(&mut self, packet: &Packet) -> EthStreamResult<()> {
        trace!(packet = ?packet.packet_type(), connection = packet.connection(), "send");
        self.link.send(self.peer, &packet.encode())
    }

    /// Receive one packet from the peer, without blocking.
    ///
    /// At most one frame is read from the link; a frame from another source
    /// or one that fails to decode is discarded and reported as `None`.
    pub fn recv_packet(&mut self) -> EthStreamResult<Option<Packet>> {
        let Some(frame) = self.link.recv()? else {
            return Ok(None);
        };
        if frame.source != self.peer {
            debug!(source = %frame.source, "frame from unrelated source, discarding");
            return Ok(None);
        }
        match Packet::decode(&frame.payload) {
            Ok(packet) => {
                trace!(packet = ?packet.packet_type(), "recv");
                Ok(Some(packet))
            }
            Err(err) => {
                debug!(%err, "undecodable frame, discarding");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{MemLink, MemSegment};
    use crate::wire::{ClosePacket, PacketType};

    fn mac(last: u8) -> MacAddr {
        MacAddr::from_bytes([0x02, 0, 0, 0, 0, last])
    }

    fn segment_pair(connection: u32) -> (MemSegment, PeerSocket<MemLink>, MemLink) {
        let segment = MemSegment::new();
        let sock = PeerSocket::new(segment.attach(mac(1)), mac(2), connection);
        let peer_link = segment.attach(mac(2));
        (segment, sock, peer_link)
    }

    #[test]
    fn test_roundtrip_to_peer() {
        let (_segment, mut sock, mut peer_link) = segment_pair(7);
        let packet = Packet::Close(ClosePacket {
            connection: 7,
            seq: 1,
        });
        sock.send_packet(&packet).unwrap();

        let frame = peer_link.recv().unwrap().expect("frame at peer");
        assert_eq!(frame.source, mac(1));
        assert_eq!(Packet::decode(&frame.payload).unwrap(), packet);
    }

    #[test]
    fn test_filters_unrelated_sources() {
        let (segment, mut sock, mut peer_link) = segment_pair(7);
        let mut stranger = segment.attach(mac(3));
        let bytes = Packet::Close(ClosePacket {
            connection: 7,
            seq: 1,
        })
        .encode();
        stranger.send(mac(1), &bytes).unwrap();
        peer_link.send(mac(1), &bytes).unwrap();

        // One receive per call: the stranger's frame burns the first call,
        // the peer's copy arrives on the second.
        assert!(sock.recv_packet().unwrap().is_none());
        assert!(sock.recv_packet().unwrap().is_some());
    }

    #[test]
    fn test_discards_undecodable_frames() {
        let (segment, mut sock, mut peer_link) = segment_pair(7);
        drop(segment);

        // Garbage first, then a valid packet behind it.
        peer_link.send(mac(1), &[0xEE; 32]).unwrap();
        let packet = Packet::Close(ClosePacket {
            connection: 7,
            seq: 1,
        });
        peer_link.send(mac(1), &packet.encode()).unwrap();

        assert!(sock.recv_packet().unwrap().is_none());
        let received = sock.recv_packet().unwrap().expect("valid packet");
        assert_eq!(received.packet_type(), PacketType::Close);
    }
}
