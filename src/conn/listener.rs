//! Listens for CONNECT packets on a service.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::core::EthStreamResult;
#[cfg(target_os = "linux")]
use crate::link::LinkSocket;
use crate::link::FrameLink;
use crate::wire::{MacAddr, Packet};

use super::ServerConnection;

/// Accepts incoming connections for one service id.
///
/// Each accepted connection gets its own sibling link on the same segment;
/// the listener keeps its link open for further CONNECTs. Repeated CONNECTs
/// for connections already handed out are left to those connections to
/// re-acknowledge.
///
/// Accepted connection ids are remembered for the lifetime of the listener,
/// even after the connection itself closes: an id can never be reused against
/// the same listener, and the id set grows with every accepted connection.
/// With random 32-bit ids and the intended handful of concurrent clients this
/// is a few bytes per connection ever accepted, not a practical limit.
pub struct Listener<L: FrameLink> {
    link: L,
    service: u16,
    known: HashSet<u32>,
}

impl<L: FrameLink> Listener<L> {
    /// Listen for CONNECTs to `service` on the given link.
    pub fn new(link: L, service: u16) -> Self {
        info!(service, addr = %link.local_addr(), "listening");
        Self {
            link,
            service,
            known: HashSet::new(),
        }
    }

    /// The service id this listener answers for.
    pub fn service(&self) -> u16 {
        self.service
    }

    /// The hardware address this listener receives on.
    pub fn local_addr(&self) -> MacAddr {
        self.link.local_addr()
    }

    /// Poll for one incoming connection, without blocking.
    ///
    /// At most one frame is read; the caller polls. `Ok(None)` means the
    /// frame (if any) was not a fresh CONNECT for this service.
    pub fn listen(&mut self) -> EthStreamResult<Option<ServerConnection<L>>> {
        let Some(frame) = self.link.recv()? else {
            return Ok(None);
        };
        let connect = match Packet::decode(&frame.payload) {
            Ok(Packet::Connect(connect)) => connect,
            Ok(packet) => {
                debug!(packet = ?packet.packet_type(), "non-connect packet on listener, ignoring");
                return Ok(None);
            }
            Err(err) => {
                debug!(%err, "undecodable frame on listener, ignoring");
                return Ok(None);
            }
        };
        if connect.service != self.service {
            debug!(service = connect.service, "connect for another service, ignoring");
            return Ok(None);
        }
        if !self.known.insert(connect.connection) {
            debug!(
                connection = connect.connection,
                "repeated connect for accepted connection, ignoring"
            );
            return Ok(None);
        }
        let link = self.link.open_sibling()?;
        Ok(Some(ServerConnection::accept(link, &connect, frame.source)?))
    }
}

#[cfg(target_os = "linux")]
impl Listener<LinkSocket> {
    /// Listen on the named network interface.
    pub fn open(interface: &str, service: u16) -> EthStreamResult<Self> {
        Ok(Self::new(LinkSocket::open(interface)?, service))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::conn::Client;
    use crate::core::constants::{SERVICE_FILE_TRANSFER, SERVICE_SHELL};
    use crate::link::{MemLink, MemSegment};
    use crate::wire::{AckPacket, ConnectPacket, MacAddr};

    fn mac(last: u8) -> MacAddr {
        MacAddr::from_bytes([0x02, 0, 0, 0, 0, last])
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn send_connect(link: &mut MemLink, server: MacAddr, connection: u32, service: u16) {
        let connect = Packet::Connect(ConnectPacket {
            connection,
            sent_count: 1,
            service,
            flags: 0,
        });
        link.send(server, &connect.encode()).unwrap();
    }

    fn recv_ack(link: &mut MemLink) -> Option<AckPacket> {
        let frame = link.recv().unwrap()?;
        match Packet::decode(&frame.payload).unwrap() {
            Packet::Ack(ack) => Some(ack),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn test_accept_sends_handshake_ack() {
        let segment = MemSegment::new();
        let mut listener = Listener::new(segment.attach(mac(2)), SERVICE_SHELL);
        let mut client_link = segment.attach(mac(1));

        assert!(listener.listen().unwrap().is_none());

        send_connect(&mut client_link, mac(2), 42, SERVICE_SHELL);
        let server = listener.listen().unwrap().expect("accepted connection");
        assert_eq!(server.connection_id(), 42);
        assert_eq!(server.peer_addr(), mac(1));
        assert!(server.connected());

        let ack = recv_ack(&mut client_link).expect("handshake ack");
        assert_eq!(ack.connection, 42);
        assert_eq!(ack.seq, 0);
        assert_eq!(ack.received_count, 1);
        assert!(ack.flags.is_empty());
    }

    #[test]
    fn test_other_service_ignored() {
        let segment = MemSegment::new();
        let mut listener = Listener::new(segment.attach(mac(2)), SERVICE_SHELL);
        let mut client_link = segment.attach(mac(1));

        send_connect(&mut client_link, mac(2), 42, SERVICE_FILE_TRANSFER);
        assert!(listener.listen().unwrap().is_none());
        assert!(recv_ack(&mut client_link).is_none());
    }

    #[test]
    fn test_repeated_connect_answered_by_connection() {
        let segment = MemSegment::new();
        let mut listener = Listener::new(segment.attach(mac(2)), SERVICE_SHELL);
        let mut client_link = segment.attach(mac(1));
        let now = Instant::now();

        send_connect(&mut client_link, mac(2), 42, SERVICE_SHELL);
        let mut server = listener.listen().unwrap().expect("accepted connection");
        assert_eq!(recv_ack(&mut client_link).expect("handshake ack").received_count, 1);

        // The ack was lost; the client sends CONNECT again. The listener
        // stays quiet and the accepted connection repeats the ack.
        send_connect(&mut client_link, mac(2), 42, SERVICE_SHELL);
        assert!(listener.listen().unwrap().is_none());
        server.work_at(now).unwrap();

        let repeat = recv_ack(&mut client_link).expect("repeated handshake ack");
        assert_eq!(repeat.seq, 0);
        assert_eq!(repeat.received_count, 2);
    }

    #[test]
    fn test_full_handshake_and_transfer() {
        init_tracing();
        let segment = MemSegment::new();
        let server_mac = mac(2);
        let mut listener = Listener::new(segment.attach(server_mac), SERVICE_SHELL);
        let mut client =
            Client::with_connection_id(segment.attach(mac(1)), server_mac, SERVICE_SHELL, 42)
                .unwrap();
        let now = Instant::now();

        let mut server = listener.listen().unwrap().expect("accepted connection");
        client.work_at(now).unwrap();
        assert!(client.connected());

        client.write(b"hello");
        server.write(b"hi there");
        for _ in 0..4 {
            client.work_at(now).unwrap();
            server.work_at(now).unwrap();
        }

        let mut buf = [0u8; 16];
        let n = server.read(&mut buf);
        assert_eq!(&buf[..n], b"hello");
        let n = client.read(&mut buf);
        assert_eq!(&buf[..n], b"hi there");
        assert!(client.flushed());
        assert!(server.flushed());

        client.close().unwrap();
        server.work_at(now).unwrap();
        assert!(server.closed());
    }

    #[test]
    fn test_two_clients_two_connections() {
        let segment = MemSegment::new();
        let server_mac = mac(9);
        let mut listener = Listener::new(segment.attach(server_mac), SERVICE_SHELL);
        let mut first =
            Client::with_connection_id(segment.attach(mac(1)), server_mac, SERVICE_SHELL, 101)
                .unwrap();
        let mut second =
            Client::with_connection_id(segment.attach(mac(2)), server_mac, SERVICE_SHELL, 202)
                .unwrap();
        let now = Instant::now();

        let mut conn_a = listener.listen().unwrap().expect("first connection");
        let mut conn_b = listener.listen().unwrap().expect("second connection");
        assert_eq!(conn_a.connection_id(), 101);
        assert_eq!(conn_b.connection_id(), 202);

        first.work_at(now).unwrap();
        second.work_at(now).unwrap();
        assert!(first.connected());
        assert!(second.connected());

        first.write(b"from first");
        second.write(b"from second");
        // Sibling links share the server address, so each connection also
        // sees (and discards) the other client's frames.
        for _ in 0..4 {
            first.work_at(now).unwrap();
            second.work_at(now).unwrap();
            conn_a.work_at(now).unwrap();
            conn_b.work_at(now).unwrap();
        }

        let mut buf = [0u8; 32];
        let n = conn_a.read(&mut buf);
        assert_eq!(&buf[..n], b"from first");
        let n = conn_b.read(&mut buf);
        assert_eq!(&buf[..n], b"from second");
    }
}
