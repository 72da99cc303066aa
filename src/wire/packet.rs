//! Packet layouts for the four EthStream packet types.
//!
//! Every packet starts with a common 7-byte header: a type tag, a 32-bit
//! connection id and a 16-bit sequence number. Multi-byte fields are
//! little-endian on the wire. Decoding tolerates trailing bytes, because
//! Ethernet pads short frames up to the 60-byte minimum.

use bitflags::bitflags;

use crate::core::WireError;
use crate::core::constants::{
    ACK_SIZE, CLOSE_SIZE, CONNECT_SIZE, DATA_HEADER_SIZE, HEADER_SIZE, MAX_PAYLOAD,
    SEQ_COUNTER_MASK, SEQ_ROLE_BIT,
};

use super::checksum::fletcher16;

/// Packet type tag, the first byte of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Connection request.
    Connect = 0,
    /// Payload slice.
    Data = 1,
    /// Acknowledgement.
    Ack = 2,
    /// Teardown.
    Close = 3,
}

impl PacketType {
    /// Highest valid type tag. Frames declaring a larger tag are discarded
    /// at the link layer.
    pub const MAX: u8 = PacketType::Close as u8;

    /// Decode a type tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PacketType::Connect),
            1 => Some(PacketType::Data),
            2 => Some(PacketType::Ack),
            3 => Some(PacketType::Close),
            _ => None,
        }
    }
}

/// Which side of a connection a state machine plays.
///
/// The role selects the high bit of outgoing sequence numbers, so client-
/// and server-originated sequences can never collide even when both sides
/// reuse the same counter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Active opener; sequence numbers have the role bit clear.
    Client,
    /// Passive opener; sequence numbers have the role bit set.
    Server,
}

impl Role {
    /// The opposite role.
    pub fn peer(self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }

    /// Stamp the role bit onto a sequence counter.
    pub fn apply(self, counter: u16) -> u16 {
        match self {
            Role::Client => counter & SEQ_COUNTER_MASK,
            Role::Server => counter | SEQ_ROLE_BIT,
        }
    }

    /// Whether `seq` was originated by this role.
    pub fn originated(self, seq: u16) -> bool {
        (seq & SEQ_ROLE_BIT != 0) == (self == Role::Server)
    }
}

/// Strip the role bit, leaving the 15-bit wrapping counter.
pub fn seq_counter(seq: u16) -> u16 {
    seq & SEQ_COUNTER_MASK
}

/// Successor of a sequence counter: wraps in 15 bits, skipping the
/// reserved 0.
pub fn next_counter(counter: u16) -> u16 {
    let next = counter.wrapping_add(1) & SEQ_COUNTER_MASK;
    if next == 0 { 1 } else { next }
}

bitflags! {
    /// Error bitfield carried by ACK packets.
    ///
    /// A non-empty bitfield tells the sender its packet was not accepted and
    /// must be retransmitted. The error is recovered by resending; it is
    /// never surfaced to the caller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AckFlags: u16 {
        /// The packet was ignored due to an error.
        const IGNORED = 1 << 0;
        /// The connection was closed due to an error.
        const CONNECTION_CLOSED = 1 << 1;
        /// The connection id is unknown.
        const UNKNOWN_CONNECTION = 1 << 2;
        /// The payload checksum did not match.
        const CHECKSUM_ERROR = 1 << 3;
        /// The connection is already open (reply to a duplicate CONNECT).
        const ALREADY_OPEN = 1 << 4;
        /// The sequence number was out of order.
        const OUT_OF_ORDER = 1 << 5;
    }
}

/// CONNECT: requests a connection to a service. Always carries sequence 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPacket {
    /// Connection id chosen by the initiating client.
    pub connection: u32,
    /// How many times this CONNECT has been sent, starting at 1.
    pub sent_count: u8,
    /// The service the client wants to reach.
    pub service: u16,
    /// Reserved; zero on the wire.
    pub flags: u16,
}

/// DATA: one checksummed, sequenced payload slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Connection id.
    pub connection: u32,
    /// Sequence number, role bit included.
    pub seq: u16,
    /// How many times this packet has been sent, starting at 1.
    pub sent_count: u8,
    /// Fletcher-16 checksum over the payload.
    pub checksum: u16,
    /// The payload slice, at most [`MAX_PAYLOAD`] bytes.
    pub payload: Vec<u8>,
}

impl DataPacket {
    /// Build a fresh DATA packet, computing the payload checksum.
    pub fn new(connection: u32, seq: u16, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            connection,
            seq,
            sent_count: 1,
            checksum: fletcher16(&payload),
            payload,
        }
    }

    /// Whether the stored checksum matches the payload.
    pub fn checksum_ok(&self) -> bool {
        fletcher16(&self.payload) == self.checksum
    }
}

/// ACK: acknowledges exactly one DATA packet, or a CONNECT as sequence 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckPacket {
    /// Connection id.
    pub connection: u32,
    /// Sequence number being acknowledged.
    pub seq: u16,
    /// How many times the acknowledged packet was received, starting at 1.
    pub received_count: u8,
    /// Error bitfield; empty means the packet was accepted.
    pub flags: AckFlags,
}

/// CLOSE: tears the connection down. Never acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePacket {
    /// Connection id.
    pub connection: u32,
    /// The sequence number the next DATA packet would have carried.
    pub seq: u16,
}

/// Any EthStream packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Connection request.
    Connect(ConnectPacket),
    /// Payload slice.
    Data(DataPacket),
    /// Acknowledgement.
    Ack(AckPacket),
    /// Teardown.
    Close(ClosePacket),
}

impl Packet {
    /// The type tag of this packet.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Data(_) => PacketType::Data,
            Packet::Ack(_) => PacketType::Ack,
            Packet::Close(_) => PacketType::Close,
        }
    }

    /// The connection id this packet belongs to.
    pub fn connection(&self) -> u32 {
        match self {
            Packet::Connect(p) => p.connection,
            Packet::Data(p) => p.connection,
            Packet::Ack(p) => p.connection,
            Packet::Close(p) => p.connection,
        }
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::Connect(p) => {
                let mut buf = Vec::with_capacity(CONNECT_SIZE);
                put_header(&mut buf, PacketType::Connect, p.connection, 0);
                buf.push(p.sent_count);
                buf.extend_from_slice(&p.service.to_le_bytes());
                buf.extend_from_slice(&p.flags.to_le_bytes());
                buf
            }
            Packet::Data(p) => {
                let mut buf = Vec::with_capacity(DATA_HEADER_SIZE + p.payload.len());
                put_header(&mut buf, PacketType::Data, p.connection, p.seq);
                buf.push(p.sent_count);
                buf.extend_from_slice(&p.checksum.to_le_bytes());
                buf.extend_from_slice(&(p.payload.len() as u16).to_le_bytes());
                buf.extend_from_slice(&p.payload);
                buf
            }
            Packet::Ack(p) => {
                let mut buf = Vec::with_capacity(ACK_SIZE);
                put_header(&mut buf, PacketType::Ack, p.connection, p.seq);
                buf.push(p.received_count);
                buf.extend_from_slice(&p.flags.bits().to_le_bytes());
                buf
            }
            Packet::Close(p) => {
                let mut buf = Vec::with_capacity(CLOSE_SIZE);
                put_header(&mut buf, PacketType::Close, p.connection, p.seq);
                buf
            }
        }
    }

    /// Deserialize from wire bytes.
    ///
    /// Trailing bytes beyond the declared packet are ignored (Ethernet pads
    /// short frames).
    pub fn decode(bytes: &[u8]) -> Result<Packet, WireError> {
        if bytes.len() < HEADER_SIZE {
            return Err(WireError::Truncated {
                needed: HEADER_SIZE,
                got: bytes.len(),
            });
        }
        let packet_type =
            PacketType::from_u8(bytes[0]).ok_or(WireError::UnknownType(bytes[0]))?;
        let connection = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let seq = u16::from_le_bytes([bytes[5], bytes[6]]);

        match packet_type {
            PacketType::Connect => {
                check_len(bytes, CONNECT_SIZE)?;
                Ok(Packet::Connect(ConnectPacket {
                    connection,
                    sent_count: bytes[7],
                    service: u16::from_le_bytes([bytes[8], bytes[9]]),
                    flags: u16::from_le_bytes([bytes[10], bytes[11]]),
                }))
            }
            PacketType::Data => {
                check_len(bytes, DATA_HEADER_SIZE)?;
                let checksum = u16::from_le_bytes([bytes[8], bytes[9]]);
                let declared = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;
                let available = bytes.len() - DATA_HEADER_SIZE;
                if declared > available {
                    return Err(WireError::BadPayloadLength {
                        declared,
                        available,
                    });
                }
                Ok(Packet::Data(DataPacket {
                    connection,
                    seq,
                    sent_count: bytes[7],
                    checksum,
                    payload: bytes[DATA_HEADER_SIZE..DATA_HEADER_SIZE + declared].to_vec(),
                }))
            }
            PacketType::Ack => {
                check_len(bytes, ACK_SIZE)?;
                Ok(Packet::Ack(AckPacket {
                    connection,
                    seq,
                    received_count: bytes[7],
                    flags: AckFlags::from_bits_retain(u16::from_le_bytes([bytes[8], bytes[9]])),
                }))
            }
            PacketType::Close => Ok(Packet::Close(ClosePacket { connection, seq })),
        }
    }
}

fn put_header(buf: &mut Vec<u8>, packet_type: PacketType, connection: u32, seq: u16) {
    buf.push(packet_type as u8);
    buf.extend_from_slice(&connection.to_le_bytes());
    buf.extend_from_slice(&seq.to_le_bytes());
}

fn check_len(bytes: &[u8], needed: usize) -> Result<(), WireError> {
    if bytes.len() < needed {
        Err(WireError::Truncated {
            needed,
            got: bytes.len(),
        })
    } else {
        Ok(())
    }
}
