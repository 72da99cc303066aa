//! Wire formats: hardware addresses, the payload checksum and the four
//! packet layouts.

mod checksum;
mod mac;
mod packet;

pub use checksum::fletcher16;
pub use mac::{MacAddr, MacParseError};
pub use packet::{
    AckFlags, AckPacket, ClosePacket, ConnectPacket, DataPacket, Packet, PacketType, Role,
    next_counter, seq_counter,
};
