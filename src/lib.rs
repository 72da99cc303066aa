//! # EthStream
//!
//! A reliable point-to-point byte-stream transport that runs directly on raw
//! Ethernet frames, with no IP or TCP underneath. Peers are addressed by
//! hardware address
//! under the private ether-type `0xFFF0`, and reliability is provided by
//! stop-and-wait ARQ: Fletcher-16 checksums, per-direction sequencing,
//! duplicate suppression and unbounded timeout-driven retransmission.
//!
//! ## Protocol sketch
//!
//! Four packet types ride inside Ethernet frames:
//!
//! - **CONNECT**: a client requests a connection to a service id; retried
//!   every 2 s until the listener acknowledges with sequence 0.
//! - **DATA**: one payload slice, checksummed and sequenced; at most one
//!   unacknowledged DATA packet is in flight per direction at any instant.
//! - **ACK**: acknowledges exactly one DATA (or the CONNECT, as sequence 0);
//!   a non-empty error bitfield requests an immediate resend.
//! - **CLOSE**: tears the connection down; deliberately never acknowledged.
//!
//! Sequence numbers are 16 bits: bit 15 is the *role bit* (set on
//! server-originated DATA and ACK packets), bits 0-14 form a wrapping counter
//! starting at 1, with 0 reserved for "nothing sent yet". The role bit keeps
//! client- and server-originated sequences from colliding even when both
//! sides reuse the same counter values.
//!
//! ## Cooperative scheduling
//!
//! The engine has no threads and no callbacks. All network I/O for a
//! connection happens inside its [`work`](conn::Connection::work) call, which
//! the caller invokes in a loop: one non-blocking receive, one dispatch, one
//! send-side tick. One thread drives one connection.
//!
//! ## Wire format
//!
//! All multi-byte fields are little-endian. Every packet starts with the
//! common 7-byte header:
//!
//! ```text
//! 0: type tag (u8): 0 CONNECT, 1 DATA, 2 ACK, 3 CLOSE
//! 1: connection id (u32)
//! 5: sequence number (u16): bit 15 role flag, bits 0-14 counter
//! ```
//!
//! followed by the per-type body:
//!
//! ```text
//! CONNECT: sent count (u8), service id (u16), reserved flags (u16)
//! DATA:    sent count (u8), Fletcher-16 checksum (u16), length (u16), payload
//! ACK:     received count (u8), error bitfield (u16)
//! CLOSE:   (header only)
//! ```
//!
//! ## Example
//!
//! A complete handshake over an in-memory segment (the raw AF_PACKET variant
//! only differs in how the links are opened):
//!
//! ```rust
//! use ethstream::prelude::*;
//!
//! let segment = MemSegment::new();
//! let server_mac: MacAddr = "02:00:00:00:00:01".parse()?;
//! let client_mac: MacAddr = "02:00:00:00:00:02".parse()?;
//!
//! let mut listener = Listener::new(segment.attach(server_mac), SERVICE_SHELL);
//! let mut client = Client::new(segment.attach(client_mac), server_mac, SERVICE_SHELL)?;
//!
//! let mut server = listener.listen()?.expect("CONNECT is already on the wire");
//! client.work()?;
//! assert!(client.connected());
//!
//! client.write(b"hello");
//! client.work()?;
//! server.work()?;
//!
//! let mut buf = [0u8; 16];
//! let n = server.read(&mut buf);
//! assert_eq!(&buf[..n], b"hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conn;
pub mod core;
pub mod link;
pub mod stream;
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::conn::{Client, Connection, Listener, ServerConnection};
    pub use crate::core::constants::{
        MAX_PAYLOAD, SERVICE_FILE_TRANSFER, SERVICE_SHELL,
    };
    pub use crate::core::{EthStreamError, EthStreamResult, WireError};
    pub use crate::link::{FrameLink, MemLink, MemSegment, PeerSocket};
    #[cfg(target_os = "linux")]
    pub use crate::link::LinkSocket;
    pub use crate::wire::{AckFlags, MacAddr, Packet, PacketType, Role};
}

// Re-export commonly used items at crate root
pub use crate::conn::{Client, Connection, Listener, ServerConnection};
pub use crate::core::{EthStreamError, EthStreamResult, WireError};
#[cfg(target_os = "linux")]
pub use crate::link::LinkSocket;
pub use crate::link::{FrameLink, MemLink, MemSegment, PeerSocket};
pub use crate::wire::{AckFlags, MacAddr, Packet, Role};
