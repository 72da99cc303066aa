//! Per-direction stop-and-wait state machines.
//!
//! A connection is symmetric: each peer runs one [`Outbound`] for the bytes
//! it sends and one [`Inbound`] for the bytes it receives. The two halves
//! never talk to each other; the connection layer wires them to a shared
//! [`PeerSocket`](crate::link::PeerSocket).

mod inbound;
mod outbound;

pub use inbound::Inbound;
pub use outbound::Outbound;
