//! Error types for EthStream.
//!
//! Protocol-level trouble (checksum mismatch, out-of-order sequence) never
//! shows up here: it travels in ACK error bitfields and is recovered by
//! retransmission. These types cover what genuinely fails: configuration,
//! socket I/O, and malformed packet encodings.

use thiserror::Error;

/// Errors produced when decoding a packet from raw frame bytes.
///
/// The receive path drops undecodable frames silently; this type is only
/// observed through explicit [`Packet::decode`](crate::wire::Packet::decode)
/// calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The type tag is not a known packet type.
    #[error("unknown packet type tag: {0}")]
    UnknownType(u8),

    /// The buffer is too short for the declared packet type.
    #[error("truncated packet: need {needed} bytes, got {got}")]
    Truncated {
        /// Minimum size for the declared type.
        needed: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// A DATA packet declared more payload than the frame carries.
    #[error("declared payload length {declared} exceeds remaining {available} frame bytes")]
    BadPayloadLength {
        /// Payload length from the DATA header.
        declared: usize,
        /// Bytes following the DATA header.
        available: usize,
    },
}

/// Top-level EthStream errors.
#[derive(Debug, Error)]
pub enum EthStreamError {
    /// The named network interface does not exist.
    #[error("configuration error: unknown interface {0:?}")]
    UnknownInterface(String),

    /// Socket setup or raw frame I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A packet could not be decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

/// Convenience alias for results carrying [`EthStreamError`].
pub type EthStreamResult<T> = Result<T, EthStreamError>;
