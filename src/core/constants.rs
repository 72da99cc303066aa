//! Protocol constants.
//!
//! These values are fixed by the wire format and must match on both peers.

use std::time::Duration;

// =============================================================================
// LINK LAYER
// =============================================================================

/// Private ether-type identifying EthStream frames.
pub const ETHERTYPE: u16 = 0xFFF0;

/// Ethernet header size: destination, source, ether-type.
pub const ETH_HEADER_SIZE: usize = 14;

/// Largest Ethernet frame this protocol rides on (untagged, without FCS).
pub const ETH_FRAME_LEN: usize = 1514;

/// Smallest well-formed frame: Ethernet header plus common packet header.
/// The kernel-level filter drops anything shorter.
pub const MIN_FRAME_SIZE: usize = ETH_HEADER_SIZE + HEADER_SIZE;

// =============================================================================
// PACKET SIZES
// =============================================================================

/// Common packet header size: type tag, connection id, sequence number.
pub const HEADER_SIZE: usize = 7;

/// CONNECT packet size.
pub const CONNECT_SIZE: usize = 12;

/// Fixed part of a DATA packet, before the payload.
pub const DATA_HEADER_SIZE: usize = 12;

/// ACK packet size.
pub const ACK_SIZE: usize = 10;

/// CLOSE packet size (header only).
pub const CLOSE_SIZE: usize = HEADER_SIZE;

/// Largest DATA payload that fits into one frame.
pub const MAX_PAYLOAD: usize = ETH_FRAME_LEN - ETH_HEADER_SIZE - DATA_HEADER_SIZE;

// =============================================================================
// SEQUENCE NUMBERS
// =============================================================================

/// High bit of the sequence number, set on server-originated DATA and ACK.
pub const SEQ_ROLE_BIT: u16 = 0x8000;

/// Low 15 bits of the sequence number: the wrapping packet counter.
/// Counter value 0 is reserved for "nothing sent yet".
pub const SEQ_COUNTER_MASK: u16 = 0x7FFF;

// =============================================================================
// TIMING
// =============================================================================

/// Resend an unacknowledged DATA packet after this long.
pub const DATA_RETRY_TIMEOUT: Duration = Duration::from_secs(1);

/// Resend an unacknowledged CONNECT after this long.
pub const CONNECT_RETRY_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// WELL-KNOWN SERVICES
// =============================================================================

/// Remote-shell service id.
pub const SERVICE_SHELL: u16 = 1;

/// File-transfer service id.
pub const SERVICE_FILE_TRANSFER: u16 = 2;
