//! Frame transport: the trait connections drive, its raw AF_PACKET
//! implementation and an in-memory test double.

mod mem;
mod peer;
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod socket;

pub use mem::{MemLink, MemSegment};
pub use peer::PeerSocket;
#[cfg(target_os = "linux")]
pub use socket::LinkSocket;

use crate::core::EthStreamResult;
use crate::wire::MacAddr;

/// One Ethernet frame received from the segment, stripped of its header.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    /// Source hardware address of the frame.
    pub source: MacAddr,
    /// Frame payload after the 14-byte Ethernet header.
    pub payload: Vec<u8>,
}

/// A non-blocking Ethernet frame transport.
///
/// Implemented by [`LinkSocket`] for real interfaces and by [`MemLink`] for
/// tests. Connections never touch frames directly; they go through
/// [`PeerSocket`], which adds packet framing and peer filtering.
pub trait FrameLink {
    /// The hardware address this link sends from.
    fn local_addr(&self) -> MacAddr;

    /// Send one frame carrying `payload` to `dest`.
    fn send(&mut self, dest: MacAddr, payload: &[u8]) -> EthStreamResult<()>;

    /// Receive one frame without blocking. `Ok(None)` means nothing is
    /// pending.
    fn recv(&mut self) -> EthStreamResult<Option<ReceivedFrame>>;

    /// Open another link on the same segment with the same address.
    ///
    /// A listener hands each accepted connection its own link this way; all
    /// links on one segment see every frame addressed to them.
    fn open_sibling(&self) -> EthStreamResult<Self>
    where
        Self: Sized;
}
