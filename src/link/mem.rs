//! In-memory Ethernet segment for tests and examples.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::core::EthStreamResult;
use crate::core::constants::HEADER_SIZE;
use crate::wire::MacAddr;

use super::{FrameLink, ReceivedFrame};

struct Endpoint {
    id: u64,
    addr: MacAddr,
    queue: VecDeque<ReceivedFrame>,
}

#[derive(Default)]
struct SegmentInner {
    endpoints: Vec<Endpoint>,
    next_id: u64,
}

impl SegmentInner {
    fn attach(&mut self, addr: MacAddr) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.endpoints.push(Endpoint {
            id,
            addr,
            queue: VecDeque::new(),
        });
        id
    }
}

/// A shared broadcast domain connecting any number of [`MemLink`]s.
///
/// Delivery mirrors a real segment: a frame reaches every other endpoint
/// whose address matches the destination (or every endpoint, for broadcast),
/// including siblings sharing one address. Frames shorter than a packet
/// header are dropped, matching the kernel-level minimum-length filter a
/// real socket carries.
#[derive(Clone, Default)]
pub struct MemSegment {
    inner: Rc<RefCell<SegmentInner>>,
}

impl MemSegment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint with the given hardware address.
    pub fn attach(&self, addr: MacAddr) -> MemLink {
        let id = self.inner.borrow_mut().attach(addr);
        MemLink {
            inner: Rc::clone(&self.inner),
            id,
            addr,
        }
    }
}

/// One endpoint on a [`MemSegment`].
pub struct MemLink {
    inner: Rc<RefCell<SegmentInner>>,
    id: u64,
    addr: MacAddr,
}

impl FrameLink for MemLink {
    fn local_addr(&self) -> MacAddr {
        self.addr
    }

    fn send(&mut self, dest: MacAddr, payload: &[u8]) -> EthStreamResult<()> {
        if payload.len() < HEADER_SIZE {
            return Ok(());
        }
        let mut inner = self.inner.borrow_mut();
        for endpoint in &mut inner.endpoints {
            if endpoint.id == self.id {
                continue;
            }
            if dest == MacAddr::BROADCAST || endpoint.addr == dest {
                endpoint.queue.push_back(ReceivedFrame {
                    source: self.addr,
                    payload: payload.to_vec(),
                });
            }
        }
        Ok(())
    }

    fn recv(&mut self) -> EthStreamResult<Option<ReceivedFrame>> {
        let mut inner = self.inner.borrow_mut();
        let endpoint = inner
            .endpoints
            .iter_mut()
            .find(|endpoint| endpoint.id == self.id);
        Ok(endpoint.and_then(|endpoint| endpoint.queue.pop_front()))
    }

    fn open_sibling(&self) -> EthStreamResult<Self> {
        let id = self.inner.borrow_mut().attach(self.addr);
        Ok(MemLink {
            inner: Rc::clone(&self.inner),
            id,
            addr: self.addr,
        })
    }
}

impl Drop for MemLink {
    fn drop(&mut self) {
        self.inner
            .borrow_mut()
            .endpoints
            .retain(|endpoint| endpoint.id != self.id);
    }
}
