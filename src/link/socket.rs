//! Raw AF_PACKET socket bound to one network interface.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::info;

use crate::core::constants::{ETH_FRAME_LEN, ETH_HEADER_SIZE, ETHERTYPE, MIN_FRAME_SIZE};
use crate::core::{EthStreamError, EthStreamResult};
use crate::wire::{MacAddr, PacketType};

use super::{FrameLink, ReceivedFrame};

// Classic BPF opcodes for the minimum-length filter.
const BPF_LD_W_LEN: u16 = 0x80;
const BPF_JMP_JGE_K: u16 = 0x35;
const BPF_RET_K: u16 = 0x06;

/// A raw packet socket speaking the EthStream ether-type on one interface.
///
/// Opening one requires `CAP_NET_RAW`. The kernel delivers only frames with
/// ether-type [`ETHERTYPE`], and an attached BPF program drops frames too
/// short to carry a packet header.
#[derive(Debug)]
pub struct LinkSocket {
    fd: OwnedFd,
    interface: String,
    if_index: libc::c_int,
    local_addr: MacAddr,
    recv_buffer: Vec<u8>,
}

impl LinkSocket {
    /// Open a raw socket on the named interface.
    pub fn open(interface: &str) -> EthStreamResult<Self> {
        let name = CString::new(interface)
            .map_err(|_| EthStreamError::UnknownInterface(interface.to_string()))?;
        let if_index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if if_index == 0 {
            return Err(EthStreamError::UnknownInterface(interface.to_string()));
        }

        let raw = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                ETHERTYPE.to_be() as libc::c_int,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };
        let local_addr = interface_hwaddr(&fd, &name)?;

        let socket = Self {
            fd,
            interface: interface.to_string(),
            if_index: if_index as libc::c_int,
            local_addr,
            recv_buffer: vec![0u8; ETH_FRAME_LEN],
        };
        socket.bind_to_interface()?;
        socket.attach_min_length_filter()?;
        info!(interface, addr = %socket.local_addr, "link socket open");
        Ok(socket)
    }

    /// The interface this socket is bound to.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn bind_to_interface(&self) -> EthStreamResult<()> {
        let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as libc::c_ushort;
        sll.sll_protocol = ETHERTYPE.to_be();
        sll.sll_ifindex = self.if_index;
        let rc = unsafe {
            libc::bind(
                self.fd.as_raw_fd(),
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    // Accept only frames long enough for an Ethernet header plus the common
    // packet header; everything shorter never leaves the kernel.
    fn attach_min_length_filter(&self) -> EthStreamResult<()> {
        let filter = [
            libc::sock_filter {
                code: BPF_LD_W_LEN,
                jt: 0,
                jf: 0,
                k: 0,
            },
            libc::sock_filter {
                code: BPF_JMP_JGE_K,
                jt: 0,
                jf: 1,
                k: MIN_FRAME_SIZE as u32,
            },
            libc::sock_filter {
                code: BPF_RET_K,
                jt: 0,
                jf: 0,
                k: ETH_FRAME_LEN as u32,
            },
            libc::sock_filter {
                code: BPF_RET_K,
                jt: 0,
                jf: 0,
                k: 0,
            },
        ];
        let prog = libc::sock_fprog {
            len: filter.len() as u16,
            filter: filter.as_ptr() as *mut libc::sock_filter,
        };
        let rc = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_ATTACH_FILTER,
                &prog as *const libc::sock_fprog as *const libc::c_void,
                mem::size_of::<libc::sock_fprog>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }
}

fn interface_hwaddr(fd: &OwnedFd, name: &CString) -> EthStreamResult<MacAddr> {
    let mut req: libc::ifreq = unsafe { mem::zeroed() };
    let bytes = name.as_bytes_with_nul();
    if bytes.len() > req.ifr_name.len() {
        return Err(EthStreamError::UnknownInterface(
            name.to_string_lossy().into_owned(),
        ));
    }
    for (dst, src) in req.ifr_name.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    let rc = unsafe { libc::ioctl(fd.as_raw_fd(), libc::SIOCGIFHWADDR, &mut req) };
    if rc < 0 {
        return Err(io::Error::last_os_error().into());
    }

    let raw = unsafe { req.ifr_ifru.ifru_hwaddr.sa_data };
    let mut addr = [0u8; MacAddr::LEN];
    for (dst, src) in addr.iter_mut().zip(raw.iter()) {
        *dst = *src as u8;
    }
    Ok(MacAddr::from_bytes(addr))
}

impl FrameLink for LinkSocket {
    fn local_addr(&self) -> MacAddr {
        self.local_addr
    }

    fn send(&mut self, dest: MacAddr, payload: &[u8]) -> EthStreamResult<()> {
        let mut frame = Vec::with_capacity(ETH_HEADER_SIZE + payload.len());
        frame.extend_from_slice(dest.as_bytes());
        frame.extend_from_slice(self.local_addr.as_bytes());
        frame.extend_from_slice(&ETHERTYPE.to_be_bytes());
        frame.extend_from_slice(payload);

        let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as libc::c_ushort;
        sll.sll_protocol = ETHERTYPE.to_be();
        sll.sll_ifindex = self.if_index;
        sll.sll_halen = MacAddr::LEN as libc::c_uchar;
        sll.sll_addr[..MacAddr::LEN].copy_from_slice(dest.as_bytes());

        let rc = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                libc::MSG_DONTROUTE,
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn recv(&mut self) -> EthStreamResult<Option<ReceivedFrame>> {
        let n = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                self.recv_buffer.as_mut_ptr() as *mut libc::c_void,
                self.recv_buffer.len(),
                libc::MSG_DONTWAIT,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(err.into());
        }
        let n = n as usize;
        if n < ETH_HEADER_SIZE + 1 {
            return Ok(None);
        }
        // Cheap early rejection, same spirit as the BPF filter: a type tag
        // past CLOSE can never decode.
        if self.recv_buffer[ETH_HEADER_SIZE] > PacketType::MAX {
            return Ok(None);
        }
        let Some(source) = MacAddr::from_slice(&self.recv_buffer[6..12]) else {
            return Ok(None);
        };
        Ok(Some(ReceivedFrame {
            source,
            payload: self.recv_buffer[ETH_HEADER_SIZE..n].to_vec(),
        }))
    }

    fn open_sibling(&self) -> EthStreamResult<Self> {
        LinkSocket::open(&self.interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_unknown_interface() {
        let err = LinkSocket::open("no-such-interface0").unwrap_err();
        assert!(matches!(err, EthStreamError::UnknownInterface(name) if name == "no-such-interface0"));
    }

    #[test]
    fn test_open_rejects_nul_in_name() {
        assert!(LinkSocket::open("eth\0x").is_err());
    }
}
