//! Packet buffer pool for inbound reassembly and outbound PDUs.

use core::cell::UnsafeCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config;

/// A byte buffer for packet data.
pub trait Packet: Sized + AsRef<[u8]> + AsMut<[u8]> {}

/// A pool that allocates packets of a fixed maximum size.
///
/// The MTU bounds the size of a reassembled L2CAP basic frame.
pub trait PacketPool: 'static {
    /// Packet type provided by this pool.
    type Packet: Packet;

    /// The maximum size a packet can have.
    const MTU: usize;

    /// Allocate a new buffer with space for `MTU` bytes.
    ///
    /// Returns `None` when the pool is exhausted.
    fn allocate() -> Option<Self::Packet>;

    /// Capacity of this pool in number of packets.
    fn capacity() -> usize;
}

struct PacketBuf<const MTU: usize> {
    buf: [u8; MTU],
    free: bool,
}

impl<const MTU: usize> PacketBuf<MTU> {
    const NEW: PacketBuf<MTU> = PacketBuf {
        buf: [0; MTU],
        free: true,
    };
}

struct PoolState<const MTU: usize, const N: usize> {
    packets: UnsafeCell<[PacketBuf<MTU>; N]>,
}

// The UnsafeCell is only touched under the pool mutex.
unsafe impl<const MTU: usize, const N: usize> Send for PoolState<MTU, N> {}

impl<const MTU: usize, const N: usize> PoolState<MTU, N> {
    const fn new() -> Self {
        Self {
            packets: UnsafeCell::new([PacketBuf::NEW; N]),
        }
    }

    fn alloc(&self) -> Option<PacketRef> {
        let packets = unsafe { &mut *self.packets.get() };
        for (idx, packet) in packets.iter_mut().enumerate() {
            if packet.free {
                packet.free = false;
                packet.buf.fill(0);
                return Some(PacketRef {
                    idx,
                    buf: &mut packet.buf[..],
                });
            }
        }
        None
    }

    fn free(&self, idx: usize) {
        let packets = unsafe { &mut *self.packets.get() };
        debug_assert!(!packets[idx].free);
        packets[idx].free = true;
    }
}

struct PacketRef {
    idx: usize,
    buf: *mut [u8],
}

type DefaultPoolState =
    PoolState<{ config::DEFAULT_PACKET_POOL_MTU }, { config::DEFAULT_PACKET_POOL_SIZE }>;

static POOL: Mutex<CriticalSectionRawMutex, DefaultPoolState> =
    Mutex::new(DefaultPoolState::new());

/// The packet pool provided by this crate, backed by static storage.
pub struct DefaultPacketPool;

impl PacketPool for DefaultPacketPool {
    type Packet = DefaultPacket;
    const MTU: usize = config::DEFAULT_PACKET_POOL_MTU;

    fn allocate() -> Option<DefaultPacket> {
        POOL.lock(|state| state.alloc().map(|p_ref| DefaultPacket { p_ref }))
    }

    fn capacity() -> usize {
        config::DEFAULT_PACKET_POOL_SIZE
    }
}

/// A packet allocated from [`DefaultPacketPool`]. Freed on drop.
pub struct DefaultPacket {
    p_ref: PacketRef,
}

impl Packet for DefaultPacket {}

impl Drop for DefaultPacket {
    fn drop(&mut self) {
        POOL.lock(|state| state.free(self.p_ref.idx));
    }
}

impl AsRef<[u8]> for DefaultPacket {
    fn as_ref(&self) -> &[u8] {
        unsafe { &(&*self.p_ref.buf)[..] }
    }
}

impl AsMut<[u8]> for DefaultPacket {
    fn as_mut(&mut self) -> &mut [u8] {
        unsafe { &mut (&mut *self.p_ref.buf)[..] }
    }
}

#[cfg(test)]
mod tests {
    use critical_section as _;

    use super::*;

    #[test]
    fn exhaustion_and_reuse() {
        let state: PoolState<8, 2> = PoolState::new();
        let a = state.alloc().unwrap();
        let b = state.alloc().unwrap();
        assert!(state.alloc().is_none());

        state.free(a.idx);
        let c = state.alloc().unwrap();
        assert_eq!(c.idx, a.idx);
        assert!(state.alloc().is_none());

        state.free(b.idx);
        state.free(c.idx);
    }

    #[test]
    fn buffers_are_zeroed_on_alloc() {
        let state: PoolState<4, 1> = PoolState::new();
        let p = state.alloc().unwrap();
        unsafe { (*p.buf).fill(0xaa) };
        state.free(p.idx);
        let p = state.alloc().unwrap();
        assert!(unsafe { &*p.buf }.iter().all(|b| *b == 0));
        state.free(p.idx);
    }

    // The global pool is shared by every test in the binary, so only poke
    // at it without draining it.
    #[test]
    fn default_pool_smoke() {
        let packet = DefaultPacketPool::allocate().expect("default pool empty");
        assert_eq!(packet.as_ref().len(), DefaultPacketPool::MTU);
        assert_eq!(DefaultPacketPool::capacity(), config::DEFAULT_PACKET_POOL_SIZE);
    }
}
