//! Round-robin egress scheduling against the controller's buffer credits.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::{Context, Poll};

use embassy_sync::waitqueue::WakerRegistration;
use heapless::Deque;

use crate::config;
use crate::packet_pool::PacketPool;
use crate::param::ConnHandle;
use crate::pdu::Pdu;
use crate::Error;

/// Egress state of one registered connection.
pub struct TxSlot<P> {
    handle: Option<ConnHandle>,
    disconnected: bool,
    queue: Deque<Pdu<P>, { config::TX_QUEUE_SIZE }>,
    room_waker: WakerRegistration,
}

impl<P> TxSlot<P> {
    pub(crate) const fn new() -> Self {
        Self {
            handle: None,
            disconnected: false,
            queue: Deque::new(),
            room_waker: WakerRegistration::new(),
        }
    }
}

struct State<'d, P> {
    slots: &'d mut [TxSlot<P>],
    cursor: usize,
    credits: usize,
    tx_waker: WakerRegistration,
}

impl<'d, P> State<'d, P> {
    fn position(&self, handle: ConnHandle) -> Option<usize> {
        self.slots.iter().position(|s| s.handle == Some(handle))
    }
}

/// Shares the controller buffer budget fairly across live connections.
///
/// Each tick of the consumer hands out exactly one PDU from the next
/// non-empty queue in rotation, so a busy connection cannot starve the
/// others. Credits are acquired one per fragment by the consumer.
pub(crate) struct RoundRobinScheduler<'d, P: PacketPool> {
    state: RefCell<State<'d, P::Packet>>,
}

impl<'d, P: PacketPool> RoundRobinScheduler<'d, P> {
    pub(crate) fn new(slots: &'d mut [TxSlot<P::Packet>]) -> Self {
        Self {
            state: RefCell::new(State {
                slots,
                cursor: 0,
                credits: 0,
                tx_waker: WakerRegistration::new(),
            }),
        }
    }

    /// Seeds the credit pool with the controller-reported buffer count.
    pub(crate) fn set_credits(&self, credits: usize) {
        let mut state = self.state.borrow_mut();
        state.credits = credits;
        state.tx_waker.wake();
    }

    #[cfg(test)]
    pub(crate) fn credits(&self) -> usize {
        self.state.borrow().credits
    }

    pub(crate) fn register(&self, handle: ConnHandle) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        debug_assert!(state.position(handle).is_none());
        for slot in state.slots.iter_mut() {
            if slot.handle.is_none() {
                slot.handle = Some(handle);
                slot.disconnected = false;
                slot.queue.clear();
                return Ok(());
            }
        }
        warn!("[sched] no free slot for handle {:?}", handle);
        Err(Error::ConnectionLimitReached)
    }

    /// Marks the handle drained: queued PDUs are no longer eligible and the
    /// entry is purged on [`unregister`](Self::unregister).
    pub(crate) fn set_disconnected(&self, handle: ConnHandle) {
        let mut state = self.state.borrow_mut();
        if let Some(idx) = state.position(handle) {
            state.slots[idx].disconnected = true;
        }
    }

    pub(crate) fn unregister(&self, handle: ConnHandle) {
        let mut state = self.state.borrow_mut();
        if let Some(idx) = state.position(handle) {
            let slot = &mut state.slots[idx];
            slot.handle = None;
            slot.disconnected = false;
            slot.room_waker.wake();
            slot.queue.clear();
        }
    }

    /// Credit return from Number Of Completed Packets. Counts for handles
    /// whose entry has been purged are discarded.
    pub(crate) fn completed_packets(&self, handle: ConnHandle, completed: usize) {
        let mut state = self.state.borrow_mut();
        if state.position(handle).is_some() {
            state.credits = state.credits.saturating_add(completed);
            state.tx_waker.wake();
        } else {
            debug!(
                "[sched] dropping completed packets for unknown handle {:?}",
                handle
            );
        }
    }

    pub(crate) fn try_send(&self, handle: ConnHandle, pdu: Pdu<P::Packet>) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Err(Error::NotFound);
        };
        let slot = &mut state.slots[idx];
        if slot.disconnected {
            return Err(Error::Disconnected);
        }
        if slot.queue.push_back(pdu).is_err() {
            return Err(Error::OutOfMemory);
        }
        state.tx_waker.wake();
        Ok(())
    }

    /// Enqueues one PDU, waiting for queue room.
    pub(crate) async fn send(&self, handle: ConnHandle, pdu: Pdu<P::Packet>) -> Result<(), Error> {
        let mut pdu = Some(pdu);
        poll_fn(|cx| {
            let mut state = self.state.borrow_mut();
            let Some(idx) = state.position(handle) else {
                return Poll::Ready(Err(Error::NotFound));
            };
            let slot = &mut state.slots[idx];
            if slot.disconnected {
                return Poll::Ready(Err(Error::Disconnected));
            }
            if slot.queue.is_full() {
                slot.room_waker.register(cx.waker());
                return Poll::Pending;
            }
            unwrap!(slot.queue.push_back(unwrap!(pdu.take())).ok());
            state.tx_waker.wake();
            Poll::Ready(Ok(()))
        })
        .await
    }

    /// One scheduler tick: with at least one credit available, takes the
    /// next pending PDU in rotation.
    pub(crate) fn poll_next(
        &self,
        cx: Option<&mut Context<'_>>,
    ) -> Poll<(ConnHandle, Pdu<P::Packet>)> {
        let mut state = self.state.borrow_mut();
        if let Some(cx) = cx {
            state.tx_waker.register(cx.waker());
        }
        if state.credits == 0 {
            return Poll::Pending;
        }
        let n = state.slots.len();
        if n == 0 {
            return Poll::Pending;
        }
        // The cursor points at the next candidate in rotation.
        let cursor = state.cursor;
        for step in 0..n {
            let idx = (cursor + step) % n;
            let slot = &mut state.slots[idx];
            if slot.disconnected || slot.handle.is_none() {
                continue;
            }
            if let Some(pdu) = slot.queue.pop_front() {
                let handle = unwrap!(slot.handle);
                slot.room_waker.wake();
                state.cursor = (idx + 1) % n;
                return Poll::Ready((handle, pdu));
            }
        }
        Poll::Pending
    }

    pub(crate) async fn next(&self) -> (ConnHandle, Pdu<P::Packet>) {
        poll_fn(|cx| self.poll_next(Some(cx))).await
    }

    /// Takes one credit, waiting for a Number Of Completed Packets return
    /// when the pool is exhausted.
    pub(crate) fn poll_acquire_credit(&self, cx: Option<&mut Context<'_>>) -> Poll<()> {
        let mut state = self.state.borrow_mut();
        if let Some(cx) = cx {
            state.tx_waker.register(cx.waker());
        }
        if state.credits > 0 {
            state.credits -= 1;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }

    pub(crate) async fn acquire_credit(&self) {
        poll_fn(|cx| self.poll_acquire_credit(Some(cx))).await
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::test_utils::{TestPacket, TestPool};

    fn pdu(tag: u8) -> Pdu<TestPacket> {
        let mut packet = TestPool::allocate().unwrap();
        packet.as_mut()[0] = tag;
        Pdu::new(packet, 1)
    }

    fn setup(slots: usize) -> RoundRobinScheduler<'static, TestPool> {
        let mut v = std::vec::Vec::new();
        for _ in 0..slots {
            v.push(TxSlot::new());
        }
        RoundRobinScheduler::new(std::vec::Vec::leak(v))
    }

    #[test]
    fn no_tick_without_credits() {
        let sched = setup(2);
        let h = ConnHandle::new(1);
        sched.register(h).unwrap();
        sched.try_send(h, pdu(1)).unwrap();
        assert!(sched.poll_next(None).is_pending());

        sched.set_credits(1);
        let Poll::Ready((handle, p)) = sched.poll_next(None) else {
            panic!("expected a pdu");
        };
        assert_eq!(handle, h);
        assert_eq!(p.as_ref()[0], 1);
    }

    #[test]
    fn round_robin_alternates_by_pdu() {
        let sched = setup(4);
        let h1 = ConnHandle::new(0x01);
        let h2 = ConnHandle::new(0x02);
        sched.register(h1).unwrap();
        sched.register(h2).unwrap();
        sched.set_credits(10);

        sched.try_send(h1, pdu(0x1a)).unwrap();
        sched.try_send(h1, pdu(0x1b)).unwrap();
        sched.try_send(h2, pdu(0x2a)).unwrap();
        sched.try_send(h2, pdu(0x2b)).unwrap();

        let mut order = heapless::Vec::<u8, 4>::new();
        while let Poll::Ready((_, p)) = sched.poll_next(None) {
            order.push(p.as_ref()[0]).unwrap();
        }
        assert_eq!(&order[..], &[0x1a, 0x2a, 0x1b, 0x2b]);
    }

    #[test]
    fn disconnected_slot_is_skipped() {
        let sched = setup(2);
        let h1 = ConnHandle::new(1);
        let h2 = ConnHandle::new(2);
        sched.register(h1).unwrap();
        sched.register(h2).unwrap();
        sched.set_credits(4);

        sched.try_send(h1, pdu(0x11)).unwrap();
        sched.try_send(h2, pdu(0x22)).unwrap();
        sched.set_disconnected(h1);

        let Poll::Ready((handle, p)) = sched.poll_next(None) else {
            panic!("expected a pdu");
        };
        assert_eq!(handle, h2);
        assert_eq!(p.as_ref()[0], 0x22);
        assert!(sched.poll_next(None).is_pending());
    }

    #[test]
    fn credits_for_purged_handle_are_discarded() {
        let sched = setup(2);
        let h = ConnHandle::new(1);
        sched.register(h).unwrap();
        sched.set_credits(2);

        assert!(sched.poll_acquire_credit(None).is_ready());
        assert!(sched.poll_acquire_credit(None).is_ready());
        assert!(sched.poll_acquire_credit(None).is_pending());

        sched.unregister(h);
        sched.completed_packets(h, 2);
        assert_eq!(sched.credits(), 0);

        sched.register(h).unwrap();
        sched.completed_packets(h, 2);
        assert_eq!(sched.credits(), 2);
    }

    #[test]
    fn queue_overflow_reports_out_of_memory() {
        let sched = setup(1);
        let h = ConnHandle::new(3);
        sched.register(h).unwrap();
        for i in 0..config::TX_QUEUE_SIZE {
            sched.try_send(h, pdu(i as u8)).unwrap();
        }
        assert!(matches!(sched.try_send(h, pdu(0xff)), Err(Error::OutOfMemory)));
    }

    #[test]
    fn send_to_unknown_handle_fails() {
        let sched = setup(1);
        assert!(matches!(
            sched.try_send(ConnHandle::new(9), pdu(0)),
            Err(Error::NotFound)
        ));
    }
}
