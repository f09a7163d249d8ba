//! Per-handle connection records, connecting sets and L2CAP reassembly.

use core::cell::RefCell;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::{Deque, Vec};

use crate::config;
use crate::connection::ConnectionEvent;
use crate::packet_pool::PacketPool;
use crate::packets::AclPacketBoundary;
use crate::param::{Address, BdAddr, ConnHandle, LinkKind, Role, Status};
use crate::pdu::Pdu;
use crate::Error;

const L2CAP_BASIC_HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ConnectionState {
    Free,
    Connecting,
    Connected,
    Disconnected(Status),
}

/// Staging area for one in-flight L2CAP PDU arriving in fragments.
pub(crate) struct PacketReassembly<P> {
    packet: Option<P>,
    written: usize,
    remaining: usize,
}

impl<P> PacketReassembly<P> {
    const fn new() -> Self {
        Self {
            packet: None,
            written: 0,
            remaining: 0,
        }
    }

    fn in_progress(&self) -> bool {
        self.packet.is_some()
    }

    fn clear(&mut self) {
        self.packet = None;
        self.written = 0;
        self.remaining = 0;
    }
}

type EventChannel =
    Channel<NoopRawMutex, ConnectionEvent, { config::CONNECTION_EVENT_QUEUE_SIZE }>;
type InboundChannel<P> = Channel<NoopRawMutex, Pdu<P>, { config::RX_QUEUE_SIZE }>;

/// One connection record slot.
pub struct ConnectionStorage<P> {
    state: ConnectionState,
    handle: Option<ConnHandle>,
    peer: Option<Address>,
    role: Option<Role>,
    kind: Option<LinkKind>,
    claimed: bool,
    disconnect_delivered: bool,
    reassembly: PacketReassembly<P>,
    inbound: InboundChannel<P>,
    events: EventChannel,
    event_waker: WakerRegistration,
    le_update_pending: bool,
    le_update_result: Option<Status>,
    le_update_waker: WakerRegistration,
}

impl<P> ConnectionStorage<P> {
    pub(crate) const fn new() -> Self {
        Self {
            state: ConnectionState::Free,
            handle: None,
            peer: None,
            role: None,
            kind: None,
            claimed: false,
            disconnect_delivered: false,
            reassembly: PacketReassembly::new(),
            inbound: Channel::new(),
            events: EventChannel::new(),
            event_waker: WakerRegistration::new(),
            le_update_pending: false,
            le_update_result: None,
            le_update_waker: WakerRegistration::new(),
        }
    }
}

/// Drop counters, exposed for logging and assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Stats {
    /// Reassembled PDUs dropped because the inbound queue was full.
    pub congestion_dropped: u32,
    /// Packets dropped because the controller violated framing rules.
    pub protocol_violations: u32,
}

/// Outcome of a classic create-connection request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ClassicConnect {
    /// No page attempt in flight, issue Create Connection now.
    IssueNow,
    /// Another page attempt is in flight, request queued.
    Queued,
}

struct State<'d, P> {
    connections: &'d mut [ConnectionStorage<P>],
    connecting_classic: Vec<BdAddr, { config::CONNECT_LIST_SIZE }>,
    connecting_le: Vec<Address, { config::CONNECT_LIST_SIZE }>,
    pending_classic: Deque<BdAddr, { config::CONNECT_LIST_SIZE }>,
    failures: Vec<(Address, LinkKind, Status), { config::CONNECT_LIST_SIZE }>,
    classic_waker: WakerRegistration,
    le_waker: WakerRegistration,
    stats: Stats,
}

impl<'d, P> State<'d, P> {
    fn position(&self, handle: ConnHandle) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.state != ConnectionState::Free && c.handle == Some(handle))
    }

    fn wake_for(&mut self, kind: LinkKind) {
        match kind {
            LinkKind::Classic => self.classic_waker.wake(),
            LinkKind::Le => self.le_waker.wake(),
        }
    }

    fn register_for(&mut self, kind: LinkKind, cx: &mut Context<'_>) {
        match kind {
            LinkKind::Classic => self.classic_waker.register(cx.waker()),
            LinkKind::Le => self.le_waker.register(cx.waker()),
        }
    }
}

/// The connection table. All mutation happens on the rx runner; the public
/// API only reads or posts through wakers and channels.
pub(crate) struct ConnectionManager<'d, P: PacketPool> {
    state: RefCell<State<'d, P::Packet>>,
}

impl<'d, P: PacketPool> ConnectionManager<'d, P> {
    pub(crate) fn new(connections: &'d mut [ConnectionStorage<P::Packet>]) -> Self {
        Self {
            state: RefCell::new(State {
                connections,
                connecting_classic: Vec::new(),
                connecting_le: Vec::new(),
                pending_classic: Deque::new(),
                failures: Vec::new(),
                classic_waker: WakerRegistration::new(),
                le_waker: WakerRegistration::new(),
                stats: Stats::default(),
            }),
        }
    }

    pub(crate) fn stats(&self) -> Stats {
        self.state.borrow().stats
    }

    // ==== connecting-set bookkeeping (classic serializes page attempts) ====

    /// Decides how an outbound classic connect proceeds. Duplicate requests
    /// and requests to an already-connected peer are rejected.
    pub(crate) fn start_classic_connect(&self, addr: BdAddr) -> Result<ClassicConnect, Error> {
        let mut state = self.state.borrow_mut();
        if state.connecting_classic.contains(&addr) || state.pending_classic.iter().any(|a| *a == addr) {
            warn!("[acl] connect already pending for {:?}", addr);
            return Err(Error::InvalidState);
        }
        if Self::is_classic_connected(&state, addr) {
            warn!("[acl] already connected: {:?}", addr);
            return Err(Error::InvalidState);
        }
        if state.connecting_classic.is_empty() {
            unwrap!(state.connecting_classic.push(addr).ok());
            Ok(ClassicConnect::IssueNow)
        } else {
            state
                .pending_classic
                .push_back(addr)
                .map_err(|_| Error::OutOfMemory)?;
            Ok(ClassicConnect::Queued)
        }
    }

    /// Tracks an inbound connection request we are about to answer.
    pub(crate) fn inbound_classic_connect(&self, addr: BdAddr) {
        let mut state = self.state.borrow_mut();
        if !state.connecting_classic.contains(&addr) {
            let _ = state.connecting_classic.push(addr);
        }
    }

    /// Removes the address from the classic connecting set on any
    /// connection-complete, success or failure.
    pub(crate) fn classic_connect_complete(&self, addr: BdAddr) {
        let mut state = self.state.borrow_mut();
        let before = state.connecting_classic.len();
        state.connecting_classic.retain(|a| *a != addr);
        if state.connecting_classic.len() == before {
            warn!("[acl] no prior connection request for {:?}", addr);
        }
    }

    /// Pops the next queued outbound classic attempt, skipping peers that
    /// connected in the meantime, and moves it into the connecting set.
    pub(crate) fn take_pending_classic(&self) -> Option<BdAddr> {
        let mut state = self.state.borrow_mut();
        if !state.connecting_classic.is_empty() {
            return None;
        }
        while let Some(addr) = state.pending_classic.pop_front() {
            if !Self::is_classic_connected(&state, addr) {
                unwrap!(state.connecting_classic.push(addr).ok());
                return Some(addr);
            }
        }
        None
    }

    pub(crate) fn cancel_classic_connect(&self, addr: BdAddr) -> bool {
        let state = self.state.borrow();
        state.connecting_classic.contains(&addr)
    }

    /// Backs out a classic connect whose command could not be posted.
    pub(crate) fn abort_classic_connect(&self, addr: BdAddr) {
        let mut state = self.state.borrow_mut();
        state.connecting_classic.retain(|a| *a != addr);
    }

    /// Backs out an LE connect whose command could not be posted.
    pub(crate) fn abort_le_connect(&self, peer: Address) {
        let mut state = self.state.borrow_mut();
        state.connecting_le.retain(|a| *a != peer);
    }

    pub(crate) fn start_le_connect(&self, peer: Address) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        if state.connecting_le.contains(&peer) {
            warn!("[acl] le connect already pending for {:?}", peer);
            return Err(Error::InvalidState);
        }
        state.connecting_le.push(peer).map_err(|_| Error::OutOfMemory)
    }

    pub(crate) fn le_connect_complete(&self, peer: Address) {
        let mut state = self.state.borrow_mut();
        let before = state.connecting_le.len();
        state.connecting_le.retain(|a| *a != peer);
        if state.connecting_le.len() == before {
            warn!("[acl] no prior le connection request for {:?}", peer);
        }
    }

    pub(crate) fn is_classic_link_connected(&self, addr: BdAddr) -> bool {
        Self::is_classic_connected(&self.state.borrow(), addr)
    }

    fn is_classic_connected(state: &State<'_, P::Packet>, addr: BdAddr) -> bool {
        state.connections.iter().any(|c| {
            c.state != ConnectionState::Free
                && c.kind == Some(LinkKind::Classic)
                && c.peer.map(|p| p.addr) == Some(addr)
        })
    }

    // ==== record lifecycle ====

    /// Inserts a new record for a completed connection.
    pub(crate) fn connect(
        &self,
        handle: ConnHandle,
        peer: Address,
        role: Role,
        kind: LinkKind,
    ) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        if state.position(handle).is_some() {
            debug_assert!(false, "handle already in connection table");
            warn!("[acl] handle {:?} already in connection table", handle);
            return Err(Error::InvalidState);
        }
        let Some(idx) = state
            .connections
            .iter()
            .position(|c| c.state == ConnectionState::Free)
        else {
            warn!("[acl] no available slot for handle {:?}", handle);
            return Err(Error::ConnectionLimitReached);
        };
        let storage = &mut state.connections[idx];
        storage.state = ConnectionState::Connecting;
        storage.handle = Some(handle);
        storage.peer = Some(peer);
        storage.role = Some(role);
        storage.kind = Some(kind);
        storage.claimed = false;
        storage.disconnect_delivered = false;
        storage.reassembly.clear();
        storage.inbound.clear();
        storage.events.clear();
        storage.le_update_pending = false;
        storage.le_update_result = None;
        state.wake_for(kind);
        Ok(())
    }

    /// Records a connection-complete failure so the matching `connect()`
    /// future resolves.
    pub(crate) fn connect_failed(&self, peer: Address, kind: LinkKind, status: Status) {
        let mut state = self.state.borrow_mut();
        if state.failures.push((peer, kind, status)).is_err() {
            warn!("[acl] dropping connect failure for {:?}", peer);
        }
        state.wake_for(kind);
    }

    /// Hands out the next unclaimed connection of the given kind and role,
    /// optionally filtered by peer address.
    pub(crate) fn poll_accept(
        &self,
        kind: LinkKind,
        role: Role,
        peers: &[Address],
        cx: Option<&mut Context<'_>>,
    ) -> Poll<ConnHandle> {
        let mut state = self.state.borrow_mut();
        if let Some(cx) = cx {
            state.register_for(kind, cx);
        }
        for storage in state.connections.iter_mut() {
            let claimable = matches!(
                storage.state,
                ConnectionState::Connecting | ConnectionState::Disconnected(_)
            );
            if claimable
                && !storage.claimed
                && storage.kind == Some(kind)
                && storage.role == Some(role)
            {
                if !peers.is_empty() && !peers.iter().any(|p| storage.peer == Some(*p)) {
                    continue;
                }
                if storage.state == ConnectionState::Connecting {
                    storage.state = ConnectionState::Connected;
                }
                storage.claimed = true;
                return Poll::Ready(unwrap!(storage.handle));
            }
        }
        Poll::Pending
    }

    /// Resolves an outbound connect: either a claimable record or a
    /// recorded failure.
    ///
    /// Classic completes report the paged address, so the record is matched
    /// by peer. An LE enhanced complete may substitute the peer resolvable
    /// address for the requested one; since the controller allows only one
    /// outstanding LE create, any new central LE record is ours.
    pub(crate) fn poll_connect_outcome(
        &self,
        peer: Address,
        kind: LinkKind,
        cx: Option<&mut Context<'_>>,
    ) -> Poll<Result<ConnHandle, Error>> {
        if let Some(idx) = {
            let state = self.state.borrow();
            state
                .failures
                .iter()
                .position(|(a, k, _)| *a == peer && *k == kind)
        } {
            let mut state = self.state.borrow_mut();
            let (_, _, status) = state.failures.swap_remove(idx);
            return Poll::Ready(Err(Error::ConnectFailed(status)));
        }
        match kind {
            LinkKind::Classic => self
                .poll_accept(kind, Role::Central, core::slice::from_ref(&peer), cx)
                .map(Ok),
            LinkKind::Le => self.poll_accept(kind, Role::Central, &[], cx).map(Ok),
        }
    }

    /// Marks the record disconnected. Queued inbound PDUs stay dequeueable;
    /// the one-shot disconnect event becomes observable.
    pub(crate) fn disconnected(&self, handle: ConnHandle, reason: Status) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            warn!("[acl] disconnection for unknown handle {:?}", handle);
            return Err(Error::NotFound);
        };
        let storage = &mut state.connections[idx];
        if let ConnectionState::Disconnected(_) = storage.state {
            return Ok(());
        }
        storage.state = ConnectionState::Disconnected(reason);
        storage.reassembly.clear();
        storage.event_waker.wake();
        storage.le_update_waker.wake();
        Ok(())
    }

    pub(crate) fn disconnect_reason(&self, handle: ConnHandle) -> Option<Status> {
        let state = self.state.borrow();
        let idx = state.position(handle)?;
        match state.connections[idx].state {
            ConnectionState::Disconnected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Erases the record. Must only be called after disconnection.
    pub(crate) fn finish(&self, handle: ConnHandle) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Err(Error::NotFound);
        };
        let storage = &mut state.connections[idx];
        if !matches!(storage.state, ConnectionState::Disconnected(_)) {
            debug_assert!(false, "finish before disconnection");
            warn!("[acl] finish on live handle {:?}", handle);
            return Err(Error::InvalidState);
        }
        storage.state = ConnectionState::Free;
        storage.handle = None;
        storage.peer = None;
        storage.role = None;
        storage.kind = None;
        storage.claimed = false;
        storage.reassembly.clear();
        storage.inbound.clear();
        storage.events.clear();
        Ok(())
    }

    pub(crate) fn is_connected(&self, handle: ConnHandle) -> bool {
        let state = self.state.borrow();
        state
            .position(handle)
            .map(|idx| state.connections[idx].state == ConnectionState::Connected)
            .unwrap_or(false)
    }

    pub(crate) fn peer_address(&self, handle: ConnHandle) -> Option<Address> {
        let state = self.state.borrow();
        let idx = state.position(handle)?;
        state.connections[idx].peer
    }

    pub(crate) fn role(&self, handle: ConnHandle) -> Option<Role> {
        let state = self.state.borrow();
        let idx = state.position(handle)?;
        state.connections[idx].role
    }

    pub(crate) fn kind(&self, handle: ConnHandle) -> Option<LinkKind> {
        let state = self.state.borrow();
        let idx = state.position(handle)?;
        state.connections[idx].kind
    }

    // ==== ingress reassembly ====

    /// Routes one inbound ACL packet into the per-connection reassembler,
    /// delivering completed PDUs to the inbound queue.
    ///
    /// Framing violations drop the affected packet (and any partial PDU)
    /// and are counted; they never propagate.
    pub(crate) fn received_acl(
        &self,
        handle: ConnHandle,
        boundary: AclPacketBoundary,
        payload: &[u8],
    ) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Err(Error::NotFound);
        };

        match boundary {
            AclPacketBoundary::FirstNonFlushable | AclPacketBoundary::Complete => {
                error!(
                    "[acl] controller sent boundary flag {:?} to host, dropping",
                    boundary
                );
                state.stats.protocol_violations += 1;
            }
            AclPacketBoundary::FirstFlushable => {
                let storage = &mut state.connections[idx];
                if storage.reassembly.in_progress() {
                    error!(
                        "[acl] starting packet without finishing previous on {:?}, dropping previous",
                        handle
                    );
                    storage.reassembly.clear();
                    state.stats.protocol_violations += 1;
                }
                if payload.len() < L2CAP_BASIC_HEADER_SIZE {
                    error!("[acl] invalid L2CAP starting packet on {:?}", handle);
                    state.stats.protocol_violations += 1;
                    return Ok(());
                }
                let pdu_len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
                let frame_len = pdu_len + L2CAP_BASIC_HEADER_SIZE;
                if frame_len < payload.len() {
                    error!("[acl] L2CAP length shorter than payload on {:?}", handle);
                    state.stats.protocol_violations += 1;
                    return Ok(());
                }
                if frame_len > P::MTU {
                    error!(
                        "[acl] L2CAP PDU of {} bytes exceeds MTU {} on {:?}",
                        frame_len,
                        P::MTU,
                        handle
                    );
                    state.stats.protocol_violations += 1;
                    return Ok(());
                }
                let Some(mut packet) = P::allocate() else {
                    warn!("[acl] no memory for inbound PDU on {:?}", handle);
                    state.stats.congestion_dropped += 1;
                    return Ok(());
                };
                packet.as_mut()[..payload.len()].copy_from_slice(payload);
                let remaining = frame_len - payload.len();
                if remaining == 0 {
                    Self::deliver(&mut state, idx, Pdu::new(packet, payload.len()));
                } else {
                    let storage = &mut state.connections[idx];
                    storage.reassembly.packet = Some(packet);
                    storage.reassembly.written = payload.len();
                    storage.reassembly.remaining = remaining;
                }
            }
            AclPacketBoundary::Continuing => {
                let storage = &mut state.connections[idx];
                if !storage.reassembly.in_progress()
                    || payload.len() > storage.reassembly.remaining
                {
                    warn!("[acl] unexpected continuation on {:?}, dropping PDU", handle);
                    storage.reassembly.clear();
                    state.stats.protocol_violations += 1;
                    return Ok(());
                }
                let written = storage.reassembly.written;
                let packet = unwrap!(storage.reassembly.packet.as_mut());
                packet.as_mut()[written..written + payload.len()].copy_from_slice(payload);
                storage.reassembly.written += payload.len();
                storage.reassembly.remaining -= payload.len();
                if storage.reassembly.remaining == 0 {
                    let packet = unwrap!(storage.reassembly.packet.take());
                    let len = storage.reassembly.written;
                    storage.reassembly.clear();
                    Self::deliver(&mut state, idx, Pdu::new(packet, len));
                }
            }
        }
        Ok(())
    }

    fn deliver(state: &mut State<'_, P::Packet>, idx: usize, pdu: Pdu<P::Packet>) {
        let storage = &state.connections[idx];
        if storage.inbound.try_send(pdu).is_err() {
            error!(
                "[acl] dropping PDU due to congestion from remote {:?}",
                storage.peer
            );
            state.stats.congestion_dropped += 1;
        }
    }

    pub(crate) fn poll_receive(
        &self,
        handle: ConnHandle,
        cx: &mut Context<'_>,
    ) -> Poll<Pdu<P::Packet>> {
        let state = self.state.borrow();
        let Some(idx) = state.position(handle) else {
            return Poll::Pending;
        };
        state.connections[idx].inbound.poll_receive(cx)
    }

    pub(crate) fn try_receive(&self, handle: ConnHandle) -> Result<Pdu<P::Packet>, Error> {
        let state = self.state.borrow();
        let idx = state.position(handle).ok_or(Error::NotFound)?;
        state.connections[idx]
            .inbound
            .try_receive()
            .map_err(|_| Error::Busy)
    }

    // ==== management event delivery ====

    /// Posts a management event to the record's subscriber. Events for
    /// unknown handles or a full queue are dropped silently.
    pub(crate) fn post_handle_event(
        &self,
        handle: ConnHandle,
        event: ConnectionEvent,
    ) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Err(Error::NotFound);
        };
        let storage = &mut state.connections[idx];
        if storage.events.try_send(event).is_err() {
            debug!("[acl] event queue full on {:?}, dropping event", handle);
        }
        storage.event_waker.wake();
        Ok(())
    }

    /// Posts a management event to every record matching the address.
    pub(crate) fn post_event_by_address(&self, addr: BdAddr, event: ConnectionEvent) {
        let mut state = self.state.borrow_mut();
        for storage in state.connections.iter_mut() {
            if storage.state != ConnectionState::Free && storage.peer.map(|p| p.addr) == Some(addr)
            {
                if storage.events.try_send(event.clone()).is_err() {
                    debug!("[acl] event queue full on {:?}, dropping event", storage.handle);
                }
                storage.event_waker.wake();
            }
        }
    }

    /// Next management event for the handle. The one-shot disconnect event
    /// is delivered exactly once, after any queued events, and immediately
    /// when the subscriber arrives late.
    pub(crate) fn poll_next_event(
        &self,
        handle: ConnHandle,
        cx: Option<&mut Context<'_>>,
    ) -> Poll<ConnectionEvent> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Poll::Pending;
        };
        let storage = &mut state.connections[idx];
        if let Some(cx) = cx {
            storage.event_waker.register(cx.waker());
        }
        if let Ok(event) = storage.events.try_receive() {
            return Poll::Ready(event);
        }
        if let ConnectionState::Disconnected(reason) = storage.state {
            if !storage.disconnect_delivered {
                storage.disconnect_delivered = true;
                return Poll::Ready(ConnectionEvent::Disconnected { reason });
            }
        }
        Poll::Pending
    }

    // ==== LE connection update one-shot ====

    /// Claims the per-connection LE update one-shot. At most one update may
    /// be pending per connection.
    pub(crate) fn begin_le_update(&self, handle: ConnHandle) -> Result<(), Error> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Err(Error::NotFound);
        };
        let storage = &mut state.connections[idx];
        if storage.state != ConnectionState::Connected {
            return Err(Error::Disconnected);
        }
        if storage.le_update_pending {
            info!("[acl] another connection update pending on {:?}", handle);
            return Err(Error::InvalidState);
        }
        storage.le_update_pending = true;
        storage.le_update_result = None;
        Ok(())
    }

    /// Releases the one-shot when the command could not be issued.
    pub(crate) fn abort_le_update(&self, handle: ConnHandle) {
        let mut state = self.state.borrow_mut();
        if let Some(idx) = state.position(handle) {
            let storage = &mut state.connections[idx];
            storage.le_update_pending = false;
            storage.le_update_result = None;
        }
    }

    /// Resolves the pending LE update one-shot, if any.
    pub(crate) fn le_update_complete(&self, handle: ConnHandle, status: Status) {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            warn!("[acl] connection update for unknown handle {:?}", handle);
            return;
        };
        let storage = &mut state.connections[idx];
        if matches!(storage.state, ConnectionState::Disconnected(_)) {
            info!("[acl] connection update complete after disconnect on {:?}", handle);
            return;
        }
        if storage.le_update_pending {
            storage.le_update_result = Some(status);
            storage.le_update_waker.wake();
        }
    }

    pub(crate) fn poll_le_update_result(
        &self,
        handle: ConnHandle,
        cx: Option<&mut Context<'_>>,
    ) -> Poll<Result<Status, Error>> {
        let mut state = self.state.borrow_mut();
        let Some(idx) = state.position(handle) else {
            return Poll::Ready(Err(Error::NotFound));
        };
        let storage = &mut state.connections[idx];
        if let Some(cx) = cx {
            storage.le_update_waker.register(cx.waker());
        }
        if let Some(status) = storage.le_update_result.take() {
            storage.le_update_pending = false;
            return Poll::Ready(Ok(status));
        }
        if matches!(storage.state, ConnectionState::Disconnected(_)) {
            storage.le_update_pending = false;
            return Poll::Ready(Err(Error::Disconnected));
        }
        Poll::Pending
    }
}
