//! Runners driving the ACL core: ingress event dispatch, controller
//! bring-up and command issuance, round-robin transmission.

use core::cell::{Cell, RefCell};

use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::once_lock::OnceLock;
use futures::pin_mut;

use crate::codec::ReadCursor;
use crate::config;
use crate::connection::ConnectionEvent;
use crate::connection_manager::ConnectionManager;
use crate::fragmenter::AclFragmenter;
use crate::packet_pool::PacketPool;
use crate::packets::command::LeConnectionUpdateParams;
use crate::packets::event::{self, Event, LeEvent};
use crate::packets::{
    AclPacket, Command, CommandResponse, ControllerToHostPacket,
};
use crate::param::{
    Address, AddrKind, BdAddr, ClassOfDevice, ConnHandle, LinkKind, LinkType, RejectReason, Role,
    Status,
};
use crate::scheduler::RoundRobinScheduler;
use crate::transport::Transport;
use crate::{AclError, Error, Stack};

/// Vendor trace traffic rides on this handle; it never belongs to a
/// connection and is dropped on ingress.
const VENDOR_DEBUG_HANDLE: u16 = 0x0edc;

/// Event codes 0x01..=0x2d, Link Supervision Timeout Changed (0x38) and
/// the LE meta event (0x3e).
const EVENT_MASK: u64 = 0x2080_1fff_ffff_ffff;

/// LE subevents: connection complete, connection update complete and
/// enhanced connection complete, plus the legacy defaults.
const LE_EVENT_MASK: u64 = 0x0000_0000_0000_021f;

/// LE feature bit gating the use of the extended create-connection
/// command.
const LE_EXTENDED_CREATE_FEATURE: u64 = 0x0010;

// Classic page defaults: DM1/DM3/DM5 and DH1/DH3/DH5 packets, R1 page
// scan repetition, no valid clock offset.
const CLASSIC_PACKET_TYPES: u16 = 0x4408 | 0x8810;
const PAGE_SCAN_REPETITION_R1: u8 = 0x01;

// LE connection defaults used for outbound creates.
const LE_SCAN_INTERVAL: u16 = 0x0060;
const LE_SCAN_WINDOW: u16 = 0x0030;
const LE_CREATE_CONN_PARAMS: LeConnectionUpdateParams = LeConnectionUpdateParams {
    conn_interval_min: 0x0018,
    conn_interval_max: 0x0028,
    conn_latency: 0x0000,
    supervision_timeout: 0x01f4,
    min_ce_length: 0x0002,
    max_ce_length: 0x0c00,
};

/// Controller properties captured during bring-up.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ControllerInfo {
    pub acl_packet_len: usize,
    pub le_features: u64,
}

/// Host counters.
#[derive(Debug, Default, Clone)]
pub struct HostMetrics {
    /// How many connect events have been received.
    pub connect_events: u32,
    /// How many disconnect events have been received.
    pub disconnect_events: u32,
    /// How many inbound packets were dropped for an unknown handle.
    pub rx_errors: u32,
}

/// Policy applied to inbound classic connection requests.
#[derive(Debug, Clone, Copy, Default)]
pub enum AcceptPolicy {
    /// No acceptor: reject with limited resources.
    #[default]
    Reject,
    /// Accept every request from a not-yet-connected peer.
    Accept,
    /// Consult the predicate.
    Filter(fn(BdAddr, ClassOfDevice) -> bool),
}

/// Work posted from the public API and the rx runner to the control
/// runner, which serializes all HCI command issuance.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlRequest {
    Command(Command),
    CreateConnection { addr: BdAddr },
    CreateLeConnection { peer: Address },
    AcceptConnection { addr: BdAddr },
    RejectConnection { addr: BdAddr, reason: RejectReason },
    CancelConnect { addr: BdAddr },
}

/// State shared between the runners and the handle-bound facades.
pub(crate) struct Inner<'d, P: PacketPool> {
    pub(crate) connections: ConnectionManager<'d, P>,
    pub(crate) scheduler: RoundRobinScheduler<'d, P>,
    pub(crate) commands: Channel<NoopRawMutex, ControlRequest, { config::COMMAND_QUEUE_SIZE }>,
    pub(crate) initialized: OnceLock<ControllerInfo>,
    pub(crate) metrics: RefCell<HostMetrics>,
    pub(crate) accept_policy: Cell<AcceptPolicy>,
    pub(crate) random_address: Cell<Option<BdAddr>>,
    pub(crate) default_link_policy: Cell<u16>,
}

/// The ACL manager core: owns the connection table, subscribes to HCI
/// events and moves data between the transport and the per-connection
/// queues.
pub(crate) struct AclHost<'d, T, P: PacketPool> {
    pub(crate) transport: T,
    pub(crate) inner: Inner<'d, P>,
}

impl<'d, T, P> AclHost<'d, T, P>
where
    T: Transport,
    P: PacketPool,
{
    pub(crate) fn new(
        transport: T,
        connections: &'d mut [crate::connection_manager::ConnectionStorage<P::Packet>],
        tx_slots: &'d mut [crate::scheduler::TxSlot<P::Packet>],
    ) -> Self {
        Self {
            transport,
            inner: Inner {
                connections: ConnectionManager::new(connections),
                scheduler: RoundRobinScheduler::new(tx_slots),
                commands: Channel::new(),
                initialized: OnceLock::new(),
                metrics: RefCell::new(HostMetrics::default()),
                accept_policy: Cell::new(AcceptPolicy::Reject),
                random_address: Cell::new(None),
                default_link_policy: Cell::new(0),
            },
        }
    }

    /// Issues one HCI command, logging any non-success resolution with its
    /// opcode and error mnemonic.
    async fn command(&self, cmd: &Command) -> Result<CommandResponse, AclError<T::Error>> {
        let response = self
            .transport
            .command(cmd)
            .await
            .map_err(AclError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                "[acl] command 0x{:04x} failed: {}",
                cmd.opcode(),
                status.name()
            );
        }
        Ok(response)
    }

    /// Same, but a non-success resolution fails the caller. Used during
    /// controller bring-up.
    async fn command_ok(&self, cmd: &Command) -> Result<CommandResponse, AclError<T::Error>> {
        let response = self.command(cmd).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AclError::Acl(Error::Hci(status)));
        }
        Ok(response)
    }

    fn post(&self, request: ControlRequest) {
        if self.inner.commands.try_send(request).is_err() {
            error!("[acl] command queue full, dropping request");
        }
    }

    // ==== ingress ====

    fn handle_acl(&self, acl: AclPacket<'_>) {
        let handle = acl.handle();
        if handle.raw() == VENDOR_DEBUG_HANDLE {
            return;
        }
        if self
            .inner
            .connections
            .received_acl(handle, acl.boundary_flag(), acl.data())
            .is_err()
        {
            info!(
                "[acl] dropping packet of size {} to unknown connection {:?}",
                acl.data().len(),
                handle
            );
            self.inner.metrics.borrow_mut().rx_errors += 1;
        }
    }

    fn handle_event(&self, event: Event<'_>) {
        match event {
            Event::ConnectionComplete(e) => self.on_connection_complete(e),
            Event::ConnectionRequest(e) => self.on_connection_request(e),
            Event::DisconnectionComplete(e) => self.on_disconnection_complete(e),
            Event::NumberOfCompletedPackets(e) => {
                for (handle, completed) in e.iter() {
                    self.inner
                        .scheduler
                        .completed_packets(handle, completed as usize);
                }
            }
            Event::Le(le) => self.on_le_event(le),
            Event::AuthenticationComplete(e) => {
                self.post_status_event(e.status, e.handle, ConnectionEvent::AuthenticationComplete)
            }
            Event::EncryptionChange(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::EncryptionChange { enabled: e.enabled },
            ),
            Event::ChangeConnectionLinkKeyComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ChangeConnectionLinkKeyComplete,
            ),
            Event::MasterLinkKeyComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::MasterLinkKeyComplete {
                    key_flag: e.key_flag,
                },
            ),
            Event::ReadClockOffsetComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ReadClockOffsetComplete {
                    clock_offset: e.clock_offset,
                },
            ),
            Event::ModeChange(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ModeChange {
                    mode: e.current_mode,
                    interval: e.interval,
                },
            ),
            Event::QosSetupComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::QosSetupComplete {
                    service_type: e.service_type,
                    token_rate: e.token_rate,
                    peak_bandwidth: e.peak_bandwidth,
                    latency: e.latency,
                    delay_variation: e.delay_variation,
                },
            ),
            Event::FlowSpecificationComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::FlowSpecificationComplete {
                    flow_direction: e.flow_direction,
                    service_type: e.service_type,
                    token_rate: e.token_rate,
                    token_bucket_size: e.token_bucket_size,
                    peak_bandwidth: e.peak_bandwidth,
                    access_latency: e.access_latency,
                },
            ),
            Event::ConnectionPacketTypeChanged(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ConnectionPacketTypeChanged {
                    packet_type: e.packet_type,
                },
            ),
            Event::RoleChange(e) => {
                if e.status.is_success() {
                    self.inner.connections.post_event_by_address(
                        e.bd_addr,
                        ConnectionEvent::RoleChange { role: e.role },
                    );
                } else {
                    error!("[acl] role change failed: {}", e.status.name());
                }
            }
            Event::FlushOccurred(e) => {
                let _ = self
                    .inner
                    .connections
                    .post_handle_event(e.handle, ConnectionEvent::FlushOccurred);
            }
            Event::LinkSupervisionTimeoutChanged(e) => {
                let _ = self.inner.connections.post_handle_event(
                    e.handle,
                    ConnectionEvent::LinkSupervisionTimeoutChanged { timeout: e.timeout },
                );
            }
            Event::ReadRemoteSupportedFeaturesComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ReadRemoteSupportedFeaturesComplete {
                    features: e.features,
                },
            ),
            Event::ReadRemoteExtendedFeaturesComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ReadRemoteExtendedFeaturesComplete {
                    page_number: e.page_number,
                    max_page_number: e.max_page_number,
                    features: e.features,
                },
            ),
            Event::ReadRemoteVersionInformationComplete(e) => self.post_status_event(
                e.status,
                e.handle,
                ConnectionEvent::ReadRemoteVersionInformationComplete {
                    version: e.version,
                    manufacturer_name: e.manufacturer_name,
                    subversion: e.subversion,
                },
            ),
            // Command responses are consumed by the transport's command
            // promises, not here.
            Event::CommandComplete(_) | Event::CommandStatus(_) => {}
            Event::Unknown { code } => {
                trace!("[acl] ignoring event 0x{:02x}", code);
            }
        }
    }

    /// Per-handle management events: non-success statuses are logged, a
    /// missing subscriber drops the event silently.
    fn post_status_event(&self, status: Status, handle: ConnHandle, event: ConnectionEvent) {
        if !status.is_success() {
            error!(
                "[acl] management event for {:?} failed: {}",
                handle,
                status.name()
            );
            return;
        }
        let _ = self.inner.connections.post_handle_event(handle, event);
    }

    fn on_connection_complete(&self, e: event::ConnectionComplete) {
        self.inner.connections.classic_connect_complete(e.bd_addr);
        let peer = Address::new(AddrKind::Public, e.bd_addr);
        if !e.status.is_success() {
            self.inner
                .connections
                .connect_failed(peer, LinkKind::Classic, e.status);
        } else if e.link_type != LinkType::Acl {
            info!("[acl] ignoring non-ACL connection from {:?}", e.bd_addr);
        } else {
            self.establish(e.handle, peer, Role::Central, LinkKind::Classic);
        }
        // The controller pages one peer at a time; dispatch the next
        // queued outgoing attempt.
        if let Some(addr) = self.inner.connections.take_pending_classic() {
            self.post(ControlRequest::CreateConnection { addr });
        }
    }

    fn on_connection_request(&self, e: event::ConnectionRequest) {
        let addr = e.bd_addr;
        if e.link_type != LinkType::Acl {
            info!("[acl] rejecting non-ACL connection request from {:?}", addr);
            self.post(ControlRequest::RejectConnection {
                addr,
                reason: RejectReason::LimitedResources,
            });
            return;
        }
        let policy = self.inner.accept_policy.get();
        if matches!(policy, AcceptPolicy::Reject) {
            error!("[acl] no acceptor registered, rejecting {:?}", addr);
            self.post(ControlRequest::RejectConnection {
                addr,
                reason: RejectReason::LimitedResources,
            });
            return;
        }
        self.inner.connections.inbound_classic_connect(addr);
        if self.inner.connections.is_classic_link_connected(addr) {
            self.post(ControlRequest::RejectConnection {
                addr,
                reason: RejectReason::UnacceptableBdAddr,
            });
        } else if match policy {
            AcceptPolicy::Accept => true,
            AcceptPolicy::Filter(f) => f(addr, e.class_of_device),
            AcceptPolicy::Reject => false,
        } {
            self.post(ControlRequest::AcceptConnection { addr });
        } else {
            self.post(ControlRequest::RejectConnection {
                addr,
                reason: RejectReason::LimitedResources,
            });
        }
    }

    fn on_disconnection_complete(&self, e: event::DisconnectionComplete) {
        if e.status.is_success() {
            let _ = self.inner.connections.disconnected(e.handle, e.reason);
            self.inner.scheduler.set_disconnected(e.handle);
            self.inner.metrics.borrow_mut().disconnect_events += 1;
        } else {
            error!(
                "[acl] disconnection complete with error code {}, handle {:?}",
                e.status.name(),
                e.handle
            );
        }
    }

    fn on_le_event(&self, event: LeEvent) {
        match event {
            LeEvent::ConnectionComplete(e) => {
                let peer = Address::new(e.peer_addr_kind, e.peer_addr);
                self.le_connection_complete(e.status, e.handle, e.role, peer);
            }
            LeEvent::EnhancedConnectionComplete(e) => {
                // A non-empty peer resolvable address substitutes the
                // reporting address.
                let peer = if !e.peer_resolvable_addr.is_zero() {
                    Address::new(AddrKind::Random, e.peer_resolvable_addr)
                } else {
                    Address::new(e.peer_addr_kind, e.peer_addr)
                };
                self.le_connection_complete(e.status, e.handle, e.role, peer);
            }
            LeEvent::ConnectionUpdateComplete(e) => {
                self.inner.connections.le_update_complete(e.handle, e.status);
            }
            LeEvent::Unknown { subevent } => {
                trace!("[acl] ignoring le subevent 0x{:02x}", subevent);
            }
        }
    }

    fn le_connection_complete(
        &self,
        status: Status,
        handle: ConnHandle,
        role: Role,
        peer: Address,
    ) {
        self.inner.connections.le_connect_complete(peer);
        if !status.is_success() {
            self.inner.connections.connect_failed(peer, LinkKind::Le, status);
        } else {
            self.establish(handle, peer, role, LinkKind::Le);
        }
    }

    fn establish(&self, handle: ConnHandle, peer: Address, role: Role, kind: LinkKind) {
        match self.inner.connections.connect(handle, peer, role, kind) {
            Ok(()) => {
                if self.inner.scheduler.register(handle).is_err() {
                    error!("[acl] no scheduler slot for {:?}", handle);
                }
                debug!("[acl] connection {:?} established to {}", handle, peer);
                self.inner.metrics.borrow_mut().connect_events += 1;
            }
            Err(e) => {
                warn!("[acl] error establishing connection: {:?}", e);
            }
        }
    }

    // ==== control dispatch ====

    async fn dispatch(&self, request: ControlRequest) -> Result<(), AclError<T::Error>> {
        match request {
            ControlRequest::Command(cmd) => {
                let response = self.command(&cmd).await?;
                if let CommandResponse::Complete { status, params } = response {
                    if status.is_success() {
                        self.on_command_complete(&cmd, &params);
                    }
                }
            }
            ControlRequest::CreateConnection { addr } => {
                let cmd = Command::CreateConnection {
                    addr,
                    packet_type: CLASSIC_PACKET_TYPES,
                    page_scan_repetition_mode: PAGE_SCAN_REPETITION_R1,
                    clock_offset: 0,
                    allow_role_switch: true,
                };
                // A non-success status is only logged; the Connection
                // Complete event resolves the attempt.
                self.command(&cmd).await?;
            }
            ControlRequest::CreateLeConnection { peer } => {
                self.create_le_connection(peer).await?;
            }
            ControlRequest::AcceptConnection { addr } => {
                // We prefer to come out of the role switch as central.
                let cmd = Command::AcceptConnectionRequest {
                    addr,
                    role: Role::Central,
                };
                let response = self.command(&cmd).await?;
                if !response.status().is_success()
                    && self.inner.connections.cancel_classic_connect(addr)
                {
                    self.command(&Command::CreateConnectionCancel { addr }).await?;
                }
            }
            ControlRequest::RejectConnection { addr, reason } => {
                self.command(&Command::RejectConnectionRequest { addr, reason })
                    .await?;
            }
            ControlRequest::CancelConnect { addr } => {
                self.command(&Command::CreateConnectionCancel { addr }).await?;
            }
        }
        Ok(())
    }

    /// Issues the LE create for the peer. A non-success status is only
    /// logged; the LE Connection Complete event resolves the attempt.
    async fn create_le_connection(&self, peer: Address) -> Result<(), AclError<T::Error>> {
        let info = self.inner.initialized.get().await;
        let own_addr_random = self.inner.random_address.get().is_some();
        if info.le_features & LE_EXTENDED_CREATE_FEATURE != 0 {
            // A random address must be configured in the controller before
            // it may be used to establish a connection.
            if let Some(addr) = self.inner.random_address.get() {
                self.command(&Command::LeSetRandomAddress { addr }).await?;
            }
            self.command(&Command::LeExtendedCreateConnection {
                scan_interval: LE_SCAN_INTERVAL,
                scan_window: LE_SCAN_WINDOW,
                peer,
                own_addr_random,
                params: LE_CREATE_CONN_PARAMS,
            })
            .await?;
        } else {
            self.command(&Command::LeCreateConnection {
                scan_interval: LE_SCAN_INTERVAL,
                scan_window: LE_SCAN_WINDOW,
                peer,
                own_addr_random,
                params: LE_CREATE_CONN_PARAMS,
            })
            .await?;
        }
        Ok(())
    }

    /// Routes command-complete return parameters to the owning
    /// connection's event channel.
    fn on_command_complete(&self, cmd: &Command, params: &[u8]) {
        let mut r = ReadCursor::new(params);
        let event = match *cmd {
            Command::RoleDiscovery { .. } => {
                let _handle = r.read_u16();
                match r.read_u8().map(Role::from_raw) {
                    Ok(Ok(role)) => ConnectionEvent::RoleDiscoveryComplete { role },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadLinkPolicySettings { .. } => {
                let _handle = r.read_u16();
                match r.read_u16() {
                    Ok(settings) => ConnectionEvent::ReadLinkPolicySettingsComplete { settings },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadAutomaticFlushTimeout { .. } => {
                let _handle = r.read_u16();
                match r.read_u16() {
                    Ok(flush_timeout) => {
                        ConnectionEvent::ReadAutomaticFlushTimeoutComplete { flush_timeout }
                    }
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadTransmitPowerLevel { .. } => {
                let _handle = r.read_u16();
                match r.read_u8() {
                    Ok(level) => ConnectionEvent::ReadTransmitPowerLevelComplete {
                        power_level: level as i8,
                    },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadLinkSupervisionTimeout { .. } => {
                let _handle = r.read_u16();
                match r.read_u16() {
                    Ok(timeout) => ConnectionEvent::ReadLinkSupervisionTimeoutComplete { timeout },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadFailedContactCounter { .. } => {
                let _handle = r.read_u16();
                match r.read_u16() {
                    Ok(counter) => ConnectionEvent::ReadFailedContactCounterComplete { counter },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadLinkQuality { .. } => {
                let _handle = r.read_u16();
                match r.read_u8() {
                    Ok(quality) => ConnectionEvent::ReadLinkQualityComplete { quality },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadAfhChannelMap { .. } => {
                let _handle = r.read_u16();
                match (r.read_u8(), r.read_array::<10>()) {
                    (Ok(mode), Ok(map)) => ConnectionEvent::ReadAfhChannelMapComplete { mode, map },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadRssi { .. } => {
                let _handle = r.read_u16();
                match r.read_u8() {
                    Ok(rssi) => ConnectionEvent::ReadRssiComplete { rssi: rssi as i8 },
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadClock { .. } => {
                let _handle = r.read_u16();
                match (r.read_u32(), r.read_u16()) {
                    (Ok(clock), Ok(accuracy)) => {
                        ConnectionEvent::ReadClockComplete { clock, accuracy }
                    }
                    _ => return self.bad_return_params(cmd),
                }
            }
            Command::ReadDefaultLinkPolicySettings => {
                if let Ok(settings) = r.read_u16() {
                    self.inner.default_link_policy.set(settings);
                }
                return;
            }
            _ => return,
        };
        if let Some(handle) = command_handle(cmd) {
            let _ = self.inner.connections.post_handle_event(handle, event);
        }
    }

    fn bad_return_params(&self, cmd: &Command) {
        error!(
            "[acl] command complete with invalid packet, opcode 0x{:04x}",
            cmd.opcode()
        );
    }
}

fn command_handle(cmd: &Command) -> Option<ConnHandle> {
    match *cmd {
        Command::RoleDiscovery { handle }
        | Command::ReadLinkPolicySettings { handle }
        | Command::ReadAutomaticFlushTimeout { handle }
        | Command::ReadTransmitPowerLevel { handle, .. }
        | Command::ReadLinkSupervisionTimeout { handle }
        | Command::ReadFailedContactCounter { handle }
        | Command::ReadLinkQuality { handle }
        | Command::ReadAfhChannelMap { handle }
        | Command::ReadRssi { handle }
        | Command::ReadClock { handle, .. } => Some(handle),
        _ => None,
    }
}

/// Runs the core against the transport.
pub struct Runner<'d, T: Transport, P: PacketPool> {
    rx: RxRunner<'d, T, P>,
    control: ControlRunner<'d, T, P>,
    tx: TxRunner<'d, T, P>,
}

/// Ingress: HCI events and inbound ACL data. Owns all connection table
/// mutation.
pub struct RxRunner<'d, T: Transport, P: PacketPool> {
    stack: &'d Stack<'d, T, P>,
}

/// Controller bring-up and serialized command issuance.
pub struct ControlRunner<'d, T: Transport, P: PacketPool> {
    stack: &'d Stack<'d, T, P>,
}

/// Egress: the round-robin scheduler loop. Owns the credit pool.
pub struct TxRunner<'d, T: Transport, P: PacketPool> {
    stack: &'d Stack<'d, T, P>,
}

impl<'d, T: Transport, P: PacketPool> Runner<'d, T, P> {
    pub(crate) fn new(stack: &'d Stack<'d, T, P>) -> Self {
        Self {
            rx: RxRunner { stack },
            control: ControlRunner { stack },
            tx: TxRunner { stack },
        }
    }

    /// Split the runner into separate independent async tasks.
    pub fn split(
        self,
    ) -> (
        RxRunner<'d, T, P>,
        ControlRunner<'d, T, P>,
        TxRunner<'d, T, P>,
    ) {
        (self.rx, self.control, self.tx)
    }

    /// Run the core until the transport fails.
    pub async fn run(&mut self) -> Result<(), AclError<T::Error>> {
        let rx_fut = self.rx.run();
        let control_fut = self.control.run();
        let tx_fut = self.tx.run();
        pin_mut!(rx_fut, control_fut, tx_fut);
        match select3(&mut rx_fut, &mut control_fut, &mut tx_fut).await {
            Either3::First(result) => {
                trace!("[acl] rx runner exit");
                result
            }
            Either3::Second(result) => {
                trace!("[acl] control runner exit");
                result
            }
            Either3::Third(result) => {
                trace!("[acl] tx runner exit");
                result
            }
        }
    }
}

impl<'d, T: Transport, P: PacketPool> RxRunner<'d, T, P> {
    /// Runs the receive loop that polls the transport for events and data.
    pub async fn run(&mut self) -> Result<(), AclError<T::Error>> {
        const MAX_HCI_PACKET_LEN: usize = 259;
        let host = &self.stack.host;
        loop {
            let mut rx = [0u8; MAX_HCI_PACKET_LEN];
            match host.transport.read(&mut rx).await {
                Ok(ControllerToHostPacket::Acl(acl)) => host.handle_acl(acl),
                Ok(ControllerToHostPacket::Event(event)) => host.handle_event(event),
                Err(e) => {
                    return Err(AclError::Transport(e));
                }
            }
        }
    }
}

impl<'d, T: Transport, P: PacketPool> ControlRunner<'d, T, P> {
    /// Brings up the controller, then issues posted commands in order.
    pub async fn run(&mut self) -> Result<(), AclError<T::Error>> {
        let host = &self.stack.host;

        host.command_ok(&Command::Reset).await?;
        if let Some(addr) = host.inner.random_address.get() {
            host.command_ok(&Command::LeSetRandomAddress { addr }).await?;
        }
        host.command_ok(&Command::SetEventMask { mask: EVENT_MASK })
            .await?;
        host.command_ok(&Command::LeSetEventMask {
            mask: LE_EVENT_MASK,
        })
        .await?;

        let response = host.command_ok(&Command::ReadBufferSize).await?;
        let (acl_packet_len, acl_packets) = match response {
            CommandResponse::Complete { ref params, .. } => {
                let mut r = ReadCursor::new(params);
                let len = r.read_u16().map_err(Error::Codec)?;
                let _sco_len = r.read_u8().map_err(Error::Codec)?;
                let acl_packets = r.read_u16().map_err(Error::Codec)?;
                (len as usize, acl_packets as usize)
            }
            _ => return Err(AclError::Acl(Error::InvalidValue)),
        };

        let response = host
            .command_ok(&Command::LeReadLocalSupportedFeatures)
            .await?;
        let le_features = match response {
            CommandResponse::Complete { ref params, .. } => {
                let mut r = ReadCursor::new(params);
                r.read_u64().map_err(Error::Codec)?
            }
            _ => return Err(AclError::Acl(Error::InvalidValue)),
        };

        let response = host
            .command_ok(&Command::ReadDefaultLinkPolicySettings)
            .await?;
        if let CommandResponse::Complete { ref params, .. } = response {
            let mut r = ReadCursor::new(params);
            if let Ok(settings) = r.read_u16() {
                host.inner.default_link_policy.set(settings);
            }
        }

        info!(
            "[acl] controller has {} buffers of {} bytes",
            acl_packets, acl_packet_len
        );
        host.inner.scheduler.set_credits(acl_packets);
        let _ = host.inner.initialized.init(ControllerInfo {
            acl_packet_len,
            le_features,
        });

        loop {
            let request = host.inner.commands.receive().await;
            host.dispatch(request).await?;
        }
    }
}

impl<'d, T: Transport, P: PacketPool> TxRunner<'d, T, P> {
    /// Runs the transmit loop: one PDU per tick, all of its fragments
    /// emitted contiguously, one credit per fragment.
    pub async fn run(&mut self) -> Result<(), AclError<T::Error>> {
        let host = &self.stack.host;
        let info = host.inner.initialized.get().await;
        let fragment_size = info.acl_packet_len;
        loop {
            let (handle, pdu) = host.inner.scheduler.next().await;
            trace!(
                "[acl] sending pdu of {} bytes on {:?}",
                pdu.len(),
                handle
            );
            for fragment in AclFragmenter::new(handle, fragment_size, pdu.as_ref()) {
                host.inner.scheduler.acquire_credit().await;
                host.transport
                    .write_acl(&fragment)
                    .await
                    .map_err(AclError::Transport)?;
            }
        }
    }
}
