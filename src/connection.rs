//! Per-connection facade handed to the upper layer.

use core::future::poll_fn;

use crate::host::{ControlRequest, Inner};
use crate::packet_pool::PacketPool;
use crate::packets::command::{Command, LeConnectionUpdateParams};
use crate::param::{
    Address, ConnHandle, DisconnectReason, FlowDirection, LinkKind, Mode, Role, ServiceType,
    Status, TransmitPowerLevelType, WhichClock,
};
use crate::pdu::Pdu;
use crate::Error;

/// Management events delivered to the upper layer of a connection.
///
/// Results of per-handle commands arrive here; so does the one-shot
/// [`Disconnected`](ConnectionEvent::Disconnected) notification.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The link went down. Delivered exactly once per connection.
    Disconnected { reason: Status },
    ConnectionPacketTypeChanged { packet_type: u16 },
    AuthenticationComplete,
    EncryptionChange { enabled: bool },
    ChangeConnectionLinkKeyComplete,
    MasterLinkKeyComplete { key_flag: u8 },
    ReadClockOffsetComplete { clock_offset: u16 },
    ModeChange { mode: Mode, interval: u16 },
    QosSetupComplete {
        service_type: ServiceType,
        token_rate: u32,
        peak_bandwidth: u32,
        latency: u32,
        delay_variation: u32,
    },
    RoleChange { role: Role },
    FlowSpecificationComplete {
        flow_direction: FlowDirection,
        service_type: ServiceType,
        token_rate: u32,
        token_bucket_size: u32,
        peak_bandwidth: u32,
        access_latency: u32,
    },
    FlushOccurred,
    RoleDiscoveryComplete { role: Role },
    ReadLinkPolicySettingsComplete { settings: u16 },
    ReadAutomaticFlushTimeoutComplete { flush_timeout: u16 },
    ReadTransmitPowerLevelComplete { power_level: i8 },
    ReadLinkSupervisionTimeoutComplete { timeout: u16 },
    LinkSupervisionTimeoutChanged { timeout: u16 },
    ReadFailedContactCounterComplete { counter: u16 },
    ReadLinkQualityComplete { quality: u8 },
    ReadAfhChannelMapComplete { mode: u8, map: [u8; 10] },
    ReadRssiComplete { rssi: i8 },
    ReadClockComplete { clock: u32, accuracy: u16 },
    ReadRemoteVersionInformationComplete {
        version: u8,
        manufacturer_name: u16,
        subversion: u16,
    },
    ReadRemoteSupportedFeaturesComplete { features: u64 },
    ReadRemoteExtendedFeaturesComplete {
        page_number: u8,
        max_page_number: u8,
        features: u64,
    },
}

/// Handle-bound facade over one ACL connection.
///
/// The facade owns no connection state; every call passes the connection
/// handle back into the manager. It is the upper end of the per-connection
/// bidirectional queue: [`send`](Connection::send) feeds the round-robin
/// scheduler, [`receive`](Connection::receive) drains reassembled PDUs.
pub struct Connection<'d, P: PacketPool> {
    handle: ConnHandle,
    inner: &'d Inner<'d, P>,
}

impl<'d, P: PacketPool> Connection<'d, P> {
    pub(crate) fn new(handle: ConnHandle, inner: &'d Inner<'d, P>) -> Self {
        Self { handle, inner }
    }

    pub fn handle(&self) -> ConnHandle {
        self.handle
    }

    pub fn peer_address(&self) -> Option<Address> {
        self.inner.connections.peer_address(self.handle)
    }

    pub fn role(&self) -> Option<Role> {
        self.inner.connections.role(self.handle)
    }

    pub fn kind(&self) -> Option<LinkKind> {
        self.inner.connections.kind(self.handle)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connections.is_connected(self.handle)
    }

    /// Reason reported by Disconnection Complete, once disconnected.
    pub fn disconnect_reason(&self) -> Option<Status> {
        self.inner.connections.disconnect_reason(self.handle)
    }

    // ==== data path ====

    /// Enqueues one L2CAP PDU for transmission, waiting for queue room.
    pub async fn send(&self, pdu: Pdu<P::Packet>) -> Result<(), Error> {
        self.inner.scheduler.send(self.handle, pdu).await
    }

    /// Enqueues one L2CAP PDU for transmission without waiting.
    pub fn try_send(&self, pdu: Pdu<P::Packet>) -> Result<(), Error> {
        self.inner.scheduler.try_send(self.handle, pdu)
    }

    /// Next reassembled inbound PDU, in arrival order. PDUs queued before a
    /// disconnection remain receivable afterwards.
    pub async fn receive(&self) -> Pdu<P::Packet> {
        poll_fn(|cx| self.inner.connections.poll_receive(self.handle, cx)).await
    }

    pub fn try_receive(&self) -> Result<Pdu<P::Packet>, Error> {
        self.inner.connections.try_receive(self.handle)
    }

    /// Next management event for this connection.
    pub async fn next_event(&self) -> ConnectionEvent {
        poll_fn(|cx| self.inner.connections.poll_next_event(self.handle, Some(cx))).await
    }

    // ==== command surface ====
    //
    // Uniform contract: the handle must be live, otherwise the call returns
    // synchronously without issuing anything. Results arrive as
    // `ConnectionEvent`s; non-success statuses are logged by the control
    // runner.

    fn request(&self, cmd: Command) -> Result<(), Error> {
        if !self.inner.connections.is_connected(self.handle) {
            info!("[acl] {:?} already disconnected", self.handle);
            return Err(Error::Disconnected);
        }
        self.inner
            .commands
            .try_send(ControlRequest::Command(cmd))
            .map_err(|_| Error::Busy)
    }

    fn request_classic(&self, cmd: Command) -> Result<(), Error> {
        if self.kind() != Some(LinkKind::Classic) {
            return Err(Error::InvalidState);
        }
        self.request(cmd)
    }

    pub fn disconnect(&self, reason: DisconnectReason) -> Result<(), Error> {
        self.request(Command::Disconnect {
            handle: self.handle,
            reason,
        })
    }

    pub fn change_connection_packet_type(&self, packet_type: u16) -> Result<(), Error> {
        self.request_classic(Command::ChangeConnectionPacketType {
            handle: self.handle,
            packet_type,
        })
    }

    pub fn authentication_requested(&self) -> Result<(), Error> {
        self.request_classic(Command::AuthenticationRequested {
            handle: self.handle,
        })
    }

    pub fn set_connection_encryption(&self, enable: bool) -> Result<(), Error> {
        self.request_classic(Command::SetConnectionEncryption {
            handle: self.handle,
            enable,
        })
    }

    pub fn change_connection_link_key(&self) -> Result<(), Error> {
        self.request_classic(Command::ChangeConnectionLinkKey {
            handle: self.handle,
        })
    }

    pub fn read_clock_offset(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadClockOffset {
            handle: self.handle,
        })
    }

    pub fn hold_mode(&self, max_interval: u16, min_interval: u16) -> Result<(), Error> {
        self.request_classic(Command::HoldMode {
            handle: self.handle,
            max_interval,
            min_interval,
        })
    }

    pub fn sniff_mode(
        &self,
        max_interval: u16,
        min_interval: u16,
        attempt: u16,
        timeout: u16,
    ) -> Result<(), Error> {
        self.request_classic(Command::SniffMode {
            handle: self.handle,
            max_interval,
            min_interval,
            attempt,
            timeout,
        })
    }

    pub fn exit_sniff_mode(&self) -> Result<(), Error> {
        self.request_classic(Command::ExitSniffMode {
            handle: self.handle,
        })
    }

    pub fn qos_setup(
        &self,
        service_type: ServiceType,
        token_rate: u32,
        peak_bandwidth: u32,
        latency: u32,
        delay_variation: u32,
    ) -> Result<(), Error> {
        self.request_classic(Command::QosSetup {
            handle: self.handle,
            service_type,
            token_rate,
            peak_bandwidth,
            latency,
            delay_variation,
        })
    }

    pub fn role_discovery(&self) -> Result<(), Error> {
        self.request_classic(Command::RoleDiscovery {
            handle: self.handle,
        })
    }

    pub fn read_link_policy_settings(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadLinkPolicySettings {
            handle: self.handle,
        })
    }

    pub fn write_link_policy_settings(&self, settings: u16) -> Result<(), Error> {
        self.request_classic(Command::WriteLinkPolicySettings {
            handle: self.handle,
            settings,
        })
    }

    pub fn flow_specification(
        &self,
        flow_direction: FlowDirection,
        service_type: ServiceType,
        token_rate: u32,
        token_bucket_size: u32,
        peak_bandwidth: u32,
        access_latency: u32,
    ) -> Result<(), Error> {
        self.request_classic(Command::FlowSpecification {
            handle: self.handle,
            flow_direction,
            service_type,
            token_rate,
            token_bucket_size,
            peak_bandwidth,
            access_latency,
        })
    }

    pub fn sniff_subrating(
        &self,
        maximum_latency: u16,
        minimum_remote_timeout: u16,
        minimum_local_timeout: u16,
    ) -> Result<(), Error> {
        self.request_classic(Command::SniffSubrating {
            handle: self.handle,
            maximum_latency,
            minimum_remote_timeout,
            minimum_local_timeout,
        })
    }

    pub fn flush(&self) -> Result<(), Error> {
        self.request_classic(Command::Flush {
            handle: self.handle,
        })
    }

    pub fn read_automatic_flush_timeout(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadAutomaticFlushTimeout {
            handle: self.handle,
        })
    }

    pub fn write_automatic_flush_timeout(&self, flush_timeout: u16) -> Result<(), Error> {
        self.request_classic(Command::WriteAutomaticFlushTimeout {
            handle: self.handle,
            flush_timeout,
        })
    }

    pub fn read_transmit_power_level(&self, kind: TransmitPowerLevelType) -> Result<(), Error> {
        self.request(Command::ReadTransmitPowerLevel {
            handle: self.handle,
            kind,
        })
    }

    pub fn read_link_supervision_timeout(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadLinkSupervisionTimeout {
            handle: self.handle,
        })
    }

    pub fn write_link_supervision_timeout(&self, timeout: u16) -> Result<(), Error> {
        self.request_classic(Command::WriteLinkSupervisionTimeout {
            handle: self.handle,
            timeout,
        })
    }

    pub fn read_failed_contact_counter(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadFailedContactCounter {
            handle: self.handle,
        })
    }

    pub fn reset_failed_contact_counter(&self) -> Result<(), Error> {
        self.request_classic(Command::ResetFailedContactCounter {
            handle: self.handle,
        })
    }

    pub fn read_link_quality(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadLinkQuality {
            handle: self.handle,
        })
    }

    pub fn read_afh_channel_map(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadAfhChannelMap {
            handle: self.handle,
        })
    }

    pub fn read_rssi(&self) -> Result<(), Error> {
        self.request(Command::ReadRssi {
            handle: self.handle,
        })
    }

    pub fn read_clock(&self, which_clock: WhichClock) -> Result<(), Error> {
        self.request_classic(Command::ReadClock {
            handle: self.handle,
            which_clock,
        })
    }

    pub fn read_remote_version_information(&self) -> Result<(), Error> {
        self.request(Command::ReadRemoteVersionInformation {
            handle: self.handle,
        })
    }

    pub fn read_remote_supported_features(&self) -> Result<(), Error> {
        self.request_classic(Command::ReadRemoteSupportedFeatures {
            handle: self.handle,
        })
    }

    pub fn read_remote_extended_features(&self, page_number: u8) -> Result<(), Error> {
        self.request_classic(Command::ReadRemoteExtendedFeatures {
            handle: self.handle,
            page_number,
        })
    }

    /// Requests an LE connection parameter update and resolves with the
    /// status of the matching LE Connection Update Complete event.
    ///
    /// Parameters are validated synchronously; at most one update may be
    /// pending per connection.
    pub async fn le_connection_update(
        &self,
        params: &LeConnectionUpdateParams,
    ) -> Result<Status, Error> {
        if self.kind() != Some(LinkKind::Le) {
            return Err(Error::InvalidState);
        }
        if !params.is_valid() {
            error!("[acl] invalid connection update parameters on {:?}", self.handle);
            return Err(Error::InvalidValue);
        }
        self.inner.connections.begin_le_update(self.handle)?;
        if let Err(e) = self.request(Command::LeConnectionUpdate {
            handle: self.handle,
            params: *params,
        }) {
            self.inner.connections.abort_le_update(self.handle);
            return Err(e);
        }
        poll_fn(|cx| {
            self.inner
                .connections
                .poll_le_update_result(self.handle, Some(cx))
        })
        .await
    }

    /// Releases the connection record. Must only be called after the
    /// connection has disconnected; the scheduler registration is removed
    /// and the handle becomes invalid.
    pub fn finish(self) {
        if self.inner.connections.finish(self.handle).is_ok() {
            self.inner.scheduler.unregister(self.handle);
        }
    }
}
