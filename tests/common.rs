//! In-memory HCI transport for driving the runners in tests.
#![allow(dead_code)]

use core::convert::Infallible;

use acl_host::packets::event::code;
use acl_host::packets::{AclPacket, Command, CommandResponse, ControllerToHostPacket, Event};
use acl_host::param::{BdAddr, ConnHandle, Status};
use acl_host::Transport;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;

const ACL_TAG: u8 = 0x02;
const EVENT_TAG: u8 = 0x04;

pub struct TransportInner {
    /// Packets waiting to be read by the rx runner, H4-tagged.
    inbound: Channel<NoopRawMutex, Vec<u8>, 64>,
    /// Raw ACL packets written by the tx runner.
    acl_out: Channel<NoopRawMutex, Vec<u8>, 64>,
    /// Commands issued by the control runner.
    commands: Channel<NoopRawMutex, Command, 64>,
    /// Controller properties reported during bring-up.
    acl_packet_len: core::cell::Cell<u16>,
    acl_buffers: core::cell::Cell<u16>,
    le_features: core::cell::Cell<u64>,
    /// Status returned for commands that resolve with Command Status.
    command_status: core::cell::Cell<Status>,
}

/// A cheap handle to the shared transport state; one copy goes into the
/// stack, the test keeps another.
#[derive(Clone, Copy)]
pub struct TestTransport {
    inner: &'static TransportInner,
}

pub fn transport() -> TestTransport {
    TestTransport {
        inner: Box::leak(Box::new(TransportInner {
            inbound: Channel::new(),
            acl_out: Channel::new(),
            commands: Channel::new(),
            acl_packet_len: core::cell::Cell::new(27),
            acl_buffers: core::cell::Cell::new(8),
            le_features: core::cell::Cell::new(0),
            command_status: core::cell::Cell::new(Status::SUCCESS),
        })),
    }
}

impl TestTransport {
    /// Controller ACL buffer count reported at bring-up.
    pub fn set_acl_buffers(&self, count: u16) {
        self.inner.acl_buffers.set(count);
    }

    /// Controller max ACL payload reported at bring-up.
    pub fn set_acl_packet_len(&self, len: u16) {
        self.inner.acl_packet_len.set(len);
    }

    /// LE feature mask reported at bring-up.
    pub fn set_le_features(&self, features: u64) {
        self.inner.le_features.set(features);
    }

    /// Status returned for status-type commands from now on.
    pub fn set_command_status(&self, status: Status) {
        self.inner.command_status.set(status);
    }

    pub fn push_event(&self, code: u8, payload: &[u8]) {
        let mut bytes = vec![EVENT_TAG, code, payload.len() as u8];
        bytes.extend_from_slice(payload);
        self.inner.inbound.try_send(bytes).expect("inbound queue full");
    }

    pub fn push_acl(&self, packet: &AclPacket<'_>) {
        let mut buf = [0u8; 512];
        let len = packet.write_hci(&mut buf).unwrap();
        let mut bytes = vec![ACL_TAG];
        bytes.extend_from_slice(&buf[..len]);
        self.inner.inbound.try_send(bytes).expect("inbound queue full");
    }

    /// Next command issued by the host.
    pub async fn next_command(&self) -> Command {
        self.inner.commands.receive().await
    }

    pub fn try_next_command(&self) -> Option<Command> {
        self.inner.commands.try_receive().ok()
    }

    /// Next raw ACL packet written by the host.
    pub async fn next_acl(&self) -> Vec<u8> {
        self.inner.acl_out.receive().await
    }

    pub fn try_next_acl(&self) -> Option<Vec<u8>> {
        self.inner.acl_out.try_receive().ok()
    }

    fn respond(&self, cmd: &Command) -> CommandResponse {
        let complete = |params: &[u8]| CommandResponse::Complete {
            status: Status::SUCCESS,
            params: heapless::Vec::from_slice(params).unwrap(),
        };
        match cmd {
            Command::ReadBufferSize => {
                let len = self.inner.acl_packet_len.get().to_le_bytes();
                let count = self.inner.acl_buffers.get().to_le_bytes();
                complete(&[len[0], len[1], 0x40, count[0], count[1], 0x00, 0x00])
            }
            Command::LeReadLocalSupportedFeatures => {
                complete(&self.inner.le_features.get().to_le_bytes())
            }
            Command::ReadDefaultLinkPolicySettings => complete(&[0x07, 0x00]),
            Command::RoleDiscovery { handle } => {
                let h = handle.raw().to_le_bytes();
                complete(&[h[0], h[1], 0x00])
            }
            Command::ReadRssi { handle } => {
                let h = handle.raw().to_le_bytes();
                complete(&[h[0], h[1], 0xc8])
            }
            // Commands resolved by a later event.
            Command::CreateConnection { .. }
            | Command::CreateConnectionCancel { .. }
            | Command::AcceptConnectionRequest { .. }
            | Command::RejectConnectionRequest { .. }
            | Command::Disconnect { .. }
            | Command::ChangeConnectionPacketType { .. }
            | Command::AuthenticationRequested { .. }
            | Command::SetConnectionEncryption { .. }
            | Command::ChangeConnectionLinkKey { .. }
            | Command::MasterLinkKey { .. }
            | Command::ReadClockOffset { .. }
            | Command::HoldMode { .. }
            | Command::SniffMode { .. }
            | Command::ExitSniffMode { .. }
            | Command::QosSetup { .. }
            | Command::SwitchRole { .. }
            | Command::FlowSpecification { .. }
            | Command::ReadRemoteVersionInformation { .. }
            | Command::ReadRemoteSupportedFeatures { .. }
            | Command::ReadRemoteExtendedFeatures { .. }
            | Command::LeConnectionUpdate { .. }
            | Command::LeCreateConnection { .. }
            | Command::LeExtendedCreateConnection { .. } => {
                CommandResponse::Status(self.inner.command_status.get())
            }
            _ => complete(&[]),
        }
    }
}

impl embedded_io::ErrorType for TestTransport {
    type Error = Infallible;
}

impl Transport for TestTransport {
    async fn read<'a>(
        &self,
        buf: &'a mut [u8],
    ) -> Result<ControllerToHostPacket<'a>, Self::Error> {
        let msg = self.inner.inbound.receive().await;
        let n = msg.len() - 1;
        buf[..n].copy_from_slice(&msg[1..]);
        let data = &buf[..n];
        Ok(match msg[0] {
            ACL_TAG => ControllerToHostPacket::Acl(AclPacket::from_hci_bytes(data).unwrap()),
            _ => ControllerToHostPacket::Event(Event::from_hci_bytes(data).unwrap()),
        })
    }

    async fn write_acl(&self, packet: &AclPacket<'_>) -> Result<(), Self::Error> {
        let mut buf = [0u8; 512];
        let len = packet.write_hci(&mut buf).unwrap();
        self.inner
            .acl_out
            .try_send(buf[..len].to_vec())
            .expect("acl out queue full");
        Ok(())
    }

    async fn command(&self, cmd: &Command) -> Result<CommandResponse, Self::Error> {
        let response = self.respond(cmd);
        self.inner
            .commands
            .try_send(cmd.clone())
            .expect("command queue full");
        Ok(response)
    }
}

// ==== event payload builders ====

pub fn connection_complete(status: Status, handle: ConnHandle, addr: BdAddr) -> (u8, Vec<u8>) {
    let mut p = vec![status.raw()];
    p.extend_from_slice(&handle.raw().to_le_bytes());
    p.extend_from_slice(addr.raw());
    p.push(0x01); // ACL
    p.push(0x00); // encryption off
    (code::CONNECTION_COMPLETE, p)
}

pub fn connection_request(addr: BdAddr) -> (u8, Vec<u8>) {
    let mut p = Vec::new();
    p.extend_from_slice(addr.raw());
    p.extend_from_slice(&[0x04, 0x01, 0x00]); // class of device
    p.push(0x01); // ACL
    (code::CONNECTION_REQUEST, p)
}

pub fn disconnection_complete(handle: ConnHandle, reason: Status) -> (u8, Vec<u8>) {
    let mut p = vec![Status::SUCCESS.raw()];
    p.extend_from_slice(&handle.raw().to_le_bytes());
    p.push(reason.raw());
    (code::DISCONNECTION_COMPLETE, p)
}

pub fn number_of_completed_packets(handle: ConnHandle, completed: u16) -> (u8, Vec<u8>) {
    let mut p = vec![0x01];
    p.extend_from_slice(&handle.raw().to_le_bytes());
    p.extend_from_slice(&completed.to_le_bytes());
    (code::NUMBER_OF_COMPLETED_PACKETS, p)
}

pub fn mode_change(handle: ConnHandle, mode: u8, interval: u16) -> (u8, Vec<u8>) {
    let mut p = vec![Status::SUCCESS.raw()];
    p.extend_from_slice(&handle.raw().to_le_bytes());
    p.push(mode);
    p.extend_from_slice(&interval.to_le_bytes());
    (code::MODE_CHANGE, p)
}

pub fn le_connection_complete(status: Status, handle: ConnHandle, addr: BdAddr) -> (u8, Vec<u8>) {
    let mut p = vec![0x01, status.raw()];
    p.extend_from_slice(&handle.raw().to_le_bytes());
    p.push(0x00); // central
    p.push(0x01); // random address
    p.extend_from_slice(addr.raw());
    p.extend_from_slice(&[0x18, 0x00, 0x00, 0x00, 0xf4, 0x01]);
    (code::LE_META, p)
}

pub fn le_connection_update_complete(status: Status, handle: ConnHandle) -> (u8, Vec<u8>) {
    let mut p = vec![0x03, status.raw()];
    p.extend_from_slice(&handle.raw().to_le_bytes());
    p.extend_from_slice(&[0x18, 0x00, 0x00, 0x00, 0xf4, 0x01]);
    (code::LE_META, p)
}

/// L2CAP basic frame bytes: length, channel id, payload.
pub fn l2cap_frame(cid: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&cid.to_le_bytes());
    out.extend_from_slice(payload);
    out
}
