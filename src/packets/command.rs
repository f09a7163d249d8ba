//! HCI command builders and the promise-style command response.

use heapless::Vec;

use crate::codec::{Error, WriteCursor};
use crate::param::{
    Address, BdAddr, ConnHandle, DisconnectReason, FlowDirection, KeyFlag, RejectReason, Role,
    ServiceType, Status, TransmitPowerLevelType, WhichClock,
};

pub(crate) mod opcode {
    // Link control (OGF 0x01)
    pub const CREATE_CONNECTION: u16 = 0x0405;
    pub const DISCONNECT: u16 = 0x0406;
    pub const CREATE_CONNECTION_CANCEL: u16 = 0x0408;
    pub const ACCEPT_CONNECTION_REQUEST: u16 = 0x0409;
    pub const REJECT_CONNECTION_REQUEST: u16 = 0x040a;
    pub const CHANGE_CONNECTION_PACKET_TYPE: u16 = 0x040f;
    pub const AUTHENTICATION_REQUESTED: u16 = 0x0411;
    pub const SET_CONNECTION_ENCRYPTION: u16 = 0x0413;
    pub const CHANGE_CONNECTION_LINK_KEY: u16 = 0x0415;
    pub const MASTER_LINK_KEY: u16 = 0x0417;
    pub const READ_REMOTE_SUPPORTED_FEATURES: u16 = 0x041b;
    pub const READ_REMOTE_EXTENDED_FEATURES: u16 = 0x041c;
    pub const READ_REMOTE_VERSION_INFORMATION: u16 = 0x041d;
    pub const READ_CLOCK_OFFSET: u16 = 0x041f;
    // Link policy (OGF 0x02)
    pub const HOLD_MODE: u16 = 0x0801;
    pub const SNIFF_MODE: u16 = 0x0803;
    pub const EXIT_SNIFF_MODE: u16 = 0x0804;
    pub const QOS_SETUP: u16 = 0x0807;
    pub const ROLE_DISCOVERY: u16 = 0x0809;
    pub const SWITCH_ROLE: u16 = 0x080b;
    pub const READ_LINK_POLICY_SETTINGS: u16 = 0x080c;
    pub const WRITE_LINK_POLICY_SETTINGS: u16 = 0x080d;
    pub const READ_DEFAULT_LINK_POLICY_SETTINGS: u16 = 0x080e;
    pub const WRITE_DEFAULT_LINK_POLICY_SETTINGS: u16 = 0x080f;
    pub const FLOW_SPECIFICATION: u16 = 0x0810;
    pub const SNIFF_SUBRATING: u16 = 0x0811;
    // Controller & baseband (OGF 0x03)
    pub const SET_EVENT_MASK: u16 = 0x0c01;
    pub const RESET: u16 = 0x0c03;
    pub const FLUSH: u16 = 0x0c08;
    pub const READ_AUTOMATIC_FLUSH_TIMEOUT: u16 = 0x0c27;
    pub const WRITE_AUTOMATIC_FLUSH_TIMEOUT: u16 = 0x0c28;
    pub const READ_TRANSMIT_POWER_LEVEL: u16 = 0x0c2d;
    pub const READ_LINK_SUPERVISION_TIMEOUT: u16 = 0x0c36;
    pub const WRITE_LINK_SUPERVISION_TIMEOUT: u16 = 0x0c37;
    // Informational (OGF 0x04)
    pub const READ_BUFFER_SIZE: u16 = 0x1005;
    // Status (OGF 0x05)
    pub const READ_FAILED_CONTACT_COUNTER: u16 = 0x1401;
    pub const RESET_FAILED_CONTACT_COUNTER: u16 = 0x1402;
    pub const READ_LINK_QUALITY: u16 = 0x1403;
    pub const READ_RSSI: u16 = 0x1405;
    pub const READ_AFH_CHANNEL_MAP: u16 = 0x1406;
    pub const READ_CLOCK: u16 = 0x1407;
    // LE (OGF 0x08)
    pub const LE_SET_EVENT_MASK: u16 = 0x2001;
    pub const LE_READ_BUFFER_SIZE: u16 = 0x2002;
    pub const LE_READ_LOCAL_SUPPORTED_FEATURES: u16 = 0x2003;
    pub const LE_SET_RANDOM_ADDRESS: u16 = 0x2005;
    pub const LE_CREATE_CONNECTION: u16 = 0x200d;
    pub const LE_CREATE_CONNECTION_CANCEL: u16 = 0x200e;
    pub const LE_CONNECTION_UPDATE: u16 = 0x2013;
    pub const LE_EXTENDED_CREATE_CONNECTION: u16 = 0x2043;
}

/// Parameters of the LE Connection Update command, also used by the legacy
/// and extended create-connection builders.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeConnectionUpdateParams {
    pub conn_interval_min: u16,
    pub conn_interval_max: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
    pub min_ce_length: u16,
    pub max_ce_length: u16,
}

impl LeConnectionUpdateParams {
    /// Range check per the LE Connection Update command definition.
    pub fn is_valid(&self) -> bool {
        let interval = |v: u16| (0x0006..=0x0c80).contains(&v);
        interval(self.conn_interval_min)
            && interval(self.conn_interval_max)
            && self.conn_interval_min <= self.conn_interval_max
            && self.conn_latency <= 0x01f3
            && (0x000a..=0x0c80).contains(&self.supervision_timeout)
    }
}

/// One HCI command, ready to be encoded onto the wire.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    SetEventMask {
        mask: u64,
    },
    LeSetEventMask {
        mask: u64,
    },
    ReadBufferSize,
    LeReadBufferSize,
    LeReadLocalSupportedFeatures,
    LeSetRandomAddress {
        addr: BdAddr,
    },
    ReadDefaultLinkPolicySettings,
    WriteDefaultLinkPolicySettings {
        settings: u16,
    },
    CreateConnection {
        addr: BdAddr,
        packet_type: u16,
        page_scan_repetition_mode: u8,
        clock_offset: u16,
        allow_role_switch: bool,
    },
    CreateConnectionCancel {
        addr: BdAddr,
    },
    AcceptConnectionRequest {
        addr: BdAddr,
        role: Role,
    },
    RejectConnectionRequest {
        addr: BdAddr,
        reason: RejectReason,
    },
    Disconnect {
        handle: ConnHandle,
        reason: DisconnectReason,
    },
    ChangeConnectionPacketType {
        handle: ConnHandle,
        packet_type: u16,
    },
    AuthenticationRequested {
        handle: ConnHandle,
    },
    SetConnectionEncryption {
        handle: ConnHandle,
        enable: bool,
    },
    ChangeConnectionLinkKey {
        handle: ConnHandle,
    },
    MasterLinkKey {
        key_flag: KeyFlag,
    },
    ReadClockOffset {
        handle: ConnHandle,
    },
    HoldMode {
        handle: ConnHandle,
        max_interval: u16,
        min_interval: u16,
    },
    SniffMode {
        handle: ConnHandle,
        max_interval: u16,
        min_interval: u16,
        attempt: u16,
        timeout: u16,
    },
    ExitSniffMode {
        handle: ConnHandle,
    },
    QosSetup {
        handle: ConnHandle,
        service_type: ServiceType,
        token_rate: u32,
        peak_bandwidth: u32,
        latency: u32,
        delay_variation: u32,
    },
    RoleDiscovery {
        handle: ConnHandle,
    },
    SwitchRole {
        addr: BdAddr,
        role: Role,
    },
    ReadLinkPolicySettings {
        handle: ConnHandle,
    },
    WriteLinkPolicySettings {
        handle: ConnHandle,
        settings: u16,
    },
    FlowSpecification {
        handle: ConnHandle,
        flow_direction: FlowDirection,
        service_type: ServiceType,
        token_rate: u32,
        token_bucket_size: u32,
        peak_bandwidth: u32,
        access_latency: u32,
    },
    SniffSubrating {
        handle: ConnHandle,
        maximum_latency: u16,
        minimum_remote_timeout: u16,
        minimum_local_timeout: u16,
    },
    Flush {
        handle: ConnHandle,
    },
    ReadAutomaticFlushTimeout {
        handle: ConnHandle,
    },
    WriteAutomaticFlushTimeout {
        handle: ConnHandle,
        flush_timeout: u16,
    },
    ReadTransmitPowerLevel {
        handle: ConnHandle,
        kind: TransmitPowerLevelType,
    },
    ReadLinkSupervisionTimeout {
        handle: ConnHandle,
    },
    WriteLinkSupervisionTimeout {
        handle: ConnHandle,
        timeout: u16,
    },
    ReadFailedContactCounter {
        handle: ConnHandle,
    },
    ResetFailedContactCounter {
        handle: ConnHandle,
    },
    ReadLinkQuality {
        handle: ConnHandle,
    },
    ReadAfhChannelMap {
        handle: ConnHandle,
    },
    ReadRssi {
        handle: ConnHandle,
    },
    ReadClock {
        handle: ConnHandle,
        which_clock: WhichClock,
    },
    ReadRemoteVersionInformation {
        handle: ConnHandle,
    },
    ReadRemoteSupportedFeatures {
        handle: ConnHandle,
    },
    ReadRemoteExtendedFeatures {
        handle: ConnHandle,
        page_number: u8,
    },
    LeConnectionUpdate {
        handle: ConnHandle,
        params: LeConnectionUpdateParams,
    },
    LeCreateConnection {
        scan_interval: u16,
        scan_window: u16,
        peer: Address,
        own_addr_random: bool,
        params: LeConnectionUpdateParams,
    },
    LeExtendedCreateConnection {
        scan_interval: u16,
        scan_window: u16,
        peer: Address,
        own_addr_random: bool,
        params: LeConnectionUpdateParams,
    },
}

impl Command {
    pub fn opcode(&self) -> u16 {
        use opcode::*;
        match self {
            Command::Reset => RESET,
            Command::SetEventMask { .. } => SET_EVENT_MASK,
            Command::LeSetEventMask { .. } => LE_SET_EVENT_MASK,
            Command::ReadBufferSize => READ_BUFFER_SIZE,
            Command::LeReadBufferSize => LE_READ_BUFFER_SIZE,
            Command::LeReadLocalSupportedFeatures => LE_READ_LOCAL_SUPPORTED_FEATURES,
            Command::LeSetRandomAddress { .. } => LE_SET_RANDOM_ADDRESS,
            Command::ReadDefaultLinkPolicySettings => READ_DEFAULT_LINK_POLICY_SETTINGS,
            Command::WriteDefaultLinkPolicySettings { .. } => WRITE_DEFAULT_LINK_POLICY_SETTINGS,
            Command::CreateConnection { .. } => CREATE_CONNECTION,
            Command::CreateConnectionCancel { .. } => CREATE_CONNECTION_CANCEL,
            Command::AcceptConnectionRequest { .. } => ACCEPT_CONNECTION_REQUEST,
            Command::RejectConnectionRequest { .. } => REJECT_CONNECTION_REQUEST,
            Command::Disconnect { .. } => DISCONNECT,
            Command::ChangeConnectionPacketType { .. } => CHANGE_CONNECTION_PACKET_TYPE,
            Command::AuthenticationRequested { .. } => AUTHENTICATION_REQUESTED,
            Command::SetConnectionEncryption { .. } => SET_CONNECTION_ENCRYPTION,
            Command::ChangeConnectionLinkKey { .. } => CHANGE_CONNECTION_LINK_KEY,
            Command::MasterLinkKey { .. } => MASTER_LINK_KEY,
            Command::ReadClockOffset { .. } => READ_CLOCK_OFFSET,
            Command::HoldMode { .. } => HOLD_MODE,
            Command::SniffMode { .. } => SNIFF_MODE,
            Command::ExitSniffMode { .. } => EXIT_SNIFF_MODE,
            Command::QosSetup { .. } => QOS_SETUP,
            Command::RoleDiscovery { .. } => ROLE_DISCOVERY,
            Command::SwitchRole { .. } => SWITCH_ROLE,
            Command::ReadLinkPolicySettings { .. } => READ_LINK_POLICY_SETTINGS,
            Command::WriteLinkPolicySettings { .. } => WRITE_LINK_POLICY_SETTINGS,
            Command::FlowSpecification { .. } => FLOW_SPECIFICATION,
            Command::SniffSubrating { .. } => SNIFF_SUBRATING,
            Command::Flush { .. } => FLUSH,
            Command::ReadAutomaticFlushTimeout { .. } => READ_AUTOMATIC_FLUSH_TIMEOUT,
            Command::WriteAutomaticFlushTimeout { .. } => WRITE_AUTOMATIC_FLUSH_TIMEOUT,
            Command::ReadTransmitPowerLevel { .. } => READ_TRANSMIT_POWER_LEVEL,
            Command::ReadLinkSupervisionTimeout { .. } => READ_LINK_SUPERVISION_TIMEOUT,
            Command::WriteLinkSupervisionTimeout { .. } => WRITE_LINK_SUPERVISION_TIMEOUT,
            Command::ReadFailedContactCounter { .. } => READ_FAILED_CONTACT_COUNTER,
            Command::ResetFailedContactCounter { .. } => RESET_FAILED_CONTACT_COUNTER,
            Command::ReadLinkQuality { .. } => READ_LINK_QUALITY,
            Command::ReadAfhChannelMap { .. } => READ_AFH_CHANNEL_MAP,
            Command::ReadRssi { .. } => READ_RSSI,
            Command::ReadClock { .. } => READ_CLOCK,
            Command::ReadRemoteVersionInformation { .. } => READ_REMOTE_VERSION_INFORMATION,
            Command::ReadRemoteSupportedFeatures { .. } => READ_REMOTE_SUPPORTED_FEATURES,
            Command::ReadRemoteExtendedFeatures { .. } => READ_REMOTE_EXTENDED_FEATURES,
            Command::LeConnectionUpdate { .. } => LE_CONNECTION_UPDATE,
            Command::LeCreateConnection { .. } => LE_CREATE_CONNECTION,
            Command::LeExtendedCreateConnection { .. } => LE_EXTENDED_CREATE_CONNECTION,
        }
    }

    /// Encodes a full command packet (opcode, parameter length, parameters)
    /// into `dest`, returning the encoded size.
    pub fn write_hci(&self, dest: &mut [u8]) -> Result<usize, Error> {
        if dest.len() < 3 {
            return Err(Error::InsufficientSpace);
        }
        let (header, params) = dest.split_at_mut(3);
        let param_len = {
            let mut w = WriteCursor::new(params);
            self.write_params(&mut w)?;
            w.len()
        };
        let mut w = WriteCursor::new(header);
        w.write_u16(self.opcode())?;
        w.write_u8(param_len as u8)?;
        Ok(3 + param_len)
    }

    fn write_params(&self, w: &mut WriteCursor<'_>) -> Result<(), Error> {
        match *self {
            Command::Reset
            | Command::ReadBufferSize
            | Command::LeReadBufferSize
            | Command::LeReadLocalSupportedFeatures
            | Command::ReadDefaultLinkPolicySettings => {}
            Command::SetEventMask { mask } | Command::LeSetEventMask { mask } => {
                w.write_slice(&mask.to_le_bytes())?;
            }
            Command::LeSetRandomAddress { addr } => {
                w.write_slice(addr.raw())?;
            }
            Command::WriteDefaultLinkPolicySettings { settings } => {
                w.write_u16(settings)?;
            }
            Command::CreateConnection {
                addr,
                packet_type,
                page_scan_repetition_mode,
                clock_offset,
                allow_role_switch,
            } => {
                w.write_slice(addr.raw())?;
                w.write_u16(packet_type)?;
                w.write_u8(page_scan_repetition_mode)?;
                w.write_u8(0)?; // reserved
                w.write_u16(clock_offset)?;
                w.write_u8(allow_role_switch as u8)?;
            }
            Command::CreateConnectionCancel { addr } => {
                w.write_slice(addr.raw())?;
            }
            Command::AcceptConnectionRequest { addr, role } => {
                w.write_slice(addr.raw())?;
                w.write_u8(role as u8)?;
            }
            Command::RejectConnectionRequest { addr, reason } => {
                w.write_slice(addr.raw())?;
                w.write_u8(reason as u8)?;
            }
            Command::Disconnect { handle, reason } => {
                w.write_u16(handle.raw())?;
                w.write_u8(reason as u8)?;
            }
            Command::ChangeConnectionPacketType {
                handle,
                packet_type,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u16(packet_type)?;
            }
            Command::AuthenticationRequested { handle }
            | Command::ChangeConnectionLinkKey { handle }
            | Command::ReadClockOffset { handle }
            | Command::ExitSniffMode { handle }
            | Command::RoleDiscovery { handle }
            | Command::ReadLinkPolicySettings { handle }
            | Command::Flush { handle }
            | Command::ReadAutomaticFlushTimeout { handle }
            | Command::ReadLinkSupervisionTimeout { handle }
            | Command::ReadFailedContactCounter { handle }
            | Command::ResetFailedContactCounter { handle }
            | Command::ReadLinkQuality { handle }
            | Command::ReadAfhChannelMap { handle }
            | Command::ReadRssi { handle }
            | Command::ReadRemoteVersionInformation { handle }
            | Command::ReadRemoteSupportedFeatures { handle } => {
                w.write_u16(handle.raw())?;
            }
            Command::SetConnectionEncryption { handle, enable } => {
                w.write_u16(handle.raw())?;
                w.write_u8(enable as u8)?;
            }
            Command::MasterLinkKey { key_flag } => {
                w.write_u8(key_flag as u8)?;
            }
            Command::HoldMode {
                handle,
                max_interval,
                min_interval,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u16(max_interval)?;
                w.write_u16(min_interval)?;
            }
            Command::SniffMode {
                handle,
                max_interval,
                min_interval,
                attempt,
                timeout,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u16(max_interval)?;
                w.write_u16(min_interval)?;
                w.write_u16(attempt)?;
                w.write_u16(timeout)?;
            }
            Command::QosSetup {
                handle,
                service_type,
                token_rate,
                peak_bandwidth,
                latency,
                delay_variation,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u8(0)?; // flags, reserved
                w.write_u8(service_type as u8)?;
                w.write_u32(token_rate)?;
                w.write_u32(peak_bandwidth)?;
                w.write_u32(latency)?;
                w.write_u32(delay_variation)?;
            }
            Command::SwitchRole { addr, role } => {
                w.write_slice(addr.raw())?;
                w.write_u8(role as u8)?;
            }
            Command::WriteLinkPolicySettings { handle, settings } => {
                w.write_u16(handle.raw())?;
                w.write_u16(settings)?;
            }
            Command::FlowSpecification {
                handle,
                flow_direction,
                service_type,
                token_rate,
                token_bucket_size,
                peak_bandwidth,
                access_latency,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u8(0)?; // flags, reserved
                w.write_u8(flow_direction as u8)?;
                w.write_u8(service_type as u8)?;
                w.write_u32(token_rate)?;
                w.write_u32(token_bucket_size)?;
                w.write_u32(peak_bandwidth)?;
                w.write_u32(access_latency)?;
            }
            Command::SniffSubrating {
                handle,
                maximum_latency,
                minimum_remote_timeout,
                minimum_local_timeout,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u16(maximum_latency)?;
                w.write_u16(minimum_remote_timeout)?;
                w.write_u16(minimum_local_timeout)?;
            }
            Command::WriteAutomaticFlushTimeout {
                handle,
                flush_timeout,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u16(flush_timeout)?;
            }
            Command::ReadTransmitPowerLevel { handle, kind } => {
                w.write_u16(handle.raw())?;
                w.write_u8(kind as u8)?;
            }
            Command::WriteLinkSupervisionTimeout { handle, timeout } => {
                w.write_u16(handle.raw())?;
                w.write_u16(timeout)?;
            }
            Command::ReadClock {
                handle,
                which_clock,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u8(which_clock as u8)?;
            }
            Command::ReadRemoteExtendedFeatures {
                handle,
                page_number,
            } => {
                w.write_u16(handle.raw())?;
                w.write_u8(page_number)?;
            }
            Command::LeConnectionUpdate { handle, params } => {
                w.write_u16(handle.raw())?;
                Self::write_conn_params(w, &params)?;
            }
            Command::LeCreateConnection {
                scan_interval,
                scan_window,
                peer,
                own_addr_random,
                params,
            } => {
                w.write_u16(scan_interval)?;
                w.write_u16(scan_window)?;
                w.write_u8(0)?; // use peer address, no filter list
                w.write_u8(peer.kind as u8)?;
                w.write_slice(peer.addr.raw())?;
                w.write_u8(own_addr_random as u8)?;
                Self::write_conn_params(w, &params)?;
            }
            Command::LeExtendedCreateConnection {
                scan_interval,
                scan_window,
                peer,
                own_addr_random,
                params,
            } => {
                w.write_u8(0)?; // use peer address, no filter list
                w.write_u8(own_addr_random as u8)?;
                w.write_u8(peer.kind as u8)?;
                w.write_slice(peer.addr.raw())?;
                w.write_u8(0x01)?; // initiate on the 1M PHY only
                w.write_u16(scan_interval)?;
                w.write_u16(scan_window)?;
                Self::write_conn_params(w, &params)?;
            }
        }
        Ok(())
    }

    fn write_conn_params(
        w: &mut WriteCursor<'_>,
        params: &LeConnectionUpdateParams,
    ) -> Result<(), Error> {
        w.write_u16(params.conn_interval_min)?;
        w.write_u16(params.conn_interval_max)?;
        w.write_u16(params.conn_latency)?;
        w.write_u16(params.supervision_timeout)?;
        w.write_u16(params.min_ce_length)?;
        w.write_u16(params.max_ce_length)?;
        Ok(())
    }
}

/// Largest command-complete return parameter payload the core consumes
/// (Read AFH Channel Map: handle, mode, 10-byte map).
pub const RETURN_PARAMS_MAX: usize = 16;

/// Resolution of an issued command: either its Command Status, or its
/// Command Complete status plus return parameters (status byte stripped).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    Status(Status),
    Complete {
        status: Status,
        params: Vec<u8, RETURN_PARAMS_MAX>,
    },
}

impl CommandResponse {
    pub fn status(&self) -> Status {
        match self {
            CommandResponse::Status(status) => *status,
            CommandResponse::Complete { status, .. } => *status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_encoding() {
        let cmd = Command::Disconnect {
            handle: ConnHandle::new(0x0042),
            reason: DisconnectReason::RemoteUserTerminatedConn,
        };
        let mut buf = [0u8; 8];
        let len = cmd.write_hci(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[0x06, 0x04, 0x03, 0x42, 0x00, 0x13]);
    }

    #[test]
    fn create_connection_encoding() {
        let cmd = Command::CreateConnection {
            addr: BdAddr::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]),
            packet_type: 0xcc18,
            page_scan_repetition_mode: 0x01,
            clock_offset: 0,
            allow_role_switch: true,
        };
        let mut buf = [0u8; 32];
        let len = cmd.write_hci(&mut buf).unwrap();
        assert_eq!(len, 3 + 13);
        assert_eq!(&buf[..3], &[0x05, 0x04, 13]);
        assert_eq!(&buf[3..9], &[0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        assert_eq!(&buf[9..11], &[0x18, 0xcc]);
        assert_eq!(buf[15], 0x01); // role switch allowed
    }

    #[test]
    fn le_connection_update_param_ranges() {
        let mut params = LeConnectionUpdateParams {
            conn_interval_min: 0x0018,
            conn_interval_max: 0x0028,
            conn_latency: 0x0000,
            supervision_timeout: 0x01f4,
            min_ce_length: 0x0002,
            max_ce_length: 0x0c00,
        };
        assert!(params.is_valid());

        params.conn_interval_min = 0x0005;
        assert!(!params.is_valid());

        params.conn_interval_min = 0x0018;
        params.conn_latency = 0x01f4;
        assert!(!params.is_valid());

        params.conn_latency = 0;
        params.supervision_timeout = 0x0009;
        assert!(!params.is_valid());
    }

    #[test]
    fn parameter_length_is_patched() {
        let cmd = Command::SniffMode {
            handle: ConnHandle::new(1),
            max_interval: 0x0320,
            min_interval: 0x0190,
            attempt: 4,
            timeout: 1,
        };
        let mut buf = [0u8; 16];
        let len = cmd.write_hci(&mut buf).unwrap();
        assert_eq!(buf[2] as usize, len - 3);
        assert_eq!(buf[2], 10);
    }
}
