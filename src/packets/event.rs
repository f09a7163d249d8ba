//! Typed views over HCI event packets.
//!
//! Only the events the ACL core subscribes to get a typed decode; anything
//! else surfaces as [`Event::Unknown`] and is ignored by the runners.

use crate::codec::{Error, ReadCursor};
use crate::param::{
    AddrKind, BdAddr, ClassOfDevice, ConnHandle, FlowDirection, LinkType, Mode, Role, ServiceType,
    Status,
};

/// HCI event codes the core subscribes to.
pub mod code {
    pub const CONNECTION_COMPLETE: u8 = 0x03;
    pub const CONNECTION_REQUEST: u8 = 0x04;
    pub const DISCONNECTION_COMPLETE: u8 = 0x05;
    pub const AUTHENTICATION_COMPLETE: u8 = 0x06;
    pub const ENCRYPTION_CHANGE: u8 = 0x08;
    pub const CHANGE_CONNECTION_LINK_KEY_COMPLETE: u8 = 0x09;
    pub const MASTER_LINK_KEY_COMPLETE: u8 = 0x0a;
    pub const READ_REMOTE_SUPPORTED_FEATURES_COMPLETE: u8 = 0x0b;
    pub const READ_REMOTE_VERSION_INFORMATION_COMPLETE: u8 = 0x0c;
    pub const QOS_SETUP_COMPLETE: u8 = 0x0d;
    pub const COMMAND_COMPLETE: u8 = 0x0e;
    pub const COMMAND_STATUS: u8 = 0x0f;
    pub const FLUSH_OCCURRED: u8 = 0x11;
    pub const ROLE_CHANGE: u8 = 0x12;
    pub const NUMBER_OF_COMPLETED_PACKETS: u8 = 0x13;
    pub const MODE_CHANGE: u8 = 0x14;
    pub const READ_CLOCK_OFFSET_COMPLETE: u8 = 0x1c;
    pub const CONNECTION_PACKET_TYPE_CHANGED: u8 = 0x1d;
    pub const FLOW_SPECIFICATION_COMPLETE: u8 = 0x21;
    pub const READ_REMOTE_EXTENDED_FEATURES_COMPLETE: u8 = 0x23;
    pub const LINK_SUPERVISION_TIMEOUT_CHANGED: u8 = 0x38;
    pub const LE_META: u8 = 0x3e;
}

/// LE meta subevent codes the core subscribes to.
pub mod subevent {
    pub const CONNECTION_COMPLETE: u8 = 0x01;
    pub const CONNECTION_UPDATE_COMPLETE: u8 = 0x03;
    pub const ENHANCED_CONNECTION_COMPLETE: u8 = 0x0a;
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ConnectionComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub bd_addr: BdAddr,
    pub link_type: LinkType,
    pub encryption_enabled: bool,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRequest {
    pub bd_addr: BdAddr,
    pub class_of_device: ClassOfDevice,
    pub link_type: LinkType,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct DisconnectionComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub reason: Status,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationComplete {
    pub status: Status,
    pub handle: ConnHandle,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct EncryptionChange {
    pub status: Status,
    pub handle: ConnHandle,
    pub enabled: bool,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ChangeConnectionLinkKeyComplete {
    pub status: Status,
    pub handle: ConnHandle,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct MasterLinkKeyComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub key_flag: u8,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ReadRemoteSupportedFeaturesComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub features: u64,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ReadRemoteExtendedFeaturesComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub page_number: u8,
    pub max_page_number: u8,
    pub features: u64,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ReadRemoteVersionInformationComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub version: u8,
    pub manufacturer_name: u16,
    pub subversion: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct QosSetupComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub service_type: ServiceType,
    pub token_rate: u32,
    pub peak_bandwidth: u32,
    pub latency: u32,
    pub delay_variation: u32,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct CommandCompleteEvent<'d> {
    pub num_hci_command_packets: u8,
    pub opcode: u16,
    pub return_params: &'d [u8],
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct CommandStatusEvent {
    pub status: Status,
    pub num_hci_command_packets: u8,
    pub opcode: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct FlushOccurred {
    pub handle: ConnHandle,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct RoleChange {
    pub status: Status,
    pub bd_addr: BdAddr,
    pub role: Role,
}

/// Borrowed view over the variable-length completed-packets list.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct NumberOfCompletedPackets<'d> {
    entries: &'d [u8],
}

impl<'d> NumberOfCompletedPackets<'d> {
    pub fn iter(&self) -> impl Iterator<Item = (ConnHandle, u16)> + 'd {
        self.entries.chunks_exact(4).map(|c| {
            (
                ConnHandle::new(u16::from_le_bytes([c[0], c[1]])),
                u16::from_le_bytes([c[2], c[3]]),
            )
        })
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ModeChange {
    pub status: Status,
    pub handle: ConnHandle,
    pub current_mode: Mode,
    pub interval: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ReadClockOffsetComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub clock_offset: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ConnectionPacketTypeChanged {
    pub status: Status,
    pub handle: ConnHandle,
    pub packet_type: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct FlowSpecificationComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub flow_direction: FlowDirection,
    pub service_type: ServiceType,
    pub token_rate: u32,
    pub token_bucket_size: u32,
    pub peak_bandwidth: u32,
    pub access_latency: u32,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct LinkSupervisionTimeoutChanged {
    pub handle: ConnHandle,
    pub timeout: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct LeConnectionComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub role: Role,
    pub peer_addr_kind: AddrKind,
    pub peer_addr: BdAddr,
    pub conn_interval: u16,
    pub peripheral_latency: u16,
    pub supervision_timeout: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct LeEnhancedConnectionComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub role: Role,
    pub peer_addr_kind: AddrKind,
    pub peer_addr: BdAddr,
    pub local_resolvable_addr: BdAddr,
    pub peer_resolvable_addr: BdAddr,
    pub conn_interval: u16,
    pub peripheral_latency: u16,
    pub supervision_timeout: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct LeConnectionUpdateComplete {
    pub status: Status,
    pub handle: ConnHandle,
    pub conn_interval: u16,
    pub peripheral_latency: u16,
    pub supervision_timeout: u16,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub enum LeEvent {
    ConnectionComplete(LeConnectionComplete),
    EnhancedConnectionComplete(LeEnhancedConnectionComplete),
    ConnectionUpdateComplete(LeConnectionUpdateComplete),
    Unknown { subevent: u8 },
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub enum Event<'d> {
    ConnectionComplete(ConnectionComplete),
    ConnectionRequest(ConnectionRequest),
    DisconnectionComplete(DisconnectionComplete),
    AuthenticationComplete(AuthenticationComplete),
    EncryptionChange(EncryptionChange),
    ChangeConnectionLinkKeyComplete(ChangeConnectionLinkKeyComplete),
    MasterLinkKeyComplete(MasterLinkKeyComplete),
    ReadRemoteSupportedFeaturesComplete(ReadRemoteSupportedFeaturesComplete),
    ReadRemoteExtendedFeaturesComplete(ReadRemoteExtendedFeaturesComplete),
    ReadRemoteVersionInformationComplete(ReadRemoteVersionInformationComplete),
    QosSetupComplete(QosSetupComplete),
    CommandComplete(CommandCompleteEvent<'d>),
    CommandStatus(CommandStatusEvent),
    FlushOccurred(FlushOccurred),
    RoleChange(RoleChange),
    NumberOfCompletedPackets(NumberOfCompletedPackets<'d>),
    ModeChange(ModeChange),
    ReadClockOffsetComplete(ReadClockOffsetComplete),
    ConnectionPacketTypeChanged(ConnectionPacketTypeChanged),
    FlowSpecificationComplete(FlowSpecificationComplete),
    LinkSupervisionTimeoutChanged(LinkSupervisionTimeoutChanged),
    Le(LeEvent),
    Unknown { code: u8 },
}

impl<'d> Event<'d> {
    /// Decodes a full event packet (code, length, payload).
    pub fn from_hci_bytes(data: &'d [u8]) -> Result<Self, Error> {
        let mut r = ReadCursor::new(data);
        let code = r.read_u8()?;
        let len = r.read_u8()? as usize;
        let payload = r.read_slice(len)?;
        Self::parse(code, payload)
    }

    /// Decodes the payload of an event with the given event code.
    pub fn parse(code: u8, payload: &'d [u8]) -> Result<Self, Error> {
        let mut r = ReadCursor::new(payload);
        let event = match code {
            code::CONNECTION_COMPLETE => Event::ConnectionComplete(ConnectionComplete {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
                bd_addr: BdAddr::new(r.read_array()?),
                link_type: LinkType::from_raw(r.read_u8()?)?,
                encryption_enabled: r.read_u8()? != 0,
            }),
            code::CONNECTION_REQUEST => Event::ConnectionRequest(ConnectionRequest {
                bd_addr: BdAddr::new(r.read_array()?),
                class_of_device: ClassOfDevice(r.read_array()?),
                link_type: LinkType::from_raw(r.read_u8()?)?,
            }),
            code::DISCONNECTION_COMPLETE => Event::DisconnectionComplete(DisconnectionComplete {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
                reason: Status::from_raw(r.read_u8()?),
            }),
            code::AUTHENTICATION_COMPLETE => Event::AuthenticationComplete(AuthenticationComplete {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
            }),
            code::ENCRYPTION_CHANGE => Event::EncryptionChange(EncryptionChange {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
                enabled: r.read_u8()? != 0,
            }),
            code::CHANGE_CONNECTION_LINK_KEY_COMPLETE => {
                Event::ChangeConnectionLinkKeyComplete(ChangeConnectionLinkKeyComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                })
            }
            code::MASTER_LINK_KEY_COMPLETE => Event::MasterLinkKeyComplete(MasterLinkKeyComplete {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
                key_flag: r.read_u8()?,
            }),
            code::READ_REMOTE_SUPPORTED_FEATURES_COMPLETE => {
                Event::ReadRemoteSupportedFeaturesComplete(ReadRemoteSupportedFeaturesComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    features: r.read_u64()?,
                })
            }
            code::READ_REMOTE_EXTENDED_FEATURES_COMPLETE => {
                Event::ReadRemoteExtendedFeaturesComplete(ReadRemoteExtendedFeaturesComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    page_number: r.read_u8()?,
                    max_page_number: r.read_u8()?,
                    features: r.read_u64()?,
                })
            }
            code::READ_REMOTE_VERSION_INFORMATION_COMPLETE => {
                Event::ReadRemoteVersionInformationComplete(ReadRemoteVersionInformationComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    version: r.read_u8()?,
                    manufacturer_name: r.read_u16()?,
                    subversion: r.read_u16()?,
                })
            }
            code::QOS_SETUP_COMPLETE => {
                let status = Status::from_raw(r.read_u8()?);
                let handle = ConnHandle::new(r.read_u16()?);
                let _flags = r.read_u8()?;
                Event::QosSetupComplete(QosSetupComplete {
                    status,
                    handle,
                    service_type: ServiceType::from_raw(r.read_u8()?)?,
                    token_rate: r.read_u32()?,
                    peak_bandwidth: r.read_u32()?,
                    latency: r.read_u32()?,
                    delay_variation: r.read_u32()?,
                })
            }
            code::COMMAND_COMPLETE => Event::CommandComplete(CommandCompleteEvent {
                num_hci_command_packets: r.read_u8()?,
                opcode: r.read_u16()?,
                return_params: r.read_slice(r.remaining())?,
            }),
            code::COMMAND_STATUS => Event::CommandStatus(CommandStatusEvent {
                status: Status::from_raw(r.read_u8()?),
                num_hci_command_packets: r.read_u8()?,
                opcode: r.read_u16()?,
            }),
            code::FLUSH_OCCURRED => Event::FlushOccurred(FlushOccurred {
                handle: ConnHandle::new(r.read_u16()?),
            }),
            code::ROLE_CHANGE => Event::RoleChange(RoleChange {
                status: Status::from_raw(r.read_u8()?),
                bd_addr: BdAddr::new(r.read_array()?),
                role: Role::from_raw(r.read_u8()?)?,
            }),
            code::NUMBER_OF_COMPLETED_PACKETS => {
                let count = r.read_u8()? as usize;
                let entries = r.read_slice(count * 4)?;
                Event::NumberOfCompletedPackets(NumberOfCompletedPackets { entries })
            }
            code::MODE_CHANGE => Event::ModeChange(ModeChange {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
                current_mode: Mode::from_raw(r.read_u8()?)?,
                interval: r.read_u16()?,
            }),
            code::READ_CLOCK_OFFSET_COMPLETE => {
                Event::ReadClockOffsetComplete(ReadClockOffsetComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    clock_offset: r.read_u16()?,
                })
            }
            code::CONNECTION_PACKET_TYPE_CHANGED => {
                Event::ConnectionPacketTypeChanged(ConnectionPacketTypeChanged {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    packet_type: r.read_u16()?,
                })
            }
            code::FLOW_SPECIFICATION_COMPLETE => {
                let status = Status::from_raw(r.read_u8()?);
                let handle = ConnHandle::new(r.read_u16()?);
                let _flags = r.read_u8()?;
                Event::FlowSpecificationComplete(FlowSpecificationComplete {
                    status,
                    handle,
                    flow_direction: FlowDirection::from_raw(r.read_u8()?)?,
                    service_type: ServiceType::from_raw(r.read_u8()?)?,
                    token_rate: r.read_u32()?,
                    token_bucket_size: r.read_u32()?,
                    peak_bandwidth: r.read_u32()?,
                    access_latency: r.read_u32()?,
                })
            }
            code::LINK_SUPERVISION_TIMEOUT_CHANGED => {
                Event::LinkSupervisionTimeoutChanged(LinkSupervisionTimeoutChanged {
                    handle: ConnHandle::new(r.read_u16()?),
                    timeout: r.read_u16()?,
                })
            }
            code::LE_META => Event::Le(Self::parse_le(&mut r)?),
            other => Event::Unknown { code: other },
        };
        Ok(event)
    }

    fn parse_le(r: &mut ReadCursor<'d>) -> Result<LeEvent, Error> {
        let sub = r.read_u8()?;
        Ok(match sub {
            subevent::CONNECTION_COMPLETE => LeEvent::ConnectionComplete(LeConnectionComplete {
                status: Status::from_raw(r.read_u8()?),
                handle: ConnHandle::new(r.read_u16()?),
                role: Role::from_raw(r.read_u8()?)?,
                peer_addr_kind: AddrKind::from_raw(r.read_u8()?)?,
                peer_addr: BdAddr::new(r.read_array()?),
                conn_interval: r.read_u16()?,
                peripheral_latency: r.read_u16()?,
                supervision_timeout: r.read_u16()?,
            }),
            subevent::ENHANCED_CONNECTION_COMPLETE => {
                LeEvent::EnhancedConnectionComplete(LeEnhancedConnectionComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    role: Role::from_raw(r.read_u8()?)?,
                    peer_addr_kind: AddrKind::from_raw(r.read_u8()?)?,
                    peer_addr: BdAddr::new(r.read_array()?),
                    local_resolvable_addr: BdAddr::new(r.read_array()?),
                    peer_resolvable_addr: BdAddr::new(r.read_array()?),
                    conn_interval: r.read_u16()?,
                    peripheral_latency: r.read_u16()?,
                    supervision_timeout: r.read_u16()?,
                })
            }
            subevent::CONNECTION_UPDATE_COMPLETE => {
                LeEvent::ConnectionUpdateComplete(LeConnectionUpdateComplete {
                    status: Status::from_raw(r.read_u8()?),
                    handle: ConnHandle::new(r.read_u16()?),
                    conn_interval: r.read_u16()?,
                    peripheral_latency: r.read_u16()?,
                    supervision_timeout: r.read_u16()?,
                })
            }
            other => LeEvent::Unknown { subevent: other },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connection_complete() {
        let payload = [
            0x00, // status
            0x42, 0x00, // handle
            0x55, 0x44, 0x33, 0x22, 0x11, 0x00, // bd_addr
            0x01, // acl
            0x00, // encryption off
        ];
        let Ok(Event::ConnectionComplete(e)) = Event::parse(code::CONNECTION_COMPLETE, &payload)
        else {
            panic!("expected connection complete");
        };
        assert!(e.status.is_success());
        assert_eq!(e.handle, ConnHandle::new(0x42));
        assert_eq!(e.bd_addr, BdAddr::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]));
        assert_eq!(e.link_type, LinkType::Acl);
    }

    #[test]
    fn truncated_event_rejected() {
        let payload = [0x00, 0x42]; // missing most fields
        assert!(Event::parse(code::CONNECTION_COMPLETE, &payload).is_err());
    }

    #[test]
    fn parse_number_of_completed_packets() {
        let payload = [
            0x02, // two entries
            0x01, 0x00, 0x03, 0x00, // handle 1, 3 packets
            0x02, 0x00, 0x01, 0x00, // handle 2, 1 packet
        ];
        let Ok(Event::NumberOfCompletedPackets(e)) =
            Event::parse(code::NUMBER_OF_COMPLETED_PACKETS, &payload)
        else {
            panic!("expected number of completed packets");
        };
        let entries: heapless::Vec<_, 4> = e.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (ConnHandle::new(1), 3));
        assert_eq!(entries[1], (ConnHandle::new(2), 1));
    }

    #[test]
    fn parse_le_connection_update_complete() {
        let payload = [
            0x03, // subevent
            0x00, // status
            0x00, 0x01, // handle
            0x18, 0x00, // interval
            0x00, 0x00, // latency
            0xf4, 0x01, // timeout
        ];
        let Ok(Event::Le(LeEvent::ConnectionUpdateComplete(e))) =
            Event::parse(code::LE_META, &payload)
        else {
            panic!("expected le connection update complete");
        };
        assert_eq!(e.handle, ConnHandle::new(0x0100));
        assert_eq!(e.conn_interval, 0x0018);
        assert_eq!(e.supervision_timeout, 0x01f4);
    }

    #[test]
    fn unknown_event_is_not_an_error() {
        let ev = Event::parse(0x7f, &[1, 2, 3]).unwrap();
        assert!(matches!(ev, Event::Unknown { code: 0x7f }));
    }

    #[test]
    fn full_packet_decode() {
        let raw = [code::DISCONNECTION_COMPLETE, 4, 0x00, 0x05, 0x00, 0x13];
        let Ok(Event::DisconnectionComplete(e)) = Event::from_hci_bytes(&raw) else {
            panic!("expected disconnection complete");
        };
        assert_eq!(e.handle, ConnHandle::new(5));
        assert_eq!(e.reason, Status::REMOTE_USER_TERMINATED);
    }
}
