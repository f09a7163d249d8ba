//! ACL data packet view and builder.

use crate::codec::{Error, ReadCursor, WriteCursor};
use crate::param::ConnHandle;

/// Packet boundary flag of an ACL packet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclPacketBoundary {
    FirstNonFlushable,
    Continuing,
    FirstFlushable,
    Complete,
}

impl AclPacketBoundary {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => Self::FirstNonFlushable,
            0b01 => Self::Continuing,
            0b10 => Self::FirstFlushable,
            _ => Self::Complete,
        }
    }

    fn to_bits(self) -> u16 {
        match self {
            Self::FirstNonFlushable => 0b00,
            Self::Continuing => 0b01,
            Self::FirstFlushable => 0b10,
            Self::Complete => 0b11,
        }
    }
}

/// Broadcast flag of an ACL packet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclBroadcastFlag {
    PointToPoint,
    ActiveBroadcast,
    PiconetBroadcast,
    Reserved,
}

impl AclBroadcastFlag {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => Self::PointToPoint,
            0b01 => Self::ActiveBroadcast,
            0b10 => Self::PiconetBroadcast,
            _ => Self::Reserved,
        }
    }

    fn to_bits(self) -> u16 {
        match self {
            Self::PointToPoint => 0b00,
            Self::ActiveBroadcast => 0b01,
            Self::PiconetBroadcast => 0b10,
            Self::Reserved => 0b11,
        }
    }
}

/// Borrowed view of one ACL data packet: 12-bit handle, 2-bit PB flag,
/// 2-bit BC flag, 16-bit little-endian length, payload.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct AclPacket<'d> {
    handle: ConnHandle,
    boundary: AclPacketBoundary,
    broadcast: AclBroadcastFlag,
    data: &'d [u8],
}

impl<'d> AclPacket<'d> {
    pub const HEADER_SIZE: usize = 4;

    pub fn new(
        handle: ConnHandle,
        boundary: AclPacketBoundary,
        broadcast: AclBroadcastFlag,
        data: &'d [u8],
    ) -> Self {
        Self {
            handle,
            boundary,
            broadcast,
            data,
        }
    }

    /// Decodes a packet from raw bytes. The declared length must match the
    /// available payload exactly.
    pub fn from_hci_bytes(data: &'d [u8]) -> Result<Self, Error> {
        let mut r = ReadCursor::new(data);
        let raw_handle = r.read_u16()?;
        let len = r.read_u16()? as usize;
        let payload = r.read_slice(len)?;
        if r.remaining() != 0 {
            return Err(Error::InvalidValue);
        }
        Ok(Self {
            handle: ConnHandle::new(raw_handle),
            boundary: AclPacketBoundary::from_bits(raw_handle >> 12),
            broadcast: AclBroadcastFlag::from_bits(raw_handle >> 14),
            data: payload,
        })
    }

    pub fn handle(&self) -> ConnHandle {
        self.handle
    }

    pub fn boundary_flag(&self) -> AclPacketBoundary {
        self.boundary
    }

    pub fn broadcast_flag(&self) -> AclBroadcastFlag {
        self.broadcast
    }

    pub fn data(&self) -> &'d [u8] {
        self.data
    }

    /// Encodes header and payload into `dest`, returning the encoded size.
    pub fn write_hci(&self, dest: &mut [u8]) -> Result<usize, Error> {
        let mut w = WriteCursor::new(dest);
        let raw_handle =
            self.handle.raw() | (self.boundary.to_bits() << 12) | (self.broadcast.to_bits() << 14);
        w.write_u16(raw_handle)?;
        w.write_u16(self.data.len() as u16)?;
        w.write_slice(self.data)?;
        Ok(w.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode() {
        let payload = [0x05, 0x00, 0x40, 0x00, 0xaa];
        let packet = AclPacket::new(
            ConnHandle::new(0x0042),
            AclPacketBoundary::FirstFlushable,
            AclBroadcastFlag::PointToPoint,
            &payload,
        );
        let mut buf = [0u8; 16];
        let len = packet.write_hci(&mut buf).unwrap();
        assert_eq!(len, AclPacket::HEADER_SIZE + payload.len());
        assert_eq!(&buf[..4], &[0x42, 0x20, 0x05, 0x00]);

        let decoded = AclPacket::from_hci_bytes(&buf[..len]).unwrap();
        assert_eq!(decoded.handle(), ConnHandle::new(0x0042));
        assert_eq!(decoded.boundary_flag(), AclPacketBoundary::FirstFlushable);
        assert_eq!(decoded.broadcast_flag(), AclBroadcastFlag::PointToPoint);
        assert_eq!(decoded.data(), &payload);
    }

    #[test]
    fn truncated_payload_rejected() {
        // Header declares 5 bytes, only 2 present.
        let raw = [0x42, 0x10, 0x05, 0x00, 0xaa, 0xbb];
        assert!(AclPacket::from_hci_bytes(&raw).is_err());
    }

    #[test]
    fn continuing_flag_roundtrip() {
        let packet = AclPacket::new(
            ConnHandle::new(0x0fff),
            AclPacketBoundary::Continuing,
            AclBroadcastFlag::PointToPoint,
            &[1, 2, 3],
        );
        let mut buf = [0u8; 8];
        let len = packet.write_hci(&mut buf).unwrap();
        let decoded = AclPacket::from_hci_bytes(&buf[..len]).unwrap();
        assert_eq!(decoded.boundary_flag(), AclPacketBoundary::Continuing);
        assert_eq!(decoded.handle().raw(), 0x0fff);
    }
}
