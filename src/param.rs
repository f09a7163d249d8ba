//! HCI parameter types shared by packet views, builders and the public API.

use crate::codec::Error as CodecError;

/// Connection handle allocated by the controller. Only the low 12 bits are
/// significant.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnHandle(u16);

impl ConnHandle {
    pub const fn new(raw: u16) -> Self {
        Self(raw & 0x0fff)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// 48-bit Bluetooth device address, little endian as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    pub const fn new(val: [u8; 6]) -> Self {
        Self(val)
    }

    pub const fn raw(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl core::fmt::Display for BdAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5], a[4], a[3], a[2], a[1], a[0]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BdAddr {
    fn format(&self, fmt: defmt::Formatter) {
        let a = self.0;
        defmt::write!(
            fmt,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a[5],
            a[4],
            a[3],
            a[2],
            a[1],
            a[0]
        )
    }
}

/// Address type tag.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrKind {
    Public = 0x00,
    Random = 0x01,
    /// Resolvable private address, public identity.
    ResolvablePublic = 0x02,
    /// Resolvable private address, random identity.
    ResolvableRandom = 0x03,
}

impl AddrKind {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, CodecError> {
        Ok(match raw {
            0x00 => Self::Public,
            0x01 => Self::Random,
            0x02 => Self::ResolvablePublic,
            0x03 => Self::ResolvableRandom,
            _ => return Err(CodecError::InvalidValue),
        })
    }
}

/// A device address together with its type tag.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub kind: AddrKind,
    pub addr: BdAddr,
}

impl Address {
    pub const fn new(kind: AddrKind, addr: BdAddr) -> Self {
        Self { kind, addr }
    }

    pub fn public(val: [u8; 6]) -> Self {
        Self::new(AddrKind::Public, BdAddr::new(val))
    }

    pub fn random(val: [u8; 6]) -> Self {
        Self::new(AddrKind::Random, BdAddr::new(val))
    }
}

impl core::fmt::Display for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Connection role. Classic master and LE central share a tag, as do
/// classic slave and LE peripheral.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Central = 0x00,
    Peripheral = 0x01,
}

impl Role {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, CodecError> {
        Ok(match raw {
            0x00 => Self::Central,
            0x01 => Self::Peripheral,
            _ => return Err(CodecError::InvalidValue),
        })
    }
}

/// The radio a connection runs on.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Classic,
    Le,
}

/// HCI error code, used both as command/event status and disconnect reason.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Status(u8);

#[allow(missing_docs)]
impl Status {
    pub const SUCCESS: Status = Status(0x00);
    pub const UNKNOWN_HCI_COMMAND: Status = Status(0x01);
    pub const UNKNOWN_CONN_IDENTIFIER: Status = Status(0x02);
    pub const HARDWARE_FAILURE: Status = Status(0x03);
    pub const PAGE_TIMEOUT: Status = Status(0x04);
    pub const AUTHENTICATION_FAILURE: Status = Status(0x05);
    pub const PIN_OR_KEY_MISSING: Status = Status(0x06);
    pub const MEMORY_CAPACITY_EXCEEDED: Status = Status(0x07);
    pub const CONNECTION_TIMEOUT: Status = Status(0x08);
    pub const CONNECTION_LIMIT_EXCEEDED: Status = Status(0x09);
    pub const CONNECTION_ALREADY_EXISTS: Status = Status(0x0b);
    pub const COMMAND_DISALLOWED: Status = Status(0x0c);
    pub const LIMITED_RESOURCES: Status = Status(0x0d);
    pub const SECURITY_REASONS: Status = Status(0x0e);
    pub const UNACCEPTABLE_BD_ADDR: Status = Status(0x0f);
    pub const INVALID_HCI_PARAMETERS: Status = Status(0x12);
    pub const REMOTE_USER_TERMINATED: Status = Status(0x13);
    pub const REMOTE_LOW_RESOURCES: Status = Status(0x14);
    pub const REMOTE_POWER_OFF: Status = Status(0x15);
    pub const LOCAL_HOST_TERMINATED: Status = Status(0x16);
    pub const UNSUPPORTED_REMOTE_FEATURE: Status = Status(0x1a);
    pub const UNSPECIFIED: Status = Status(0x1f);
    pub const CONTROLLER_BUSY: Status = Status(0x3a);
    pub const UNACCEPTABLE_CONN_PARAMS: Status = Status(0x3b);
    pub const CONN_FAILED_TO_ESTABLISH: Status = Status(0x3e);

    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0x00
    }

    /// Error code mnemonic, for logging.
    pub fn name(self) -> &'static str {
        match self {
            Self::SUCCESS => "SUCCESS",
            Self::UNKNOWN_HCI_COMMAND => "UNKNOWN_HCI_COMMAND",
            Self::UNKNOWN_CONN_IDENTIFIER => "UNKNOWN_CONN_IDENTIFIER",
            Self::HARDWARE_FAILURE => "HARDWARE_FAILURE",
            Self::PAGE_TIMEOUT => "PAGE_TIMEOUT",
            Self::AUTHENTICATION_FAILURE => "AUTHENTICATION_FAILURE",
            Self::PIN_OR_KEY_MISSING => "PIN_OR_KEY_MISSING",
            Self::MEMORY_CAPACITY_EXCEEDED => "MEMORY_CAPACITY_EXCEEDED",
            Self::CONNECTION_TIMEOUT => "CONNECTION_TIMEOUT",
            Self::CONNECTION_LIMIT_EXCEEDED => "CONNECTION_LIMIT_EXCEEDED",
            Self::CONNECTION_ALREADY_EXISTS => "CONNECTION_ALREADY_EXISTS",
            Self::COMMAND_DISALLOWED => "COMMAND_DISALLOWED",
            Self::LIMITED_RESOURCES => "LIMITED_RESOURCES",
            Self::SECURITY_REASONS => "SECURITY_REASONS",
            Self::UNACCEPTABLE_BD_ADDR => "UNACCEPTABLE_BD_ADDR",
            Self::INVALID_HCI_PARAMETERS => "INVALID_HCI_PARAMETERS",
            Self::REMOTE_USER_TERMINATED => "REMOTE_USER_TERMINATED",
            Self::REMOTE_LOW_RESOURCES => "REMOTE_LOW_RESOURCES",
            Self::REMOTE_POWER_OFF => "REMOTE_POWER_OFF",
            Self::LOCAL_HOST_TERMINATED => "LOCAL_HOST_TERMINATED",
            Self::UNSUPPORTED_REMOTE_FEATURE => "UNSUPPORTED_REMOTE_FEATURE",
            Self::UNSPECIFIED => "UNSPECIFIED",
            Self::CONTROLLER_BUSY => "CONTROLLER_BUSY",
            Self::UNACCEPTABLE_CONN_PARAMS => "UNACCEPTABLE_CONN_PARAMS",
            Self::CONN_FAILED_TO_ESTABLISH => "CONN_FAILED_TO_ESTABLISH",
            _ => "UNKNOWN",
        }
    }
}

impl core::fmt::Debug for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}(0x{:02x})", self.name(), self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}(0x{:02x})", self.name(), self.0)
    }
}

/// Reasons a host may pass to the Disconnect command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    AuthenticationFailure = 0x05,
    RemoteUserTerminatedConn = 0x13,
    RemoteDeviceTerminatedConnLowResources = 0x14,
    RemoteDeviceTerminatedConnPowerOff = 0x15,
    UnsupportedRemoteFeature = 0x1a,
    UnacceptableConnParameters = 0x3b,
}

/// Reasons a host may reject an inbound connection request with.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    LimitedResources = 0x0d,
    SecurityReasons = 0x0e,
    UnacceptableBdAddr = 0x0f,
}

/// Current connection mode, reported by Mode Change.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Active = 0x00,
    Hold = 0x01,
    Sniff = 0x02,
    Park = 0x03,
}

impl Mode {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, CodecError> {
        Ok(match raw {
            0x00 => Self::Active,
            0x01 => Self::Hold,
            0x02 => Self::Sniff,
            0x03 => Self::Park,
            _ => return Err(CodecError::InvalidValue),
        })
    }
}

/// QoS service type.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    NoTraffic = 0x00,
    BestEffort = 0x01,
    Guaranteed = 0x02,
}

impl ServiceType {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, CodecError> {
        Ok(match raw {
            0x00 => Self::NoTraffic,
            0x01 => Self::BestEffort,
            0x02 => Self::Guaranteed,
            _ => return Err(CodecError::InvalidValue),
        })
    }
}

/// Direction of a flow specification.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Outgoing = 0x00,
    Incoming = 0x01,
}

impl FlowDirection {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, CodecError> {
        Ok(match raw {
            0x00 => Self::Outgoing,
            0x01 => Self::Incoming,
            _ => return Err(CodecError::InvalidValue),
        })
    }
}

/// Clock selector for the Read Clock command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhichClock {
    Local = 0x00,
    Piconet = 0x01,
}

/// Selector for the Read Transmit Power Level command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitPowerLevelType {
    Current = 0x00,
    Maximum = 0x01,
}

/// Key flag for the Master Link Key command.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFlag {
    SemiPermanent = 0x00,
    Temporary = 0x01,
}

/// Class of device of an inbound connection request.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassOfDevice(pub [u8; 3]);

/// Link type reported by classic connection events.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Sco = 0x00,
    Acl = 0x01,
    Esco = 0x02,
}

impl LinkType {
    pub(crate) fn from_raw(raw: u8) -> Result<Self, CodecError> {
        Ok(match raw {
            0x00 => Self::Sco,
            0x01 => Self::Acl,
            0x02 => Self::Esco,
            _ => return Err(CodecError::InvalidValue),
        })
    }
}
