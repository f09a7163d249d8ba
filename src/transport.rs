//! The HCI transport seam.

use core::future::Future;

use crate::packets::{AclPacket, Command, CommandResponse, ControllerToHostPacket};

/// Driver for the HCI transport below the ACL core.
///
/// Implementations own the byte framing towards the controller (H4 or
/// similar) and the pairing of issued commands with their Command Status /
/// Command Complete events. The core holds exactly one reader.
pub trait Transport: embedded_io::ErrorType {
    /// Reads the next ACL data packet or HCI event from the controller.
    ///
    /// `buf` must be large enough for the largest HCI packet (259 bytes for
    /// events); the returned view borrows from it.
    fn read<'a>(
        &self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = Result<ControllerToHostPacket<'a>, Self::Error>>;

    /// Writes one ACL data packet towards the controller.
    fn write_acl(&self, packet: &AclPacket<'_>) -> impl Future<Output = Result<(), Self::Error>>;

    /// Issues an HCI command and resolves with its Command Status, or its
    /// Command Complete status and return parameters.
    fn command(&self, cmd: &Command) -> impl Future<Output = Result<CommandResponse, Self::Error>>;
}
