//! Host-side Bluetooth ACL connection manager.
//!
//! The crate sits directly above an HCI transport and owns the lifecycle,
//! framing and flow of ACL logical links, both Classic (BR/EDR) and Low
//! Energy: connection establishment and teardown, reassembly of L2CAP PDUs
//! from inbound ACL fragments, round-robin egress scheduling against the
//! controller's buffer credits, and per-connection command dispatch.
//!
//! The core is driven by three cooperative runners sharing one executor:
//! an rx runner (all HCI event handling and connection-table mutation), a
//! control runner (controller bring-up and serialized command issuance)
//! and a tx runner (the egress scheduler). The layer above talks to the
//! core through [`Acl`] and per-connection [`Connection`] facades.
#![no_std]
#![allow(clippy::needless_lifetimes)]

use core::mem::MaybeUninit;

mod fmt;

pub mod config;
pub mod packets;
pub mod param;

mod acl;
mod codec;
mod connection;
mod connection_manager;
mod fragmenter;
mod host;
mod packet_pool;
mod pdu;
mod scheduler;
mod transport;

pub use acl::Acl;
pub use codec::Error as CodecError;
pub use connection::{Connection, ConnectionEvent};
pub use fragmenter::AclFragmenter;
pub use host::{AcceptPolicy, ControlRunner, HostMetrics, Runner, RxRunner, TxRunner};
pub use packet_pool::{DefaultPacket, DefaultPacketPool, Packet, PacketPool};
pub use pdu::Pdu;
pub use transport::Transport;

use connection_manager::ConnectionStorage;
use host::AclHost;
use param::Status;
use scheduler::TxSlot;

pub mod prelude {
    //! Convenience include of the most commonly used types.
    pub use super::packets::{
        AclBroadcastFlag, AclPacket, AclPacketBoundary, Command, CommandResponse,
        ControllerToHostPacket, LeConnectionUpdateParams,
    };
    pub use super::param::*;
    pub use super::{
        AcceptPolicy, Acl, AclError, AclResources, Connection, ConnectionEvent, DefaultPacketPool,
        Error, Host, HostMetrics, Packet, PacketPool, Pdu, Runner, Stack, Transport,
    };
}

/// Errors returned by the core.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A controller command resolved with a non-success status.
    Hci(Status),
    /// A connection attempt completed with a failure status.
    ConnectFailed(Status),
    /// Error decoding or encoding a packet.
    Codec(CodecError),
    /// Resource not found.
    NotFound,
    /// Invalid state for the operation.
    InvalidState,
    /// Parameter out of range.
    InvalidValue,
    /// A bounded queue is full.
    OutOfMemory,
    /// The core is busy, retry later.
    Busy,
    /// The connection is disconnected.
    Disconnected,
    /// No free connection slot.
    ConnectionLimitReached,
}

impl From<CodecError> for Error {
    fn from(error: CodecError) -> Self {
        Self::Codec(error)
    }
}

/// Errors surfaced by the runners, carrying transport errors generically.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum AclError<E> {
    /// Error from the transport driver.
    Transport(E),
    /// Error from the core.
    Acl(Error),
}

impl<E> From<Error> for AclError<E> {
    fn from(error: Error) -> Self {
        Self::Acl(error)
    }
}

impl<E> From<CodecError> for AclError<E> {
    fn from(error: CodecError) -> Self {
        Self::Acl(Error::Codec(error))
    }
}

/// Storage for the core, created outside the stack and borrowed by it for
/// its whole lifetime. `CONNS` bounds the number of simultaneous
/// connections.
pub struct AclResources<P: PacketPool, const CONNS: usize> {
    connections: MaybeUninit<[ConnectionStorage<P::Packet>; CONNS]>,
    tx_slots: MaybeUninit<[TxSlot<P::Packet>; CONNS]>,
}

impl<P: PacketPool, const CONNS: usize> Default for AclResources<P, CONNS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PacketPool, const CONNS: usize> AclResources<P, CONNS> {
    pub const fn new() -> Self {
        Self {
            connections: MaybeUninit::uninit(),
            tx_slots: MaybeUninit::uninit(),
        }
    }
}

/// Creates a new instance of the ACL stack with the provided transport
/// driver and resources.
pub fn new<'resources, T: Transport, P: PacketPool, const CONNS: usize>(
    transport: T,
    resources: &'resources mut AclResources<P, CONNS>,
) -> Stack<'resources, T, P> {
    unsafe fn transmute_slice<T>(x: &mut [T]) -> &'static mut [T] {
        unsafe { core::mem::transmute(x) }
    }

    // Safety:
    // - The resources outlive the returned Stack.
    // - Internal lifetimes are elided (made 'static) to simplify API usage.
    // - No references into the resources are held once the stack is gone.
    let connections = &mut *resources
        .connections
        .write([const { ConnectionStorage::new() }; CONNS]);
    let connections: &'resources mut [ConnectionStorage<P::Packet>] =
        unsafe { transmute_slice(connections) };

    let tx_slots = &mut *resources.tx_slots.write([const { TxSlot::new() }; CONNS]);
    let tx_slots: &'resources mut [TxSlot<P::Packet>] = unsafe { transmute_slice(tx_slots) };

    Stack {
        host: AclHost::new(transport, connections, tx_slots),
    }
}

/// Contains the ACL stack.
pub struct Stack<'stack, T, P: PacketPool> {
    pub(crate) host: AclHost<'stack, T, P>,
}

/// Host components.
#[non_exhaustive]
pub struct Host<'stack, T: Transport, P: PacketPool> {
    /// Connection management surface.
    pub acl: Acl<'stack, P>,
    /// Runner driving the core.
    pub runner: Runner<'stack, T, P>,
}

impl<'stack, T: Transport, P: PacketPool> Stack<'stack, T, P> {
    /// Sets the random address configured into the controller at bring-up
    /// and used for extended LE connection creation.
    pub fn set_random_address(self, addr: param::BdAddr) -> Self {
        self.host.inner.random_address.set(Some(addr));
        self
    }

    /// Sets the policy applied to inbound classic connection requests.
    /// Without one, every request is rejected with limited resources.
    pub fn set_accept_policy(self, policy: AcceptPolicy) -> Self {
        self.host.inner.accept_policy.set(policy);
        self
    }

    /// Builds the stack into its public components.
    pub fn build(&'stack self) -> Host<'stack, T, P> {
        Host {
            acl: Acl::new(&self.host.inner),
            runner: Runner::new(self),
        }
    }

    /// Reads the current host metrics.
    pub fn metrics<F: FnOnce(&HostMetrics) -> R, R>(&self, f: F) -> R {
        let m = self.host.inner.metrics.borrow();
        f(&m)
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::packet_pool::{Packet, PacketPool};

    pub struct TestPacket([u8; 256]);

    impl Packet for TestPacket {}

    impl AsRef<[u8]> for TestPacket {
        fn as_ref(&self) -> &[u8] {
            &self.0
        }
    }

    impl AsMut<[u8]> for TestPacket {
        fn as_mut(&mut self) -> &mut [u8] {
            &mut self.0
        }
    }

    /// Unbounded pool, so tests never contend for buffers.
    pub struct TestPool;

    impl PacketPool for TestPool {
        type Packet = TestPacket;
        const MTU: usize = 256;

        fn allocate() -> Option<TestPacket> {
            Some(TestPacket([0; 256]))
        }

        fn capacity() -> usize {
            usize::MAX
        }
    }
}
