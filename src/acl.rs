//! The public connection-management surface.

use core::future::poll_fn;

use crate::connection::Connection;
use crate::connection_manager::ClassicConnect;
use crate::host::{ControlRequest, Inner};
use crate::packet_pool::PacketPool;
use crate::packets::Command;
use crate::param::{Address, AddrKind, BdAddr, KeyFlag, LinkKind, Role};
use crate::Error;

/// Entry point for creating and accepting ACL connections.
pub struct Acl<'d, P: PacketPool> {
    inner: &'d Inner<'d, P>,
}

impl<'d, P: PacketPool> Acl<'d, P> {
    pub(crate) fn new(inner: &'d Inner<'d, P>) -> Self {
        Self { inner }
    }

    /// Creates an outbound classic connection.
    ///
    /// The controller serializes page attempts, so the request is queued
    /// when another classic connect is in flight. A duplicate request for
    /// an address that is pending or already connected fails synchronously.
    pub async fn connect(&self, addr: BdAddr) -> Result<Connection<'d, P>, Error> {
        match self.inner.connections.start_classic_connect(addr)? {
            ClassicConnect::IssueNow => {
                if self
                    .inner
                    .commands
                    .try_send(ControlRequest::CreateConnection { addr })
                    .is_err()
                {
                    self.inner.connections.abort_classic_connect(addr);
                    return Err(Error::Busy);
                }
            }
            ClassicConnect::Queued => {}
        }
        let peer = Address::new(AddrKind::Public, addr);
        let handle = poll_fn(|cx| {
            self.inner
                .connections
                .poll_connect_outcome(peer, LinkKind::Classic, Some(cx))
        })
        .await?;
        Ok(Connection::new(handle, self.inner))
    }

    /// Creates an outbound LE connection to the given peer.
    pub async fn connect_le(&self, peer: Address) -> Result<Connection<'d, P>, Error> {
        self.inner.connections.start_le_connect(peer)?;
        if self
            .inner
            .commands
            .try_send(ControlRequest::CreateLeConnection { peer })
            .is_err()
        {
            self.inner.connections.abort_le_connect(peer);
            return Err(Error::Busy);
        }
        let handle = poll_fn(|cx| {
            self.inner
                .connections
                .poll_connect_outcome(peer, LinkKind::Le, Some(cx))
        })
        .await?;
        Ok(Connection::new(handle, self.inner))
    }

    /// Cancels a pending outbound classic connect. The connection-complete
    /// event for the cancelled attempt performs the cleanup.
    pub fn cancel_connect(&self, addr: BdAddr) -> Result<(), Error> {
        if !self.inner.connections.cancel_classic_connect(addr) {
            info!("[acl] cannot cancel non-existent connection to {:?}", addr);
            return Err(Error::NotFound);
        }
        self.inner
            .commands
            .try_send(ControlRequest::CancelConnect { addr })
            .map_err(|_| Error::Busy)
    }

    /// Waits for the next established connection of the given kind.
    ///
    /// Classic links always enter the table in the central role, so this
    /// also observes outbound classic connections; do not run it
    /// concurrently with [`connect`](Self::connect).
    pub async fn accept(&self, kind: LinkKind) -> Connection<'d, P> {
        let role = match kind {
            LinkKind::Classic => Role::Central,
            LinkKind::Le => Role::Peripheral,
        };
        let handle = poll_fn(|cx| {
            self.inner
                .connections
                .poll_accept(kind, role, &[], Some(cx))
        })
        .await;
        Connection::new(handle, self.inner)
    }

    /// Changes the piconet master link key.
    pub fn master_link_key(&self, key_flag: KeyFlag) -> Result<(), Error> {
        self.inner
            .commands
            .try_send(ControlRequest::Command(Command::MasterLinkKey { key_flag }))
            .map_err(|_| Error::Busy)
    }

    /// Requests a role switch with the peer.
    pub fn switch_role(&self, addr: BdAddr, role: Role) -> Result<(), Error> {
        self.inner
            .commands
            .try_send(ControlRequest::Command(Command::SwitchRole { addr, role }))
            .map_err(|_| Error::Busy)
    }

    /// Default link policy settings read from the controller at bring-up.
    pub fn default_link_policy_settings(&self) -> u16 {
        self.inner.default_link_policy.get()
    }

    pub fn write_default_link_policy_settings(&self, settings: u16) -> Result<(), Error> {
        self.inner.default_link_policy.set(settings);
        self.inner
            .commands
            .try_send(ControlRequest::Command(
                Command::WriteDefaultLinkPolicySettings { settings },
            ))
            .map_err(|_| Error::Busy)
    }
}
