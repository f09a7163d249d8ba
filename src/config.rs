//! Compile-time configuration.
//!
//! Queue depths are fixed at compile time; changing them requires
//! rebuilding the crate.

/// Inbound PDU queue depth for every connection.
///
/// Reassembled L2CAP PDUs wait here until the upper layer dequeues them.
/// When the queue is full the newest PDU is dropped and a congestion
/// warning is logged.
pub const RX_QUEUE_SIZE: usize = 10;

/// Outbound PDU queue depth for every connection.
///
/// PDUs wait here until the scheduler picks the connection in rotation.
pub const TX_QUEUE_SIZE: usize = 10;

/// Connection event queue depth for every connection.
///
/// Carries management events (mode change, RSSI, disconnection, ...) to
/// the upper layer. Events posted while the queue is full are dropped.
pub const CONNECTION_EVENT_QUEUE_SIZE: usize = 4;

/// Depth of the queue feeding the control runner with HCI commands.
pub const COMMAND_QUEUE_SIZE: usize = 8;

/// Maximum number of simultaneous outgoing/incoming connection attempts
/// tracked per transport.
pub const CONNECT_LIST_SIZE: usize = 4;

/// Packet count of [`DefaultPacketPool`](crate::packet_pool::DefaultPacketPool).
pub const DEFAULT_PACKET_POOL_SIZE: usize = 32;

/// Packet buffer size of [`DefaultPacketPool`](crate::packet_pool::DefaultPacketPool).
///
/// Bounds the size of a reassembled L2CAP basic frame (header included).
pub const DEFAULT_PACKET_POOL_MTU: usize = 251;
