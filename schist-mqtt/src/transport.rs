/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Boundary between the protocol engine and whatever moves packets over the network.

The engine deals in typed [`MqttPacket`](crate::mqtt::MqttPacket) values only.  A transport
implementation owns the socket (plain TCP, TLS, websockets, an in-memory pipe in tests) and the
packet codec: it encodes packets on [`Transport::write`] and delivers decoded packets as
[`TransportEvent::PacketReceived`] on the connection's event channel.  When the underlying stream
ends, for any reason, it sends [`TransportEvent::Closed`].
 */

use crate::error::MqttResult;
use crate::mqtt::MqttPacket;

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc::UnboundedReceiver;

/// Writable half of an established connection.
///
/// The client serializes all calls, so an implementation never sees two writes in flight at once.
pub trait Transport: Send {

    /// Encodes a packet and writes it to the stream.  An error here is treated as fatal to the
    /// connection; implementations should return `MqttError::TransportError`.
    fn write(&mut self, packet: &MqttPacket) -> MqttResult<()>;

    /// Shuts the stream down.  Called at most once per connection, after which the transport is
    /// dropped.
    fn close(&mut self);
}

/// Things that happen on the readable half of an established connection.
#[derive(Debug)]
pub enum TransportEvent {

    /// A complete packet was decoded from the stream
    PacketReceived(MqttPacket),

    /// The stream was closed, by the peer or by an error
    Closed,
}

/// Result of a successful connection attempt: the writable half plus a channel carrying
/// everything the readable half produces.
pub struct TransportConnection {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) events: UnboundedReceiver<TransportEvent>,
}

impl TransportConnection {

    /// Bundles a transport with the receiving end of its event channel
    pub fn new(transport: Box<dyn Transport>, events: UnboundedReceiver<TransportEvent>) -> Self {
        TransportConnection {
            transport,
            events
        }
    }
}

/// Return type of a connection attempt
pub type TransportConnectResult = Pin<Box<dyn Future<Output = MqttResult<TransportConnection>> + Send>>;

/// Factory for new connections.  The client invokes this once per call to `connect`.
pub trait TransportConnector: Send + Sync {

    /// Opens a stream to the given endpoint.  The returned future resolves once the stream is
    /// ready for the CONNECT packet, or fails with `MqttError::TransportError`.
    fn connect(&self, host: &str, port: u16) -> TransportConnectResult;
}
