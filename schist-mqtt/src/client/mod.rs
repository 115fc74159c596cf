/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing the public MQTT client and associated types necessary to invoke operations on it.
 */

#![warn(missing_docs)]

pub(crate) mod builder;
pub(crate) mod dispatch;
pub(crate) mod tokio_impl;

pub use builder::ClientBuilder;

use crate::config::*;
use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::protocol::*;
use crate::transport::TransportConnector;
use dispatch::EventDispatcher;
use tokio_impl::now;

use log::*;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;

/// Outcome of a connection attempt, as delivered to the connect result handler.  Carries the
/// server's CONNACK on success.
pub type ConnectResult = MqttResult<ConnackPacket>;

/// An operation that was still waiting on an acknowledgement when its connection ended.  Its
/// packet id has been released.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AbandonedOperation {

    /// A QoS 1 or QoS 2 publish, exactly as it was sent
    Publish(PublishPacket),

    /// The packet id of a subscribe
    Subscribe(u16),

    /// The packet id of an unsubscribe
    Unsubscribe(u16),
}

impl AbandonedOperation {

    /// Returns the packet id the operation was sent with
    pub fn packet_id(&self) -> u16 {
        match self {
            AbandonedOperation::Publish(publish) => { publish.packet_id }
            AbandonedOperation::Subscribe(packet_id) => { *packet_id }
            AbandonedOperation::Unsubscribe(packet_id) => { *packet_id }
        }
    }
}

/// Kinds of events the client can report to the application.  Used to clear a registered handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ClientEventType {

    /// A connection attempt succeeded or failed
    ConnectResult,

    /// A publish was written
    PublishSent,

    /// A QoS 1 or QoS 2 publish was fully acknowledged
    PublishComplete,

    /// A message arrived from the server
    PublishReceived,

    /// A SUBACK arrived
    SubscribeComplete,

    /// An UNSUBACK arrived
    UnsubscribeComplete,

    /// A PINGRESP arrived
    PingResponse,

    /// An accepted connection ended without the application asking for it
    ConnectionClosed,

    /// An unacknowledged operation was dropped because its connection ended
    OperationAbandoned,
}

impl fmt::Display for ClientEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEventType::ConnectResult => { write!(f, "ConnectResult") }
            ClientEventType::PublishSent => { write!(f, "PublishSent") }
            ClientEventType::PublishComplete => { write!(f, "PublishComplete") }
            ClientEventType::PublishReceived => { write!(f, "PublishReceived") }
            ClientEventType::SubscribeComplete => { write!(f, "SubscribeComplete") }
            ClientEventType::UnsubscribeComplete => { write!(f, "UnsubscribeComplete") }
            ClientEventType::PingResponse => { write!(f, "PingResponse") }
            ClientEventType::ConnectionClosed => { write!(f, "ConnectionClosed") }
            ClientEventType::OperationAbandoned => { write!(f, "OperationAbandoned") }
        }
    }
}

// Everything the protocol state wants the application to hear about, in the order it happened
#[derive(Clone, Debug)]
pub(crate) enum ClientEvent {
    ConnectionSuccess(ConnackPacket),
    ConnectionFailure(MqttError),
    PublishSent(u16),
    PublishComplete(u16),
    PublishReceived(PublishPacket),
    SubscribeComplete(SubackPacket),
    UnsubscribeComplete(u16),
    PingResponse,
    ConnectionClosed,
    OperationAbandoned(AbandonedOperation),
}

impl ClientEvent {
    pub(crate) fn event_type(&self) -> ClientEventType {
        match self {
            ClientEvent::ConnectionSuccess(_) | ClientEvent::ConnectionFailure(_) => { ClientEventType::ConnectResult }
            ClientEvent::PublishSent(_) => { ClientEventType::PublishSent }
            ClientEvent::PublishComplete(_) => { ClientEventType::PublishComplete }
            ClientEvent::PublishReceived(_) => { ClientEventType::PublishReceived }
            ClientEvent::SubscribeComplete(_) => { ClientEventType::SubscribeComplete }
            ClientEvent::UnsubscribeComplete(_) => { ClientEventType::UnsubscribeComplete }
            ClientEvent::PingResponse => { ClientEventType::PingResponse }
            ClientEvent::ConnectionClosed => { ClientEventType::ConnectionClosed }
            ClientEvent::OperationAbandoned(_) => { ClientEventType::OperationAbandoned }
        }
    }
}

// Protocol state plus the events it has produced that have not been handed to the application yet.
// Events are queued under the lock and dispatched outside of it, by one thread at a time, so
// handlers see them in order and may call back into the client.
pub(crate) struct ClientCore {
    pub(crate) protocol_state: ProtocolState,
    pending_events: VecDeque<ClientEvent>,
    dispatching: bool,
}

pub(crate) struct ClientShared {
    pub(crate) core: Mutex<ClientCore>,
    pub(crate) dispatcher: Mutex<EventDispatcher>,
    pub(crate) options: ClientOptions,
    pub(crate) connector: Arc<dyn TransportConnector>,
    pub(crate) runtime: Handle,
}

impl ClientShared {

    pub(crate) fn new(options: ClientOptions, connector: Arc<dyn TransportConnector>, runtime: Handle) -> Self {
        let config = ProtocolStateConfig {
            connect_options: options.connect_options.clone(),
            base_timestamp: now(),
        };

        ClientShared {
            core: Mutex::new(ClientCore {
                protocol_state: ProtocolState::new(config),
                pending_events: VecDeque::new(),
                dispatching: false,
            }),
            dispatcher: Mutex::new(EventDispatcher::default()),
            options,
            connector,
            runtime,
        }
    }

    /// Runs a function against the protocol state under the client lock, then delivers whatever
    /// events it produced.
    pub(crate) fn with_protocol_state<T, F>(&self, function: F) -> T where F : FnOnce(&mut ProtocolState, &mut VecDeque<ClientEvent>) -> T {
        let result = {
            let mut core = self.core.lock().unwrap();
            let core = &mut *core;
            function(&mut core.protocol_state, &mut core.pending_events)
        };

        self.dispatch_pending_events();

        result
    }

    fn dispatch_pending_events(&self) {
        {
            let mut core = self.core.lock().unwrap();
            if core.dispatching || core.pending_events.is_empty() {
                return;
            }

            core.dispatching = true;
        }

        loop {
            let event = {
                let mut core = self.core.lock().unwrap();
                match core.pending_events.pop_front() {
                    Some(event) => { event }
                    None => {
                        core.dispatching = false;
                        return;
                    }
                }
            };

            let event_type = event.event_type();
            let dispatcher = self.dispatcher.lock().unwrap().clone();

            // a panicking handler must not leave the dispatching flag set or kill the delivery task
            if panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(event))).is_err() {
                error!("dispatch_pending_events - {} handler panicked", event_type);
            }
        }
    }

    fn apply_user_event(&self, event: UserEvent) -> MqttResult<Option<u16>> {
        self.with_protocol_state(|state, client_events| {
            state.handle_user_event(UserEventContext {
                event,
                current_time: now(),
                client_events,
            })
        })
    }

    pub(crate) fn apply_network_event(&self, connection_id: u64, event: NetworkEvent) -> MqttResult<()> {
        self.with_protocol_state(|state, client_events| {
            state.handle_network_event(NetworkEventContext {
                event,
                connection_id,
                current_time: now(),
                client_events,
            })
        })
    }

    fn update_dispatcher<F>(&self, update: F) where F : FnOnce(&mut EventDispatcher) {
        let mut dispatcher = self.dispatcher.lock().unwrap();
        update(&mut dispatcher);
    }
}

fn expect_packet_id(result: MqttResult<Option<u16>>) -> MqttResult<u16> {
    result?.ok_or_else(|| MqttError::new_internal_state_error("operation completed without a packet id"))
}

/// Callback-driven MQTT 3.1.1 client.
///
/// Operations return as soon as their packet has been written; acknowledgements and inbound
/// messages are reported through the registered handlers.  Cloning yields another handle to the
/// same client.
#[derive(Clone)]
pub struct MqttClient {
    pub(crate) shared: Arc<ClientShared>,
}

impl fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttClient")
            .field("host", &self.shared.options.host)
            .field("port", &self.shared.options.port)
            .field("state", &self.shared.core.lock().unwrap().protocol_state.state())
            .finish()
    }
}

impl MqttClient {

    pub(crate) fn new(options: ClientOptions, connector: Arc<dyn TransportConnector>, runtime: Handle) -> Self {
        MqttClient {
            shared: Arc::new(ClientShared::new(options, connector, runtime)),
        }
    }

    /// Establishes a transport to the configured endpoint and sends CONNECT.  Only allowed while
    /// disconnected.
    ///
    /// Returns once CONNECT has been written, or with the error that prevented it.  The server's
    /// verdict arrives later through the connect result handler.  A transport failure is both
    /// returned here and reported to the connect result handler.
    pub async fn connect(&self) -> MqttResult<()> {
        tokio_impl::connect(self.shared.clone()).await
    }

    /// Sends DISCONNECT and closes the connection.  Allowed while connected or connecting.
    ///
    /// Succeeds even if the DISCONNECT could not be written.  Operations still waiting on an
    /// acknowledgement are reported to the operation abandoned handler.  The connection closed
    /// handler is not invoked; a connection attempt that had not been accepted yet is reported
    /// as failed to the connect result handler.
    pub fn disconnect(&self) -> MqttResult<()> {
        info!("disconnect - user requested disconnect");
        self.shared.apply_user_event(UserEvent::Disconnect).map(|_| ())
    }

    /// Publishes a message and returns the packet id it was sent with.
    ///
    /// The topic is validated before anything else happens.  A packet id is allocated for every
    /// publish; for QoS 0 it is released again immediately.  The publish sent handler fires
    /// after the write, and for QoS 1 and QoS 2 the publish complete handler fires once the
    /// acknowledgement exchange finishes.
    pub fn publish(&self, publish: PublishPacket) -> MqttResult<u16> {
        debug!("publish - user submitting publish to \"{}\"", publish.topic);
        expect_packet_id(self.shared.apply_user_event(UserEvent::Publish(publish)))
    }

    /// Subscribes to one or more topic filters and returns the SUBSCRIBE's packet id.  The
    /// subscribe complete handler receives the matching SUBACK.
    pub fn subscribe(&self, subscribe: SubscribePacket) -> MqttResult<u16> {
        debug!("subscribe - user submitting subscribe");
        expect_packet_id(self.shared.apply_user_event(UserEvent::Subscribe(subscribe)))
    }

    /// Unsubscribes from one or more topic filters and returns the UNSUBSCRIBE's packet id.  The
    /// unsubscribe complete handler receives that id when the UNSUBACK arrives.
    pub fn unsubscribe(&self, unsubscribe: UnsubscribePacket) -> MqttResult<u16> {
        debug!("unsubscribe - user submitting unsubscribe");
        expect_packet_id(self.shared.apply_user_event(UserEvent::Unsubscribe(unsubscribe)))
    }

    /// Sends a PINGREQ right away, independent of keep alive.
    pub fn ping(&self) -> MqttResult<()> {
        self.shared.apply_user_event(UserEvent::Ping).map(|_| ())
    }

    /// Returns the client id used in CONNECT.  Empty until the first connect if the id is being
    /// generated.
    pub fn client_id(&self) -> String {
        self.shared.with_protocol_state(|state, _| state.client_id().to_string())
    }

    /// Returns the connection's current lifecycle state
    pub fn state(&self) -> ProtocolStateType {
        self.shared.with_protocol_state(|state, _| state.state())
    }

    /// Returns the endpoint and CONNECT options the client was built with
    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }

    /// Registers the handler for connection attempt outcomes
    pub fn set_connect_result_handler<F>(&self, handler: F) where F : Fn(&ConnectResult) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.connect_result = Some(Arc::new(handler)));
    }

    /// Registers the handler invoked with the packet id of every publish once it is written
    pub fn set_publish_sent_handler<F>(&self, handler: F) where F : Fn(u16) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.publish_sent = Some(Arc::new(handler)));
    }

    /// Registers the handler invoked with the packet id of every QoS 1 or QoS 2 publish once it is
    /// fully acknowledged
    pub fn set_publish_complete_handler<F>(&self, handler: F) where F : Fn(u16) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.publish_complete = Some(Arc::new(handler)));
    }

    /// Registers the handler for messages from the server
    pub fn set_publish_received_handler<F>(&self, handler: F) where F : Fn(&PublishPacket) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.publish_received = Some(Arc::new(handler)));
    }

    /// Registers the handler for SUBACK packets
    pub fn set_subscribe_complete_handler<F>(&self, handler: F) where F : Fn(&SubackPacket) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.subscribe_complete = Some(Arc::new(handler)));
    }

    /// Registers the handler invoked with the packet id of every acknowledged unsubscribe
    pub fn set_unsubscribe_complete_handler<F>(&self, handler: F) where F : Fn(u16) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.unsubscribe_complete = Some(Arc::new(handler)));
    }

    /// Registers the handler for PINGRESP packets
    pub fn set_ping_response_handler<F>(&self, handler: F) where F : Fn() + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.ping_response = Some(Arc::new(handler)));
    }

    /// Registers the handler for connections that end without the application asking
    pub fn set_connection_closed_handler<F>(&self, handler: F) where F : Fn() + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.connection_closed = Some(Arc::new(handler)));
    }

    /// Registers the handler for operations dropped when their connection ends
    pub fn set_operation_abandoned_handler<F>(&self, handler: F) where F : Fn(&AbandonedOperation) + Send + Sync + 'static {
        self.shared.update_dispatcher(|dispatcher| dispatcher.operation_abandoned = Some(Arc::new(handler)));
    }

    /// Removes the handler registered for a kind of event, if any
    pub fn clear_handler(&self, event_type: ClientEventType) {
        self.shared.update_dispatcher(|dispatcher| dispatcher.clear(event_type));
    }
}
