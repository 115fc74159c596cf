/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

pub(crate) mod keep_alive;
pub(crate) mod packet_id;
pub(crate) mod qos;

use crate::client::ClientEvent;
use crate::config::*;
use crate::error::{MqttError, MqttResult};
use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;
use crate::transport::Transport;
use crate::validate::*;

use keep_alive::KeepAliveMonitor;
use packet_id::PacketIdAllocator;
use qos::QosTracker;

use log::*;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::time::Instant;

// The protocol state never touches the network directly.  Transports, decoded packets, and
// transport failures all arrive as events; writes go through the installed transport.
pub(crate) enum NetworkEvent {
    ConnectionOpened(Box<dyn Transport>),
    ConnectionFailed(MqttError),
    PacketReceived(MqttPacket),
    ConnectionClosed,
}

pub(crate) struct NetworkEventContext<'a> {
    pub(crate) event: NetworkEvent,

    // connection attempt the event belongs to; events for anything but the current attempt are stale
    pub(crate) connection_id: u64,
    pub(crate) current_time: Instant,

    // output field for everything the application should hear about
    pub(crate) client_events: &'a mut VecDeque<ClientEvent>,
}

// Application operations on an established connection.  Connect is handled separately
// since it spans an await on the transport connector.
pub(crate) enum UserEvent {
    Publish(PublishPacket),
    Subscribe(SubscribePacket),
    Unsubscribe(UnsubscribePacket),
    Ping,
    Disconnect,
}

pub(crate) struct UserEventContext<'a> {
    pub(crate) event: UserEvent,
    pub(crate) current_time: Instant,
    pub(crate) client_events: &'a mut VecDeque<ClientEvent>,
}

pub(crate) struct ServiceContext<'a> {
    pub(crate) current_time: Instant,
    pub(crate) client_events: &'a mut VecDeque<ClientEvent>,
}

/// Lifecycle state of a client's connection
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProtocolStateType {

    /// No transport; only `connect` is allowed
    Disconnected,

    /// Transport being established, or CONNECT sent and waiting on the CONNACK
    Connecting,

    /// CONNACK accepted; all operations are allowed
    Connected,

    /// Tearing the connection down at the application's request
    Disconnecting,
}

impl Display for ProtocolStateType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolStateType::Disconnected => { write!(f, "Disconnected") }
            ProtocolStateType::Connecting => { write!(f, "Connecting") }
            ProtocolStateType::Connected => { write!(f, "Connected") }
            ProtocolStateType::Disconnecting => { write!(f, "Disconnecting") }
        }
    }
}

pub(crate) struct ProtocolStateConfig {
    pub(crate) connect_options: ConnectOptions,

    pub(crate) base_timestamp: Instant,
}

pub(crate) struct ProtocolState {
    config: ProtocolStateConfig,

    state: ProtocolStateType,

    // the need to model time in a simple, test-controllable fashion leads to a solution where
    // the state thinks in time based on elapsed milliseconds since the state was created.  This
    // allows for simple time mocking which lets us simulate the passage of time "instantly."
    current_time: Instant,
    elapsed_time_ms: u128,

    // Client id sent in every CONNECT.  Generated once, on the first connect, if the configured
    // id is empty and generation is enabled.
    client_id: String,

    // Incremented on every connection attempt.  Lets the containing client discard events from
    // connection attempts that have since been abandoned.
    connection_id: u64,

    // Writable half of the current connection, if any.  Every outbound packet goes through here.
    transport: Option<Box<dyn Transport>>,

    pub(crate) packet_ids: PacketIdAllocator,

    pub(crate) qos: QosTracker,

    keep_alive: KeepAliveMonitor,
}

impl Display for ProtocolState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ProtocolState {{")?;
        write!(f, " state:{}", self.state)?;
        log_primitive_value!(self.connection_id, f, "connection_id");
        log_primitive_value!(self.packet_ids.allocated_count(), f, "allocated_packet_ids");
        log_primitive_value!(self.qos.pending_outbound_count(), f, "pending_outbound_operations");
        log_primitive_value!(self.qos.incoming_qos2_count(), f, "unreleased_incoming_qos2_publishes");
        if let Some(next_ping) = self.keep_alive.next_ping_timepoint() {
            log_primitive_value!(self.get_elapsed_millis(&next_ping), f, "next_ping_elapsed_ms");
        }
        write!(f, " }}")
    }
}

impl ProtocolState {

    // Crate-public API

    pub(crate) fn new(config: ProtocolStateConfig) -> ProtocolState {
        let base_time = config.base_timestamp;
        let client_id = config.connect_options.client_id.clone();
        let keep_alive = KeepAliveMonitor::new(config.connect_options.keep_alive_interval_seconds, config.connect_options.auto_keep_alive);

        ProtocolState {
            config,
            state: ProtocolStateType::Disconnected,
            current_time: base_time,
            elapsed_time_ms: 0,
            client_id,
            connection_id: 0,
            transport: None,
            packet_ids: PacketIdAllocator::new(),
            qos: QosTracker::new(),
            keep_alive,
        }
    }

    pub(crate) fn state(&self) -> ProtocolStateType {
        self.state
    }

    pub(crate) fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    pub(crate) fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// True while the given connection attempt is the current one and has not ended
    pub(crate) fn is_current_connection(&self, connection_id: u64) -> bool {
        self.connection_id == connection_id && self.state != ProtocolStateType::Disconnected
    }

    /// First half of a connection attempt: claims the state machine for a new attempt and
    /// returns the attempt's id.  The outcome of establishing the transport comes back later as a
    /// `ConnectionOpened` or `ConnectionFailed` network event carrying that id.
    pub(crate) fn start_connect(&mut self, current_time: &Instant) -> MqttResult<u64> {
        self.update_internal_clock(current_time);

        if self.state != ProtocolStateType::Disconnected {
            error!("[{} ms] start_connect - invalid state {} to begin a connection attempt", self.elapsed_time_ms, self.state);
            return Err(MqttError::new_invalid_state(self.state, "connect is only allowed while disconnected"));
        }

        if self.client_id.is_empty() && self.config.connect_options.auto_generate_client_id {
            self.client_id = uuid::Uuid::new_v4().to_string();
            info!("[{} ms] start_connect - generated client id \"{}\"", self.elapsed_time_ms, self.client_id);
        }

        self.connection_id += 1;
        self.change_state(ProtocolStateType::Connecting);

        Ok(self.connection_id)
    }

    pub(crate) fn handle_network_event(&mut self, context: NetworkEventContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);

        let NetworkEventContext { event, connection_id, client_events, .. } = context;

        let result =
            if connection_id != self.connection_id {
                self.handle_stale_network_event(event, connection_id)
            } else {
                match event {
                    NetworkEvent::ConnectionOpened(transport) => { self.handle_network_event_connection_opened(transport, client_events) }
                    NetworkEvent::ConnectionFailed(error) => { self.handle_network_event_connection_failed(error, client_events) }
                    NetworkEvent::PacketReceived(packet) => { self.handle_packet(packet, client_events) }
                    NetworkEvent::ConnectionClosed => { self.handle_network_event_connection_closed(client_events) }
                }
            };

        self.log_state();

        if result.is_err() {
            error!("[{} ms] handle_network_event - final result: {:?}", self.elapsed_time_ms, result);
        } else {
            debug!("[{} ms] handle_network_event - final result: {:?}", self.elapsed_time_ms, result);
        }

        result
    }

    /// Applies an application operation.  Publish, subscribe, and unsubscribe yield the packet id
    /// they were sent with.
    pub(crate) fn handle_user_event(&mut self, context: UserEventContext) -> MqttResult<Option<u16>> {
        self.update_internal_clock(&context.current_time);

        let UserEventContext { event, client_events, .. } = context;

        let result =
            match event {
                UserEvent::Publish(publish) => { self.handle_user_event_publish(publish, client_events) }
                UserEvent::Subscribe(subscribe) => { self.handle_user_event_subscribe(subscribe, client_events) }
                UserEvent::Unsubscribe(unsubscribe) => { self.handle_user_event_unsubscribe(unsubscribe, client_events) }
                UserEvent::Ping => { self.handle_user_event_ping(client_events) }
                UserEvent::Disconnect => { self.handle_user_event_disconnect(client_events) }
            };

        self.log_state();

        if result.is_err() {
            error!("[{} ms] handle_user_event - final result: {:?}", self.elapsed_time_ms, result);
        } else {
            debug!("[{} ms] handle_user_event - final result: {:?}", self.elapsed_time_ms, result);
        }

        result
    }

    pub(crate) fn service(&mut self, context: ServiceContext) -> MqttResult<()> {
        self.update_internal_clock(&context.current_time);

        let result =
            match self.state {
                ProtocolStateType::Connected => { self.service_keep_alive(context.client_events) }
                _ => { Ok(()) }
            };

        if result.is_err() {
            error!("[{} ms] service - final result: {:?}", self.elapsed_time_ms, result);
        }

        result
    }

    pub(crate) fn get_next_service_timepoint(&mut self, current_time: &Instant) -> Option<Instant> {
        self.update_internal_clock(current_time);

        let next_service_time =
            match self.state {
                ProtocolStateType::Connected => { self.keep_alive.next_ping_timepoint() }
                _ => { None }
            };

        if let Some(next_timepoint) = &next_service_time {
            debug!("[{} ms] get_next_service_timepoint - state {}, target_elapsed_time: {} ms", self.elapsed_time_ms, self.state, self.get_elapsed_millis(next_timepoint));
        } else {
            debug!("[{} ms] get_next_service_timepoint - state {}, target_elapsed_time: NEVER", self.elapsed_time_ms, self.state);
        }

        next_service_time
    }

    // Private Implementation

    fn log_state(&self) {
        let level = log::max_level();
        match level {
            LevelFilter::Debug => {
                debug!("{}", self);
            }
            LevelFilter::Trace => {
                trace!("{}", self);
            }
            _ => {}
        }
    }

    fn update_internal_clock(&mut self, current_time: &Instant) {
        self.current_time = *current_time;
        self.elapsed_time_ms = self.get_elapsed_millis(current_time);
    }

    fn get_elapsed_millis(&self, timepoint: &Instant) -> u128 {
        timepoint.saturating_duration_since(self.config.base_timestamp).as_millis()
    }

    fn change_state(&mut self, next_state: ProtocolStateType) {
        debug!("[{} ms] change_state - transitioning from {} to {}", self.elapsed_time_ms, self.state, next_state);
        self.state = next_state;
    }

    fn check_connected(&self, function_name: &str) -> MqttResult<()> {
        if self.state != ProtocolStateType::Connected {
            error!("[{} ms] {} - invalid state {} for operation", self.elapsed_time_ms, function_name, self.state);
            return Err(MqttError::new_invalid_state(self.state, "operation requires an established connection"));
        }

        Ok(())
    }

    // The one place packets reach the transport
    fn write_packet(&mut self, packet: &MqttPacket) -> MqttResult<()> {
        let transport =
            match self.transport.as_mut() {
                Some(transport) => { transport }
                None => {
                    error!("[{} ms] write_packet - no transport to write {} to", self.elapsed_time_ms, mqtt_packet_to_packet_type(packet));
                    return Err(MqttError::new_internal_state_error("packet write attempted without a transport"));
                }
            };

        log_packet("Writing packet: ", packet);
        transport.write(packet)?;
        self.keep_alive.on_write(self.current_time);

        Ok(())
    }

    // A failed write ends the connection
    fn send_packet(&mut self, packet: &MqttPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        if let Err(error) = self.write_packet(packet) {
            error!("[{} ms] send_packet - failed to write {}: {}", self.elapsed_time_ms, mqtt_packet_to_packet_type(packet), error);
            self.apply_connection_closed(client_events, error.clone());
            return Err(error);
        }

        Ok(())
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            debug!("[{} ms] close_transport - closing connection {}", self.elapsed_time_ms, self.connection_id);
            transport.close();
        }
    }

    fn abandon_pending_operations(&mut self, client_events: &mut VecDeque<ClientEvent>) {
        let abandoned = self.qos.abandon_outbound();
        if !abandoned.is_empty() {
            info!("[{} ms] abandon_pending_operations - abandoning {} unacknowledged operations", self.elapsed_time_ms, abandoned.len());
        }

        for operation in abandoned {
            client_events.push_back(ClientEvent::OperationAbandoned(operation));
        }

        self.packet_ids.release_all();

        if self.config.connect_options.clean_session {
            self.qos.clear_incoming();
        }
    }

    // Shared by unsolicited closure and write failure
    fn apply_connection_closed(&mut self, client_events: &mut VecDeque<ClientEvent>, reason: MqttError) {
        let was_connecting = self.state == ProtocolStateType::Connecting;

        self.close_transport();
        self.change_state(ProtocolStateType::Disconnected);
        self.keep_alive.reset();
        self.abandon_pending_operations(client_events);

        // a connection that never got accepted ends as a failed attempt, not a closure
        if was_connecting {
            client_events.push_back(ClientEvent::ConnectionFailure(reason));
        } else {
            client_events.push_back(ClientEvent::ConnectionClosed);
        }
    }

    fn handle_stale_network_event(&mut self, event: NetworkEvent, connection_id: u64) -> MqttResult<()> {
        match event {
            NetworkEvent::ConnectionOpened(mut transport) => {
                warn!("[{} ms] handle_network_event - connection attempt {} was superseded, closing its transport", self.elapsed_time_ms, connection_id);
                transport.close();
                Err(MqttError::new_invalid_state(self.state, "connection attempt was cancelled"))
            }
            _ => {
                debug!("[{} ms] handle_network_event - ignoring event from stale connection {}", self.elapsed_time_ms, connection_id);
                Ok(())
            }
        }
    }

    fn handle_network_event_connection_opened(&mut self, mut transport: Box<dyn Transport>, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        if self.state != ProtocolStateType::Connecting {
            warn!("[{} ms] handle_network_event_connection_opened - connection attempt was cancelled, closing transport", self.elapsed_time_ms);
            transport.close();
            return Err(MqttError::new_invalid_state(self.state, "connection attempt was cancelled"));
        }

        info!("[{} ms] handle_network_event_connection_opened - transport established, sending CONNECT", self.elapsed_time_ms);
        if self.config.connect_options.clean_session {
            self.qos.clear_incoming();
        }

        self.transport = Some(transport);

        let connect = MqttPacket::Connect(self.config.connect_options.to_connect_packet(&self.client_id));
        self.send_packet(&connect, client_events)
    }

    fn handle_network_event_connection_failed(&mut self, error: MqttError, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        if self.state != ProtocolStateType::Connecting {
            debug!("[{} ms] handle_network_event_connection_failed - connection attempt already cancelled", self.elapsed_time_ms);
            return Ok(());
        }

        error!("[{} ms] handle_network_event_connection_failed - transport could not be established: {}", self.elapsed_time_ms, error);
        self.change_state(ProtocolStateType::Disconnected);
        client_events.push_back(ClientEvent::ConnectionFailure(error));

        Ok(())
    }

    fn handle_network_event_connection_closed(&mut self, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        if self.state == ProtocolStateType::Disconnected {
            debug!("[{} ms] handle_network_event_connection_closed - already disconnected", self.elapsed_time_ms);
            return Ok(());
        }

        info!("[{} ms] handle_network_event_connection_closed - transport closed in state {}", self.elapsed_time_ms, self.state);
        self.apply_connection_closed(client_events, MqttError::new_connection_closed("transport closed before the connection was accepted"));

        Ok(())
    }

    fn service_keep_alive(&mut self, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        if self.keep_alive.is_ping_due(self.current_time) {
            debug!("[{} ms] service_keep_alive - next ping time reached, sending ping", self.elapsed_time_ms);
            self.send_packet(&MqttPacket::Pingreq(PingreqPacket{}), client_events)?;
        }

        Ok(())
    }

    fn handle_user_event_publish(&mut self, mut publish: PublishPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<Option<u16>> {
        validate_publish_packet_outbound(&publish)?;
        self.check_connected("handle_user_event_publish")?;

        let packet_id = self.packet_ids.acquire()?;
        publish.packet_id = packet_id;
        let qos = publish.qos;

        let packet = MqttPacket::Publish(publish);
        self.send_packet(&packet, client_events)?;

        if let MqttPacket::Publish(publish) = packet {
            if qos == QualityOfService::AtMostOnce {
                self.packet_ids.release(packet_id);
            } else {
                self.qos.track_publish(publish);
            }
        }

        client_events.push_back(ClientEvent::PublishSent(packet_id));

        Ok(Some(packet_id))
    }

    fn handle_user_event_subscribe(&mut self, mut subscribe: SubscribePacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<Option<u16>> {
        validate_subscribe_packet_outbound(&subscribe)?;
        self.check_connected("handle_user_event_subscribe")?;

        let packet_id = self.packet_ids.acquire()?;
        subscribe.packet_id = packet_id;

        self.send_packet(&MqttPacket::Subscribe(subscribe), client_events)?;
        self.qos.track_subscribe(packet_id);

        Ok(Some(packet_id))
    }

    fn handle_user_event_unsubscribe(&mut self, mut unsubscribe: UnsubscribePacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<Option<u16>> {
        validate_unsubscribe_packet_outbound(&unsubscribe)?;
        self.check_connected("handle_user_event_unsubscribe")?;

        let packet_id = self.packet_ids.acquire()?;
        unsubscribe.packet_id = packet_id;

        self.send_packet(&MqttPacket::Unsubscribe(unsubscribe), client_events)?;
        self.qos.track_unsubscribe(packet_id);

        Ok(Some(packet_id))
    }

    fn handle_user_event_ping(&mut self, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<Option<u16>> {
        self.check_connected("handle_user_event_ping")?;

        self.send_packet(&MqttPacket::Pingreq(PingreqPacket{}), client_events)?;

        Ok(None)
    }

    fn handle_user_event_disconnect(&mut self, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<Option<u16>> {
        match self.state {
            ProtocolStateType::Connected | ProtocolStateType::Connecting => {}
            _ => {
                error!("[{} ms] handle_user_event_disconnect - invalid state {} for disconnect", self.elapsed_time_ms, self.state);
                return Err(MqttError::new_invalid_state(self.state, "disconnect requires a connection or connection attempt"));
            }
        }

        let was_connecting = self.state == ProtocolStateType::Connecting;
        self.change_state(ProtocolStateType::Disconnecting);

        // Nothing acknowledges a DISCONNECT, and the connection is going away regardless
        if self.transport.is_some() {
            if let Err(error) = self.write_packet(&MqttPacket::Disconnect(DisconnectPacket{})) {
                warn!("[{} ms] handle_user_event_disconnect - failed to write DISCONNECT: {}", self.elapsed_time_ms, error);
            }
        }

        self.close_transport();
        self.change_state(ProtocolStateType::Disconnected);
        self.keep_alive.reset();
        self.abandon_pending_operations(client_events);

        if was_connecting {
            client_events.push_back(ClientEvent::ConnectionFailure(MqttError::new_connection_closed("connection attempt cancelled by disconnect")));
        }

        Ok(None)
    }

    fn handle_packet(&mut self, packet: MqttPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        log_packet("Received packet: ", &packet);

        match packet {
            MqttPacket::Connack(connack) => { self.handle_connack(connack, client_events) }
            MqttPacket::Publish(publish) => { self.handle_publish(publish, client_events) }
            MqttPacket::Puback(puback) => { self.handle_puback(puback, client_events) }
            MqttPacket::Pubrec(pubrec) => { self.handle_pubrec(pubrec, client_events) }
            MqttPacket::Pubrel(pubrel) => { self.handle_pubrel(pubrel, client_events) }
            MqttPacket::Pubcomp(pubcomp) => { self.handle_pubcomp(pubcomp, client_events) }
            MqttPacket::Suback(suback) => { self.handle_suback(suback, client_events) }
            MqttPacket::Unsuback(unsuback) => { self.handle_unsuback(unsuback, client_events) }
            MqttPacket::Pingresp(_) => { self.handle_pingresp(client_events) }
            _ => {
                warn!("[{} ms] handle_packet - ignoring {}, which a server never sends", self.elapsed_time_ms, mqtt_packet_to_packet_type(&packet));
                Ok(())
            }
        }
    }

    // Acks and publishes only make sense on an accepted connection
    fn is_valid_state_for_packet(&self, packet_type: PacketType) -> bool {
        if self.state != ProtocolStateType::Connected {
            warn!("[{} ms] handle_packet - ignoring {} received in state {}", self.elapsed_time_ms, packet_type, self.state);
            return false;
        }

        true
    }

    fn handle_connack(&mut self, connack: ConnackPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_connack - processing CONNACK packet", self.elapsed_time_ms);
        if self.state != ProtocolStateType::Connecting {
            warn!("[{} ms] handle_connack - ignoring CONNACK received in state {}", self.elapsed_time_ms, self.state);
            return Ok(());
        }

        if connack.return_code.is_accepted() {
            info!("[{} ms] handle_connack - connection accepted, session present: {}", self.elapsed_time_ms, connack.session_present);
            self.change_state(ProtocolStateType::Connected);
            client_events.push_back(ClientEvent::ConnectionSuccess(connack));
        } else {
            error!("[{} ms] handle_connack - connection refused with return code {} ({})", self.elapsed_time_ms, connack.return_code.to_u8(), connack.return_code);
            self.close_transport();
            self.change_state(ProtocolStateType::Disconnected);
            self.keep_alive.reset();
            client_events.push_back(ClientEvent::ConnectionFailure(MqttError::new_connection_refused(connack.return_code)));
        }

        Ok(())
    }

    fn handle_publish(&mut self, publish: PublishPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_publish - processing PUBLISH packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Publish) {
            return Ok(());
        }

        match publish.qos {
            QualityOfService::AtMostOnce => {
                client_events.push_back(ClientEvent::PublishReceived(publish));
            }
            QualityOfService::AtLeastOnce => {
                self.send_packet(&MqttPacket::Puback(PubackPacket::new(publish.packet_id)), client_events)?;
                client_events.push_back(ClientEvent::PublishReceived(publish));
            }
            QualityOfService::ExactlyOnce => {
                let packet_id = publish.packet_id;
                if !self.qos.on_incoming_qos2_publish(publish) {
                    debug!("[{} ms] handle_publish - duplicate delivery of unreleased QoS 2 publish {}", self.elapsed_time_ms, packet_id);
                }

                self.send_packet(&MqttPacket::Pubrec(PubrecPacket::new(packet_id)), client_events)?;
            }
        }

        Ok(())
    }

    fn handle_puback(&mut self, puback: PubackPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_puback - processing PUBACK packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Puback) {
            return Ok(());
        }

        let packet_id = puback.packet_id;
        if self.qos.on_puback(packet_id) {
            self.packet_ids.release(packet_id);
            client_events.push_back(ClientEvent::PublishComplete(packet_id));
        } else {
            debug!("[{} ms] handle_puback - no pending QoS 1 publish for packet id {}", self.elapsed_time_ms, packet_id);
        }

        Ok(())
    }

    fn handle_pubrec(&mut self, pubrec: PubrecPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_pubrec - processing PUBREC packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Pubrec) {
            return Ok(());
        }

        let packet_id = pubrec.packet_id;
        if self.qos.on_pubrec(packet_id) {
            return self.send_packet(&MqttPacket::Pubrel(PubrelPacket::new(packet_id)), client_events);
        }

        debug!("[{} ms] handle_pubrec - no pending QoS 2 publish for packet id {}", self.elapsed_time_ms, packet_id);
        Ok(())
    }

    fn handle_pubrel(&mut self, pubrel: PubrelPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_pubrel - processing PUBREL packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Pubrel) {
            return Ok(());
        }

        // the server expects a PUBCOMP for every PUBREL, whether or not we still hold the message
        let packet_id = pubrel.packet_id;
        self.send_packet(&MqttPacket::Pubcomp(PubcompPacket::new(packet_id)), client_events)?;

        if let Some(publish) = self.qos.on_pubrel(packet_id) {
            client_events.push_back(ClientEvent::PublishReceived(publish));
        } else {
            debug!("[{} ms] handle_pubrel - no unreleased QoS 2 publish for packet id {}", self.elapsed_time_ms, packet_id);
        }

        Ok(())
    }

    fn handle_pubcomp(&mut self, pubcomp: PubcompPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_pubcomp - processing PUBCOMP packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Pubcomp) {
            return Ok(());
        }

        let packet_id = pubcomp.packet_id;
        if self.qos.on_pubcomp(packet_id) {
            self.packet_ids.release(packet_id);
            client_events.push_back(ClientEvent::PublishComplete(packet_id));
        } else {
            debug!("[{} ms] handle_pubcomp - no released QoS 2 publish for packet id {}", self.elapsed_time_ms, packet_id);
        }

        Ok(())
    }

    fn handle_suback(&mut self, suback: SubackPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_suback - processing SUBACK packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Suback) {
            return Ok(());
        }

        let packet_id = suback.packet_id;
        if self.qos.on_suback(packet_id) {
            self.packet_ids.release(packet_id);
            client_events.push_back(ClientEvent::SubscribeComplete(suback));
        } else {
            debug!("[{} ms] handle_suback - no pending subscribe for packet id {}", self.elapsed_time_ms, packet_id);
        }

        Ok(())
    }

    fn handle_unsuback(&mut self, unsuback: UnsubackPacket, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_unsuback - processing UNSUBACK packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Unsuback) {
            return Ok(());
        }

        let packet_id = unsuback.packet_id;
        if self.qos.on_unsuback(packet_id) {
            self.packet_ids.release(packet_id);
            client_events.push_back(ClientEvent::UnsubscribeComplete(packet_id));
        } else {
            debug!("[{} ms] handle_unsuback - no pending unsubscribe for packet id {}", self.elapsed_time_ms, packet_id);
        }

        Ok(())
    }

    fn handle_pingresp(&mut self, client_events: &mut VecDeque<ClientEvent>) -> MqttResult<()> {
        info!("[{} ms] handle_pingresp - processing PINGRESP packet", self.elapsed_time_ms);
        if !self.is_valid_state_for_packet(PacketType::Pingresp) {
            return Ok(());
        }

        client_events.push_back(ClientEvent::PingResponse);

        Ok(())
    }
}
