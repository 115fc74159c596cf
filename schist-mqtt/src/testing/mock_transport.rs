/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;
use crate::mqtt::utils::mqtt_packet_to_packet_type;
use crate::transport::*;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

// Broker-side reaction to a packet written by the client
pub(crate) type PacketHandler = Arc<dyn Fn(&MqttPacket, &mut VecDeque<MqttPacket>) + Send + Sync + 'static>;
pub(crate) type PacketHandlerSet = HashMap<PacketType, PacketHandler>;

fn handle_connect_with_successful_connack(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) {
    if let MqttPacket::Connect(connect) = packet {
        response_packets.push_back(MqttPacket::Connack(ConnackPacket::new(!connect.clean_session, ConnectReturnCode::Accepted)));
        return;
    }

    panic!("Invalid packet handler state")
}

pub(crate) fn handle_connect_with_refusal(return_code: ConnectReturnCode) -> PacketHandler {
    Arc::new(move |_, response_packets| {
        response_packets.push_back(MqttPacket::Connack(ConnackPacket::new(false, return_code)));
    })
}

fn handle_publish_with_success(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) {
    if let MqttPacket::Publish(publish) = packet {
        match publish.qos {
            QualityOfService::AtMostOnce => {}
            QualityOfService::AtLeastOnce => {
                response_packets.push_back(MqttPacket::Puback(PubackPacket::new(publish.packet_id)));
            }
            QualityOfService::ExactlyOnce => {
                response_packets.push_back(MqttPacket::Pubrec(PubrecPacket::new(publish.packet_id)));
            }
        }
        return;
    }

    panic!("Invalid packet handler state")
}

fn handle_pubrel_with_success(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) {
    if let MqttPacket::Pubrel(pubrel) = packet {
        response_packets.push_back(MqttPacket::Pubcomp(PubcompPacket::new(pubrel.packet_id)));
        return;
    }

    panic!("Invalid packet handler state")
}

fn handle_subscribe_with_success(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) {
    if let MqttPacket::Subscribe(subscribe) = packet {
        let return_codes = subscribe.subscriptions.iter().map(|subscription| {
            match subscription.qos {
                QualityOfService::AtMostOnce => { SubackReturnCode::GrantedQos0 }
                QualityOfService::AtLeastOnce => { SubackReturnCode::GrantedQos1 }
                QualityOfService::ExactlyOnce => { SubackReturnCode::GrantedQos2 }
            }
        }).collect();

        response_packets.push_back(MqttPacket::Suback(SubackPacket::new(subscribe.packet_id, return_codes)));
        return;
    }

    panic!("Invalid packet handler state")
}

fn handle_unsubscribe_with_success(packet: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) {
    if let MqttPacket::Unsubscribe(unsubscribe) = packet {
        response_packets.push_back(MqttPacket::Unsuback(UnsubackPacket::new(unsubscribe.packet_id)));
        return;
    }

    panic!("Invalid packet handler state")
}

fn handle_pingreq_with_pingresp(_: &MqttPacket, response_packets: &mut VecDeque<MqttPacket>) {
    response_packets.push_back(MqttPacket::Pingresp(PingrespPacket{}));
}

pub(crate) fn handle_with_nothing() -> PacketHandler {
    Arc::new(|_, _| {})
}

pub(crate) fn create_default_packet_handlers() -> PacketHandlerSet {
    let mut handlers : PacketHandlerSet = HashMap::new();

    handlers.insert(PacketType::Connect, Arc::new(handle_connect_with_successful_connack));
    handlers.insert(PacketType::Publish, Arc::new(handle_publish_with_success));
    handlers.insert(PacketType::Pubrel, Arc::new(handle_pubrel_with_success));
    handlers.insert(PacketType::Subscribe, Arc::new(handle_subscribe_with_success));
    handlers.insert(PacketType::Unsubscribe, Arc::new(handle_unsubscribe_with_success));
    handlers.insert(PacketType::Pingreq, Arc::new(handle_pingreq_with_pingresp));

    handlers
}

#[derive(Default)]
pub(crate) struct MockTransportState {
    pub(crate) written_packets: Vec<MqttPacket>,

    // broker responses not yet handed to the client; only used without an event channel
    pub(crate) pending_responses: VecDeque<MqttPacket>,

    pub(crate) fail_writes: bool,
    pub(crate) close_count: usize,
}

pub(crate) type SharedMockTransportState = Arc<Mutex<MockTransportState>>;

pub(crate) fn written_packet_types(state: &SharedMockTransportState) -> Vec<PacketType> {
    state.lock().unwrap().written_packets.iter().map(mqtt_packet_to_packet_type).collect()
}

pub(crate) struct MockTransport {
    state: SharedMockTransportState,
    handlers: PacketHandlerSet,
    events: Option<UnboundedSender<TransportEvent>>,
}

impl MockTransport {
    pub(crate) fn new(state: SharedMockTransportState, handlers: PacketHandlerSet, events: Option<UnboundedSender<TransportEvent>>) -> Self {
        MockTransport {
            state,
            handlers,
            events
        }
    }
}

impl Transport for MockTransport {
    fn write(&mut self, packet: &MqttPacket) -> MqttResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(MqttError::new_transport_error("simulated write failure"));
        }

        state.written_packets.push(packet.clone());

        let mut response_packets = VecDeque::new();
        if let Some(handler) = self.handlers.get(&mqtt_packet_to_packet_type(packet)) {
            (handler)(packet, &mut response_packets);
        }

        match &self.events {
            Some(sender) => {
                for response in response_packets {
                    let _ = sender.send(TransportEvent::PacketReceived(response));
                }
            }
            None => {
                state.pending_responses.append(&mut response_packets);
            }
        }

        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().close_count += 1;
        if let Some(sender) = self.events.take() {
            let _ = sender.send(TransportEvent::Closed);
        }
    }
}

// Test-side handle on a connection the mock connector opened
#[derive(Clone)]
pub(crate) struct MockConnection {
    pub(crate) state: SharedMockTransportState,
    pub(crate) to_client: UnboundedSender<TransportEvent>,
}

pub(crate) struct MockConnector {
    handlers: PacketHandlerSet,
    fail_connect: bool,
    connections: Mutex<Vec<MockConnection>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::new_with_handlers(create_default_packet_handlers())
    }

    pub(crate) fn new_with_handlers(handlers: PacketHandlerSet) -> Self {
        MockConnector {
            handlers,
            fail_connect: false,
            connections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn new_failing() -> Self {
        MockConnector {
            fail_connect: true,
            ..Self::new()
        }
    }

    pub(crate) fn connection(&self, index: usize) -> Option<MockConnection> {
        self.connections.lock().unwrap().get(index).cloned()
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

impl TransportConnector for MockConnector {
    fn connect(&self, _host: &str, _port: u16) -> TransportConnectResult {
        if self.fail_connect {
            return Box::pin(async { Err(MqttError::new_transport_error("simulated connection refusal")) });
        }

        let (sender, receiver) = unbounded_channel();
        let state = SharedMockTransportState::default();
        let transport = MockTransport::new(state.clone(), self.handlers.clone(), Some(sender.clone()));

        self.connections.lock().unwrap().push(MockConnection {
            state,
            to_client: sender,
        });

        Box::pin(async move {
            Ok(TransportConnection::new(Box::new(transport), receiver))
        })
    }
}
