/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::client::*;
use crate::config::*;
use crate::error::{InvalidTopic, MqttError, MqttResult};
use crate::mqtt::*;
use crate::protocol::*;
use crate::protocol::qos::OutboundPublishPhase;
use crate::testing::mock_transport::*;

use assert_matches::assert_matches;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

fn build_standard_test_config() -> ProtocolStateConfig {
    ProtocolStateConfig {
        connect_options : ConnectOptions::builder().with_client_id("DefaultTesting").with_keep_alive_interval_seconds(0).build(),
        base_timestamp: Instant::now(),
    }
}

fn build_test_config(connect_options: ConnectOptions) -> ProtocolStateConfig {
    ProtocolStateConfig {
        connect_options,
        base_timestamp: Instant::now(),
    }
}

pub(crate) struct ProtocolStateTestFixture {
    base_timestamp: Instant,

    pub(crate) client_state: ProtocolState,

    pub(crate) client_events: VecDeque<ClientEvent>,

    pub(crate) broker_packet_handlers: PacketHandlerSet,

    // state of the most recently opened mock transport
    pub(crate) transport_state: SharedMockTransportState,
}

impl ProtocolStateTestFixture {

    pub(crate) fn new(config : ProtocolStateConfig) -> Self {
        Self {
            base_timestamp : config.base_timestamp,
            client_state: ProtocolState::new(config),
            client_events : VecDeque::new(),
            broker_packet_handlers : create_default_packet_handlers(),
            transport_state: SharedMockTransportState::default(),
        }
    }

    fn time(&self, elapsed_millis: u64) -> Instant {
        self.base_timestamp + Duration::from_millis(elapsed_millis)
    }

    fn apply_network_event(&mut self, elapsed_millis: u64, connection_id: u64, event: NetworkEvent) -> MqttResult<()> {
        let context = NetworkEventContext {
            event,
            connection_id,
            current_time: self.time(elapsed_millis),
            client_events: &mut self.client_events,
        };

        self.client_state.handle_network_event(context)
    }

    fn apply_user_event(&mut self, elapsed_millis: u64, event: UserEvent) -> MqttResult<Option<u16>> {
        let context = UserEventContext {
            event,
            current_time: self.time(elapsed_millis),
            client_events: &mut self.client_events,
        };

        let result = self.client_state.handle_user_event(context);
        self.deliver_broker_responses(elapsed_millis)?;

        result
    }

    // hands everything the mock broker has answered so far back to the client, including
    // answers to packets the client writes along the way
    pub(crate) fn deliver_broker_responses(&mut self, elapsed_millis: u64) -> MqttResult<()> {
        loop {
            let next_packet = self.transport_state.lock().unwrap().pending_responses.pop_front();
            match next_packet {
                Some(packet) => {
                    let connection_id = self.client_state.connection_id();
                    self.apply_network_event(elapsed_millis, connection_id, NetworkEvent::PacketReceived(packet))?;
                }
                None => { return Ok(()); }
            }
        }
    }

    pub(crate) fn start_connect(&mut self, elapsed_millis: u64) -> MqttResult<u64> {
        let current_time = self.time(elapsed_millis);
        self.client_state.start_connect(&current_time)
    }

    pub(crate) fn on_connection_opened_with_id(&mut self, elapsed_millis: u64, connection_id: u64) -> MqttResult<()> {
        self.transport_state = SharedMockTransportState::default();
        let transport = MockTransport::new(self.transport_state.clone(), self.broker_packet_handlers.clone(), None);

        self.apply_network_event(elapsed_millis, connection_id, NetworkEvent::ConnectionOpened(Box::new(transport)))?;
        self.deliver_broker_responses(elapsed_millis)
    }

    pub(crate) fn on_connection_opened(&mut self, elapsed_millis: u64) -> MqttResult<()> {
        let connection_id = self.client_state.connection_id();
        self.on_connection_opened_with_id(elapsed_millis, connection_id)
    }

    pub(crate) fn on_connection_failed(&mut self, elapsed_millis: u64, error: MqttError) -> MqttResult<()> {
        let connection_id = self.client_state.connection_id();
        self.apply_network_event(elapsed_millis, connection_id, NetworkEvent::ConnectionFailed(error))
    }

    pub(crate) fn on_connection_closed(&mut self, elapsed_millis: u64) -> MqttResult<()> {
        let connection_id = self.client_state.connection_id();
        self.apply_network_event(elapsed_millis, connection_id, NetworkEvent::ConnectionClosed)
    }

    pub(crate) fn on_packet_received_with_id(&mut self, elapsed_millis: u64, connection_id: u64, packet: MqttPacket) -> MqttResult<()> {
        self.apply_network_event(elapsed_millis, connection_id, NetworkEvent::PacketReceived(packet))?;
        self.deliver_broker_responses(elapsed_millis)
    }

    pub(crate) fn on_packet_received(&mut self, elapsed_millis: u64, packet: MqttPacket) -> MqttResult<()> {
        let connection_id = self.client_state.connection_id();
        self.on_packet_received_with_id(elapsed_millis, connection_id, packet)
    }

    pub(crate) fn connect(&mut self, elapsed_millis: u64) -> MqttResult<()> {
        self.start_connect(elapsed_millis)?;
        self.on_connection_opened(elapsed_millis)
    }

    pub(crate) fn publish(&mut self, elapsed_millis: u64, publish: PublishPacket) -> MqttResult<Option<u16>> {
        self.apply_user_event(elapsed_millis, UserEvent::Publish(publish))
    }

    pub(crate) fn subscribe(&mut self, elapsed_millis: u64, subscribe: SubscribePacket) -> MqttResult<Option<u16>> {
        self.apply_user_event(elapsed_millis, UserEvent::Subscribe(subscribe))
    }

    pub(crate) fn unsubscribe(&mut self, elapsed_millis: u64, unsubscribe: UnsubscribePacket) -> MqttResult<Option<u16>> {
        self.apply_user_event(elapsed_millis, UserEvent::Unsubscribe(unsubscribe))
    }

    pub(crate) fn ping(&mut self, elapsed_millis: u64) -> MqttResult<Option<u16>> {
        self.apply_user_event(elapsed_millis, UserEvent::Ping)
    }

    pub(crate) fn disconnect(&mut self, elapsed_millis: u64) -> MqttResult<Option<u16>> {
        self.apply_user_event(elapsed_millis, UserEvent::Disconnect)
    }

    pub(crate) fn service(&mut self, elapsed_millis: u64) -> MqttResult<()> {
        let context = ServiceContext {
            current_time: self.time(elapsed_millis),
            client_events: &mut self.client_events,
        };

        self.client_state.service(context)?;
        self.deliver_broker_responses(elapsed_millis)
    }

    pub(crate) fn get_next_service_time(&mut self, elapsed_millis: u64) -> Option<u64> {
        let current_time = self.time(elapsed_millis);
        self.client_state.get_next_service_timepoint(&current_time).map(|timepoint| (timepoint - self.base_timestamp).as_millis() as u64)
    }

    pub(crate) fn take_events(&mut self) -> Vec<ClientEvent> {
        self.client_events.drain(..).collect()
    }

    pub(crate) fn written_packets(&self) -> Vec<MqttPacket> {
        self.transport_state.lock().unwrap().written_packets.clone()
    }

    pub(crate) fn last_written_packet(&self) -> Option<MqttPacket> {
        self.transport_state.lock().unwrap().written_packets.last().cloned()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.transport_state.lock().unwrap().close_count
    }
}

fn build_connected_fixture(config: ProtocolStateConfig) -> ProtocolStateTestFixture {
    let mut fixture = ProtocolStateTestFixture::new(config);
    assert!(fixture.connect(0).is_ok());
    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
    fixture.take_events();

    fixture
}

// connected fixture whose broker never answers the given packet types
fn build_connected_fixture_with_silent_broker(config: ProtocolStateConfig, packet_types: &[PacketType]) -> ProtocolStateTestFixture {
    let mut fixture = ProtocolStateTestFixture::new(config);
    for packet_type in packet_types {
        fixture.broker_packet_handlers.insert(*packet_type, handle_with_nothing());
    }

    assert!(fixture.connect(0).is_ok());
    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
    fixture.take_events();

    fixture
}

fn build_publish(topic: &str, qos: QualityOfService) -> PublishPacket {
    PublishPacket::builder(topic.to_string(), qos).with_payload("payload".as_bytes().to_vec()).build()
}

fn verify_operations_fail_with_invalid_state(fixture: &mut ProtocolStateTestFixture) {
    let written_count = fixture.written_packets().len();

    assert_matches!(fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)), Err(MqttError::InvalidState(_)));
    assert_matches!(fixture.subscribe(0, SubscribePacket::builder().with_topic_filter("a/#", QualityOfService::AtMostOnce).build()), Err(MqttError::InvalidState(_)));
    assert_matches!(fixture.unsubscribe(0, UnsubscribePacket::builder().with_topic_filter("a/#").build()), Err(MqttError::InvalidState(_)));
    assert_matches!(fixture.ping(0), Err(MqttError::InvalidState(_)));

    assert_eq!(written_count, fixture.written_packets().len());
    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn disconnected_state_operations_fail() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());

    verify_operations_fail_with_invalid_state(&mut fixture);
    assert_matches!(fixture.disconnect(0), Err(MqttError::InvalidState(context)) => {
        assert_eq!(ProtocolStateType::Disconnected, context.state);
    });
}

#[test]
fn disconnected_state_next_service_time_never() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());

    assert_eq!(None, fixture.get_next_service_time(0));
}

#[test]
fn disconnected_state_network_events_ignored() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());

    assert!(fixture.on_connection_closed(0).is_ok());
    assert!(fixture.on_packet_received(0, MqttPacket::Puback(PubackPacket::new(1))).is_ok());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn connecting_state_operations_fail() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Connect, handle_with_nothing());

    assert!(fixture.connect(0).is_ok());
    assert_eq!(ProtocolStateType::Connecting, fixture.client_state.state());

    verify_operations_fail_with_invalid_state(&mut fixture);
}

#[test]
fn connect_success() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());

    assert_eq!(1, fixture.start_connect(0).unwrap());
    assert_eq!(ProtocolStateType::Connecting, fixture.client_state.state());

    assert!(fixture.on_connection_opened(0).is_ok());
    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());

    assert_matches!(fixture.written_packets().as_slice(), [MqttPacket::Connect(connect)] => {
        assert_eq!("DefaultTesting", connect.client_id());
        assert_eq!("MQTT", connect.protocol_name());
        assert_eq!(4, connect.protocol_level());
        assert!(connect.clean_session());
    });

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionSuccess(connack)] => {
        assert!(!connack.session_present());
        assert_eq!(ConnectReturnCode::Accepted, connack.return_code());
    });
}

#[test]
fn connect_while_connected_fails() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_matches!(fixture.start_connect(0), Err(MqttError::InvalidState(context)) => {
        assert_eq!(ProtocolStateType::Connected, context.state);
    });
    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
}

#[test]
fn connect_generates_client_id_once() {
    let mut fixture = ProtocolStateTestFixture::new(build_test_config(ConnectOptions::default()));
    assert_eq!("", fixture.client_state.client_id());

    assert!(fixture.connect(0).is_ok());
    let client_id = fixture.client_state.client_id().to_string();
    assert_eq!(36, client_id.len());
    assert_matches!(fixture.written_packets().first(), Some(MqttPacket::Connect(connect)) => {
        assert_eq!(client_id.as_str(), connect.client_id());
    });

    assert!(fixture.disconnect(0).is_ok());
    assert!(fixture.connect(0).is_ok());
    assert_eq!(client_id, fixture.client_state.client_id());
    assert_matches!(fixture.written_packets().first(), Some(MqttPacket::Connect(connect)) => {
        assert_eq!(client_id.as_str(), connect.client_id());
    });
}

#[test]
fn connect_sends_empty_client_id_without_generation() {
    let options = ConnectOptions::builder().with_auto_generate_client_id(false).build();
    let mut fixture = ProtocolStateTestFixture::new(build_test_config(options));

    assert!(fixture.connect(0).is_ok());
    assert_eq!("", fixture.client_state.client_id());
    assert_matches!(fixture.written_packets().first(), Some(MqttPacket::Connect(connect)) => {
        assert_eq!("", connect.client_id());
    });
}

#[test]
fn connect_sends_credentials_and_will() {
    let options = ConnectOptions::builder()
        .with_client_id("will-test")
        .with_username("user")
        .with_password("secret".as_bytes())
        .with_will(WillMessage::new("status/will-test", "offline".as_bytes(), QualityOfService::AtLeastOnce, true))
        .build();
    let mut fixture = ProtocolStateTestFixture::new(build_test_config(options));

    assert!(fixture.connect(0).is_ok());
    assert_matches!(fixture.written_packets().first(), Some(MqttPacket::Connect(connect)) => {
        assert_eq!(Some("user"), connect.username());
        assert_eq!(Some("secret".as_bytes()), connect.password());
        let will = connect.will().unwrap();
        assert_eq!("status/will-test", will.topic());
        assert_eq!(QualityOfService::AtLeastOnce, will.qos());
        assert!(will.retain());
    });
}

fn do_connack_refusal_test(return_code: ConnectReturnCode) {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Connect, handle_connect_with_refusal(return_code));

    assert!(fixture.connect(0).is_ok());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(1, fixture.close_count());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionFailure(MqttError::ConnectionRefused(context))] => {
        assert_eq!(return_code, context.return_code);
    });

    // a refused connection reports through the connect result only
    assert!(fixture.on_connection_closed(0).is_ok());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn connack_refusal_not_authorized() {
    do_connack_refusal_test(ConnectReturnCode::NotAuthorized);
}

#[test]
fn connack_refusal_identifier_rejected() {
    do_connack_refusal_test(ConnectReturnCode::IdentifierRejected);
}

#[test]
fn connack_refusal_reserved_code_preserved() {
    do_connack_refusal_test(ConnectReturnCode::Reserved(77));
}

#[test]
fn connection_failed_reports_connect_failure() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());

    assert!(fixture.start_connect(0).is_ok());
    assert!(fixture.on_connection_failed(0, MqttError::new_transport_error("no route to host")).is_ok());

    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionFailure(MqttError::TransportError(_))]);
}

#[test]
fn connection_closed_while_connecting() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Connect, handle_with_nothing());

    assert!(fixture.connect(0).is_ok());
    assert!(fixture.on_connection_closed(0).is_ok());

    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionFailure(MqttError::ConnectionClosed(_))]);
}

#[test]
fn connack_while_connected_ignored() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert!(fixture.on_packet_received(0, MqttPacket::Connack(ConnackPacket::new(false, ConnectReturnCode::NotAuthorized))).is_ok());
    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn publish_before_connack_ignored() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Connect, handle_with_nothing());

    assert!(fixture.connect(0).is_ok());
    assert!(fixture.on_packet_received(0, MqttPacket::Publish(build_publish("a/b", QualityOfService::AtLeastOnce))).is_ok());

    assert!(fixture.client_events.is_empty());
    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
}

#[test]
fn client_only_packet_from_server_ignored() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert!(fixture.on_packet_received(0, MqttPacket::Pingreq(PingreqPacket{})).is_ok());
    assert!(fixture.on_packet_received(0, MqttPacket::Disconnect(DisconnectPacket{})).is_ok());

    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn qos0_publish_releases_packet_id() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::AtMostOnce)).unwrap());
    assert_eq!(Some(2), fixture.publish(0, build_publish("a/b", QualityOfService::AtMostOnce)).unwrap());

    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());
    assert_eq!(0, fixture.client_state.qos.pending_outbound_count());

    assert_matches!(fixture.last_written_packet(), Some(MqttPacket::Publish(publish)) => {
        assert_eq!(2, publish.packet_id());
        assert_eq!("a/b", publish.topic());
        assert_eq!("payload".as_bytes(), publish.payload());
    });

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishSent(1), ClientEvent::PublishSent(2)]);
}

#[test]
fn qos1_publish_completes_once() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).unwrap());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishSent(1), ClientEvent::PublishComplete(1)]);
    assert!(!fixture.client_state.packet_ids.is_allocated(1));

    // duplicate acknowledgement
    assert!(fixture.on_packet_received(0, MqttPacket::Puback(PubackPacket::new(1))).is_ok());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn qos1_publish_pending_until_puback() {
    let mut fixture = build_connected_fixture_with_silent_broker(build_standard_test_config(), &[PacketType::Publish]);

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).unwrap());
    assert!(fixture.client_state.packet_ids.is_allocated(1));

    // PUBREC and PUBCOMP do not complete a QoS 1 publish
    assert!(fixture.on_packet_received(0, MqttPacket::Pubrec(PubrecPacket::new(1))).is_ok());
    assert!(fixture.on_packet_received(0, MqttPacket::Pubcomp(PubcompPacket::new(1))).is_ok());
    assert_matches!(fixture.take_events().as_slice(), [ClientEvent::PublishSent(1)]);

    assert!(fixture.on_packet_received(0, MqttPacket::Puback(PubackPacket::new(1))).is_ok());
    assert_matches!(fixture.take_events().as_slice(), [ClientEvent::PublishComplete(1)]);
    assert!(!fixture.client_state.packet_ids.is_allocated(1));
}

#[test]
fn qos2_publish_full_exchange() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    for _ in 0..4 {
        assert!(fixture.publish(0, build_publish("warmup", QualityOfService::AtMostOnce)).is_ok());
    }
    fixture.take_events();

    assert_eq!(Some(5), fixture.publish(0, build_publish("a/b", QualityOfService::ExactlyOnce)).unwrap());

    let written = fixture.written_packets();
    assert_matches!(&written[written.len() - 2..], [MqttPacket::Publish(publish), MqttPacket::Pubrel(pubrel)] => {
        assert_eq!(5, publish.packet_id());
        assert_eq!(QualityOfService::ExactlyOnce, publish.qos());
        assert_eq!(5, pubrel.packet_id());
    });

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishSent(5), ClientEvent::PublishComplete(5)]);
    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());
}

#[test]
fn qos2_publish_step_by_step() {
    let mut fixture = build_connected_fixture_with_silent_broker(build_standard_test_config(), &[PacketType::Publish, PacketType::Pubrel]);

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::ExactlyOnce)).unwrap());
    assert_eq!(Some(OutboundPublishPhase::AwaitingReceipt), fixture.client_state.qos.publish_phase(1));

    // PUBCOMP before PUBREC is not a completion
    assert!(fixture.on_packet_received(0, MqttPacket::Pubcomp(PubcompPacket::new(1))).is_ok());
    assert_eq!(Some(OutboundPublishPhase::AwaitingReceipt), fixture.client_state.qos.publish_phase(1));

    assert!(fixture.on_packet_received(0, MqttPacket::Pubrec(PubrecPacket::new(1))).is_ok());
    assert_eq!(Some(OutboundPublishPhase::AwaitingCompletion), fixture.client_state.qos.publish_phase(1));

    // a repeated PUBREC gets the PUBREL again
    assert!(fixture.on_packet_received(0, MqttPacket::Pubrec(PubrecPacket::new(1))).is_ok());
    assert_eq!(
        vec![PacketType::Connect, PacketType::Publish, PacketType::Pubrel, PacketType::Pubrel],
        written_packet_types(&fixture.transport_state));

    assert!(fixture.on_packet_received(0, MqttPacket::Pubcomp(PubcompPacket::new(1))).is_ok());
    assert!(fixture.on_packet_received(0, MqttPacket::Pubcomp(PubcompPacket::new(1))).is_ok());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishSent(1), ClientEvent::PublishComplete(1)]);
    assert_eq!(None, fixture.client_state.qos.publish_phase(1));
}

#[test]
fn publish_invalid_topic_checked_before_state() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());

    assert_matches!(fixture.publish(0, build_publish("a/+", QualityOfService::AtMostOnce)), Err(MqttError::InvalidTopic(context)) => {
        assert_eq!(InvalidTopic::BadWildcard, context.reason);
    });
}

#[test]
fn publish_validation_precedes_packet_id_allocation() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_matches!(fixture.publish(0, build_publish("", QualityOfService::AtLeastOnce)), Err(MqttError::InvalidTopic(context)) => {
        assert_eq!(InvalidTopic::LengthOutOfRange, context.reason);
    });
    assert_matches!(fixture.publish(0, build_publish("a/\u{0}", QualityOfService::AtLeastOnce)), Err(MqttError::InvalidTopic(_)));

    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
    assert!(fixture.client_events.is_empty());

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).unwrap());
}

#[test]
fn subscribe_completes_with_suback() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    let subscribe = SubscribePacket::builder()
        .with_topic_filter("sensors/+/temperature", QualityOfService::AtLeastOnce)
        .with_topic_filter("alerts/#", QualityOfService::ExactlyOnce)
        .build();

    assert_eq!(Some(1), fixture.subscribe(0, subscribe).unwrap());

    assert_matches!(fixture.written_packets().get(1), Some(MqttPacket::Subscribe(subscribe)) => {
        assert_eq!(1, subscribe.packet_id());
        assert_eq!(2, subscribe.subscriptions().len());
    });

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::SubscribeComplete(suback)] => {
        assert_eq!(1, suback.packet_id());
        assert_eq!(&[SubackReturnCode::GrantedQos1, SubackReturnCode::GrantedQos2], suback.return_codes());
    });
    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());
}

#[test]
fn subscribe_failure_return_code_delivered() {
    let mut fixture = build_connected_fixture_with_silent_broker(build_standard_test_config(), &[PacketType::Subscribe]);

    let subscribe = SubscribePacket::builder().with_topic_filter("forbidden/#", QualityOfService::AtMostOnce).build();
    assert_eq!(Some(1), fixture.subscribe(0, subscribe).unwrap());
    assert!(fixture.on_packet_received(0, MqttPacket::Suback(SubackPacket::new(1, vec![SubackReturnCode::Failure]))).is_ok());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::SubscribeComplete(suback)] => {
        assert_eq!(None, suback.return_codes()[0].granted_qos());
    });
}

#[test]
fn subscribe_validation_failures() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_matches!(fixture.subscribe(0, SubscribePacket::builder().build()), Err(MqttError::PacketValidation(context)) => {
        assert_eq!(PacketType::Subscribe, context.packet_type);
    });

    let subscribe = SubscribePacket::builder()
        .with_topic_filter("valid/#", QualityOfService::AtMostOnce)
        .with_topic_filter("a/#/b", QualityOfService::AtMostOnce)
        .build();
    assert_matches!(fixture.subscribe(0, subscribe), Err(MqttError::InvalidTopic(context)) => {
        assert_eq!("a/#/b", context.topic);
    });

    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());
}

#[test]
fn unsubscribe_completes_with_unsuback() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    let unsubscribe = UnsubscribePacket::builder().with_topic_filter("a/+").with_topic_filter("b/#").build();
    assert_eq!(Some(1), fixture.unsubscribe(0, unsubscribe).unwrap());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::UnsubscribeComplete(1)]);

    // a stale UNSUBACK changes nothing
    assert!(fixture.on_packet_received(0, MqttPacket::Unsuback(UnsubackPacket::new(1))).is_ok());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn unsubscribe_validation_failures() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_matches!(fixture.unsubscribe(0, UnsubscribePacket::builder().build()), Err(MqttError::PacketValidation(_)));
    assert_matches!(fixture.unsubscribe(0, UnsubscribePacket::builder().with_topic_filter("a#").build()), Err(MqttError::InvalidTopic(_)));

    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
}

#[test]
fn incoming_qos0_publish_delivered() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert!(fixture.on_packet_received(0, MqttPacket::Publish(build_publish("a/b", QualityOfService::AtMostOnce))).is_ok());

    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishReceived(publish)] => {
        assert_eq!("a/b", publish.topic());
    });
}

#[test]
fn incoming_qos1_publish_acknowledged_and_delivered() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    let publish = PublishPacket::builder("a/b".to_string(), QualityOfService::AtLeastOnce).with_packet_id(3).build();
    assert!(fixture.on_packet_received(0, MqttPacket::Publish(publish)).is_ok());

    assert_eq!(Some(MqttPacket::Puback(PubackPacket::new(3))), fixture.last_written_packet());
    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishReceived(publish)] => {
        assert_eq!(3, publish.packet_id());
    });
}

#[test]
fn incoming_qos2_publish_delivered_on_pubrel() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    let publish = PublishPacket::builder("a/b".to_string(), QualityOfService::ExactlyOnce)
        .with_packet_id(7)
        .with_payload("first".as_bytes().to_vec())
        .build();
    assert!(fixture.on_packet_received(0, MqttPacket::Publish(publish.clone())).is_ok());
    assert_eq!(Some(MqttPacket::Pubrec(PubrecPacket::new(7))), fixture.last_written_packet());
    assert!(fixture.client_events.is_empty());

    // redelivery before release is acknowledged again but not stored twice
    let duplicate = PublishPacket::builder("a/b".to_string(), QualityOfService::ExactlyOnce)
        .with_packet_id(7)
        .with_duplicate(true)
        .with_payload("second".as_bytes().to_vec())
        .build();
    assert!(fixture.on_packet_received(0, MqttPacket::Publish(duplicate)).is_ok());
    assert_eq!(Some(MqttPacket::Pubrec(PubrecPacket::new(7))), fixture.last_written_packet());
    assert!(fixture.client_events.is_empty());
    assert_eq!(1, fixture.client_state.qos.incoming_qos2_count());

    assert!(fixture.on_packet_received(0, MqttPacket::Pubrel(PubrelPacket::new(7))).is_ok());
    assert_eq!(Some(MqttPacket::Pubcomp(PubcompPacket::new(7))), fixture.last_written_packet());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishReceived(received)] => {
        assert_eq!(&publish, received);
    });

    // a second release is completed without another delivery
    assert!(fixture.on_packet_received(0, MqttPacket::Pubrel(PubrelPacket::new(7))).is_ok());
    assert_eq!(Some(MqttPacket::Pubcomp(PubcompPacket::new(7))), fixture.last_written_packet());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn pubrel_without_stored_publish_still_completed() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert!(fixture.on_packet_received(0, MqttPacket::Pubrel(PubrelPacket::new(42))).is_ok());

    assert_eq!(Some(MqttPacket::Pubcomp(PubcompPacket::new(42))), fixture.last_written_packet());
    assert!(fixture.client_events.is_empty());
}

fn do_incoming_qos2_across_reconnect_test(clean_session: bool) -> Vec<ClientEvent> {
    let options = ConnectOptions::builder()
        .with_client_id("persistent")
        .with_clean_session(clean_session)
        .with_keep_alive_interval_seconds(0)
        .build();
    let mut fixture = build_connected_fixture(build_test_config(options));

    let publish = PublishPacket::builder("a/b".to_string(), QualityOfService::ExactlyOnce).with_packet_id(7).build();
    assert!(fixture.on_packet_received(0, MqttPacket::Publish(publish)).is_ok());

    assert!(fixture.on_connection_closed(0).is_ok());
    assert!(fixture.connect(0).is_ok());
    fixture.take_events();

    assert!(fixture.on_packet_received(0, MqttPacket::Pubrel(PubrelPacket::new(7))).is_ok());
    assert_eq!(Some(MqttPacket::Pubcomp(PubcompPacket::new(7))), fixture.last_written_packet());

    fixture.take_events()
}

#[test]
fn incoming_qos2_survives_reconnect_with_persistent_session() {
    let events = do_incoming_qos2_across_reconnect_test(false);
    assert_matches!(events.as_slice(), [ClientEvent::PublishReceived(publish)] => {
        assert_eq!(7, publish.packet_id());
    });
}

#[test]
fn incoming_qos2_discarded_with_clean_session() {
    let events = do_incoming_qos2_across_reconnect_test(true);
    assert!(events.is_empty());
}

#[test]
fn ping_response_reported() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_eq!(None, fixture.ping(0).unwrap());
    assert_eq!(Some(MqttPacket::Pingreq(PingreqPacket{})), fixture.last_written_packet());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PingResponse]);
}

#[test]
fn keep_alive_pings_after_write_idle_interval() {
    let options = ConnectOptions::builder().with_client_id("keepalive").with_keep_alive_interval_seconds(10).build();
    let mut fixture = ProtocolStateTestFixture::new(build_test_config(options));

    assert!(fixture.start_connect(0).is_ok());
    assert_eq!(None, fixture.get_next_service_time(0));

    assert!(fixture.on_connection_opened(0).is_ok());
    fixture.take_events();
    assert_eq!(Some(10000), fixture.get_next_service_time(0));

    assert!(fixture.service(5000).is_ok());
    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));

    // any write pushes the ping out
    assert!(fixture.publish(5000, build_publish("a/b", QualityOfService::AtMostOnce)).is_ok());
    assert_eq!(Some(15000), fixture.get_next_service_time(5000));

    assert!(fixture.service(14999).is_ok());
    assert_eq!(vec![PacketType::Connect, PacketType::Publish], written_packet_types(&fixture.transport_state));

    assert!(fixture.service(15000).is_ok());
    assert_eq!(vec![PacketType::Connect, PacketType::Publish, PacketType::Pingreq], written_packet_types(&fixture.transport_state));
    assert_eq!(Some(25000), fixture.get_next_service_time(15000));

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::PublishSent(1), ClientEvent::PingResponse]);
}

#[test]
fn keep_alive_not_scheduled_while_connecting() {
    let options = ConnectOptions::builder().with_client_id("keepalive").with_keep_alive_interval_seconds(10).build();
    let mut fixture = ProtocolStateTestFixture::new(build_test_config(options));
    fixture.broker_packet_handlers.insert(PacketType::Connect, handle_with_nothing());

    assert!(fixture.connect(0).is_ok());
    assert_eq!(None, fixture.get_next_service_time(0));

    assert!(fixture.service(60000).is_ok());
    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
}

#[test]
fn keep_alive_disabled() {
    let zero_interval = ConnectOptions::builder().with_keep_alive_interval_seconds(0).build();
    let mut fixture = build_connected_fixture(build_test_config(zero_interval));
    assert_eq!(None, fixture.get_next_service_time(0));

    let manual = ConnectOptions::builder().with_keep_alive_interval_seconds(10).with_auto_keep_alive(false).build();
    let mut fixture = build_connected_fixture(build_test_config(manual));
    assert_eq!(None, fixture.get_next_service_time(0));
    assert_matches!(fixture.written_packets().first(), Some(MqttPacket::Connect(connect)) => {
        assert_eq!(10, connect.keep_alive_interval_seconds());
    });

    assert!(fixture.service(60000).is_ok());
    assert_eq!(vec![PacketType::Connect], written_packet_types(&fixture.transport_state));
}

#[test]
fn write_failure_closes_connection() {
    let mut fixture = build_connected_fixture_with_silent_broker(build_standard_test_config(), &[PacketType::Publish]);

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).unwrap());
    fixture.take_events();

    fixture.transport_state.lock().unwrap().fail_writes = true;
    assert_matches!(fixture.publish(0, build_publish("a/b", QualityOfService::AtMostOnce)), Err(MqttError::TransportError(_)));

    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(1, fixture.close_count());
    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::OperationAbandoned(AbandonedOperation::Publish(publish)), ClientEvent::ConnectionClosed] => {
        assert_eq!(1, publish.packet_id());
    });
}

#[test]
fn connect_write_failure_reports_connect_failure() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    assert!(fixture.start_connect(0).is_ok());

    let connection_id = fixture.client_state.connection_id();
    let transport_state = SharedMockTransportState::default();
    transport_state.lock().unwrap().fail_writes = true;
    let transport = MockTransport::new(transport_state.clone(), create_default_packet_handlers(), None);

    assert_matches!(fixture.apply_network_event(0, connection_id, NetworkEvent::ConnectionOpened(Box::new(transport))), Err(MqttError::TransportError(_)));
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(1, transport_state.lock().unwrap().close_count);

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionFailure(MqttError::TransportError(_))]);
}

#[test]
fn connection_closed_abandons_pending_operations() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Publish, handle_with_nothing());
    fixture.broker_packet_handlers.insert(PacketType::Subscribe, handle_with_nothing());
    fixture.broker_packet_handlers.insert(PacketType::Unsubscribe, handle_with_nothing());
    assert!(fixture.connect(0).is_ok());

    assert!(fixture.publish(0, build_publish("a/b", QualityOfService::ExactlyOnce)).is_ok());
    assert!(fixture.subscribe(0, SubscribePacket::builder().with_topic_filter("a/#", QualityOfService::AtMostOnce).build()).is_ok());
    assert!(fixture.unsubscribe(0, UnsubscribePacket::builder().with_topic_filter("c/#").build()).is_ok());
    fixture.take_events();

    assert!(fixture.on_connection_closed(0).is_ok());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(0, fixture.client_state.packet_ids.allocated_count());
    assert_eq!(0, fixture.client_state.qos.pending_outbound_count());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [
        ClientEvent::OperationAbandoned(AbandonedOperation::Publish(_)),
        ClientEvent::OperationAbandoned(AbandonedOperation::Subscribe(2)),
        ClientEvent::OperationAbandoned(AbandonedOperation::Unsubscribe(3)),
        ClientEvent::ConnectionClosed
    ]);
}

#[test]
fn disconnect_from_connected() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Publish, handle_with_nothing());
    assert!(fixture.connect(0).is_ok());
    assert!(fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).is_ok());
    fixture.take_events();

    assert_eq!(None, fixture.disconnect(0).unwrap());

    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(Some(MqttPacket::Disconnect(DisconnectPacket{})), fixture.last_written_packet());
    assert_eq!(1, fixture.close_count());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::OperationAbandoned(operation)] => {
        assert_eq!(1, operation.packet_id());
    });

    // the transport reporting its own closure afterwards is not news
    assert!(fixture.on_connection_closed(0).is_ok());
    assert!(fixture.client_events.is_empty());

    verify_operations_fail_with_invalid_state(&mut fixture);
}

#[test]
fn disconnect_succeeds_when_write_fails() {
    let mut fixture = build_connected_fixture(build_standard_test_config());
    fixture.transport_state.lock().unwrap().fail_writes = true;

    assert!(fixture.disconnect(0).is_ok());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(1, fixture.close_count());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn disconnect_while_connecting_cancels_attempt() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    let connection_id = fixture.start_connect(0).unwrap();

    assert!(fixture.disconnect(0).is_ok());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionFailure(MqttError::ConnectionClosed(_))]);

    // the transport for the cancelled attempt shows up late
    assert_matches!(fixture.on_connection_opened_with_id(0, connection_id), Err(MqttError::InvalidState(_)));
    assert_eq!(1, fixture.close_count());
    assert!(fixture.written_packets().is_empty());
    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert!(fixture.client_events.is_empty());
}

#[test]
fn disconnect_while_awaiting_connack_fails_attempt() {
    let mut fixture = ProtocolStateTestFixture::new(build_standard_test_config());
    fixture.broker_packet_handlers.insert(PacketType::Connect, handle_with_nothing());

    assert!(fixture.connect(0).is_ok());
    assert!(fixture.disconnect(0).is_ok());

    assert_eq!(ProtocolStateType::Disconnected, fixture.client_state.state());
    assert_eq!(vec![PacketType::Connect, PacketType::Disconnect], written_packet_types(&fixture.transport_state));
    assert_eq!(1, fixture.close_count());

    let events = fixture.take_events();
    assert_matches!(events.as_slice(), [ClientEvent::ConnectionFailure(MqttError::ConnectionClosed(_))]);
}

#[test]
fn stale_connection_events_ignored() {
    let mut fixture = build_connected_fixture(build_standard_test_config());
    let first_connection_id = fixture.client_state.connection_id();

    assert!(fixture.disconnect(0).is_ok());
    assert!(fixture.connect(0).is_ok());
    fixture.take_events();
    let second_connection_id = fixture.client_state.connection_id();
    assert_ne!(first_connection_id, second_connection_id);

    assert!(fixture.on_packet_received_with_id(0, first_connection_id, MqttPacket::Publish(build_publish("a/b", QualityOfService::AtMostOnce))).is_ok());
    assert!(fixture.apply_network_event(0, first_connection_id, NetworkEvent::ConnectionClosed).is_ok());

    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
    assert!(fixture.client_events.is_empty());

    let stale_transport_state = SharedMockTransportState::default();
    let stale_transport = MockTransport::new(stale_transport_state.clone(), create_default_packet_handlers(), None);
    assert_matches!(fixture.apply_network_event(0, first_connection_id, NetworkEvent::ConnectionOpened(Box::new(stale_transport))), Err(MqttError::InvalidState(_)));
    assert_eq!(1, stale_transport_state.lock().unwrap().close_count);
    assert_eq!(ProtocolStateType::Connected, fixture.client_state.state());
}

#[test]
fn packet_ids_continue_across_reconnect() {
    let mut fixture = build_connected_fixture(build_standard_test_config());

    assert_eq!(Some(1), fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).unwrap());
    assert!(fixture.on_connection_closed(0).is_ok());
    assert!(fixture.connect(0).is_ok());

    assert_eq!(Some(2), fixture.publish(0, build_publish("a/b", QualityOfService::AtLeastOnce)).unwrap());
}
