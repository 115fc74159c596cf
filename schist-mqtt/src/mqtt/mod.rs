/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing a set of structured data types that model the MQTT 3.1.1 control packets.

These are the values exchanged with the packet codec; how they map to bytes on the wire is the
codec's business.
 */

mod display;
pub mod utils;

use crate::error::MqttError;

use std::fmt;

/// Protocol name carried in every CONNECT packet.
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protocol level value that identifies MQTT 3.1.1.
pub const PROTOCOL_LEVEL_311: u8 = 4;

pub(crate) const CONNECT_FLAG_CLEAN_SESSION: u8 = 0x02;
pub(crate) const CONNECT_FLAG_WILL: u8 = 0x04;
pub(crate) const CONNECT_FLAG_WILL_QOS_SHIFT: u8 = 3;
pub(crate) const CONNECT_FLAG_WILL_RETAIN: u8 = 0x20;
pub(crate) const CONNECT_FLAG_PASSWORD: u8 = 0x40;
pub(crate) const CONNECT_FLAG_USERNAME: u8 = 0x80;

/// MQTT message delivery quality of service.
///
/// Enum values match [MQTT 3.1.1](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718099) encoding values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum QualityOfService {

    /// The message is delivered according to the capabilities of the underlying network. No response is sent by the
    /// receiver and no retry is performed by the sender. The message arrives at the receiver either once or not at all.
    #[default]
    AtMostOnce = 0,

    /// A level of service that ensures that the message arrives at the receiver at least once.
    AtLeastOnce = 1,

    /// A level of service that ensures that the message arrives at the receiver exactly once.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QualityOfService {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_quality_of_service(value)
    }
}

/// Server return code for connection attempts.
///
/// Values 6-255 are reserved by MQTT 3.1.1; they are preserved verbatim in the `Reserved`
/// variant rather than being collapsed into a generic failure.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectReturnCode {

    /// The connection was accepted.
    #[default]
    Accepted,

    /// The server does not support the level of the MQTT protocol requested by the client.
    UnacceptableProtocolVersion,

    /// The client identifier is correct UTF-8 but not allowed by the server.
    IdentifierRejected,

    /// The network connection has been made but the MQTT service is unavailable.
    ServerUnavailable,

    /// The data in the user name or password is malformed.
    BadUsernameOrPassword,

    /// The client is not authorized to connect.
    NotAuthorized,

    /// A return code MQTT 3.1.1 reserves for future use.
    Reserved(u8),
}

impl ConnectReturnCode {

    /// Returns the return code's wire value
    pub fn to_u8(&self) -> u8 {
        match self {
            ConnectReturnCode::Accepted => { 0 }
            ConnectReturnCode::UnacceptableProtocolVersion => { 1 }
            ConnectReturnCode::IdentifierRejected => { 2 }
            ConnectReturnCode::ServerUnavailable => { 3 }
            ConnectReturnCode::BadUsernameOrPassword => { 4 }
            ConnectReturnCode::NotAuthorized => { 5 }
            ConnectReturnCode::Reserved(value) => { *value }
        }
    }

    /// Returns whether or not the return code indicates the connection was accepted
    pub fn is_accepted(&self) -> bool {
        *self == ConnectReturnCode::Accepted
    }
}

impl From<u8> for ConnectReturnCode {
    fn from(value: u8) -> Self {
        utils::convert_u8_to_connect_return_code(value)
    }
}

/// Per-subscription result within a SUBACK packet.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SubackReturnCode {

    /// The subscription was accepted and the maximum QoS sent will be QoS 0.
    #[default]
    GrantedQos0,

    /// The subscription was accepted and the maximum QoS sent will be QoS 1.
    GrantedQos1,

    /// The subscription was accepted and the maximum QoS sent will be QoS 2.
    GrantedQos2,

    /// The subscription was rejected.
    Failure,
}

impl SubackReturnCode {

    /// Returns the granted quality of service, or None if the subscription failed
    pub fn granted_qos(&self) -> Option<QualityOfService> {
        match self {
            SubackReturnCode::GrantedQos0 => { Some(QualityOfService::AtMostOnce) }
            SubackReturnCode::GrantedQos1 => { Some(QualityOfService::AtLeastOnce) }
            SubackReturnCode::GrantedQos2 => { Some(QualityOfService::ExactlyOnce) }
            SubackReturnCode::Failure => { None }
        }
    }
}

impl TryFrom<u8> for SubackReturnCode {
    type Error = MqttError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        utils::convert_u8_to_suback_return_code(value)
    }
}

/// Message the server publishes on the client's behalf if the client's network connection
/// is lost without a DISCONNECT.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WillMessage {
    pub(crate) topic: String,
    pub(crate) payload: Vec<u8>,
    pub(crate) qos: QualityOfService,
    pub(crate) retain: bool,
}

impl WillMessage {

    /// Creates a new will message
    pub fn new(topic: &str, payload: &[u8], qos: QualityOfService, retain: bool) -> Self {
        WillMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain
        }
    }

    /// Returns the topic the will message is published to
    pub fn topic(&self) -> &str { self.topic.as_str() }

    /// Returns the will message payload
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }

    /// Returns the quality of service the will message is published with
    pub fn qos(&self) -> QualityOfService { self.qos }

    /// Returns whether the will message is retained
    pub fn retain(&self) -> bool { self.retain }
}

/// Data model of an [MQTT 3.1.1 CONNECT](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028) packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectPacket {
    pub(crate) protocol_name: String,
    pub(crate) protocol_level: u8,
    pub(crate) clean_session: bool,
    pub(crate) keep_alive_interval_seconds: u16,
    pub(crate) client_id: String,
    pub(crate) will: Option<WillMessage>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<Vec<u8>>,
}

impl Default for ConnectPacket {
    fn default() -> Self {
        ConnectPacket {
            protocol_name: PROTOCOL_NAME.to_string(),
            protocol_level: PROTOCOL_LEVEL_311,
            clean_session: true,
            keep_alive_interval_seconds: 0,
            client_id: String::new(),
            will: None,
            username: None,
            password: None,
        }
    }
}

impl ConnectPacket {

    /// Returns the protocol name, always "MQTT"
    pub fn protocol_name(&self) -> &str { self.protocol_name.as_str() }

    /// Returns the protocol level, always 4
    pub fn protocol_level(&self) -> u8 { self.protocol_level }

    /// Returns whether the server should discard any existing session state for this client
    pub fn clean_session(&self) -> bool { self.clean_session }

    /// Returns the keep alive interval in seconds; zero disables keep alive
    pub fn keep_alive_interval_seconds(&self) -> u16 { self.keep_alive_interval_seconds }

    /// Returns the client identifier
    pub fn client_id(&self) -> &str { self.client_id.as_str() }

    /// Returns the will message, if any
    pub fn will(&self) -> Option<&WillMessage> { self.will.as_ref() }

    /// Returns the user name, if any
    pub fn username(&self) -> Option<&str> { self.username.as_deref() }

    /// Returns the password, if any
    pub fn password(&self) -> Option<&[u8]> { self.password.as_deref() }

    /// Computes the connect flags byte of the variable header.
    ///
    /// See [MQTT 3.1.1 Connect Flags](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718030)
    pub fn connect_flags(&self) -> u8 {
        let mut flags = 0;

        if self.clean_session {
            flags |= CONNECT_FLAG_CLEAN_SESSION;
        }

        if let Some(will) = &self.will {
            flags |= CONNECT_FLAG_WILL;
            flags |= (will.qos as u8) << CONNECT_FLAG_WILL_QOS_SHIFT;
            if will.retain {
                flags |= CONNECT_FLAG_WILL_RETAIN;
            }
        }

        if self.password.is_some() {
            flags |= CONNECT_FLAG_PASSWORD;
        }

        if self.username.is_some() {
            flags |= CONNECT_FLAG_USERNAME;
        }

        flags
    }
}

/// Data model of an [MQTT 3.1.1 CONNACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718033) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnackPacket {
    pub(crate) session_present: bool,
    pub(crate) return_code: ConnectReturnCode,
}

impl ConnackPacket {

    /// Creates a new CONNACK packet; used by codecs and test brokers
    pub fn new(session_present: bool, return_code: ConnectReturnCode) -> Self {
        ConnackPacket {
            session_present,
            return_code
        }
    }

    /// Returns whether the server already holds session state for this client
    pub fn session_present(&self) -> bool { self.session_present }

    /// Returns the server's verdict on the connection attempt
    pub fn return_code(&self) -> ConnectReturnCode { self.return_code }
}

/// Data model of an [MQTT 3.1.1 PUBLISH](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718037) packet
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PublishPacket {
    pub(crate) packet_id: u16,
    pub(crate) topic: String,
    pub(crate) qos: QualityOfService,
    pub(crate) duplicate: bool,
    pub(crate) retain: bool,
    pub(crate) payload: Vec<u8>,
}

impl PublishPacket {

    /// Creates a new builder for a PublishPacket.
    pub fn builder(topic: String, qos: QualityOfService) -> PublishPacketBuilder {
        PublishPacketBuilder::new(topic, qos)
    }

    /// Returns the packet id of the publish.  The client assigns this value for outbound
    /// publishes, including QoS 0 publishes where the codec leaves it off the wire.
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Sent publishes - returns the topic this message should be published to.
    ///
    /// Received publishes - returns the topic this message was published to.
    pub fn topic(&self) -> &str { self.topic.as_str() }

    /// Returns the MQTT quality of service level of the message
    pub fn qos(&self) -> QualityOfService { self.qos }

    /// Returns whether this packet is a resend of a previously-submitted Publish
    pub fn duplicate(&self) -> bool { self.duplicate }

    /// Returns true if this is a retained message, false otherwise.
    pub fn retain(&self) -> bool { self.retain }

    /// Returns the payload of the publish message.
    pub fn payload(&self) -> &[u8] { self.payload.as_slice() }
}

/// Builder type for PublishPacket instances
pub struct PublishPacketBuilder {
    packet: PublishPacket
}

impl PublishPacketBuilder {
    pub(crate) fn new(topic: String, qos: QualityOfService) -> Self {
        PublishPacketBuilder {
            packet: PublishPacket {
                topic,
                qos,
                ..Default::default()
            }
        }
    }

    /// Sets if this should be a retained message
    pub fn with_retain(mut self, retain: bool) -> Self {
        self.packet.retain = retain;
        self
    }

    /// Sets the duplicate delivery flag
    pub fn with_duplicate(mut self, duplicate: bool) -> Self {
        self.packet.duplicate = duplicate;
        self
    }

    /// Sets the payload of the publish message.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.packet.payload = payload;
        self
    }

    /// Sets the packet id.  Only meaningful for packets handed to the client by a codec;
    /// the client overwrites the packet id of anything it publishes.
    pub fn with_packet_id(mut self, packet_id: u16) -> Self {
        self.packet.packet_id = packet_id;
        self
    }

    /// Builds a new PublishPacket.  Consumes the builder in the process.
    pub fn build(self) -> PublishPacket {
        self.packet
    }
}

macro_rules! define_ack_packet {
    ($packet_type: ident, $doc: expr) => {
        #[doc = $doc]
        #[derive(Clone, Debug, Default, Eq, PartialEq)]
        pub struct $packet_type {
            pub(crate) packet_id: u16,
        }

        impl $packet_type {

            /// Creates a new packet bound to a packet id
            pub fn new(packet_id: u16) -> Self {
                $packet_type {
                    packet_id
                }
            }

            /// Returns the packet id of the operation this packet acknowledges
            pub fn packet_id(&self) -> u16 { self.packet_id }
        }
    };
}

define_ack_packet!(PubackPacket, "Data model of an MQTT 3.1.1 PUBACK packet.");
define_ack_packet!(PubrecPacket, "Data model of an MQTT 3.1.1 PUBREC packet.");
define_ack_packet!(PubrelPacket, "Data model of an MQTT 3.1.1 PUBREL packet.");
define_ack_packet!(PubcompPacket, "Data model of an MQTT 3.1.1 PUBCOMP packet.");
define_ack_packet!(UnsubackPacket, "Data model of an MQTT 3.1.1 UNSUBACK packet.");

/// Specifies a single subscription within a Subscribe operation
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Subscription {
    pub(crate) topic_filter: String,
    pub(crate) qos: QualityOfService,
}

impl Subscription {

    /// Creates a new subscription
    pub fn new(topic_filter: &str, qos: QualityOfService) -> Self {
        Subscription {
            topic_filter: topic_filter.to_string(),
            qos
        }
    }

    /// Returns the topic filter to subscribe to
    pub fn topic_filter(&self) -> &str { self.topic_filter.as_str() }

    /// Returns the maximum QoS on which the subscriber will accept publish messages.  Granted QoS may be different.
    pub fn qos(&self) -> QualityOfService { self.qos }
}

/// Data model of an [MQTT 3.1.1 SUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718063) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubscribePacket {
    pub(crate) packet_id: u16,
    pub(crate) subscriptions: Vec<Subscription>,
}

impl SubscribePacket {

    /// Creates a new builder for a SubscribePacket.
    pub fn builder() -> SubscribePacketBuilder {
        SubscribePacketBuilder::new()
    }

    /// Returns the packet id assigned by the client
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Returns the list of subscriptions that the client wishes to listen to
    pub fn subscriptions(&self) -> &[Subscription] { self.subscriptions.as_slice() }
}

/// Builder type for SubscribePacket instances
pub struct SubscribePacketBuilder {
    packet: SubscribePacket
}

impl SubscribePacketBuilder {

    pub(crate) fn new() -> Self {
        SubscribePacketBuilder {
            packet: SubscribePacket::default()
        }
    }

    /// Adds a subscription to the list of subscriptions that the client wishes to listen to
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.packet.subscriptions.push(subscription);
        self
    }

    /// Adds a subscription built from a topic filter and a requested quality of service
    pub fn with_topic_filter(self, topic_filter: &str, qos: QualityOfService) -> Self {
        self.with_subscription(Subscription::new(topic_filter, qos))
    }

    /// Builds a new SubscribePacket.  Consumes the builder in the process.
    pub fn build(self) -> SubscribePacket {
        self.packet
    }
}

/// Data model of an [MQTT 3.1.1 SUBACK](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718068) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SubackPacket {
    pub(crate) packet_id: u16,
    pub(crate) return_codes: Vec<SubackReturnCode>,
}

impl SubackPacket {

    /// Creates a new SUBACK packet; used by codecs and test brokers
    pub fn new(packet_id: u16, return_codes: Vec<SubackReturnCode>) -> Self {
        SubackPacket {
            packet_id,
            return_codes
        }
    }

    /// Returns the packet id of the subscribe this packet acknowledges
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Returns one result per requested subscription, in request order
    pub fn return_codes(&self) -> &[SubackReturnCode] { self.return_codes.as_slice() }
}

/// Data model of an [MQTT 3.1.1 UNSUBSCRIBE](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718072) packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UnsubscribePacket {
    pub(crate) packet_id: u16,
    pub(crate) topic_filters: Vec<String>,
}

impl UnsubscribePacket {

    /// Creates a new builder for an UnsubscribePacket.
    pub fn builder() -> UnsubscribePacketBuilder {
        UnsubscribePacketBuilder::new()
    }

    /// Returns the packet id assigned by the client
    pub fn packet_id(&self) -> u16 { self.packet_id }

    /// Returns the list of topic filters that the client wishes to unsubscribe from.
    pub fn topic_filters(&self) -> &[String] { self.topic_filters.as_slice() }
}

/// Builder type for UnsubscribePacket instances
pub struct UnsubscribePacketBuilder {
    packet: UnsubscribePacket
}

impl UnsubscribePacketBuilder {

    pub(crate) fn new() -> Self {
        UnsubscribePacketBuilder {
            packet: UnsubscribePacket::default()
        }
    }

    /// Adds a topic filter to the list of topic filters that the client wishes to unsubscribe from.
    pub fn with_topic_filter(mut self, topic_filter: &str) -> Self {
        self.packet.topic_filters.push(topic_filter.to_string());
        self
    }

    /// Builds a new UnsubscribePacket.  Consumes the builder in the process.
    pub fn build(self) -> UnsubscribePacket {
        self.packet
    }
}

/// Data model of an MQTT 3.1.1 PINGREQ packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PingreqPacket {}

/// Data model of an MQTT 3.1.1 PINGRESP packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PingrespPacket {}

/// Data model of an MQTT 3.1.1 DISCONNECT packet.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisconnectPacket {}

/// Algebraic union of all MQTT 3.1.1 packet types.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MqttPacket {
    Connect(ConnectPacket),
    Connack(ConnackPacket),
    Publish(PublishPacket),
    Puback(PubackPacket),
    Pubrec(PubrecPacket),
    Pubrel(PubrelPacket),
    Pubcomp(PubcompPacket),
    Subscribe(SubscribePacket),
    Suback(SubackPacket),
    Unsubscribe(UnsubscribePacket),
    Unsuback(UnsubackPacket),
    Pingreq(PingreqPacket),
    Pingresp(PingrespPacket),
    Disconnect(DisconnectPacket),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
/// An enum indicating the kind of MQTT packet
pub enum PacketType {
    /// A [Connect](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718028) packet
    Connect,

    /// A [Connack](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718033) packet
    Connack,

    /// A [Publish](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718037) packet
    Publish,

    /// A [Puback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718043) packet
    Puback,

    /// A [Pubrec](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718048) packet
    Pubrec,

    /// A [Pubrel](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718053) packet
    Pubrel,

    /// A [Pubcomp](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718058) packet
    Pubcomp,

    /// A [Subscribe](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718063) packet
    Subscribe,

    /// A [Suback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718068) packet
    Suback,

    /// An [Unsubscribe](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718072) packet
    Unsubscribe,

    /// An [Unsuback](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718077) packet
    Unsuback,

    /// A [Pingreq](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718081) packet
    Pingreq,

    /// A [Pingresp](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718086) packet
    Pingresp,

    /// A [Disconnect](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718090) packet
    Disconnect,
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketType::Connect => { write!(f, "ConnectPacket") }
            PacketType::Connack => { write!(f, "ConnackPacket") }
            PacketType::Publish => { write!(f, "PublishPacket") }
            PacketType::Puback => { write!(f, "PubackPacket") }
            PacketType::Pubrec => { write!(f, "PubrecPacket") }
            PacketType::Pubrel => { write!(f, "PubrelPacket") }
            PacketType::Pubcomp => { write!(f, "PubcompPacket") }
            PacketType::Subscribe => { write!(f, "SubscribePacket") }
            PacketType::Suback => { write!(f, "SubackPacket") }
            PacketType::Unsubscribe => { write!(f, "UnsubscribePacket") }
            PacketType::Unsuback => { write!(f, "UnsubackPacket") }
            PacketType::Pingreq => { write!(f, "PingreqPacket") }
            PacketType::Pingresp => { write!(f, "PingrespPacket") }
            PacketType::Disconnect => { write!(f, "DisconnectPacket") }
        }
    }
}
