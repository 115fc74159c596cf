/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::logging::*;
use crate::mqtt::*;
use crate::mqtt::utils::*;

use std::fmt;

impl fmt::Display for QualityOfService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", quality_of_service_to_str(*self))
    }
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", connect_return_code_to_str(*self))
    }
}

impl fmt::Display for SubackReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", suback_return_code_to_str(*self))
    }
}

impl fmt::Display for WillMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        log_string!(self.topic, f, "topic");
        log_enum!(self.qos, f, "qos", quality_of_service_to_str);
        log_primitive_value!(self.retain, f, "retain");
        log_binary_data!(self.payload, f, "payload");
        write!(f, " }}")
    }
}

impl fmt::Display for ConnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnectPacket {{")?;
        log_string!(self.protocol_name, f, "protocol_name");
        log_primitive_value!(self.protocol_level, f, "protocol_level");
        log_primitive_value!(self.keep_alive_interval_seconds, f, "keep_alive_interval_seconds");
        log_primitive_value!(self.clean_session, f, "clean_session");
        log_string!(self.client_id, f, "client_id");
        log_optional_string_sensitive!(self.username, f, "username");
        log_optional_binary_data_sensitive!(self.password, f, "password");
        if let Some(will) = &self.will {
            write!(f, " will:{}", will)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for ConnackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConnackPacket {{")?;
        log_primitive_value!(self.session_present, f, "session_present");
        write!(f, " return_code:{} ({})", self.return_code.to_u8(), self.return_code)?;
        write!(f, " }}")
    }
}

impl fmt::Display for PublishPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublishPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        log_string!(self.topic, f, "topic");
        log_enum!(self.qos, f, "qos", quality_of_service_to_str);
        log_primitive_value!(self.duplicate, f, "duplicate");
        log_primitive_value!(self.retain, f, "retain");
        log_binary_data!(self.payload, f, "payload");
        write!(f, " }}")
    }
}

define_ack_packet_display_trait!(PubackPacket, "PubackPacket");
define_ack_packet_display_trait!(PubrecPacket, "PubrecPacket");
define_ack_packet_display_trait!(PubrelPacket, "PubrelPacket");
define_ack_packet_display_trait!(PubcompPacket, "PubcompPacket");
define_ack_packet_display_trait!(UnsubackPacket, "UnsubackPacket");

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(\"{}\", {})", self.topic_filter, quality_of_service_to_str(self.qos))
    }
}

impl fmt::Display for SubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " subscriptions: [")?;
        for subscription in &self.subscriptions {
            write!(f, " {}", subscription)?;
        }
        write!(f, " ] }}")
    }
}

impl fmt::Display for SubackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubackPacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " return_codes: [")?;
        for return_code in &self.return_codes {
            write!(f, " {}", suback_return_code_to_str(*return_code))?;
        }
        write!(f, " ] }}")
    }
}

impl fmt::Display for UnsubscribePacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UnsubscribePacket {{")?;
        log_primitive_value!(self.packet_id, f, "packet_id");
        write!(f, " topic_filters: [")?;
        for topic_filter in &self.topic_filters {
            write!(f, " \"{}\"", topic_filter)?;
        }
        write!(f, " ] }}")
    }
}

impl fmt::Display for PingreqPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PingreqPacket {{}}")
    }
}

impl fmt::Display for PingrespPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PingrespPacket {{}}")
    }
}

impl fmt::Display for DisconnectPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DisconnectPacket {{}}")
    }
}

impl fmt::Display for MqttPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MqttPacket::Connect(packet) => { write!(f, "{}", packet) }
            MqttPacket::Connack(packet) => { write!(f, "{}", packet) }
            MqttPacket::Publish(packet) => { write!(f, "{}", packet) }
            MqttPacket::Puback(packet) => { write!(f, "{}", packet) }
            MqttPacket::Pubrec(packet) => { write!(f, "{}", packet) }
            MqttPacket::Pubrel(packet) => { write!(f, "{}", packet) }
            MqttPacket::Pubcomp(packet) => { write!(f, "{}", packet) }
            MqttPacket::Subscribe(packet) => { write!(f, "{}", packet) }
            MqttPacket::Suback(packet) => { write!(f, "{}", packet) }
            MqttPacket::Unsubscribe(packet) => { write!(f, "{}", packet) }
            MqttPacket::Unsuback(packet) => { write!(f, "{}", packet) }
            MqttPacket::Pingreq(packet) => { write!(f, "{}", packet) }
            MqttPacket::Pingresp(packet) => { write!(f, "{}", packet) }
            MqttPacket::Disconnect(packet) => { write!(f, "{}", packet) }
        }
    }
}
