/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing miscellaneous conversion functions between integers and MQTT 3.1.1 enumerations.
Codec implementations are the primary consumer.
 */

use crate::error::{MqttError, MqttResult};
use crate::mqtt::*;

use log::*;

/// Converts a u8 value to a QualityOfService.  3 and above are illegal.
pub fn convert_u8_to_quality_of_service(value: u8) -> MqttResult<QualityOfService> {
    match value {
        0 => { Ok(QualityOfService::AtMostOnce) }
        1 => { Ok(QualityOfService::AtLeastOnce) }
        2 => { Ok(QualityOfService::ExactlyOnce) }
        _ => {
            error!("Packet Decode - Invalid quality of service value ({})", value);
            Err(MqttError::new_decoding_failure(format!("invalid quality of service value ({})", value)))
        }
    }
}

pub(crate) fn quality_of_service_to_str (qos: QualityOfService) -> &'static str {
    match qos {
        QualityOfService::AtMostOnce => { "0 (AtMostOnce)" }
        QualityOfService::AtLeastOnce => { "1 (AtLeastOnce)" }
        QualityOfService::ExactlyOnce => { "2 (ExactlyOnce)" }
    }
}

/// Converts a u8 value to a ConnectReturnCode.  Every value is accepted; 6 and above map to
/// `ConnectReturnCode::Reserved`.
pub fn convert_u8_to_connect_return_code(value: u8) -> ConnectReturnCode {
    match value {
        0 => { ConnectReturnCode::Accepted }
        1 => { ConnectReturnCode::UnacceptableProtocolVersion }
        2 => { ConnectReturnCode::IdentifierRejected }
        3 => { ConnectReturnCode::ServerUnavailable }
        4 => { ConnectReturnCode::BadUsernameOrPassword }
        5 => { ConnectReturnCode::NotAuthorized }
        _ => { ConnectReturnCode::Reserved(value) }
    }
}

pub(crate) fn connect_return_code_to_str (return_code: ConnectReturnCode) -> &'static str {
    match return_code {
        ConnectReturnCode::Accepted => { "Accepted" }
        ConnectReturnCode::UnacceptableProtocolVersion => { "UnacceptableProtocolVersion" }
        ConnectReturnCode::IdentifierRejected => { "IdentifierRejected" }
        ConnectReturnCode::ServerUnavailable => { "ServerUnavailable" }
        ConnectReturnCode::BadUsernameOrPassword => { "BadUsernameOrPassword" }
        ConnectReturnCode::NotAuthorized => { "NotAuthorized" }
        ConnectReturnCode::Reserved(_) => { "Reserved" }
    }
}

/// Converts a u8 value to a SubackReturnCode.  Only 0, 1, 2, and 0x80 are legal.
pub fn convert_u8_to_suback_return_code(value: u8) -> MqttResult<SubackReturnCode> {
    match value {
        0 => { Ok(SubackReturnCode::GrantedQos0) }
        1 => { Ok(SubackReturnCode::GrantedQos1) }
        2 => { Ok(SubackReturnCode::GrantedQos2) }
        0x80 => { Ok(SubackReturnCode::Failure) }
        _ => {
            error!("Packet Decode - Invalid suback return code value ({})", value);
            Err(MqttError::new_decoding_failure(format!("invalid suback return code value ({})", value)))
        }
    }
}

pub(crate) fn suback_return_code_to_str (return_code: SubackReturnCode) -> &'static str {
    match return_code {
        SubackReturnCode::GrantedQos0 => { "0 (GrantedQos0)" }
        SubackReturnCode::GrantedQos1 => { "1 (GrantedQos1)" }
        SubackReturnCode::GrantedQos2 => { "2 (GrantedQos2)" }
        SubackReturnCode::Failure => { "128 (Failure)" }
    }
}

pub(crate) fn mqtt_packet_to_packet_type(packet: &MqttPacket) -> PacketType {
    match packet {
        MqttPacket::Connect(_) => { PacketType::Connect }
        MqttPacket::Connack(_) => { PacketType::Connack }
        MqttPacket::Publish(_) => { PacketType::Publish}
        MqttPacket::Puback(_) => { PacketType::Puback }
        MqttPacket::Pubrec(_) => { PacketType::Pubrec }
        MqttPacket::Pubrel(_) => { PacketType::Pubrel }
        MqttPacket::Pubcomp(_) => { PacketType::Pubcomp }
        MqttPacket::Subscribe(_) => { PacketType::Subscribe }
        MqttPacket::Suback(_) => { PacketType::Suback }
        MqttPacket::Unsubscribe(_) => { PacketType::Unsubscribe }
        MqttPacket::Unsuback(_) => { PacketType::Unsuback }
        MqttPacket::Pingreq(_) => { PacketType::Pingreq }
        MqttPacket::Pingresp(_) => { PacketType::Pingresp }
        MqttPacket::Disconnect(_) => { PacketType::Disconnect }
    }
}
