/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Topic name and topic filter validation, plus validation of the outbound requests built from them.

Everything here is pure.  The client runs these checks before a packet id is allocated and before
anything is written, so a rejected request never consumes an identifier or reaches the wire.

Utf-8 codepoints beyond U+0000 are not checked.
 */

use crate::error::{InvalidTopic, MqttError, MqttResult};
use crate::mqtt::*;

use log::*;

/// Maximum encoded length, in bytes, of an MQTT string
pub(crate) const MAXIMUM_STRING_LENGTH: usize = 65535;

fn validate_topic_length(topic: &str) -> Result<(), InvalidTopic> {
    if topic.is_empty() || topic.len() > MAXIMUM_STRING_LENGTH {
        return Err(InvalidTopic::LengthOutOfRange);
    }

    Ok(())
}

/// Checks that a string is usable as the topic of a publish: 1 to 65535 bytes long, no
/// wildcard characters, no U+0000.
pub fn validate_topic_name(topic: &str) -> Result<(), InvalidTopic> {
    validate_topic_length(topic)?;

    if topic.contains(['#', '+']) {
        return Err(InvalidTopic::BadWildcard);
    }

    if topic.contains('\0') {
        return Err(InvalidTopic::NullCharacter);
    }

    Ok(())
}

/// Checks that a string is usable as a subscription topic filter: 1 to 65535 bytes long, `+` only
/// as a complete level, `#` only as the complete final level, no U+0000.
pub fn validate_topic_filter(filter: &str) -> Result<(), InvalidTopic> {
    validate_topic_length(filter)?;

    if filter.contains('\0') {
        return Err(InvalidTopic::NullCharacter);
    }

    let mut seen_multi_level_wildcard = false;
    for segment in filter.split('/') {
        if seen_multi_level_wildcard {
            return Err(InvalidTopic::BadWildcard);
        }

        if segment.len() == 1 {
            if segment == "#" {
                seen_multi_level_wildcard = true;
            }
        } else if segment.contains(['#', '+']) {
            return Err(InvalidTopic::BadWildcard);
        }
    }

    Ok(())
}

fn validate_topic_name_outbound(topic: &str, packet_name: &str) -> MqttResult<()> {
    if let Err(reason) = validate_topic_name(topic) {
        error!("{}Packet Validation - invalid topic \"{}\": {}", packet_name, topic, reason);
        return Err(MqttError::new_invalid_topic(topic, reason));
    }

    Ok(())
}

fn validate_topic_filter_outbound(filter: &str, packet_name: &str) -> MqttResult<()> {
    if let Err(reason) = validate_topic_filter(filter) {
        error!("{}Packet Validation - invalid topic filter \"{}\": {}", packet_name, filter, reason);
        return Err(MqttError::new_invalid_topic(filter, reason));
    }

    Ok(())
}

pub(crate) fn validate_publish_packet_outbound(packet: &PublishPacket) -> MqttResult<()> {
    validate_topic_name_outbound(&packet.topic, "Publish")
}

pub(crate) fn validate_subscribe_packet_outbound(packet: &SubscribePacket) -> MqttResult<()> {
    if packet.subscriptions.is_empty() {
        error!("SubscribePacket Validation - empty subscription set");
        return Err(MqttError::new_packet_validation(PacketType::Subscribe, "empty subscription set"));
    }

    for subscription in &packet.subscriptions {
        validate_topic_filter_outbound(&subscription.topic_filter, "Subscribe")?;
    }

    Ok(())
}

pub(crate) fn validate_unsubscribe_packet_outbound(packet: &UnsubscribePacket) -> MqttResult<()> {
    if packet.topic_filters.is_empty() {
        error!("UnsubscribePacket Validation - empty topic filter set");
        return Err(MqttError::new_packet_validation(PacketType::Unsubscribe, "empty topic filter set"));
    }

    for filter in &packet.topic_filters {
        validate_topic_filter_outbound(filter, "Unsubscribe")?;
    }

    Ok(())
}

pub(crate) fn validate_will_outbound(will: &WillMessage) -> MqttResult<()> {
    validate_topic_name_outbound(&will.topic, "Connect")?;

    if will.payload.len() > MAXIMUM_STRING_LENGTH {
        error!("ConnectPacket Validation - will payload too long");
        return Err(MqttError::new_packet_validation(PacketType::Connect, "will payload too long"));
    }

    Ok(())
}
