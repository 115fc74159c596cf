/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::client::*;
use crate::mqtt::*;

use log::*;
use std::sync::Arc;

pub(crate) type ConnectResultHandler = Arc<dyn Fn(&ConnectResult) + Send + Sync>;
pub(crate) type PacketIdHandler = Arc<dyn Fn(u16) + Send + Sync>;
pub(crate) type PublishReceivedHandler = Arc<dyn Fn(&PublishPacket) + Send + Sync>;
pub(crate) type SubscribeCompleteHandler = Arc<dyn Fn(&SubackPacket) + Send + Sync>;
pub(crate) type NotificationHandler = Arc<dyn Fn() + Send + Sync>;
pub(crate) type OperationAbandonedHandler = Arc<dyn Fn(&AbandonedOperation) + Send + Sync>;

/// One optional handler per kind of event.  Registering a handler replaces the previous one;
/// events with no handler are dropped.
#[derive(Default, Clone)]
pub(crate) struct EventDispatcher {
    pub(crate) connect_result: Option<ConnectResultHandler>,
    pub(crate) publish_sent: Option<PacketIdHandler>,
    pub(crate) publish_complete: Option<PacketIdHandler>,
    pub(crate) publish_received: Option<PublishReceivedHandler>,
    pub(crate) subscribe_complete: Option<SubscribeCompleteHandler>,
    pub(crate) unsubscribe_complete: Option<PacketIdHandler>,
    pub(crate) ping_response: Option<NotificationHandler>,
    pub(crate) connection_closed: Option<NotificationHandler>,
    pub(crate) operation_abandoned: Option<OperationAbandonedHandler>,
}

impl EventDispatcher {

    pub(crate) fn clear(&mut self, event_type: ClientEventType) {
        match event_type {
            ClientEventType::ConnectResult => { self.connect_result = None; }
            ClientEventType::PublishSent => { self.publish_sent = None; }
            ClientEventType::PublishComplete => { self.publish_complete = None; }
            ClientEventType::PublishReceived => { self.publish_received = None; }
            ClientEventType::SubscribeComplete => { self.subscribe_complete = None; }
            ClientEventType::UnsubscribeComplete => { self.unsubscribe_complete = None; }
            ClientEventType::PingResponse => { self.ping_response = None; }
            ClientEventType::ConnectionClosed => { self.connection_closed = None; }
            ClientEventType::OperationAbandoned => { self.operation_abandoned = None; }
        }
    }

    pub(crate) fn dispatch(&self, event: ClientEvent) {
        debug!("dispatch - {}", event.event_type());

        match event {
            ClientEvent::ConnectionSuccess(connack) => {
                if let Some(handler) = &self.connect_result {
                    (handler)(&Ok(connack));
                }
            }
            ClientEvent::ConnectionFailure(error) => {
                if let Some(handler) = &self.connect_result {
                    (handler)(&Err(error));
                }
            }
            ClientEvent::PublishSent(packet_id) => {
                if let Some(handler) = &self.publish_sent {
                    (handler)(packet_id);
                }
            }
            ClientEvent::PublishComplete(packet_id) => {
                if let Some(handler) = &self.publish_complete {
                    (handler)(packet_id);
                }
            }
            ClientEvent::PublishReceived(publish) => {
                if let Some(handler) = &self.publish_received {
                    (handler)(&publish);
                }
            }
            ClientEvent::SubscribeComplete(suback) => {
                if let Some(handler) = &self.subscribe_complete {
                    (handler)(&suback);
                }
            }
            ClientEvent::UnsubscribeComplete(packet_id) => {
                if let Some(handler) = &self.unsubscribe_complete {
                    (handler)(packet_id);
                }
            }
            ClientEvent::PingResponse => {
                if let Some(handler) = &self.ping_response {
                    (handler)();
                }
            }
            ClientEvent::ConnectionClosed => {
                if let Some(handler) = &self.connection_closed {
                    (handler)();
                }
            }
            ClientEvent::OperationAbandoned(operation) => {
                if let Some(handler) = &self.operation_abandoned {
                    (handler)(&operation);
                }
            }
        }
    }
}
