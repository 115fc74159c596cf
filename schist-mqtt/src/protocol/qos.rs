/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::client::AbandonedOperation;
use crate::mqtt::*;

use std::collections::{HashMap, HashSet};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutboundPublishPhase {

    // QoS 1, waiting on a PUBACK
    AwaitingAck,

    // QoS 2, waiting on a PUBREC
    AwaitingReceipt,

    // QoS 2, PUBREL sent, waiting on a PUBCOMP
    AwaitingCompletion,
}

pub(crate) struct PendingPublish {
    pub(crate) packet: PublishPacket,
    pub(crate) phase: OutboundPublishPhase,
}

/// Per-identifier acknowledgement state for everything the client is waiting on, plus the inbound
/// QoS 2 messages it is holding until the server releases them.
///
/// The tracker only records state.  Writing the acknowledgements it asks for and releasing
/// outbound packet ids is the caller's job.
#[derive(Default)]
pub(crate) struct QosTracker {

    // qos1+ publishes that have been written but not yet completed.
    // { packet id -> pending publish }
    pending_publishes: HashMap<u16, PendingPublish>,

    // subscribes and unsubscribes that have been written but not yet acknowledged
    pending_subscribes: HashSet<u16>,
    pending_unsubscribes: HashSet<u16>,

    // Incoming qos2 publishes that have been PUBREC'd but not yet released.  Keyed by the
    // server's packet id, which lives in a different id space than our own.
    incoming_qos2_publishes: HashMap<u16, PublishPacket>,
}

impl QosTracker {

    pub(crate) fn new() -> Self {
        QosTracker::default()
    }

    pub(crate) fn track_publish(&mut self, packet: PublishPacket) {
        let phase =
            match packet.qos {
                QualityOfService::ExactlyOnce => { OutboundPublishPhase::AwaitingReceipt }
                _ => { OutboundPublishPhase::AwaitingAck }
            };

        self.pending_publishes.insert(packet.packet_id, PendingPublish {
            packet,
            phase
        });
    }

    pub(crate) fn track_subscribe(&mut self, packet_id: u16) {
        self.pending_subscribes.insert(packet_id);
    }

    pub(crate) fn track_unsubscribe(&mut self, packet_id: u16) {
        self.pending_unsubscribes.insert(packet_id);
    }

    /// Returns true if the PUBACK completed a pending QoS 1 publish
    pub(crate) fn on_puback(&mut self, packet_id: u16) -> bool {
        self.complete_publish_in_phase(packet_id, OutboundPublishPhase::AwaitingAck)
    }

    /// Returns true if a PUBREL should be written in response.  A repeated PUBREC for a publish
    /// that is already awaiting completion gets the PUBREL again.
    pub(crate) fn on_pubrec(&mut self, packet_id: u16) -> bool {
        if let Some(pending) = self.pending_publishes.get_mut(&packet_id) {
            match pending.phase {
                OutboundPublishPhase::AwaitingReceipt => {
                    pending.phase = OutboundPublishPhase::AwaitingCompletion;
                    return true;
                }
                OutboundPublishPhase::AwaitingCompletion => {
                    return true;
                }
                OutboundPublishPhase::AwaitingAck => {}
            }
        }

        false
    }

    /// Returns true if the PUBCOMP completed a pending QoS 2 publish
    pub(crate) fn on_pubcomp(&mut self, packet_id: u16) -> bool {
        self.complete_publish_in_phase(packet_id, OutboundPublishPhase::AwaitingCompletion)
    }

    pub(crate) fn on_suback(&mut self, packet_id: u16) -> bool {
        self.pending_subscribes.remove(&packet_id)
    }

    pub(crate) fn on_unsuback(&mut self, packet_id: u16) -> bool {
        self.pending_unsubscribes.remove(&packet_id)
    }

    /// Stores an incoming QoS 2 publish until it is released.  Returns false if a publish with
    /// the same packet id is already being held, in which case the stored message is kept.
    pub(crate) fn on_incoming_qos2_publish(&mut self, packet: PublishPacket) -> bool {
        if self.incoming_qos2_publishes.contains_key(&packet.packet_id) {
            return false;
        }

        self.incoming_qos2_publishes.insert(packet.packet_id, packet);
        true
    }

    /// Releases a held QoS 2 publish, if there is one
    pub(crate) fn on_pubrel(&mut self, packet_id: u16) -> Option<PublishPacket> {
        self.incoming_qos2_publishes.remove(&packet_id)
    }

    /// Drops everything the client is still waiting on and returns it, ordered by packet id.
    /// Held incoming publishes are unaffected.
    pub(crate) fn abandon_outbound(&mut self) -> Vec<AbandonedOperation> {
        let mut abandoned : Vec<AbandonedOperation> = Vec::new();

        abandoned.extend(self.pending_publishes.drain().map(|(_, pending)| AbandonedOperation::Publish(pending.packet)));
        abandoned.extend(self.pending_subscribes.drain().map(AbandonedOperation::Subscribe));
        abandoned.extend(self.pending_unsubscribes.drain().map(AbandonedOperation::Unsubscribe));

        abandoned.sort_by_key(|operation| operation.packet_id());
        abandoned
    }

    pub(crate) fn clear_incoming(&mut self) {
        self.incoming_qos2_publishes.clear();
    }

    pub(crate) fn pending_outbound_count(&self) -> usize {
        self.pending_publishes.len() + self.pending_subscribes.len() + self.pending_unsubscribes.len()
    }

    pub(crate) fn incoming_qos2_count(&self) -> usize {
        self.incoming_qos2_publishes.len()
    }

    #[cfg(test)]
    pub(crate) fn publish_phase(&self, packet_id: u16) -> Option<OutboundPublishPhase> {
        self.pending_publishes.get(&packet_id).map(|pending| pending.phase)
    }

    fn complete_publish_in_phase(&mut self, packet_id: u16, phase: OutboundPublishPhase) -> bool {
        if let Some(pending) = self.pending_publishes.get(&packet_id) {
            if pending.phase == phase {
                self.pending_publishes.remove(&packet_id);
                return true;
            }
        }

        false
    }
}
