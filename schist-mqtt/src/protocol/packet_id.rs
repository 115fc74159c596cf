/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::error::{MqttError, MqttResult};

use log::*;

use std::collections::HashSet;

/// Hands out packet ids for outbound ack-based operations.
///
/// Ids cycle 1, 2, ..., 65535, 1, ... and are never 0.  An id stays bound until it is released,
/// and the cycle skips bound ids.  When every id is bound, acquisition fails rather than reusing one.
pub(crate) struct PacketIdAllocator {

    // counter that helps us heuristically find an unused packet id with as little id-space
    // search as possible
    next_packet_id: u16,

    // packet ids bound to an outstanding operation
    allocated_packet_ids: HashSet<u16>,
}

impl PacketIdAllocator {

    pub(crate) fn new() -> Self {
        PacketIdAllocator {
            next_packet_id: 1,
            allocated_packet_ids: HashSet::new(),
        }
    }

    pub(crate) fn acquire(&mut self) -> MqttResult<u16> {
        let start_id = self.next_packet_id;
        let mut check_id = start_id;

        loop {
            if self.next_packet_id == u16::MAX {
                self.next_packet_id = 1;
            } else {
                self.next_packet_id += 1;
            }

            if self.allocated_packet_ids.insert(check_id) {
                return Ok(check_id);
            }

            if self.next_packet_id == start_id {
                error!("PacketIdAllocator::acquire - could not find an unbound packet id");
                return Err(MqttError::new_identifier_exhaustion());
            }

            check_id = self.next_packet_id;
        }
    }

    /// Returns true if the id was bound
    pub(crate) fn release(&mut self, packet_id: u16) -> bool {
        self.allocated_packet_ids.remove(&packet_id)
    }

    pub(crate) fn release_all(&mut self) {
        self.allocated_packet_ids.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self, packet_id: u16) -> bool {
        self.allocated_packet_ids.contains(&packet_id)
    }

    pub(crate) fn allocated_count(&self) -> usize {
        self.allocated_packet_ids.len()
    }
}
