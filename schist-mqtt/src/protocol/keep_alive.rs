/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use std::time::{Duration, Instant};

/// Write-idle keep alive tracking.  A ping is due once a full interval has passed without any
/// packet being written.  Receiving a PINGRESP changes nothing here.
pub(crate) struct KeepAliveMonitor {

    // None when keep alive is disabled, either by configuration or a zero interval
    interval: Option<Duration>,

    // Point in time of the most recent successful write on the current connection.  None while
    // no connection is established.
    last_write_timepoint: Option<Instant>,
}

impl KeepAliveMonitor {

    pub(crate) fn new(keep_alive_interval_seconds: u16, auto_keep_alive: bool) -> Self {
        let interval =
            if auto_keep_alive && keep_alive_interval_seconds > 0 {
                Some(Duration::from_secs(keep_alive_interval_seconds as u64))
            } else {
                None
            };

        KeepAliveMonitor {
            interval,
            last_write_timepoint: None,
        }
    }

    pub(crate) fn on_write(&mut self, current_time: Instant) {
        self.last_write_timepoint = Some(current_time);
    }

    pub(crate) fn reset(&mut self) {
        self.last_write_timepoint = None;
    }

    pub(crate) fn next_ping_timepoint(&self) -> Option<Instant> {
        match (&self.interval, &self.last_write_timepoint) {
            (Some(interval), Some(last_write)) => { Some(*last_write + *interval) }
            _ => { None }
        }
    }

    pub(crate) fn is_ping_due(&self, current_time: Instant) -> bool {
        if let Some(next_ping) = self.next_ping_timepoint() {
            return current_time >= next_ping;
        }

        false
    }
}
