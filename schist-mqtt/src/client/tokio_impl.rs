/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::client::ClientShared;
use crate::error::MqttResult;
use crate::protocol::*;
use crate::transport::{TransportConnection, TransportEvent};

use log::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

// The runtime's clock, so that paused tokio time also drives keep alive
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub(crate) async fn connect(shared: Arc<ClientShared>) -> MqttResult<()> {
    let connection_id = shared.with_protocol_state(|state, _| state.start_connect(&now()))?;

    let host = shared.options.host.clone();
    let port = shared.options.port;
    info!("tokio - connect - establishing connection {} to {}:{}", connection_id, host, port);

    match shared.connector.connect(&host, port).await {
        Ok(connection) => {
            let TransportConnection { transport, events } = connection;

            debug!("tokio - connect - connection {} established", connection_id);
            shared.apply_network_event(connection_id, NetworkEvent::ConnectionOpened(transport))?;

            let task_shared = shared.clone();
            shared.runtime.spawn(async move {
                process_connection(task_shared, connection_id, events).await;
            });

            Ok(())
        }
        Err(error) => {
            info!("tokio - connect - connection {} failed: {}", connection_id, error);
            shared.apply_network_event(connection_id, NetworkEvent::ConnectionFailed(error.clone()))?;
            Err(error)
        }
    }
}

// Delivers everything the transport reads to the protocol state and wakes up for keep alive,
// until the connection is replaced or ends.
async fn process_connection(shared: Arc<ClientShared>, connection_id: u64, mut events: UnboundedReceiver<TransportEvent>) {
    loop {
        trace!("tokio - process_connection loop");

        let next_service_time = shared.with_protocol_state(|state, _| {
            if state.is_current_connection(connection_id) {
                Ok(state.get_next_service_timepoint(&now()))
            } else {
                Err(())
            }
        });

        let service_wait =
            match next_service_time {
                Ok(Some(service_time)) => { Some(sleep(service_time.saturating_duration_since(now()))) }
                Ok(None) => { None }
                Err(_) => {
                    debug!("tokio - process_connection - connection {} is no longer current", connection_id);
                    break;
                }
            };

        tokio::select! {
            // inbound packets and stream closure
            event = events.recv() => {
                match event {
                    Some(TransportEvent::PacketReceived(packet)) => {
                        debug!("tokio - process_connection - packet received on connection {}", connection_id);
                        let _ = shared.apply_network_event(connection_id, NetworkEvent::PacketReceived(packet));
                    }
                    Some(TransportEvent::Closed) | None => {
                        info!("tokio - process_connection - connection {} closed", connection_id);
                        let _ = shared.apply_network_event(connection_id, NetworkEvent::ConnectionClosed);
                        break;
                    }
                }
            }
            // keep alive (if relevant)
            Some(_) = conditional_wait(service_wait) => {
                debug!("tokio - process_connection - running service task");
                let _ = shared.with_protocol_state(|state, client_events| {
                    if !state.is_current_connection(connection_id) {
                        return Ok(());
                    }

                    state.service(ServiceContext {
                        current_time: now(),
                        client_events,
                    })
                });
            }
        }
    }

    info!("tokio - process_connection - finished with connection {}", connection_id);
}

async fn conditional_wait(wait_option: Option<tokio::time::Sleep>) -> Option<()> {
    match wait_option {
        Some(timer) => {
            timer.await;
            Some(())
        },
        None => None,
    }
}
