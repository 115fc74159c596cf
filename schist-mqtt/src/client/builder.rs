/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::client::MqttClient;
use crate::config::ClientOptions;
use crate::error::{MqttError, MqttResult};
use crate::mqtt::PacketType;
use crate::transport::TransportConnector;
use crate::validate::validate_will_outbound;

use log::*;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Assembles an [`MqttClient`] from client options and a way of opening connections.
pub struct ClientBuilder {
    options: ClientOptions,
    connector: Arc<dyn TransportConnector>,
}

impl ClientBuilder {

    /// Creates a new builder.  `connector` is invoked once per call to `connect`.
    pub fn new(options: ClientOptions, connector: Arc<dyn TransportConnector>) -> Self {
        ClientBuilder {
            options,
            connector,
        }
    }

    /// Validates the options and creates a client.  Connection tasks are spawned on `runtime`.
    pub fn build(self, runtime: &Handle) -> MqttResult<MqttClient> {
        if self.options.host.is_empty() {
            error!("ClientBuilder::build - empty host");
            return Err(MqttError::new_packet_validation(PacketType::Connect, "host must not be empty"));
        }

        if let Some(will) = &self.options.connect_options.will {
            validate_will_outbound(will)?;
        }

        info!("ClientBuilder::build - client for {}:{} created", self.options.host, self.options.port);

        Ok(MqttClient::new(self.options, self.connector, runtime.clone()))
    }
}
