/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
# schist-mqtt

The client side of the MQTT 3.1.1 protocol: connection lifecycle, packet id management, QoS 1
and QoS 2 acknowledgement flows, keep alive, and topic validation.

The crate works with typed packets ([`mqtt::MqttPacket`]) and leaves sockets and byte
encoding to a [`transport::Transport`] implementation supplied by the application through a
[`transport::TransportConnector`].  Results are reported through handlers registered on the
[`client::MqttClient`].

# Example

```no_run
use schist_mqtt::client::ClientBuilder;
use schist_mqtt::config::{ClientOptions, ConnectOptions};
use schist_mqtt::mqtt::{PublishPacket, QualityOfService};
use schist_mqtt::transport::TransportConnector;
use std::sync::Arc;

# async fn example(connector: Arc<dyn TransportConnector>) -> schist_mqtt::error::MqttResult<()> {
let connect_options = ConnectOptions::builder()
    .with_client_id("sensor-17")
    .with_keep_alive_interval_seconds(60)
    .build();

let options = ClientOptions::builder("broker.example.com")
    .with_connect_options(connect_options)
    .build();

let client = ClientBuilder::new(options, connector).build(&tokio::runtime::Handle::current())?;

client.set_connect_result_handler(|result| {
    println!("connect result: {:?}", result);
});
client.set_publish_complete_handler(|packet_id| {
    println!("publish {} acknowledged", packet_id);
});

client.connect().await?;

// once the connect result handler reports success
let publish = PublishPacket::builder("sensors/17/temperature".to_string(), QualityOfService::AtLeastOnce)
    .with_payload("21.5".as_bytes().to_vec())
    .build();
client.publish(publish)?;
# Ok(())
# }
```
 */

#![cfg_attr(feature = "strict", deny(warnings))]

pub mod client;
pub mod config;
pub mod error;
mod logging;
pub mod mqtt;
mod protocol;
pub mod transport;
pub mod validate;

#[cfg(test)]
mod testing;

pub use protocol::ProtocolStateType;
