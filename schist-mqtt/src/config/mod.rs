/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
Module containing types for configuring an MQTT client.
 */

use crate::mqtt::*;

use std::fmt::{Debug, Formatter};

pub(crate) const DEFAULT_KEEP_ALIVE_SECONDS : u16 = 30;

/// Default port for unencrypted MQTT connections
pub const DEFAULT_MQTT_PORT : u16 = 1883;

/// Configuration options that will determine packet field values for the CONNECT packet sent out
/// by the client on each connection attempt.
#[derive(Clone, Eq, PartialEq)]
pub struct ConnectOptions {

    /// A unique string identifying the client to the server.  Used to restore session state between connections.
    ///
    /// See [MQTT 3.1.1 Client Identifier](https://docs.oasis-open.org/mqtt/mqtt/v3.1.1/os/mqtt-v3.1.1-os.html#_Toc398718031)
    pub(crate) client_id: String,

    /// If the client id is empty, generate a random one on the first connect and keep using it.
    /// When false, an empty client id is sent as-is and the server decides what to do with it.
    pub(crate) auto_generate_client_id: bool,

    /// Whether the server should discard prior session state when the connection is established.
    pub(crate) clean_session: bool,

    /// The maximum time interval, in seconds, that is permitted to elapse between the point at which the client
    /// finishes transmitting one MQTT packet and the point it starts sending the next.
    ///
    /// Zero disables keep alive.  Such a state is not advised due to scenarios where TCP connections can be
    /// invisibly dropped by routers/firewalls within the full connection circuit.
    pub(crate) keep_alive_interval_seconds: u16,

    /// Whether the client sends PINGREQ packets on its own to honor the keep alive interval.  When false the
    /// interval is still sent to the server and keeping the connection alive is up to the application.
    pub(crate) auto_keep_alive: bool,

    /// A string value that the server may use for client authentication and authorization.
    pub(crate) username: Option<String>,

    /// Opaque binary data that the server may use for client authentication and authorization.
    pub(crate) password: Option<Vec<u8>>,

    /// Message the server publishes if this connection ends without a DISCONNECT.
    pub(crate) will: Option<WillMessage>,
}

impl ConnectOptions {

    /// Creates a new builder for ConnectOptions
    pub fn builder() -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new()
    }

    pub(crate) fn to_connect_packet(&self, client_id: &str) -> ConnectPacket {
        ConnectPacket {
            clean_session: self.clean_session,
            keep_alive_interval_seconds: self.keep_alive_interval_seconds,
            client_id: client_id.to_string(),
            will: self.will.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            ..Default::default()
        }
    }

    /// Returns the configured client id; empty if none was set
    pub fn client_id(&self) -> &str { self.client_id.as_str() }

    /// Returns whether an empty client id is replaced with a generated one
    pub fn auto_generate_client_id(&self) -> bool { self.auto_generate_client_id }

    /// Returns the clean session flag
    pub fn clean_session(&self) -> bool { self.clean_session }

    /// Returns the keep alive interval in seconds
    pub fn keep_alive_interval_seconds(&self) -> u16 { self.keep_alive_interval_seconds }

    /// Returns whether the client pings automatically
    pub fn auto_keep_alive(&self) -> bool { self.auto_keep_alive }

    /// Returns the will message, if any
    pub fn will(&self) -> Option<&WillMessage> { self.will.as_ref() }
}

impl Debug for ConnectOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("client_id", &self.client_id)
            .field("auto_generate_client_id", &self.auto_generate_client_id)
            .field("clean_session", &self.clean_session)
            .field("keep_alive_interval_seconds", &self.keep_alive_interval_seconds)
            .field("auto_keep_alive", &self.auto_keep_alive)
            .field("username", &self.username.as_ref().map(|_| "<...redacted>"))
            .field("password", &self.password.as_ref().map(|_| "<...redacted>"))
            .field("will", &self.will)
            .finish()
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            client_id: String::new(),
            auto_generate_client_id: true,
            clean_session: true,
            keep_alive_interval_seconds: DEFAULT_KEEP_ALIVE_SECONDS,
            auto_keep_alive: true,
            username: None,
            password: None,
            will: None,
        }
    }
}

/// Builder type for ConnectOptions instances
#[derive(Default)]
pub struct ConnectOptionsBuilder {
    options: ConnectOptions
}

impl ConnectOptionsBuilder {

    /// Creates a new builder with default values
    pub fn new() -> Self {
        ConnectOptionsBuilder {
            ..Default::default()
        }
    }

    /// Sets the client id
    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.options.client_id = client_id.to_string();
        self
    }

    /// Sets whether an empty client id should be replaced by a generated one
    pub fn with_auto_generate_client_id(mut self, auto_generate_client_id: bool) -> Self {
        self.options.auto_generate_client_id = auto_generate_client_id;
        self
    }

    /// Sets the clean session flag
    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.options.clean_session = clean_session;
        self
    }

    /// Sets the keep alive interval in seconds
    pub fn with_keep_alive_interval_seconds(mut self, keep_alive: u16) -> Self {
        self.options.keep_alive_interval_seconds = keep_alive;
        self
    }

    /// Sets whether the client sends PINGREQ packets on its own
    pub fn with_auto_keep_alive(mut self, auto_keep_alive: bool) -> Self {
        self.options.auto_keep_alive = auto_keep_alive;
        self
    }

    /// Sets the user name
    pub fn with_username(mut self, username: &str) -> Self {
        self.options.username = Some(username.to_string());
        self
    }

    /// Sets the password
    pub fn with_password(mut self, password: &[u8]) -> Self {
        self.options.password = Some(password.to_vec());
        self
    }

    /// Sets the will message
    pub fn with_will(mut self, will: WillMessage) -> Self {
        self.options.will = Some(will);
        self
    }

    /// Builds a new ConnectOptions.  Consumes the builder in the process.
    pub fn build(self) -> ConnectOptions {
        self.options
    }
}

/// Where to connect and what to say once connected
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) connect_options: ConnectOptions,
}

impl ClientOptions {

    /// Creates a new builder for ClientOptions targeting a host
    pub fn builder(host: &str) -> ClientOptionsBuilder {
        ClientOptionsBuilder::new(host)
    }

    /// Returns the host the client connects to
    pub fn host(&self) -> &str { self.host.as_str() }

    /// Returns the port the client connects to
    pub fn port(&self) -> u16 { self.port }

    /// Returns the options used to build each CONNECT packet
    pub fn connect_options(&self) -> &ConnectOptions { &self.connect_options }
}

/// Builder type for ClientOptions instances
pub struct ClientOptionsBuilder {
    options: ClientOptions
}

impl ClientOptionsBuilder {

    /// Creates a new builder for a host, using the default port and connect options
    pub fn new(host: &str) -> Self {
        ClientOptionsBuilder {
            options: ClientOptions {
                host: host.to_string(),
                port: DEFAULT_MQTT_PORT,
                connect_options: ConnectOptions::default(),
            }
        }
    }

    /// Sets the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Sets the options used to build each CONNECT packet
    pub fn with_connect_options(mut self, connect_options: ConnectOptions) -> Self {
        self.options.connect_options = connect_options;
        self
    }

    /// Builds a new ClientOptions.  Consumes the builder in the process.
    pub fn build(self) -> ClientOptions {
        self.options
    }
}
