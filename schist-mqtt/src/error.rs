/*
 * Copyright Bret Ambrose. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

/*!
A module containing the core crate error enumeration, context structures, and conversion
definitions.
 */

use crate::mqtt::{ConnectReturnCode, PacketType};
use crate::protocol::ProtocolStateType;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

type ErrorSource = Arc<dyn Error + Send + Sync + 'static>;

fn into_error_source(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> ErrorSource {
    let boxed : Box<dyn Error + Send + Sync + 'static> = source.into();
    Arc::from(boxed)
}

/// Reasons a topic name or topic filter can fail validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InvalidTopic {

    /// The topic's UTF-8 encoding is empty or longer than 65535 bytes.
    LengthOutOfRange,

    /// A wildcard character appears where it is not allowed: anywhere in a topic name, or in a
    /// topic filter as something other than a complete level (`+`) or the complete final
    /// level (`#`).
    BadWildcard,

    /// The topic contains U+0000.
    NullCharacter,
}

impl Error for InvalidTopic {}

impl fmt::Display for InvalidTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidTopic::LengthOutOfRange => { write!(f, "topic length must be between 1 and 65535 utf-8 bytes") }
            InvalidTopic::BadWildcard => { write!(f, "topic contains an illegal use of the '#' or '+' wildcard") }
            InvalidTopic::NullCharacter => { write!(f, "topic contains a U+0000 character") }
        }
    }
}

/// Additional details about a TransportError error variant
#[derive(Clone, Debug)]
pub struct TransportErrorContext {
    source: ErrorSource
}

/// Additional details about a ConnectionRefused error variant
#[derive(Clone, Debug)]
pub struct ConnectionRefusedContext {

    /// return code of the CONNACK packet that refused the connection, exactly as sent by the server
    pub return_code: ConnectReturnCode,
}

/// Additional details about an InvalidTopic error variant
#[derive(Clone, Debug)]
pub struct InvalidTopicContext {

    /// topic name or filter that failed validation
    pub topic: String,

    /// what was wrong with it
    pub reason: InvalidTopic,
}

/// Additional details about an IdentifierExhaustion error variant
#[derive(Clone, Debug)]
pub struct IdentifierExhaustionContext {
}

/// Additional details about an InvalidState error variant
#[derive(Clone, Debug)]
pub struct InvalidStateContext {

    /// connection state at the time the operation was attempted
    pub state: ProtocolStateType,

    source: ErrorSource
}

/// Additional details about a PacketValidation error variant
#[derive(Clone, Debug)]
pub struct PacketValidationContext {

    /// type of packet that failed validation
    pub packet_type: PacketType,

    source: ErrorSource
}

/// Additional details about a DecodingFailure error variant
#[derive(Clone, Debug)]
pub struct DecodingFailureContext {
    source: ErrorSource
}

/// Additional details about a ConnectionClosed error variant
#[derive(Clone, Debug)]
pub struct ConnectionClosedContext {
    source: ErrorSource
}

/// Additional details about an InternalStateError error variant
#[derive(Clone, Debug)]
pub struct InternalStateErrorContext {
    source: ErrorSource
}

/// Basic error type for the entire schist-mqtt crate.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum MqttError {

    /// Establishing the transport, or writing a packet to it, failed.  The connection returns to
    /// the Disconnected state.
    TransportError(TransportErrorContext),

    /// The server answered CONNECT with a CONNACK whose return code is not "accepted".
    ConnectionRefused(ConnectionRefusedContext),

    /// A topic name or topic filter was rejected before any packet id was allocated or any
    /// packet was written.  Connection state is unaffected.
    InvalidTopic(InvalidTopicContext),

    /// All 65535 packet ids are bound to outstanding operations.
    IdentifierExhaustion(IdentifierExhaustionContext),

    /// The operation is not legal in the connection's current state.
    InvalidState(InvalidStateContext),

    /// The operation request is structurally invalid (for example, a subscribe with no
    /// subscriptions).
    PacketValidation(PacketValidationContext),

    /// A value received from the packet codec does not map to anything MQTT 3.1.1 defines.
    DecodingFailure(DecodingFailureContext),

    /// The connection closed before the operation completed.
    ConnectionClosed(ConnectionClosedContext),

    /// Error emitted by the client when something happens that should never happen.  Always indicates
    /// a bug in the client.
    InternalStateError(InternalStateErrorContext),
}

impl MqttError {

    /// Constructs a new TransportError variant from an existing error.  Typically this should be
    /// an error surfacing from a socket or codec implementation.
    pub fn new_transport_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::TransportError(
            TransportErrorContext {
                source : into_error_source(source)
            }
        )
    }

    pub(crate) fn new_connection_refused(return_code: ConnectReturnCode) -> Self {
        MqttError::ConnectionRefused(
            ConnectionRefusedContext {
                return_code
            }
        )
    }

    pub(crate) fn new_invalid_topic(topic: &str, reason: InvalidTopic) -> Self {
        MqttError::InvalidTopic(
            InvalidTopicContext {
                topic: topic.to_string(),
                reason
            }
        )
    }

    pub(crate) fn new_identifier_exhaustion() -> Self {
        MqttError::IdentifierExhaustion(
            IdentifierExhaustionContext {
            }
        )
    }

    pub(crate) fn new_invalid_state(state: ProtocolStateType, source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::InvalidState(
            InvalidStateContext {
                state,
                source : into_error_source(source)
            }
        )
    }

    pub(crate) fn new_packet_validation(packet_type: PacketType, source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::PacketValidation(
            PacketValidationContext {
                packet_type,
                source : into_error_source(source)
            }
        )
    }

    /// Constructs a new DecodingFailure variant.  Codec implementations use this to reject values
    /// that have no MQTT 3.1.1 meaning.
    pub fn new_decoding_failure(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::DecodingFailure(
            DecodingFailureContext {
                source : into_error_source(source)
            }
        )
    }

    pub(crate) fn new_connection_closed(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::ConnectionClosed(
            ConnectionClosedContext {
                source : into_error_source(source)
            }
        )
    }

    pub(crate) fn new_internal_state_error(source: impl Into<Box<dyn Error + Send + Sync + 'static>>) -> Self {
        MqttError::InternalStateError(
            InternalStateErrorContext {
                source : into_error_source(source)
            }
        )
    }
}

impl Error for MqttError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MqttError::TransportError(context) => {
                Some(context.source.as_ref())
            }
            MqttError::InvalidTopic(context) => {
                Some(&context.reason)
            }
            MqttError::InvalidState(context) => {
                Some(context.source.as_ref())
            }
            MqttError::PacketValidation(context) => {
                Some(context.source.as_ref())
            }
            MqttError::DecodingFailure(context) => {
                Some(context.source.as_ref())
            }
            MqttError::ConnectionClosed(context) => {
                Some(context.source.as_ref())
            }
            MqttError::InternalStateError(context) => {
                Some(context.source.as_ref())
            }
            _ => { None }
        }
    }
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MqttError::TransportError(_) => {
                write!(f, "transport error; source contains further details")
            }
            MqttError::ConnectionRefused(context) => {
                write!(f, "server refused the connection with return code {} ({})", context.return_code.to_u8(), context.return_code)
            }
            MqttError::InvalidTopic(context) => {
                write!(f, "invalid topic \"{}\": {}", context.topic, context.reason)
            }
            MqttError::IdentifierExhaustion(_) => {
                write!(f, "packet id space exhausted; all 65535 identifiers are outstanding")
            }
            MqttError::InvalidState(context) => {
                write!(f, "operation not allowed while the connection is {}", context.state)
            }
            MqttError::PacketValidation(context) => {
                write!(f, "{} failed validation; source contains further details", context.packet_type)
            }
            MqttError::DecodingFailure(_) => {
                write!(f, "failed to decode a packet value; source contains further details")
            }
            MqttError::ConnectionClosed(_) => {
                write!(f, "client connection was closed; source contains further details")
            }
            MqttError::InternalStateError(_) => {
                write!(f, "client reached an invalid internal state; almost certainly a client bug")
            }
        }
    }
}

impl From<std::io::Error> for MqttError {
    fn from(error: std::io::Error) -> Self {
        MqttError::new_transport_error(error)
    }
}

/// Crate-wide result type for functions that can fail
pub type MqttResult<T> = Result<T, MqttError>;
