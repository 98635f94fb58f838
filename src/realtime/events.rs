//! Realtime wire messages and incident events

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Incident;

/// Types of server messages on the realtime feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Subscribed,
    Created,
    Modified,
    Deleted,
}

impl MessageType {
    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "subscribed" => Some(MessageType::Subscribed),
            "created" => Some(MessageType::Created),
            "modified" => Some(MessageType::Modified),
            "deleted" => Some(MessageType::Deleted),
            _ => None,
        }
    }
}

/// A message pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription acknowledged, with the current incident snapshot
    Subscribed { start_incidents: Vec<Incident> },
    Created { payload: Incident },
    Modified { payload: Incident },
    Deleted { payload: Incident },
}

/// Why a server message could not be used
#[derive(Error, Debug)]
pub enum MessageError {
    /// Not a JSON object with a string `type`
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unhandled message type: {0}")]
    UnknownType(String),

    /// Known `type` with a body that does not match it
    #[error("invalid {kind:?} message: {source}")]
    InvalidBody {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

impl MessageError {
    /// Whether the text was at least a well-formed envelope
    pub fn is_envelope(&self) -> bool {
        !matches!(self, MessageError::Malformed(_))
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

impl ServerMessage {
    /// Parse a text frame from the server
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| MessageError::Malformed(e.to_string()))?;
        let envelope = Envelope::deserialize(&value)
            .map_err(|e| MessageError::Malformed(e.to_string()))?;

        let kind = MessageType::from_wire(&envelope.kind)
            .ok_or(MessageError::UnknownType(envelope.kind))?;

        serde_json::from_value(value).map_err(|source| MessageError::InvalidBody { kind, source })
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            ServerMessage::Subscribed { .. } => MessageType::Subscribed,
            ServerMessage::Created { .. } => MessageType::Created,
            ServerMessage::Modified { .. } => MessageType::Modified,
            ServerMessage::Deleted { .. } => MessageType::Deleted,
        }
    }
}

/// A control message sent to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for a live feed of all incidents
    Subscribe,
}

impl ClientMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// An incident change delivered to the application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum IncidentEvent {
    /// Snapshot sent once per subscription, before any change
    Initial(Vec<Incident>),
    Added(Incident),
    Modified(Incident),
    Removed(Incident),
}

impl From<ServerMessage> for IncidentEvent {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Subscribed { start_incidents } => IncidentEvent::Initial(start_incidents),
            ServerMessage::Created { payload } => IncidentEvent::Added(payload),
            ServerMessage::Modified { payload } => IncidentEvent::Modified(payload),
            ServerMessage::Deleted { payload } => IncidentEvent::Removed(payload),
        }
    }
}
