//! The envelope that travels over the WebSocket between the broker and a world.
//!
//! Requests carry an operation name in `type`, a `requestId` that the world
//! must echo back verbatim, and a free-form JSON payload. Responses reuse the
//! same shape with `type` suffixed `-result` and either a `payload` or an
//! `error`. The operation name strings below are part of the wire contract
//! with existing worlds and must not be renamed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The relay operations a world understands. `as_str` gives the literal
/// string used on the wire; it must match what worlds already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Fetch an entity by uuid or the user's current selection.
    Get,
    /// Create a new entity (actor, item, macro, ...).
    Create,
    /// Update fields on an existing entity.
    Update,
    /// Delete an entity.
    Delete,
    /// Transfer an item from one actor to another.
    Give,
    /// Remove an item/quantity from an actor.
    Remove,
    /// Increase a numeric attribute.
    Increase,
    /// Decrease a numeric attribute.
    Decrease,
    /// Reduce an actor's hit points to zero / apply a kill.
    Kill,
}

impl Operation {
    /// The literal `type` string sent to the world for a request envelope.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "entity",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Give => "give",
            Operation::Remove => "remove",
            Operation::Increase => "increase",
            Operation::Decrease => "decrease",
            Operation::Kill => "kill",
        }
    }

    /// The `type` string a matching response envelope is expected to carry.
    pub fn result_type(self) -> String {
        format!("{}-result", self.as_str())
    }
}

/// Errors raised while encoding or decoding an [`Envelope`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame was not valid JSON, or was missing a required field.
    #[error("malformed envelope: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

/// A request or response frame exchanged with a world over its WebSocket.
///
/// `client_id` is present on requests (it names the target world) and
/// typically absent on responses, since the Session the reply arrived on
/// already identifies the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The operation name (request) or `<operation>-result` (response).
    #[serde(rename = "type")]
    pub kind: String,
    /// Correlates a response with the request that produced it. Absent on
    /// envelopes a world pushes on its own initiative.
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<Uuid>,
    /// Present on requests; names the target world.
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// The operation-specific payload.
    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Present on error responses in place of a meaningful `payload`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Builds a request envelope for `operation` addressed at `client_id`,
    /// carrying `payload` as the request body.
    pub fn request(
        operation: Operation,
        request_id: Uuid,
        client_id: impl Into<String>,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            kind: operation.as_str().to_owned(),
            request_id: Some(request_id),
            client_id: Some(client_id.into()),
            payload,
            error: None,
        }
    }

    /// Whether this envelope represents a world-reported error rather than a
    /// successful result.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serializes the envelope as a single-line JSON text frame.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a JSON text frame into an [`Envelope`].
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }
}
