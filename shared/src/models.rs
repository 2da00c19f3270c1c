//! Inbound notification and webhook reply models.

use serde::Serialize;
use serde_json::Value;

use crate::calendar::CreatedEvent;
use crate::{Error, Result};

/// A decoded Monday.com webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundNotification {
    /// Subscription handshake; the token is echoed back untouched.
    Challenge(Value),
    /// The `event` object of a change notification.
    Event(Value),
}

impl InboundNotification {
    /// Decode a raw request body.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::Validation("Empty request body".to_string()));
        }

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| Error::Validation(format!("Invalid JSON payload: {}", e)))?;

        let mut object = match payload {
            Value::Object(object) => object,
            _ => {
                return Err(Error::Validation(
                    "Expected a JSON object payload".to_string(),
                ))
            }
        };

        if let Some(challenge) = object.remove("challenge") {
            return Ok(InboundNotification::Challenge(challenge));
        }

        match object.remove("event") {
            Some(Value::Object(event)) => Ok(InboundNotification::Event(Value::Object(event))),
            _ => Err(Error::Validation("Missing event payload".to_string())),
        }
    }
}

/// Reply to a challenge handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeReply {
    pub challenge: Value,
}

/// Status reply for event notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReply {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyBody {
    Challenge(ChallengeReply),
    Status(StatusReply),
}

/// What the webhook answers: an HTTP status and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookReply {
    pub status_code: u16,
    pub body: ReplyBody,
}

impl WebhookReply {
    pub fn challenge(token: Value) -> Self {
        Self {
            status_code: 200,
            body: ReplyBody::Challenge(ChallengeReply { challenge: token }),
        }
    }

    pub fn created(event: &CreatedEvent) -> Self {
        Self {
            status_code: 200,
            body: ReplyBody::Status(StatusReply {
                status: "ok".to_string(),
                message: "Event added to Google Calendar".to_string(),
                event_id: Some(event.id.clone()),
                event_link: event.html_link.clone(),
            }),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: ReplyBody::Status(StatusReply {
                status: "error".to_string(),
                message: message.into(),
                event_id: None,
                event_link: None,
            }),
        }
    }
}
