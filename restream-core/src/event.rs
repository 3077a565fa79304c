//! Inbound webhook event model

use serde::Deserialize;

/// Message type header values on the stream-event webhook route.
pub const MSG_TYPE_NOTIFICATION: &str = "notification";
pub const MSG_TYPE_VERIFICATION: &str = "webhook_callback_verification";
pub const MSG_TYPE_REVOCATION: &str = "revocation";

/// What a notification is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    StreamOnline,
    StreamOffline,
    Unknown(String),
}

impl EventKind {
    #[must_use]
    pub fn from_subscription_type(sub_type: &str) -> Self {
        match sub_type {
            "stream.online" => Self::StreamOnline,
            "stream.offline" => Self::StreamOffline,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// One authenticated, parsed webhook notification.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub message_id: String,
    pub kind: EventKind,
    pub broadcaster_id: String,
    pub broadcaster_login: String,
}

/// Raw JSON envelope of a stream-event delivery.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub subscription: Option<SubscriptionBlock>,
    #[serde(default)]
    pub event: Option<EventBlock>,
    /// Present only on verification handshakes.
    #[serde(default)]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionBlock {
    #[serde(rename = "type")]
    pub sub_type: String,
}

#[derive(Debug, Deserialize)]
pub struct EventBlock {
    #[serde(default)]
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
}

impl EventEnvelope {
    /// Parse the raw body bytes. Malformed payloads yield `None`; the caller
    /// logs and acknowledges rather than raising.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Flatten into a [`WebhookEvent`] for dispatch.
    #[must_use]
    pub fn into_event(self, message_id: String) -> Option<WebhookEvent> {
        let subscription = self.subscription?;
        let event = self.event?;
        Some(WebhookEvent {
            message_id,
            kind: EventKind::from_subscription_type(&subscription.sub_type),
            broadcaster_id: event.broadcaster_user_id,
            broadcaster_login: event.broadcaster_user_login,
        })
    }
}
