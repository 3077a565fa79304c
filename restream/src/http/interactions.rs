//! Bot interaction route
//!
//! Slash-command webhook from the chat platform. Requests are signed with a
//! detached Ed25519 signature over `timestamp + raw body`; anything that
//! fails verification is rejected before parsing. Commands get a deferred
//! reply immediately and the real work happens on a background task that
//! edits the reply when done.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use restream_core::signature;

use super::AppState;
use crate::commands;

pub const HEADER_SIGNATURE: &str = "X-Signature-Ed25519";
pub const HEADER_TIMESTAMP: &str = "X-Signature-Timestamp";

/// Ping interaction, answered with pong.
const INTERACTION_PING: u8 = 1;

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub data: Option<CommandData>,
}

#[derive(Debug, Deserialize)]
pub struct Member {
    pub user: UserRef,
}

#[derive(Debug, Deserialize)]
pub struct UserRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
pub struct CommandOption {
    #[serde(default)]
    pub value: serde_json::Value,
}

impl CommandData {
    /// First option as a string, the shape every command here uses.
    #[must_use]
    pub fn first_option(&self) -> Option<&str> {
        self.options.first().and_then(|option| option.value.as_str())
    }
}

pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Some(sig), Some(timestamp)) = (
        headers.get(HEADER_SIGNATURE).and_then(|v| v.to_str().ok()),
        headers.get(HEADER_TIMESTAMP).and_then(|v| v.to_str().ok()),
    ) else {
        warn!("interaction missing signature headers");
        return (StatusCode::UNAUTHORIZED, "Invalid request signature").into_response();
    };

    if !signature::verify_interaction(&state.interaction_key, timestamp, &body, sig) {
        warn!("interaction signature rejected");
        return (StatusCode::UNAUTHORIZED, "Invalid request signature").into_response();
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            warn!("malformed interaction payload: {e}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if interaction.kind == INTERACTION_PING {
        info!("interaction ping");
        return Json(json!({ "type": INTERACTION_PING })).into_response();
    }

    // Deferred reply now, real answer via followup edit once the command
    // glue finishes.
    let reply = Json(json!({
        "type": 5,
        "data": { "content": commands::await_phrase() },
    }));
    tokio::spawn(commands::handle(state, interaction));
    reply.into_response()
}
