//! Stream-event webhook route
//!
//! The source platform requires a prompt 200-class acknowledgment; slow or
//! absent responses count as delivery failures and trigger its own retries,
//! which would cascade into duplicate event storms. Verification, the
//! challenge echo, and the dedup check run inline; everything else is
//! dispatched to a background task.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use restream_core::event::{
    EventEnvelope, MSG_TYPE_NOTIFICATION, MSG_TYPE_REVOCATION, MSG_TYPE_VERIFICATION,
};
use restream_core::signature;

use super::AppState;

pub const HEADER_MESSAGE_ID: &str = "X-Event-Message-Id";
pub const HEADER_TIMESTAMP: &str = "X-Event-Message-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Event-Message-Signature";
pub const HEADER_MESSAGE_TYPE: &str = "X-Event-Message-Type";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn plain_text(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        body,
    )
        .into_response()
}

/// Legacy hub handshake: echo the challenge query parameter.
pub async fn challenge_echo(Query(params): Query<HashMap<String, String>>) -> Response {
    info!("source webhook handshake");
    plain_text(params.get("hub.challenge").cloned().unwrap_or_default())
}

/// Signed stream-event delivery.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (Some(message_id), Some(timestamp), Some(sig)) = (
        header_str(&headers, HEADER_MESSAGE_ID),
        header_str(&headers, HEADER_TIMESTAMP),
        header_str(&headers, HEADER_SIGNATURE),
    ) else {
        warn!("webhook delivery missing signature headers");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    // Verification runs over the exact raw body bytes from the transport.
    if !signature::verify_stream_event(
        &state.config.source.webhook_secret,
        message_id,
        timestamp,
        &body,
        sig,
        Utc::now(),
    ) {
        warn!(message_id, "webhook signature rejected");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let message_type = header_str(&headers, HEADER_MESSAGE_TYPE).unwrap_or(MSG_TYPE_NOTIFICATION);

    // Challenges are answered before the dedup check: a re-delivered
    // handshake must still receive the echoed token.
    if message_type == MSG_TYPE_VERIFICATION {
        let challenge = EventEnvelope::parse(&body)
            .and_then(|envelope| envelope.challenge)
            .unwrap_or_default();
        info!(message_id, "webhook verification challenge answered");
        return plain_text(challenge);
    }

    if state.dedup.seen(message_id) {
        debug!(message_id, "duplicate delivery acknowledged");
        return StatusCode::OK.into_response();
    }

    match message_type {
        MSG_TYPE_REVOCATION => {
            warn!(message_id, "subscription revoked by the platform");
        }
        MSG_TYPE_NOTIFICATION => {
            match EventEnvelope::parse(&body)
                .and_then(|envelope| envelope.into_event(message_id.to_string()))
            {
                Some(event) => {
                    let sessions = state.sessions.clone();
                    tokio::spawn(async move {
                        sessions.handle_event(event).await;
                    });
                }
                None => warn!(message_id, "malformed notification payload ignored"),
            }
        }
        other => {
            info!(message_id, message_type = %other, "unhandled message type acknowledged");
        }
    }

    StatusCode::OK.into_response()
}
