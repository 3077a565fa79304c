//! Public operational routes
//!
//! Health probes, the scheduler-triggered maintenance callbacks, and the
//! OAuth redirect target.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::error::{AppError, AppResult};
use super::AppState;
use crate::ops;

pub async fn index() -> impl IntoResponse {
    Html("<b>Webhook-driven live stream relay. See <a href=\"/health\">/health</a>.</b>")
}

/// Basic health check (always returns OK if server is running)
pub async fn health() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct ReauthQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

/// Scheduler-triggered source token refresh.
pub async fn reauth(
    State(state): State<AppState>,
    Query(query): Query<ReauthQuery>,
) -> AppResult<&'static str> {
    info!("source reauth requested");
    check_client_id(&state, query.client_id.as_deref())?;

    ops::reauth_source(&state)
        .await
        .map_err(|e| AppError::unauthorized(e.to_string()))?;
    Ok("OK")
}

#[derive(Debug, Deserialize)]
pub struct ResubscribeQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
    login: Option<String>,
}

/// Scheduler-triggered subscription renewal. Failures are reported to the
/// announcement sink so a human notices a broken renewal chain.
pub async fn resubscribe(
    State(state): State<AppState>,
    Query(query): Query<ResubscribeQuery>,
) -> AppResult<&'static str> {
    info!(user_id = ?query.user_id, login = ?query.login, "subscription renewal requested");
    check_client_id(&state, query.client_id.as_deref())?;

    let (Some(user_id), Some(login)) = (query.user_id, query.login) else {
        return Err(AppError::bad_request("userId and login are required"));
    };

    if let Err(e) = ops::resubscribe_user(&state, &user_id, &login).await {
        error!(login, "subscription renewal failed: {e}");
        let message = format!("Subscription renewal for **{login}** failed: {e}");
        if let Err(post_err) = state.announce.post(&message).await {
            warn!("failure report failed: {post_err}");
        }
        return Err(AppError::unauthorized(e.to_string()));
    }
    Ok("OK")
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    code: Option<String>,
}

/// Destination OAuth redirect target. The browser tab closes itself; the
/// code exchange runs in the background and its outcome is announced.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Html<&'static str> {
    if let Some(code) = query.code.filter(|code| !code.is_empty()) {
        tokio::spawn(async move {
            let outcome = match state.credentials.complete_authorization(&code).await {
                Ok(()) => "success".to_string(),
                Err(e) => {
                    error!("authorization code exchange failed: {e}");
                    format!("failed ({e})")
                }
            };
            let message = format!("[Destination] Authorization **{outcome}**");
            if let Err(e) = state.announce.post(&message).await {
                warn!("authorization report failed: {e}");
            }
        });
    } else {
        warn!("oauth callback without a code");
    }

    Html(
        "<html><head></head><body><script>window.onload = function() { window.close(); };</script></body></html>",
    )
}

fn check_client_id(state: &AppState, client_id: Option<&str>) -> Result<(), AppError> {
    if client_id != Some(state.config.source.client_id.as_str()) {
        return Err(AppError::unauthorized("ClientId doesn't match"));
    }
    Ok(())
}
