//! Slash-command glue
//!
//! Thin dispatch over the maintenance flows and platform clients. Every
//! command already received a deferred reply; the final answer replaces it
//! via a followup edit.

use std::collections::HashMap;

use anyhow::{bail, Result};
use rand::prelude::IndexedRandom;
use tracing::{error, info, warn};

use restream_providers::source::UserQuery;

use crate::http::interactions::Interaction;
use crate::http::AppState;
use crate::ops;

const AWAIT_PHRASES: &[&str] = &[
    "Wait a few seconds...",
    "Hold on, warming up...",
    "One moment, talking to the platforms...",
    ":hourglass_flowing_sand: loading... :hourglass:",
];

/// Phrase shown in the deferred reply while the command runs.
pub fn await_phrase() -> &'static str {
    AWAIT_PHRASES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(AWAIT_PHRASES[0])
}

/// Run a command interaction to completion and edit the deferred reply.
pub async fn handle(state: AppState, interaction: Interaction) {
    let Some(data) = &interaction.data else {
        warn!("command interaction without data ignored");
        return;
    };
    let caller_id = interaction.member.as_ref().map(|member| member.user.id.as_str());
    info!(command = %data.name, "handling command");

    let content = match data.name.as_str() {
        "authorize" => cmd_authorize(&state),
        "subscriptions" => cmd_subscriptions(&state).await,
        "subscribe" => cmd_subscribe(&state, data.first_option(), caller_id).await,
        "unsubscribe" => cmd_unsubscribe(&state, data.first_option(), caller_id).await,
        "reauth" => cmd_reauth(&state).await,
        other => {
            error!(command = %other, "no handler for command");
            return;
        }
    }
    .unwrap_or_else(|e| format!("Command failed: {e}"));

    if let Err(e) = state
        .announce
        .edit_followup(&interaction.application_id, &interaction.token, &content)
        .await
    {
        warn!("followup edit failed: {e}");
    }
}

fn cmd_authorize(state: &AppState) -> Result<String> {
    let link = state.credentials.auth_link()?;
    Ok(format!("**Click this link to authorize** {link}"))
}

async fn cmd_subscriptions(state: &AppState) -> Result<String> {
    let token = ops::source_token(state).await?;
    let subscriptions = state.source.get_subscriptions(&token).await?;
    if subscriptions.is_empty() {
        return Ok("No active subscriptions".to_string());
    }

    // topic -> expiry, resolved to display names in one batch lookup
    let mut expiries: HashMap<String, String> = HashMap::new();
    let mut user_ids = Vec::new();
    for subscription in &subscriptions {
        if let Some(user_id) = subscription.user_id() {
            expiries.insert(user_id.to_string(), subscription.expires_at.clone());
            user_ids.push(user_id.to_string());
        }
    }

    let users = state.source.get_users(&token, UserQuery::Ids(&user_ids)).await?;
    let lines: Vec<String> = users
        .iter()
        .map(|user| {
            let expires_at = expiries.get(&user.id).map_or("unknown", String::as_str);
            format!("- {} | {expires_at}", user.display_name)
        })
        .collect();
    Ok(format!("Active subscriptions:\n{}", lines.join("\n")))
}

async fn cmd_subscribe(
    state: &AppState,
    login: Option<&str>,
    caller_id: Option<&str>,
) -> Result<String> {
    let Some(login) = login.filter(|login| !login.is_empty()) else {
        bail!("usage: /subscribe <login>");
    };
    let login = ops::subscribe_login(state, login).await?;
    Ok(match caller_id {
        Some(id) => format!("<@{id}> subscribed to {login}"),
        None => format!("Subscribed to {login}"),
    })
}

async fn cmd_unsubscribe(
    state: &AppState,
    login: Option<&str>,
    caller_id: Option<&str>,
) -> Result<String> {
    let Some(login) = login.filter(|login| !login.is_empty()) else {
        bail!("usage: /unsubscribe <login>");
    };
    ops::unsubscribe_login(state, login).await?;
    Ok(match caller_id {
        Some(id) => format!("<@{id}> unsubscribed from {login}"),
        None => format!("Unsubscribed from {login}"),
    })
}

async fn cmd_reauth(state: &AppState) -> Result<String> {
    match ops::reauth_source(state).await {
        Ok(()) => Ok("Source reauthorization succeeded".to_string()),
        Err(e) => Ok(format!("Source reauthorization failed: {e}")),
    }
}
