//! Token and subscription maintenance flows
//!
//! Thin glue over the source platform, scheduler, and settings store.
//! Shared between the scheduler-triggered routes (`/auth`, `/resubscribe`)
//! and the bot commands, so a scheduled callback and a human command do
//! exactly the same thing.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use restream_providers::source::UserQuery;

use crate::http::AppState;

/// Obtain a fresh source app token, persist it, and schedule the next
/// reauthentication ahead of token expiry.
pub async fn reauth_source(state: &AppState) -> Result<()> {
    let token = state.source.app_token().await.context("app token grant failed")?;
    state.settings.set_source_token(&token.access_token).await?;

    let when = Utc::now() + chrono::Duration::seconds(state.config.scheduler.reauth_lease_seconds as i64);
    let url = format!(
        "{}/auth?clientId={}",
        state.config.server.public_url.trim_end_matches('/'),
        state.config.source.client_id,
    );
    let receipt = state
        .scheduler
        .schedule(when, &url, None)
        .await
        .context("scheduling reauth callback failed")?;

    if let Some(old_id) = state.settings.document().await?.source_reauth_id {
        if let Err(e) = state.scheduler.cancel(&old_id).await {
            warn!(schedule_id = %old_id, "cancelling stale reauth schedule failed: {e}");
        }
    }
    state.settings.set_source_reauth_id(&receipt.id).await?;

    info!(schedule_id = %receipt.id, "source token refreshed, next reauth scheduled");
    Ok(())
}

/// Subscribe (or renew the subscription) to a broadcaster's stream-change
/// webhooks and schedule the renewal callback before the lease runs out.
pub async fn resubscribe_user(state: &AppState, user_id: &str, login: &str) -> Result<()> {
    let token = source_token(state).await?;
    let lease = state.config.source.subscription_lease_seconds;

    state
        .source
        .subscribe(&token, user_id, &state.config.webhook_callback_url(), lease)
        .await
        .context("webhook subscription failed")?;

    let margin = state.config.scheduler.renewal_margin_seconds.min(lease);
    let when = Utc::now() + chrono::Duration::seconds((lease - margin) as i64);
    let url = format!(
        "{}/resubscribe?clientId={}&userId={user_id}&login={login}",
        state.config.server.public_url.trim_end_matches('/'),
        state.config.source.client_id,
    );
    let receipt = state
        .scheduler
        .schedule(when, &url, None)
        .await
        .context("scheduling renewal callback failed")?;

    if let Some(old_id) = state.settings.document().await?.subscriptions.get(login) {
        if let Err(e) = state.scheduler.cancel(old_id).await {
            warn!(schedule_id = %old_id, "cancelling stale renewal schedule failed: {e}");
        }
    }
    state.settings.set_subscription(login, &receipt.id).await?;

    info!(user_id, login, schedule_id = %receipt.id, "subscription renewed");
    Ok(())
}

/// Resolve a login to a user id and subscribe. Used by the bot command
/// where only the login is known.
pub async fn subscribe_login(state: &AppState, login: &str) -> Result<String> {
    let token = source_token(state).await?;
    let logins = vec![login.to_string()];
    let users = state.source.get_users(&token, UserQuery::Logins(&logins)).await?;
    let Some(user) = users.into_iter().next() else {
        bail!("user `{login}` does not exist on the source platform");
    };

    resubscribe_user(state, &user.id, &user.login).await?;
    Ok(user.login)
}

/// Drop a broadcaster's subscription: cancel the renewal schedule,
/// unsubscribe upstream, and forget the bookkeeping.
pub async fn unsubscribe_login(state: &AppState, login: &str) -> Result<()> {
    let token = source_token(state).await?;
    let logins = vec![login.to_string()];
    let users = state.source.get_users(&token, UserQuery::Logins(&logins)).await?;
    let Some(user) = users.into_iter().next() else {
        bail!("user `{login}` does not exist on the source platform");
    };

    let Some(schedule_id) = state.settings.document().await?.subscriptions.get(&user.login).cloned()
    else {
        bail!("not subscribed to `{login}`");
    };

    state.scheduler.cancel(&schedule_id).await.context("cancelling renewal schedule failed")?;
    state
        .source
        .unsubscribe(&token, &user.id, &state.config.webhook_callback_url())
        .await
        .context("webhook unsubscription failed")?;
    state.settings.remove_subscription(&user.login).await?;

    info!(login = %user.login, "subscription dropped");
    Ok(())
}

pub async fn source_token(state: &AppState) -> Result<String> {
    state
        .settings
        .document()
        .await?
        .source_token
        .context("no source token stored; run the reauth flow first")
}
