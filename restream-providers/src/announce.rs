//! Announcement sink client
//!
//! Posts messages to a chat webhook (announcements, failure reports) and
//! edits deferred bot-interaction replies. Callers treat announcement
//! failures as best-effort: log and move on.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{check_response, json_with_limit, ProviderClientError};

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build announce shared HTTP client")
});

const EMBED_COLOR: u32 = 6_570_405;

/// A message previously posted to the announcement channel.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelMessage {
    pub id: String,
    pub content: String,
}

/// Announcement webhook sink.
pub struct AnnounceClient {
    webhook_url: String,
    api_url: String,
    avatar_url: String,
    bot_token: Option<String>,
    channel_id: Option<String>,
    client: Client,
}

impl AnnounceClient {
    pub fn new(
        webhook_url: impl Into<String>,
        api_url: impl Into<String>,
        avatar_url: impl Into<String>,
        bot_token: Option<String>,
        channel_id: Option<String>,
    ) -> Self {
        let mut api_url = api_url.into();
        while api_url.ends_with('/') {
            api_url.pop();
        }
        Self {
            webhook_url: webhook_url.into(),
            api_url,
            avatar_url: avatar_url.into(),
            bot_token,
            channel_id,
            client: SHARED_CLIENT.clone(),
        }
    }

    /// Post a plain message to the announcement channel.
    pub async fn post(&self, content: &str) -> Result<(), ProviderClientError> {
        let body = json!({
            "content": content,
            "avatar_url": self.avatar_url,
        });
        self.send_webhook(&body).await
    }

    /// Post a message with an image embed.
    pub async fn post_embed(
        &self,
        content: &str,
        image_url: &str,
    ) -> Result<(), ProviderClientError> {
        let body = json!({
            "content": content,
            "avatar_url": self.avatar_url,
            "embeds": [{
                "color": EMBED_COLOR,
                "image": { "url": image_url },
            }],
        });
        self.send_webhook(&body).await
    }

    /// Post a message that mentions specific users.
    pub async fn post_mention(
        &self,
        content: &str,
        user_ids: &[String],
    ) -> Result<(), ProviderClientError> {
        let body = json!({
            "content": content,
            "avatar_url": self.avatar_url,
            "allowed_mentions": { "users": user_ids },
        });
        self.send_webhook(&body).await
    }

    async fn send_webhook(&self, body: &serde_json::Value) -> Result<(), ProviderClientError> {
        let resp = self.client.post(&self.webhook_url).json(body).send().await?;
        check_response(resp)?;
        Ok(())
    }

    /// Fetch the most recent messages from the announcement channel,
    /// newest first. Requires the bot token and channel id to be configured.
    pub async fn recent_messages(&self) -> Result<Vec<ChannelMessage>, ProviderClientError> {
        let token = self.bot_token.as_deref().ok_or_else(|| {
            ProviderClientError::InvalidConfig("announce bot token not configured".to_string())
        })?;
        let channel_id = self.channel_id.as_deref().ok_or_else(|| {
            ProviderClientError::InvalidConfig("announce channel id not configured".to_string())
        })?;

        let resp = self
            .client
            .get(format!("{}/channels/{channel_id}/messages", self.api_url))
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await?;

        let resp = check_response(resp)?;
        json_with_limit(resp).await
    }

    /// Replace the deferred reply of a bot interaction with final content.
    pub async fn edit_followup(
        &self,
        application_id: &str,
        interaction_token: &str,
        content: &str,
    ) -> Result<(), ProviderClientError> {
        let body = json!({ "content": content });
        let resp = self
            .client
            .patch(format!(
                "{}/webhooks/{application_id}/{interaction_token}/messages/@original",
                self.api_url
            ))
            .json(&body)
            .send()
            .await?;

        check_response(resp)?;
        Ok(())
    }
}
