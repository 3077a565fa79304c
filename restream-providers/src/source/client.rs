//! Source platform HTTP client

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{check_response, json_with_limit, ProviderClientError};
use super::types::{AppToken, StreamInfo, SubscriptionInfo, UserInfo, UserQuery, VideoInfo};

/// Shared HTTP client for all source platform requests (connection pooling).
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build source shared HTTP client")
});

/// Source platform HTTP client.
///
/// All API methods take the current app access token; token lifecycle is
/// owned by the caller (the token is persisted via the settings store and
/// refreshed through the reauth flow).
pub struct SourceClient {
    api_url: String,
    auth_url: String,
    client_id: String,
    client_secret: String,
    client: Client,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: Vec<T>,
}

impl SourceClient {
    /// Create a new source client (reuses shared connection pool).
    pub fn new(
        api_url: impl Into<String>,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            api_url: trim_slash(api_url.into()),
            auth_url: trim_slash(auth_url.into()),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            client: SHARED_CLIENT.clone(),
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn authed(&self, req: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        req.bearer_auth(token).header("Client-Id", &self.client_id)
    }

    /// Get current stream metadata for a broadcaster (empty when offline).
    pub async fn get_streams(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<Vec<StreamInfo>, ProviderClientError> {
        let req = self
            .client
            .get(format!("{}/streams", self.api_url))
            .query(&[("user_id", user_id)]);

        let resp = check_response(self.authed(req, token).send().await?)?;
        let envelope: DataEnvelope<StreamInfo> = json_with_limit(resp).await?;
        Ok(envelope.data)
    }

    /// Look up users by ids or logins (platform limit: 100 per call).
    pub async fn get_users(
        &self,
        token: &str,
        query: UserQuery<'_>,
    ) -> Result<Vec<UserInfo>, ProviderClientError> {
        let req = self
            .client
            .get(format!("{}/users", self.api_url))
            .query(&query.to_query());

        let resp = check_response(self.authed(req, token).send().await?)?;
        let envelope: DataEnvelope<UserInfo> = json_with_limit(resp).await?;
        Ok(envelope.data)
    }

    /// List a broadcaster's archived videos, most recent first.
    pub async fn get_videos(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<Vec<VideoInfo>, ProviderClientError> {
        let req = self
            .client
            .get(format!("{}/videos", self.api_url))
            .query(&[("user_id", user_id)]);

        let resp = check_response(self.authed(req, token).send().await?)?;
        let envelope: DataEnvelope<VideoInfo> = json_with_limit(resp).await?;
        Ok(envelope.data)
    }

    /// Obtain an app access token via the client-credentials grant.
    pub async fn app_token(&self) -> Result<AppToken, ProviderClientError> {
        let resp = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let resp = check_response(resp)?;
        json_with_limit(resp).await
    }

    /// Subscribe to stream-change webhooks for a broadcaster.
    ///
    /// The hub answers 202 when the subscription request is accepted;
    /// anything else is treated as a failure.
    pub async fn subscribe(
        &self,
        token: &str,
        user_id: &str,
        callback_url: &str,
        lease_seconds: u64,
    ) -> Result<(), ProviderClientError> {
        self.hub_request(token, user_id, callback_url, lease_seconds, "subscribe")
            .await
    }

    /// Drop the stream-change webhook subscription for a broadcaster.
    pub async fn unsubscribe(
        &self,
        token: &str,
        user_id: &str,
        callback_url: &str,
    ) -> Result<(), ProviderClientError> {
        self.hub_request(token, user_id, callback_url, 0, "unsubscribe").await
    }

    async fn hub_request(
        &self,
        token: &str,
        user_id: &str,
        callback_url: &str,
        lease_seconds: u64,
        mode: &str,
    ) -> Result<(), ProviderClientError> {
        let body = json!({
            "hub.callback": callback_url,
            "hub.mode": mode,
            "hub.topic": format!("{}/streams?user_id={user_id}", self.api_url),
            "hub.lease_seconds": lease_seconds,
        });

        let req = self.client.post(format!("{}/webhooks/hub", self.api_url)).json(&body);
        let resp = self.authed(req, token).send().await?;

        if resp.status() != reqwest::StatusCode::ACCEPTED {
            return Err(ProviderClientError::Http {
                status: resp.status(),
                url: resp.url().to_string(),
            });
        }
        Ok(())
    }

    /// List currently active webhook subscriptions.
    pub async fn get_subscriptions(
        &self,
        token: &str,
    ) -> Result<Vec<SubscriptionInfo>, ProviderClientError> {
        let req = self.client.get(format!("{}/webhooks/subscriptions", self.api_url));
        let resp = check_response(self.authed(req, token).send().await?)?;
        let envelope: DataEnvelope<SubscriptionInfo> = json_with_limit(resp).await?;
        Ok(envelope.data)
    }
}

fn trim_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}
