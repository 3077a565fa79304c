//! Destination platform HTTP client

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;

use crate::error::{check_response, json_with_limit, ProviderClientError};
use super::types::{
    Broadcast, BroadcastResource, IngestEndpoint, ListEnvelope, ListStreamsParams, StreamResource,
};

/// Shared HTTP client for all destination platform requests (connection pooling).
static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build destination shared HTTP client")
});

/// Destination platform HTTP client.
///
/// Every method takes the current access token; token lifecycle is owned by
/// the credential service, which is asked for a fresh token before each call
/// in the provisioning chain.
pub struct DestinationClient {
    api_url: String,
    client: Client,
}

impl DestinationClient {
    /// Create a new destination client (reuses shared connection pool).
    pub fn new(api_url: impl Into<String>) -> Self {
        let mut api_url = api_url.into();
        while api_url.ends_with('/') {
            api_url.pop();
        }
        Self {
            api_url,
            client: SHARED_CLIENT.clone(),
        }
    }

    /// List ingestion endpoints matching the given options.
    pub async fn list_streams(
        &self,
        token: &str,
        params: &ListStreamsParams,
    ) -> Result<Vec<IngestEndpoint>, ProviderClientError> {
        let resp = self
            .client
            .get(format!("{}/liveStreams", self.api_url))
            .bearer_auth(token)
            .query(&params.to_query())
            .send()
            .await?;

        let resp = check_response(resp)?;
        let envelope: ListEnvelope<StreamResource> = json_with_limit(resp).await?;
        Ok(envelope.items.into_iter().map(Into::into).collect())
    }

    /// Create a new reusable ingestion endpoint.
    pub async fn create_stream(
        &self,
        token: &str,
        title: &str,
    ) -> Result<IngestEndpoint, ProviderClientError> {
        let body = json!({
            "snippet": { "title": title },
            "cdn": {
                "ingestionType": "rtmp",
                "resolution": "variable",
                "frameRate": "variable",
            },
        });

        let resp = self
            .client
            .post(format!("{}/liveStreams", self.api_url))
            .bearer_auth(token)
            .query(&[("part", "snippet,cdn")])
            .json(&body)
            .send()
            .await?;

        let resp = check_response(resp)?;
        let resource: StreamResource = json_with_limit(resp).await?;
        Ok(resource.into())
    }

    /// Create a new broadcast scheduled to start at `scheduled_start`.
    pub async fn create_broadcast(
        &self,
        token: &str,
        title: &str,
        scheduled_start: DateTime<Utc>,
        privacy: &str,
    ) -> Result<Broadcast, ProviderClientError> {
        let body = json!({
            "snippet": {
                "title": title,
                "scheduledStartTime": scheduled_start.to_rfc3339(),
            },
            "status": { "privacyStatus": privacy },
        });

        let resp = self
            .client
            .post(format!("{}/liveBroadcasts", self.api_url))
            .bearer_auth(token)
            .query(&[("part", "snippet,status")])
            .json(&body)
            .send()
            .await?;

        let resp = check_response(resp)?;
        let resource: BroadcastResource = json_with_limit(resp).await?;
        Ok(resource.into())
    }

    /// Bind a broadcast to an ingestion endpoint.
    ///
    /// Required before the endpoint will carry data for that broadcast.
    pub async fn bind_broadcast(
        &self,
        token: &str,
        broadcast_id: &str,
        stream_id: &str,
    ) -> Result<(), ProviderClientError> {
        let resp = self
            .client
            .post(format!("{}/liveBroadcasts/bind", self.api_url))
            .bearer_auth(token)
            .query(&[("id", broadcast_id), ("streamId", stream_id), ("part", "id")])
            .send()
            .await?;

        check_response(resp)?;
        Ok(())
    }

    /// Fetch a broadcast's current metadata.
    pub async fn get_broadcast(
        &self,
        token: &str,
        broadcast_id: &str,
    ) -> Result<Option<Broadcast>, ProviderClientError> {
        let resp = self
            .client
            .get(format!("{}/liveBroadcasts", self.api_url))
            .bearer_auth(token)
            .query(&[("part", "snippet"), ("id", broadcast_id)])
            .send()
            .await?;

        let resp = check_response(resp)?;
        let envelope: ListEnvelope<BroadcastResource> = json_with_limit(resp).await?;
        Ok(envelope.items.into_iter().next().map(Into::into))
    }

    /// Update a broadcast's title (cosmetic; callers treat failures as
    /// best-effort).
    pub async fn update_broadcast_title(
        &self,
        token: &str,
        broadcast_id: &str,
        title: &str,
    ) -> Result<(), ProviderClientError> {
        let body = json!({
            "id": broadcast_id,
            "snippet": { "title": title },
        });

        let resp = self
            .client
            .put(format!("{}/liveBroadcasts", self.api_url))
            .bearer_auth(token)
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await?;

        check_response(resp)?;
        Ok(())
    }
}
