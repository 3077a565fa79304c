//! Destination broadcast provisioning
//!
//! Resolves the reusable ingestion endpoint (confirm the cached one still
//! exists upstream, create and persist a new one otherwise), creates a fresh
//! broadcast, and binds the two. Endpoints are long-lived and shared across
//! sessions; broadcasts are per-session.
//!
//! The chain may span a token refresh boundary, so a fresh access token is
//! requested immediately before each upstream call instead of being cached
//! across the whole chain. Failures propagate to the caller; retry policy
//! is not this module's concern.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::credentials::CredentialService;
use crate::error::Result;
use crate::settings::SettingsStore;
use restream_providers::destination::{DestinationClient, IngestEndpoint, ListStreamsParams};

/// Broadcasts are scheduled slightly in the future so the platform accepts
/// the start time.
const SCHEDULED_START_LEAD_SECS: i64 = 60;

/// A provisioned, bound broadcast ready to receive the relay.
#[derive(Debug, Clone)]
pub struct ProvisionedBroadcast {
    pub broadcast_id: String,
    pub ingestion_uri: String,
}

/// Provisioning seam for the session layer.
#[async_trait]
pub trait Provision: Send + Sync {
    async fn provision(&self, title: &str) -> Result<ProvisionedBroadcast>;
}

pub struct DestinationProvisioner {
    destination: Arc<DestinationClient>,
    credentials: Arc<CredentialService>,
    settings: Arc<dyn SettingsStore>,
    endpoint_title: String,
    privacy: String,
}

impl DestinationProvisioner {
    #[must_use]
    pub fn new(
        destination: Arc<DestinationClient>,
        credentials: Arc<CredentialService>,
        settings: Arc<dyn SettingsStore>,
        endpoint_title: String,
        privacy: String,
    ) -> Self {
        Self {
            destination,
            credentials,
            settings,
            endpoint_title,
            privacy,
        }
    }

    /// Resolve the reusable ingestion endpoint: cached id confirmed
    /// upstream, or a newly created endpoint whose id is persisted for
    /// future sessions.
    async fn resolve_endpoint(&self) -> Result<IngestEndpoint> {
        if let Some(cached_id) = self.settings.document().await?.ingest_endpoint_id {
            let token = self.credentials.access_token().await?;
            let params = ListStreamsParams {
                part: vec!["id", "cdn"],
                mine: false,
                id: Some(cached_id.clone()),
            };
            let found = self
                .destination
                .list_streams(&token, &params)
                .await?
                .into_iter()
                .find(|endpoint| endpoint.id == cached_id);

            match found {
                Some(endpoint) => {
                    info!(endpoint_id = %endpoint.id, "reusing cached ingestion endpoint");
                    return Ok(endpoint);
                }
                None => {
                    warn!(endpoint_id = %cached_id, "cached ingestion endpoint gone upstream");
                }
            }
        }

        let token = self.credentials.access_token().await?;
        let endpoint = self.destination.create_stream(&token, &self.endpoint_title).await?;
        self.settings.set_ingest_endpoint_id(&endpoint.id).await?;
        info!(endpoint_id = %endpoint.id, "created ingestion endpoint");
        Ok(endpoint)
    }
}

#[async_trait]
impl Provision for DestinationProvisioner {
    async fn provision(&self, title: &str) -> Result<ProvisionedBroadcast> {
        let endpoint = self.resolve_endpoint().await?;

        let token = self.credentials.access_token().await?;
        let scheduled_start = Utc::now() + chrono::Duration::seconds(SCHEDULED_START_LEAD_SECS);
        let broadcast = self
            .destination
            .create_broadcast(&token, title, scheduled_start, &self.privacy)
            .await?;

        let token = self.credentials.access_token().await?;
        self.destination
            .bind_broadcast(&token, &broadcast.id, &endpoint.id)
            .await?;

        info!(
            broadcast_id = %broadcast.id,
            endpoint_id = %endpoint.id,
            "broadcast provisioned and bound"
        );

        Ok(ProvisionedBroadcast {
            broadcast_id: broadcast.id,
            ingestion_uri: endpoint.ingestion_uri(),
        })
    }
}
