//! Post-transition side effects
//!
//! Announcements and cosmetic metadata sync run after the state machine has
//! already moved on. They are spawned fire-and-forget: the session is
//! Relaying (or back Idle) regardless of whether any of this succeeds, and
//! failures are logged, never propagated.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::credentials::CredentialService;
use crate::error::Error;
use crate::settings::SettingsStore;
use restream_providers::announce::AnnounceClient;
use restream_providers::destination::DestinationClient;
use restream_providers::source::SourceClient;

/// Side-effect seam for the session layer.
#[async_trait]
pub trait SessionEffects: Send + Sync {
    /// A session reached Relaying: sync the source title onto the
    /// destination broadcast and announce the relay.
    async fn on_relaying(&self, broadcaster_id: &str, login: &str, broadcast_id: &str);

    /// A session ended: archive announcement for the finished stream.
    async fn on_offline(&self, broadcaster_id: &str, login: &str);

    /// Provisioning failed; report so a human can act.
    async fn on_provision_failed(&self, login: &str, error: &Error);
}

/// Production effects: talk to the real platform clients.
pub struct RelayAnnouncer {
    source: Arc<SourceClient>,
    destination: Arc<DestinationClient>,
    credentials: Arc<CredentialService>,
    announce: Arc<AnnounceClient>,
    settings: Arc<dyn SettingsStore>,
    watch_url_base: String,
}

impl RelayAnnouncer {
    #[must_use]
    pub fn new(
        source: Arc<SourceClient>,
        destination: Arc<DestinationClient>,
        credentials: Arc<CredentialService>,
        announce: Arc<AnnounceClient>,
        settings: Arc<dyn SettingsStore>,
        watch_url_base: String,
    ) -> Self {
        Self {
            source,
            destination,
            credentials,
            announce,
            settings,
            watch_url_base,
        }
    }

    async fn source_token(&self) -> Option<String> {
        match self.settings.document().await {
            Ok(doc) => doc.source_token,
            Err(e) => {
                warn!("settings read failed: {e}");
                None
            }
        }
    }

    /// Current title of the broadcaster's live stream, when reachable.
    async fn live_title(&self, broadcaster_id: &str) -> Option<String> {
        let token = self.source_token().await?;
        match self.source.get_streams(&token, broadcaster_id).await {
            Ok(streams) => streams.into_iter().next().map(|s| s.title),
            Err(e) => {
                warn!(broadcaster_id, "source stream lookup failed: {e}");
                None
            }
        }
    }

    fn watch_url(&self, broadcast_id: &str) -> String {
        format!("{}/{broadcast_id}", self.watch_url_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl SessionEffects for RelayAnnouncer {
    async fn on_relaying(&self, broadcaster_id: &str, login: &str, broadcast_id: &str) {
        let (live_title, broadcast) = tokio::join!(self.live_title(broadcaster_id), async {
            let token = self.credentials.access_token().await.ok()?;
            match self.destination.get_broadcast(&token, broadcast_id).await {
                Ok(broadcast) => broadcast,
                Err(e) => {
                    warn!(broadcast_id, "broadcast lookup failed: {e}");
                    None
                }
            }
        });

        // Push the source title onto the destination broadcast. Cosmetic:
        // the session stays Relaying whatever happens here.
        if let Some(title) = &live_title {
            let already_synced = broadcast.as_ref().is_some_and(|b| &b.title == title);
            if !already_synced {
                match self.credentials.access_token().await {
                    Ok(token) => {
                        if let Err(e) = self
                            .destination
                            .update_broadcast_title(&token, broadcast_id, title)
                            .await
                        {
                            warn!(broadcast_id, "title sync failed: {e}");
                        }
                    }
                    Err(e) => warn!("title sync skipped: {e}"),
                }
            }
        }

        let title = live_title.unwrap_or_else(|| "live stream".to_string());
        let message = format!("**{login}** is live: {title} | {}", self.watch_url(broadcast_id));
        if let Err(e) = self.announce.post(&message).await {
            warn!("relay announcement failed: {e}");
        }
    }

    async fn on_offline(&self, broadcaster_id: &str, login: &str) {
        let Some(token) = self.source_token().await else {
            return;
        };
        let video = match self.source.get_videos(&token, broadcaster_id).await {
            Ok(videos) => videos.into_iter().next(),
            Err(e) => {
                warn!(broadcaster_id, "video lookup failed: {e}");
                None
            }
        };
        let Some(video) = video else { return };

        // Skip reposting when the archive link already sits in the channel.
        match self.announce.recent_messages().await {
            Ok(messages) => {
                if messages.iter().any(|m| m.content.contains(&video.id)) {
                    info!(video_id = %video.id, "archive already announced");
                    return;
                }
            }
            Err(e) => warn!("recent message lookup failed: {e}"),
        }

        let image_url = video
            .thumbnail_url
            .replace("%{width}", "600")
            .replace("%{height}", "350");
        let message = format!("**{login}** went offline: {} [{}]", video.title, video.id);
        if let Err(e) = self.announce.post_embed(&message, &image_url).await {
            warn!("archive announcement failed: {e}");
        }
    }

    async fn on_provision_failed(&self, login: &str, error: &Error) {
        let message = match error {
            Error::CredentialUnavailable(_) => format!(
                "Relay for **{login}** not started: destination authorization required ({error})"
            ),
            _ => format!("Relay for **{login}** not started: {error}"),
        };
        if let Err(e) = self.announce.post(&message).await {
            warn!("failure report failed: {e}");
        }
    }
}
