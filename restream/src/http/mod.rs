// Module: http
// Webhook routes and the small operational surface around them

pub mod error;
pub mod interactions;
pub mod public;
pub mod source_webhook;


use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use ed25519_dalek::VerifyingKey;
use tower_http::trace::TraceLayer;

use restream_core::session::{FfmpegLauncher, KeepAlive, RelayAnnouncer};
use restream_core::{
    signature, Config, CredentialService, DestinationProvisioner, EventDeduplicator, FileSettings,
    SessionManager, SettingsStore,
};
use restream_providers::destination::DestinationOAuth;
use restream_providers::{AnnounceClient, DestinationClient, SchedulerClient, SourceClient};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionManager>,
    pub dedup: Arc<EventDeduplicator>,
    pub settings: Arc<dyn SettingsStore>,
    pub credentials: Arc<CredentialService>,
    pub source: Arc<SourceClient>,
    pub announce: Arc<AnnounceClient>,
    pub scheduler: Arc<SchedulerClient>,
    pub interaction_key: VerifyingKey,
}

impl AppState {
    /// Wire up the settings store, platform clients, and session manager
    /// from validated configuration.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let interaction_key = signature::parse_verifying_key(&config.interactions.public_key)
            .map_err(|e| anyhow::anyhow!("interactions.public_key: {e}"))?;

        let settings: Arc<dyn SettingsStore> =
            Arc::new(FileSettings::open(&config.settings.path).await?);

        let source = Arc::new(SourceClient::new(
            config.source.api_url.clone(),
            config.source.auth_url.clone(),
            config.source.client_id.clone(),
            config.source.client_secret.clone(),
        ));
        let destination = Arc::new(DestinationClient::new(config.destination.api_url.clone()));
        let oauth = DestinationOAuth::new(
            config.destination.auth_url.clone(),
            config.destination.token_url.clone(),
            config.destination.client_id.clone(),
            config.destination.client_secret.clone(),
            config.destination.redirect_uri.clone(),
            config.destination.scope.clone(),
        );
        let credentials = Arc::new(CredentialService::new(oauth, settings.clone()));
        let announce = Arc::new(AnnounceClient::new(
            config.announce.webhook_url.clone(),
            config.announce.api_url.clone(),
            config.announce.avatar_url.clone(),
            config.announce.bot_token.clone(),
            config.announce.channel_id.clone(),
        ));
        let scheduler = Arc::new(SchedulerClient::new(
            config.scheduler.api_url.clone(),
            config.scheduler.api_key.clone(),
        ));

        let provisioner = Arc::new(DestinationProvisioner::new(
            destination.clone(),
            credentials.clone(),
            settings.clone(),
            config.destination.endpoint_title.clone(),
            config.destination.privacy.clone(),
        ));
        let effects = Arc::new(RelayAnnouncer::new(
            source.clone(),
            destination.clone(),
            credentials.clone(),
            announce.clone(),
            settings.clone(),
            config.destination.watch_url_base.clone(),
        ));
        let keepalive = KeepAlive::new(
            config.server.public_url.clone(),
            Duration::from_secs(config.keepalive.interval_minutes * 60),
        );
        let launcher = Arc::new(FfmpegLauncher::new(config.relay.command.clone()));

        let sessions = Arc::new(SessionManager::new(
            provisioner,
            launcher,
            effects,
            keepalive,
            config.source.playlist_template.clone(),
            config.destination.default_broadcast_title.clone(),
            Duration::from_secs(config.relay.restart_delay_seconds),
        ));

        Ok(Self {
            config,
            sessions,
            dedup: Arc::new(EventDeduplicator::default()),
            settings,
            credentials,
            source,
            announce,
            scheduler,
            interaction_key,
        })
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(public::index))
        .route("/health", get(public::health))
        .route(
            "/source-webhook",
            get(source_webhook::challenge_echo).post(source_webhook::receive),
        )
        .route("/bot-interaction", post(interactions::receive))
        .route("/auth", get(public::reauth))
        .route("/resubscribe", get(public::resubscribe))
        .route("/oauth/callback", get(public::oauth_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
