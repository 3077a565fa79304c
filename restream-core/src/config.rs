use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub interactions: InteractionsConfig,
    pub announce: AnnounceConfig,
    pub scheduler: SchedulerConfig,
    pub relay: RelayConfig,
    pub keepalive: KeepAliveConfig,
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL of this service. Used to build webhook
    /// callback URLs and as the keep-alive self-ping target.
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Source streaming platform (webhook emitter + metadata API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_url: String,
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Shared secret for the stream-event webhook HMAC signatures.
    pub webhook_secret: String,
    /// Template for the live playlist the relay reads; `{login}` is replaced
    /// with the broadcaster's login.
    pub playlist_template: String,
    /// Webhook-hub subscription lease (platform max: 10 days).
    pub subscription_lease_seconds: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stream.example.com/v1".to_string(),
            auth_url: "https://id.stream.example.com/oauth2".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            webhook_secret: String::new(),
            playlist_template: "https://edge.stream.example.com/hls/{login}/index.m3u8"
                .to_string(),
            subscription_lease_seconds: 10 * 24 * 60 * 60,
        }
    }
}

/// Destination live platform (broadcast + ingestion endpoint API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub api_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI completing the OAuth consent flow.
    pub redirect_uri: String,
    pub scope: String,
    /// Visibility of freshly provisioned broadcasts.
    pub privacy: String,
    /// Base URL for human-facing broadcast links in announcements.
    pub watch_url_base: String,
    /// Title used while provisioning, before the source title is synced.
    pub default_broadcast_title: String,
    /// Title of the reusable ingestion endpoint.
    pub endpoint_title: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.live.example.com/v3".to_string(),
            auth_url: "https://accounts.live.example.com/oauth2/auth".to_string(),
            token_url: "https://accounts.live.example.com/oauth2/token".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scope: "live.manage".to_string(),
            privacy: "unlisted".to_string(),
            watch_url_base: "https://live.example.com/watch".to_string(),
            default_broadcast_title: "Live relay".to_string(),
            endpoint_title: "Relay ingest".to_string(),
        }
    }
}

/// Interaction bot webhook (asymmetric signature verification).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionsConfig {
    /// Hex-encoded Ed25519 public key of the interaction sender.
    pub public_key: String,
}

/// Announcement webhook sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnounceConfig {
    pub webhook_url: String,
    pub api_url: String,
    pub avatar_url: String,
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            api_url: "https://chat.example.com/api".to_string(),
            avatar_url: String::new(),
            bot_token: None,
            channel_id: None,
        }
    }
}

/// Scheduler SaaS used for timed reauth/resubscribe callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub api_url: String,
    pub api_key: String,
    /// How long a source app token is trusted before scheduled reauth.
    pub reauth_lease_seconds: u64,
    /// How long before subscription expiry the renewal callback fires.
    pub renewal_margin_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.schedulerapi.com".to_string(),
            api_key: String::new(),
            reauth_lease_seconds: 50 * 24 * 60 * 60,
            renewal_margin_seconds: 300,
        }
    }
}

/// Relay subprocess configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Media-copy tool invoked with the fixed argument contract.
    pub command: String,
    /// Delay between a relay exit and its respawn.
    pub restart_delay_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            command: "ffmpeg".to_string(),
            restart_delay_seconds: 5,
        }
    }
}

/// Keep-alive self-ping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    pub interval_minutes: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self { interval_minutes: 25 }
    }
}

/// Settings document location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub path: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: "./settings.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables (RESTREAM_SERVER__PORT, etc.)
        builder = builder.add_source(
            Environment::with_prefix("RESTREAM")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Callback URL the source platform delivers webhooks to.
    #[must_use]
    pub fn webhook_callback_url(&self) -> String {
        format!("{}/source-webhook", self.server.public_url.trim_end_matches('/'))
    }

    /// Validate configuration, collecting every problem instead of stopping
    /// at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.public_url.is_empty() {
            errors.push("server.public_url must be set".to_string());
        }
        if self.source.client_id.is_empty() {
            errors.push("source.client_id must be set".to_string());
        }
        if self.source.webhook_secret.is_empty() {
            errors.push("source.webhook_secret must be set".to_string());
        }
        if !self.source.playlist_template.contains("{login}") {
            errors.push("source.playlist_template must contain a {login} placeholder".to_string());
        }
        if self.interactions.public_key.is_empty() {
            errors.push("interactions.public_key must be set".to_string());
        } else if hex::decode(&self.interactions.public_key)
            .map(|b| b.len() != 32)
            .unwrap_or(true)
        {
            errors.push("interactions.public_key must be 32 hex-encoded bytes".to_string());
        }
        if self.destination.client_id.is_empty() {
            errors.push("destination.client_id must be set".to_string());
        }
        if self.relay.command.is_empty() {
            errors.push("relay.command must be set".to_string());
        }
        if self.keepalive.interval_minutes == 0 {
            errors.push("keepalive.interval_minutes must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.server.public_url = "https://relay.example.com".to_string();
        config.source.client_id = "cid".to_string();
        config.source.webhook_secret = "secret".to_string();
        config.interactions.public_key = "aa".repeat(32);
        config.destination.client_id = "dcid".to_string();
        config
    }

    #[test]
    fn test_default_config_fails_validation() {
        let errors = Config::default().validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("public_url")));
        assert!(errors.iter().any(|e| e.contains("webhook_secret")));
    }

    #[test]
    fn test_configured_passes_validation() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_bad_public_key_rejected() {
        let mut config = configured();
        config.interactions.public_key = "zz-not-hex".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("public_key")));
    }

    #[test]
    fn test_webhook_callback_url() {
        let mut config = configured();
        config.server.public_url = "https://relay.example.com/".to_string();
        assert_eq!(config.webhook_callback_url(), "https://relay.example.com/source-webhook");
    }

    #[test]
    fn test_playlist_template_placeholder_required() {
        let mut config = configured();
        config.source.playlist_template = "https://edge.example.com/fixed.m3u8".to_string();
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("playlist_template")));
    }
}
