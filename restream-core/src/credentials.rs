//! Destination credential lifecycle
//!
//! Every destination API call needs a currently-valid access token. Access
//! tokens are short-lived and minted from the refresh token in the settings
//! store; the refresh token itself only exists after a human has completed
//! the OAuth consent flow once.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::settings::SettingsStore;
use restream_providers::destination::DestinationOAuth;

/// Refresh this many seconds before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

pub struct CredentialService {
    oauth: DestinationOAuth,
    settings: Arc<dyn SettingsStore>,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialService {
    #[must_use]
    pub fn new(oauth: DestinationOAuth, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            oauth,
            settings,
            cached: Mutex::new(None),
        }
    }

    /// Consent link for a human to (re)authorize the destination account.
    pub fn auth_link(&self) -> Result<String> {
        Ok(self.oauth.auth_link()?)
    }

    /// Return a currently-valid access token, refreshing when the cached one
    /// is stale. Fails with [`Error::CredentialUnavailable`] when no refresh
    /// token is stored or the refresh grant is rejected; callers abort
    /// rather than attempting the upstream call.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(cached) = &*self.cached.lock() {
            if cached.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > Utc::now() {
                return Ok(cached.token.clone());
            }
        }

        let refresh_token = self
            .settings
            .document()
            .await?
            .destination_refresh_token
            .ok_or_else(|| {
                Error::CredentialUnavailable(
                    "no refresh token stored; complete the authorization flow first".to_string(),
                )
            })?;

        let token = self
            .oauth
            .refresh_access_token(&refresh_token)
            .await
            .map_err(|e| Error::CredentialUnavailable(format!("token refresh failed: {e}")))?;

        debug!(expires_in = token.expires_in, "destination access token refreshed");
        let access_token = token.access_token.clone();
        self.cache(token.access_token, token.expires_in);
        Ok(access_token)
    }

    /// Complete the OAuth consent flow with the redirect code, persisting
    /// the refresh token for future sessions.
    pub async fn complete_authorization(&self, code: &str) -> Result<()> {
        let token = self.oauth.exchange_code(code).await?;

        if let Some(refresh_token) = &token.refresh_token {
            self.settings.set_destination_refresh_token(refresh_token).await?;
        }
        self.cache(token.access_token, token.expires_in);
        info!("destination account authorized");
        Ok(())
    }

    fn cache(&self, token: String, expires_in: u64) {
        let expires_at = Utc::now() + Duration::seconds(expires_in.min(i64::MAX as u64) as i64);
        *self.cached.lock() = Some(CachedToken { token, expires_at });
    }
}
