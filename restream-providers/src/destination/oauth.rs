//! Destination platform OAuth flows
//!
//! Consent-link construction, authorization-code exchange, and
//! refresh-token grants against the platform's token endpoint.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::error::{check_response, json_with_limit, ProviderClientError};
use super::types::TokenResponse;

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build destination OAuth HTTP client")
});

/// OAuth client for the destination platform.
pub struct DestinationOAuth {
    auth_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
}

impl DestinationOAuth {
    pub fn new(
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
        }
    }

    /// Build the consent link a human opens to authorize the account.
    ///
    /// Requests offline access so the platform issues a refresh token on the
    /// subsequent code exchange.
    pub fn auth_link(&self) -> Result<String, ProviderClientError> {
        let mut url = Url::parse(&self.auth_url)?;
        url.query_pairs_mut()
            .append_pair("access_type", "offline")
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &self.scope)
            .append_pair("redirect_uri", &self.redirect_uri);
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, ProviderClientError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        self.token_request(&params).await
    }

    /// Obtain a fresh access token from a stored refresh token.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, ProviderClientError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.token_request(&params).await
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, ProviderClientError> {
        let resp = SHARED_CLIENT
            .clone()
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;

        let resp = check_response(resp)?;
        json_with_limit(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth_for(server: &MockServer) -> DestinationOAuth {
        DestinationOAuth::new(
            "https://accounts.example.com/oauth2/auth",
            format!("{}/oauth2/token", server.uri()),
            "cid",
            "secret",
            "https://relay.example.com/oauth/callback",
            "https://api.example.com/auth/live",
        )
    }

    #[test]
    fn test_auth_link_carries_offline_access() {
        let server_uri = "http://unused.example.com";
        let oauth = DestinationOAuth::new(
            "https://accounts.example.com/oauth2/auth",
            server_uri,
            "cid",
            "secret",
            "https://relay.example.com/oauth/callback",
            "scope-a",
        );
        let link = oauth.auth_link().unwrap();
        assert!(link.starts_with("https://accounts.example.com/oauth2/auth?"));
        assert!(link.contains("access_type=offline"));
        assert!(link.contains("response_type=code"));
        assert!(link.contains("client_id=cid"));
    }

    #[tokio::test]
    async fn test_exchange_code_returns_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "expires_in": 3600,
                "refresh_token": "rt"
            })))
            .mount(&server)
            .await;

        let token = oauth_for(&server).exchange_code("the-code").await.unwrap();
        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn test_refresh_grant_without_refresh_token_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at2",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let token = oauth_for(&server).refresh_access_token("rt").await.unwrap();
        assert_eq!(token.access_token, "at2");
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_grant_failure_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let err = oauth_for(&server).refresh_access_token("rt").await.unwrap_err();
        assert!(matches!(err, ProviderClientError::Http { .. }));
    }
}
