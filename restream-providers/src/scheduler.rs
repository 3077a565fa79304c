//! Scheduler SaaS client
//!
//! Schedules one-shot webhook callbacks used for timed reauthentication and
//! subscription renewal. The service has no delete operation; cancellation
//! rewrites the schedule to a far-future instant.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{check_response, json_with_limit, ProviderClientError};

static SHARED_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build scheduler shared HTTP client")
});

/// How far out a "cancelled" schedule is pushed.
const CANCEL_HORIZON_DAYS: i64 = 3650;

/// Receipt for a created or updated schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleReceipt {
    pub id: String,
}

/// Scheduler SaaS client.
pub struct SchedulerClient {
    api_url: String,
    api_key: String,
    client: Client,
}

impl SchedulerClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut api_url = api_url.into();
        while api_url.ends_with('/') {
            api_url.pop();
        }
        Self {
            api_url,
            api_key: api_key.into(),
            client: SHARED_CLIENT.clone(),
        }
    }

    /// Schedule a webhook callback at `when`. A body makes it a POST
    /// callback, otherwise the scheduler issues a GET.
    pub async fn schedule(
        &self,
        when: DateTime<Utc>,
        url: &str,
        body: Option<&str>,
    ) -> Result<ScheduleReceipt, ProviderClientError> {
        let payload = json!({
            "when": when.to_rfc3339(),
            "protocol": "webhook",
            "payload": {
                "method": if body.is_some() { "post" } else { "get" },
                "url": url,
                "body": body.unwrap_or(""),
            },
        });

        let resp = self
            .client
            .post(format!("{}/schedule", self.api_url))
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let resp = check_response(resp)?;
        json_with_limit(resp).await
    }

    /// Move an existing schedule to a new instant.
    pub async fn update(
        &self,
        id: &str,
        when: DateTime<Utc>,
    ) -> Result<ScheduleReceipt, ProviderClientError> {
        let payload = json!({
            "id": id,
            "when": when.to_rfc3339(),
            "protocol": "webhook",
        });

        let resp = self
            .client
            .post(format!("{}/update", self.api_url))
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let resp = check_response(resp)?;
        json_with_limit(resp).await
    }

    /// Effectively cancel a schedule by pushing it far into the future.
    pub async fn cancel(&self, id: &str) -> Result<(), ProviderClientError> {
        let when = Utc::now() + chrono::Duration::days(CANCEL_HORIZON_DAYS);
        self.update(id, when).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_schedule_get_callback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/schedule"))
            .and(header("x-api-key", "key-1"))
            .and(body_partial_json(serde_json::json!({
                "protocol": "webhook",
                "payload": {"method": "get", "url": "https://relay.example.com/auth"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sched-1"
            })))
            .mount(&server)
            .await;

        let client = SchedulerClient::new(server.uri(), "key-1");
        let receipt = client
            .schedule(Utc::now(), "https://relay.example.com/auth", None)
            .await
            .unwrap();
        assert_eq!(receipt.id, "sched-1");
    }

    #[tokio::test]
    async fn test_cancel_rewrites_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .and(body_partial_json(serde_json::json!({"id": "sched-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sched-1"
            })))
            .mount(&server)
            .await;

        let client = SchedulerClient::new(server.uri(), "key-1");
        client.cancel("sched-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_schedule_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/schedule"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = SchedulerClient::new(server.uri(), "bad-key");
        let err = client
            .schedule(Utc::now(), "https://relay.example.com/auth", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderClientError::Http { .. }));
    }
}
