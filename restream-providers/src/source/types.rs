//! Source platform wire types

use serde::Deserialize;

/// A live (or recently live) stream as reported by the source platform.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamInfo {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub stream_type: String,
}

/// A source platform user account.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

/// An archived broadcast (VOD).
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
}

/// App access token from the client-credentials grant.
#[derive(Debug, Clone, Deserialize)]
pub struct AppToken {
    pub access_token: String,
    pub expires_in: u64,
}

/// One active webhook-hub subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionInfo {
    pub topic: String,
    pub expires_at: String,
}

impl SubscriptionInfo {
    /// Extract the subscribed user id from the topic URL, if present.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.topic.split_once("user_id=").map(|(_, id)| id)
    }
}

/// Typed user lookup query: batch of ids or batch of logins.
#[derive(Debug, Clone, Copy)]
pub enum UserQuery<'a> {
    Ids(&'a [String]),
    Logins(&'a [String]),
}

impl<'a> UserQuery<'a> {
    pub(crate) fn to_query(self) -> Vec<(&'static str, &'a str)> {
        match self {
            Self::Ids(ids) => ids.iter().map(|id| ("id", id.as_str())).collect(),
            Self::Logins(logins) => logins.iter().map(|l| ("login", l.as_str())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_user_id() {
        let sub = SubscriptionInfo {
            topic: "https://api.example.com/streams?user_id=42".to_string(),
            expires_at: "2026-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(sub.user_id(), Some("42"));

        let sub = SubscriptionInfo {
            topic: "https://api.example.com/streams".to_string(),
            expires_at: String::new(),
        };
        assert_eq!(sub.user_id(), None);
    }

    #[test]
    fn test_user_query_params() {
        let ids = vec!["1".to_string(), "2".to_string()];
        assert_eq!(UserQuery::Ids(&ids).to_query(), vec![("id", "1"), ("id", "2")]);

        let logins = vec!["alice".to_string()];
        assert_eq!(UserQuery::Logins(&logins).to_query(), vec![("login", "alice")]);
    }
}
