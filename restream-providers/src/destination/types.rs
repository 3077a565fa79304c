//! Destination platform wire types

use serde::Deserialize;

/// A reusable ingestion endpoint ("live stream" resource): the long-lived
/// pipe broadcasts are bound to before the relay can push data.
#[derive(Debug, Clone)]
pub struct IngestEndpoint {
    pub id: String,
    pub ingestion_address: String,
    pub stream_key: String,
}

impl IngestEndpoint {
    /// Concrete network address the relay writes to (host + stream key path).
    #[must_use]
    pub fn ingestion_uri(&self) -> String {
        format!("{}/{}", self.ingestion_address.trim_end_matches('/'), self.stream_key)
    }
}

/// A broadcast entity on the destination platform.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub id: String,
    pub title: String,
}

/// Enumerated options for the ingestion endpoint list call.
///
/// Each list call site builds one of these instead of assembling query
/// strings ad hoc.
#[derive(Debug, Clone, Default)]
pub struct ListStreamsParams {
    /// Resource parts to return (joined with commas on the wire).
    pub part: Vec<&'static str>,
    /// Restrict to endpoints owned by the authorized account.
    pub mine: bool,
    /// Restrict to a single endpoint id.
    pub id: Option<String>,
}

impl ListStreamsParams {
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("part", self.part.join(","))];
        if self.mine {
            query.push(("mine", "true".to_string()));
        }
        if let Some(id) = &self.id {
            query.push(("id", id.clone()));
        }
        query
    }
}

/// OAuth token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    /// Present on the initial code exchange, absent on refresh grants.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

// Wire-side resource shapes. The public types above are flattened from
// these in the client.

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct ListEnvelope<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamResource {
    pub id: String,
    pub cdn: CdnInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CdnInfo {
    #[serde(rename = "ingestionInfo")]
    pub ingestion_info: IngestionInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IngestionInfo {
    #[serde(rename = "ingestionAddress")]
    pub ingestion_address: String,
    #[serde(rename = "streamName")]
    pub stream_name: String,
}

impl From<StreamResource> for IngestEndpoint {
    fn from(res: StreamResource) -> Self {
        Self {
            id: res.id,
            ingestion_address: res.cdn.ingestion_info.ingestion_address,
            stream_key: res.cdn.ingestion_info.stream_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BroadcastResource {
    pub id: String,
    #[serde(default)]
    pub snippet: BroadcastSnippet,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BroadcastSnippet {
    #[serde(default)]
    pub title: String,
}

impl From<BroadcastResource> for Broadcast {
    fn from(res: BroadcastResource) -> Self {
        Self {
            id: res.id,
            title: res.snippet.title,
        }
    }
}
