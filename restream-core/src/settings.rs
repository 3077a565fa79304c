//! Long-lived settings document
//!
//! The service keeps a handful of durable values across restarts: platform
//! tokens, scheduler bookkeeping, and the reusable ingestion endpoint id.
//! Persistence sits behind a trait so the session layer can be exercised
//! with an in-memory store.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The persisted settings document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDocument {
    /// Source platform app token.
    pub source_token: Option<String>,
    /// Scheduler id of the pending source reauth callback.
    pub source_reauth_id: Option<String>,
    /// Broadcaster login -> scheduler id of its subscription renewal.
    pub subscriptions: HashMap<String, String>,
    /// Destination platform OAuth refresh token.
    pub destination_refresh_token: Option<String>,
    /// Id of the reusable destination ingestion endpoint.
    pub ingest_endpoint_id: Option<String>,
}

/// Storage seam for the settings document.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Snapshot of the current document.
    async fn document(&self) -> Result<SettingsDocument, SettingsError>;

    async fn set_source_token(&self, token: &str) -> Result<(), SettingsError>;
    async fn set_source_reauth_id(&self, id: &str) -> Result<(), SettingsError>;
    async fn set_subscription(&self, login: &str, schedule_id: &str) -> Result<(), SettingsError>;
    async fn remove_subscription(&self, login: &str) -> Result<(), SettingsError>;
    async fn set_destination_refresh_token(&self, token: &str) -> Result<(), SettingsError>;
    async fn set_ingest_endpoint_id(&self, id: &str) -> Result<(), SettingsError>;
}

/// JSON-file-backed settings store.
///
/// The whole document is held in memory and rewritten atomically
/// (tmp + rename) on every change; changes are rare (reauth, resubscribe,
/// first-time provisioning).
pub struct FileSettings {
    path: PathBuf,
    doc: Mutex<SettingsDocument>,
}

impl FileSettings {
    /// Open the settings file, starting from an empty document when the file
    /// does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SettingsDocument::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    async fn update<F>(&self, apply: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut SettingsDocument),
    {
        let mut doc = self.doc.lock().await;
        apply(&mut doc);
        self.persist(&doc).await
    }

    async fn persist(&self, doc: &SettingsDocument) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn document(&self) -> Result<SettingsDocument, SettingsError> {
        Ok(self.doc.lock().await.clone())
    }

    async fn set_source_token(&self, token: &str) -> Result<(), SettingsError> {
        self.update(|doc| doc.source_token = Some(token.to_string())).await
    }

    async fn set_source_reauth_id(&self, id: &str) -> Result<(), SettingsError> {
        self.update(|doc| doc.source_reauth_id = Some(id.to_string())).await
    }

    async fn set_subscription(&self, login: &str, schedule_id: &str) -> Result<(), SettingsError> {
        self.update(|doc| {
            doc.subscriptions.insert(login.to_string(), schedule_id.to_string());
        })
        .await
    }

    async fn remove_subscription(&self, login: &str) -> Result<(), SettingsError> {
        self.update(|doc| {
            doc.subscriptions.remove(login);
        })
        .await
    }

    async fn set_destination_refresh_token(&self, token: &str) -> Result<(), SettingsError> {
        self.update(|doc| doc.destination_refresh_token = Some(token.to_string())).await
    }

    async fn set_ingest_endpoint_id(&self, id: &str) -> Result<(), SettingsError> {
        self.update(|doc| doc.ingest_endpoint_id = Some(id.to_string())).await
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory settings store for tests.

    use super::*;
    use parking_lot::Mutex as SyncMutex;

    #[derive(Default)]
    pub struct MemorySettings {
        doc: SyncMutex<SettingsDocument>,
    }

    impl MemorySettings {
        #[must_use]
        pub fn with_document(doc: SettingsDocument) -> Self {
            Self {
                doc: SyncMutex::new(doc),
            }
        }
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn document(&self) -> Result<SettingsDocument, SettingsError> {
            Ok(self.doc.lock().clone())
        }

        async fn set_source_token(&self, token: &str) -> Result<(), SettingsError> {
            self.doc.lock().source_token = Some(token.to_string());
            Ok(())
        }

        async fn set_source_reauth_id(&self, id: &str) -> Result<(), SettingsError> {
            self.doc.lock().source_reauth_id = Some(id.to_string());
            Ok(())
        }

        async fn set_subscription(
            &self,
            login: &str,
            schedule_id: &str,
        ) -> Result<(), SettingsError> {
            self.doc
                .lock()
                .subscriptions
                .insert(login.to_string(), schedule_id.to_string());
            Ok(())
        }

        async fn remove_subscription(&self, login: &str) -> Result<(), SettingsError> {
            self.doc.lock().subscriptions.remove(login);
            Ok(())
        }

        async fn set_destination_refresh_token(&self, token: &str) -> Result<(), SettingsError> {
            self.doc.lock().destination_refresh_token = Some(token.to_string());
            Ok(())
        }

        async fn set_ingest_endpoint_id(&self, id: &str) -> Result<(), SettingsError> {
            self.doc.lock().ingest_endpoint_id = Some(id.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSettings::open(dir.path().join("settings.json")).await.expect("open");
        let doc = store.document().await.expect("document");
        assert!(doc.source_token.is_none());
        assert!(doc.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = FileSettings::open(&path).await.expect("open");
        store.set_source_token("tok").await.expect("set token");
        store.set_ingest_endpoint_id("e1").await.expect("set endpoint");
        store.set_subscription("alice", "sched-1").await.expect("set sub");

        let reopened = FileSettings::open(&path).await.expect("reopen");
        let doc = reopened.document().await.expect("document");
        assert_eq!(doc.source_token.as_deref(), Some("tok"));
        assert_eq!(doc.ingest_endpoint_id.as_deref(), Some("e1"));
        assert_eq!(doc.subscriptions.get("alice").map(String::as_str), Some("sched-1"));
    }

    #[tokio::test]
    async fn test_remove_subscription() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSettings::open(dir.path().join("settings.json")).await.expect("open");
        store.set_subscription("alice", "sched-1").await.expect("set");
        store.remove_subscription("alice").await.expect("remove");
        let doc = store.document().await.expect("document");
        assert!(doc.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_fields_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, br#"{"source_token":"tok","legacy_field":1}"#)
            .await
            .expect("write");

        let store = FileSettings::open(&path).await.expect("open");
        let doc = store.document().await.expect("document");
        assert_eq!(doc.source_token.as_deref(), Some("tok"));
    }
}
