//! Keep-alive self-ping
//!
//! The host platform spins the process down when no traffic arrives for a
//! while, which would cut a running relay mid-stream. While at least one
//! relay session is active, a low-cost GET against our own public URL keeps
//! the host awake. Must not run when idle.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct KeepAlive {
    url: String,
    interval: Duration,
    client: reqwest::Client,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAlive {
    #[must_use]
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            url: url.into(),
            interval,
            client: reqwest::Client::new(),
            task: Mutex::new(None),
        }
    }

    /// Start the ping loop. No-op while already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let url = self.url.clone();
        let client = self.client.clone();
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval fires immediately; the first ping waits a full period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match client.get(&url).send().await {
                    Ok(resp) => debug!(status = %resp.status(), "keep-alive ping"),
                    Err(e) => warn!("keep-alive ping failed: {e}"),
                }
            }
        }));
        info!(interval_secs = interval.as_secs(), "keep-alive started");
    }

    /// Cancel the pending ping loop. No-op while not running.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            info!("keep-alive stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}
