//! Relay subprocess supervision
//!
//! The relay copies the source playlist into the destination ingestion
//! address without re-encoding. The external tool is a black box with a
//! fixed argument contract; its exit code is observed but never
//! interpreted. Supervision retries for as long as the owning session is
//! active and ends only on the session's stop signal.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// A running relay subprocess.
#[async_trait]
pub trait RelayProcess: Send {
    /// Wait for the process to exit; returns the exit code when available.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;
    /// Send the process a termination signal.
    async fn kill(&mut self) -> std::io::Result<()>;
}

/// Spawns relay subprocesses. Injectable so supervision can be tested with
/// a fake process.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(
        &self,
        playlist_url: &str,
        ingestion_uri: &str,
    ) -> std::io::Result<Box<dyn RelayProcess>>;
}

/// Launches the media-copy tool with the fixed argument shape:
/// input playlist, codec copy, streaming-flv container, output URI.
pub struct FfmpegLauncher {
    command: String,
}

impl FfmpegLauncher {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

struct FfmpegProcess {
    child: tokio::process::Child,
}

#[async_trait]
impl RelayProcess for FfmpegProcess {
    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        self.child.wait().await.map(|status| status.code())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}

#[async_trait]
impl ProcessLauncher for FfmpegLauncher {
    async fn launch(
        &self,
        playlist_url: &str,
        ingestion_uri: &str,
    ) -> std::io::Result<Box<dyn RelayProcess>> {
        let mut child = Command::new(&self.command)
            .arg("-i")
            .arg(playlist_url)
            .args(["-c", "copy", "-f", "flv"])
            .arg(ingestion_uri)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Output is captured for diagnostics only, never parsed for control
        // decisions.
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "relay_process", "{line}");
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "relay_process", "{line}");
                }
            });
        }

        Ok(Box::new(FfmpegProcess { child }))
    }
}

/// Owns one relay subprocess end-to-end: spawn, observe exit, pause, respawn
/// while the session is still active.
pub struct RelaySupervisor {
    launcher: Arc<dyn ProcessLauncher>,
    playlist_url: String,
    ingestion_uri: String,
    restart_delay: Duration,
}

impl RelaySupervisor {
    #[must_use]
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        playlist_url: String,
        ingestion_uri: String,
        restart_delay: Duration,
    ) -> Self {
        Self {
            launcher,
            playlist_url,
            ingestion_uri,
            restart_delay,
        }
    }

    /// Run supervision until the stop signal fires (or its sender is
    /// dropped). The signal is one-way: senders only ever send `true`.
    pub async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                return;
            }

            let mut process = match self
                .launcher
                .launch(&self.playlist_url, &self.ingestion_uri)
                .await
            {
                Ok(process) => process,
                Err(e) => {
                    error!(playlist_url = %self.playlist_url, "failed to spawn relay process: {e}");
                    if wait_or_stop(&mut stop_rx, self.restart_delay).await {
                        return;
                    }
                    continue;
                }
            };
            info!(playlist_url = %self.playlist_url, "relay process started");

            let exited = loop {
                tokio::select! {
                    exit = process.wait() => break exit,
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            if let Err(e) = process.kill().await {
                                warn!("failed to kill relay process: {e}");
                            }
                            info!("relay supervision stopped");
                            return;
                        }
                    }
                }
            };

            match exited {
                Ok(code) => info!(code = ?code, "relay process exited"),
                Err(e) => warn!("relay process wait failed: {e}"),
            }

            // Pause before respawning so a persistent failure does not turn
            // into a tight spawn loop.
            if wait_or_stop(&mut stop_rx, self.restart_delay).await {
                info!("relay supervision stopped");
                return;
            }
        }
    }
}

/// Sleep for `delay`, returning true early if the stop signal fires.
async fn wait_or_stop(stop_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => *stop_rx.borrow(),
        changed = stop_rx.changed() => changed.is_err() || *stop_rx.borrow(),
    }
}
