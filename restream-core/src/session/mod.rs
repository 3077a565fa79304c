//! Relay session state machine
//!
//! One session per broadcaster, `Idle -> Provisioning -> Relaying ->
//! Stopping -> Idle` (Idle sessions are simply absent from the table). A
//! second "went live" signal for a broadcaster with a non-Idle session is a
//! redelivery artifact and is ignored; the claim check and insert happen
//! under one lock so concurrent deliveries cannot both win.

pub mod effects;
pub mod keepalive;
pub mod relay;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::event::{EventKind, WebhookEvent};
use crate::provision::Provision;

pub use effects::{RelayAnnouncer, SessionEffects};
pub use keepalive::KeepAlive;
pub use relay::{FfmpegLauncher, ProcessLauncher, RelaySupervisor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Provisioning,
    Relaying,
    Stopping,
}

struct SessionEntry {
    state: SessionState,
    stop_tx: watch::Sender<bool>,
}

/// Owns the per-broadcaster session table and drives transitions from
/// authenticated, de-duplicated webhook events.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    keepalive: KeepAlive,
    provisioner: Arc<dyn Provision>,
    launcher: Arc<dyn ProcessLauncher>,
    effects: Arc<dyn SessionEffects>,
    playlist_template: String,
    default_title: String,
    restart_delay: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        provisioner: Arc<dyn Provision>,
        launcher: Arc<dyn ProcessLauncher>,
        effects: Arc<dyn SessionEffects>,
        keepalive: KeepAlive,
        playlist_template: String,
        default_title: String,
        restart_delay: Duration,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            keepalive,
            provisioner,
            launcher,
            effects,
            playlist_template,
            default_title,
            restart_delay,
        }
    }

    /// Dispatch one authenticated, de-duplicated event.
    pub async fn handle_event(&self, event: WebhookEvent) {
        match &event.kind {
            EventKind::StreamOnline => {
                self.handle_online(&event.broadcaster_id, &event.broadcaster_login).await;
            }
            EventKind::StreamOffline => {
                self.handle_offline(&event.broadcaster_id, &event.broadcaster_login);
            }
            EventKind::Unknown(kind) => {
                info!(kind = %kind, message_id = %event.message_id, "ignoring unhandled event type");
            }
        }
    }

    /// "Stream went live": provision a destination broadcast and start the
    /// relay. Returns once the session is Relaying (or back Idle on
    /// failure); title sync and announcements are not awaited.
    pub async fn handle_online(&self, broadcaster_id: &str, login: &str) {
        let stop_rx = {
            let mut sessions = self.sessions.lock();
            if let Some(entry) = sessions.get(broadcaster_id) {
                debug!(
                    broadcaster_id,
                    state = ?entry.state,
                    "duplicate online signal ignored"
                );
                return;
            }
            let (stop_tx, stop_rx) = watch::channel(false);
            sessions.insert(
                broadcaster_id.to_string(),
                SessionEntry {
                    state: SessionState::Provisioning,
                    stop_tx,
                },
            );
            stop_rx
        };

        info!(broadcaster_id, login, "provisioning relay session");
        let provisioned = match self.provisioner.provision(&self.default_title).await {
            Ok(provisioned) => provisioned,
            Err(e) => {
                error!(broadcaster_id, "provisioning failed: {e}");
                self.sessions.lock().remove(broadcaster_id);
                self.effects.on_provision_failed(login, &e).await;
                return;
            }
        };

        let playlist_url = self.playlist_template.replace("{login}", login);
        let started = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(broadcaster_id) {
                Some(entry) if !*stop_rx.borrow() => {
                    entry.state = SessionState::Relaying;
                    let supervisor = RelaySupervisor::new(
                        self.launcher.clone(),
                        playlist_url,
                        provisioned.ingestion_uri.clone(),
                        self.restart_delay,
                    );
                    tokio::spawn(supervisor.run(stop_rx));
                    self.keepalive.start();
                    true
                }
                _ => {
                    // the broadcaster went offline mid-provisioning
                    sessions.remove(broadcaster_id);
                    false
                }
            }
        };

        if started {
            info!(
                broadcaster_id,
                broadcast_id = %provisioned.broadcast_id,
                "relay session active"
            );
            let effects = self.effects.clone();
            let broadcaster_id = broadcaster_id.to_string();
            let login = login.to_string();
            let broadcast_id = provisioned.broadcast_id;
            tokio::spawn(async move {
                effects.on_relaying(&broadcaster_id, &login, &broadcast_id).await;
            });
        } else {
            info!(broadcaster_id, "session stopped during provisioning, relay not started");
        }
    }

    /// "Stream went offline": stop the relay (no further auto-restart) and
    /// drop the keep-alive once no session remains. No session is a no-op.
    pub fn handle_offline(&self, broadcaster_id: &str, login: &str) {
        let stopped = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(broadcaster_id) {
                None => {
                    debug!(broadcaster_id, "offline signal without a session ignored");
                    false
                }
                Some(entry) => {
                    entry.state = SessionState::Stopping;
                    let _ = entry.stop_tx.send(true);
                    sessions.remove(broadcaster_id);
                    if sessions.is_empty() {
                        self.keepalive.stop();
                    }
                    true
                }
            }
        };

        if stopped {
            info!(broadcaster_id, "relay session stopped");
            let effects = self.effects.clone();
            let broadcaster_id = broadcaster_id.to_string();
            let login = login.to_string();
            tokio::spawn(async move {
                effects.on_offline(&broadcaster_id, &login).await;
            });
        }
    }

    /// Current state of a broadcaster's session, `None` when Idle.
    #[must_use]
    pub fn state_of(&self, broadcaster_id: &str) -> Option<SessionState> {
        self.sessions.lock().get(broadcaster_id).map(|entry| entry.state)
    }

    /// Number of non-Idle sessions.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    #[must_use]
    pub fn keepalive(&self) -> &KeepAlive {
        &self.keepalive
    }
}

#[cfg(test)]
mod tests {
    use super::effects::mock_effects::RecordingEffects;
    use super::relay::mock_launcher::FakeLauncher;
    use super::*;
    use crate::error::Error;
    use crate::provision::ProvisionedBroadcast;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvisioner {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl FakeProvisioner {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::from_millis(10),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
                delay: Duration::from_millis(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provision for FakeProvisioner {
        async fn provision(&self, _title: &str) -> crate::error::Result<ProvisionedBroadcast> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(Error::CredentialUnavailable("no refresh token".to_string()));
            }
            Ok(ProvisionedBroadcast {
                broadcast_id: "b1".to_string(),
                ingestion_uri: "rtmp://ingest.example.com/live2/key".to_string(),
            })
        }
    }

    struct Fixture {
        manager: Arc<SessionManager>,
        provisioner: Arc<FakeProvisioner>,
        launcher: Arc<FakeLauncher>,
        effects: Arc<RecordingEffects>,
    }

    fn fixture(provisioner: FakeProvisioner, launcher: FakeLauncher) -> Fixture {
        let provisioner = Arc::new(provisioner);
        let launcher = Arc::new(launcher);
        let effects = Arc::new(RecordingEffects::default());
        let manager = Arc::new(SessionManager::new(
            provisioner.clone(),
            launcher.clone(),
            effects.clone(),
            KeepAlive::new("http://127.0.0.1:9/", Duration::from_secs(3600)),
            "https://edge.example.com/hls/{login}/index.m3u8".to_string(),
            "Live relay".to_string(),
            Duration::from_millis(10),
        ));
        Fixture {
            manager,
            provisioner,
            launcher,
            effects,
        }
    }

    #[tokio::test]
    async fn test_online_starts_single_session() {
        let f = fixture(FakeProvisioner::ok(), FakeLauncher::long_running());

        f.manager.handle_online("42", "alice").await;
        assert_eq!(f.manager.state_of("42"), Some(SessionState::Relaying));
        assert_eq!(f.provisioner.calls(), 1);
        assert!(f.manager.keepalive().is_running());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.launcher.spawns(), 1);
        assert!(f.effects.recorded().contains(&"relaying:42:b1".to_string()));
    }

    #[tokio::test]
    async fn test_duplicate_online_is_ignored() {
        let f = fixture(FakeProvisioner::ok(), FakeLauncher::long_running());

        tokio::join!(
            f.manager.handle_online("42", "alice"),
            f.manager.handle_online("42", "alice"),
        );
        assert_eq!(f.provisioner.calls(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.launcher.spawns(), 1);
    }

    #[tokio::test]
    async fn test_provisioning_failure_returns_to_idle() {
        let f = fixture(FakeProvisioner::failing(), FakeLauncher::long_running());

        f.manager.handle_online("42", "alice").await;
        assert_eq!(f.manager.state_of("42"), None);
        assert_eq!(f.launcher.spawns(), 0);
        assert!(!f.manager.keepalive().is_running());
        assert!(f.effects.recorded().contains(&"failed:alice".to_string()));
    }

    #[tokio::test]
    async fn test_offline_without_session_is_noop() {
        let f = fixture(FakeProvisioner::ok(), FakeLauncher::long_running());

        f.manager.handle_offline("42", "alice");
        assert_eq!(f.manager.state_of("42"), None);
        assert_eq!(f.manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_online_then_offline_stops_relay() {
        let f = fixture(FakeProvisioner::ok(), FakeLauncher::exiting());

        f.manager.handle_online("42", "alice").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(f.launcher.spawns() >= 1);

        f.manager.handle_offline("42", "alice");
        assert_eq!(f.manager.state_of("42"), None);
        assert!(!f.manager.keepalive().is_running());

        // no further auto-restart once stopped
        tokio::time::sleep(Duration::from_millis(20)).await;
        let settled = f.launcher.spawns();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(f.launcher.spawns(), settled);
    }

    #[tokio::test]
    async fn test_keepalive_tracks_remaining_sessions() {
        let f = fixture(FakeProvisioner::ok(), FakeLauncher::long_running());

        f.manager.handle_online("42", "alice").await;
        f.manager.handle_online("43", "bob").await;
        assert!(f.manager.keepalive().is_running());

        f.manager.handle_offline("42", "alice");
        assert!(f.manager.keepalive().is_running(), "other session still active");

        f.manager.handle_offline("43", "bob");
        assert!(!f.manager.keepalive().is_running());
    }

    #[tokio::test]
    async fn test_offline_during_provisioning_discards_session() {
        let provisioner = FakeProvisioner {
            calls: AtomicUsize::new(0),
            fail: false,
            delay: Duration::from_millis(50),
        };
        let f = fixture(provisioner, FakeLauncher::long_running());

        let manager = f.manager.clone();
        let online = tokio::spawn(async move { manager.handle_online("42", "alice").await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.manager.state_of("42"), Some(SessionState::Provisioning));

        f.manager.handle_offline("42", "alice");
        online.await.expect("online task panicked");

        assert_eq!(f.manager.state_of("42"), None);
        assert_eq!(f.launcher.spawns(), 0, "relay must not start after offline");
    }

    #[tokio::test]
    async fn test_unknown_event_kind_changes_nothing() {
        let f = fixture(FakeProvisioner::ok(), FakeLauncher::long_running());

        f.manager
            .handle_event(WebhookEvent {
                message_id: "m1".to_string(),
                kind: EventKind::Unknown("channel.update".to_string()),
                broadcaster_id: "42".to_string(),
                broadcaster_login: "alice".to_string(),
            })
            .await;
        assert_eq!(f.manager.active_sessions(), 0);
        assert_eq!(f.provisioner.calls(), 0);
    }
}
