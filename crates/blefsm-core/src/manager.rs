//! Process-wide lifecycle management.
//!
//! A [`LifecycleManager`] owns the pieces every session shares: the
//! transport, the device registry, the scan controller and the event
//! dispatcher. Sessions built through it are tracked weakly so that
//! [`LifecycleManager::clean_up_all`] can sweep every live one at shutdown.

use std::sync::{Arc, Weak};

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::{EventDispatcher, EventReceiver};
use crate::hooks::StreamHooks;
use crate::registry::DeviceRegistry;
use crate::scan::ScanController;
use crate::session::{CleanUp, Session};
use crate::transport::BleTransport;

/// Shared state for all sessions in a process.
pub struct LifecycleManager {
    transport: Arc<dyn BleTransport>,
    registry: DeviceRegistry,
    scanner: ScanController,
    events: EventDispatcher,
    config: Config,
    sessions: RwLock<Vec<Weak<dyn CleanUp>>>,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Create a manager over `transport` with default configuration.
    pub fn new(transport: Arc<dyn BleTransport>) -> Self {
        Self::with_config(transport, Config::default())
    }

    /// Create a manager over `transport` with `config`.
    pub fn with_config(transport: Arc<dyn BleTransport>, config: Config) -> Self {
        let registry = DeviceRegistry::new();
        let events = EventDispatcher::default();
        let scanner =
            ScanController::with_events(Arc::clone(&transport), registry.clone(), events.clone());
        Self {
            transport,
            registry,
            scanner,
            events,
            config,
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// The shared device registry.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The shared scan controller.
    pub fn scanner(&self) -> &ScanController {
        &self.scanner
    }

    /// The configuration sessions are built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared event dispatcher.
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Subscribe to events from the scanner and every managed session.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Build a tracked session streaming through `hooks`.
    pub async fn session<H: StreamHooks>(&self, hooks: H) -> Arc<Session<H>> {
        let session = Arc::new(
            Session::with_hooks(Arc::clone(&self.transport), self.registry.clone(), hooks)
                .config(&self.config.session)
                .events(self.events.clone()),
        );
        self.track(session.clone()).await;
        session
    }

    /// Track a session built elsewhere.
    pub async fn track(&self, session: Arc<dyn CleanUp>) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|s| s.strong_count() > 0);
        sessions.push(Arc::downgrade(&session));
    }

    /// Number of tracked sessions still alive.
    pub async fn session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    /// Clean up every live session concurrently.
    ///
    /// Returns `true` only when every session reached `Init` cleanly.
    /// Dropped sessions are forgotten.
    pub async fn clean_up_all(&self) -> bool {
        let live: Vec<Arc<dyn CleanUp>> = {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|s| s.strong_count() > 0);
            sessions.iter().filter_map(Weak::upgrade).collect()
        };
        info!("Cleaning up {} session(s)", live.len());

        let results = join_all(live.iter().map(|s| s.clean_up())).await;

        let mut all_clean = true;
        for (session, clean) in live.iter().zip(results) {
            if !clean {
                warn!(session = session.id(), state = %session.state(), "Session did not clean up");
                all_clean = false;
            }
        }
        all_clean
    }

    /// Stop any running scan and clean up every session.
    pub async fn shutdown(&self) -> bool {
        self.scanner.stop_scan().await;
        self.clean_up_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::CharacteristicHooks;
    use crate::mock::MockTransport;
    use blefsm_types::uuid::HEART_RATE_MEASUREMENT;
    use blefsm_types::{DiscoveredDevice, State};

    fn hooks() -> CharacteristicHooks {
        CharacteristicHooks::new(HEART_RATE_MEASUREMENT, Arc::new(|_: &[u8]| {}))
    }

    #[tokio::test]
    async fn test_dropped_sessions_are_pruned() {
        let manager = LifecycleManager::new(Arc::new(MockTransport::builder().build()));
        let kept = manager.session(hooks()).await;
        drop(manager.session(hooks()).await);

        assert_eq!(manager.session_count().await, 1);
        assert!(manager.clean_up_all().await);
        assert_eq!(kept.state(), State::Init);
    }

    #[tokio::test]
    async fn test_sessions_share_registry_and_config() {
        let mut config = Config::default();
        config.session.connection_timeout_secs = 1.5;
        let manager =
            LifecycleManager::with_config(Arc::new(MockTransport::builder().build()), config);
        manager.registry().upsert(DiscoveredDevice::new("addr1"));

        let a = manager.session(hooks()).await;
        let b = manager.session(hooks()).await;
        assert_eq!(a.timeout(), std::time::Duration::from_millis(1500));

        assert!(a.set_target("addr1").await.unwrap());
        assert!(!b.set_target("addr1").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_timeout_uses_default() {
        let mut config = Config::default();
        config.session.connection_timeout_secs = -1.0;
        let manager =
            LifecycleManager::with_config(Arc::new(MockTransport::builder().build()), config);

        let session = manager.session(hooks()).await;
        assert_eq!(session.timeout(), std::time::Duration::from_secs(5));
    }
}
