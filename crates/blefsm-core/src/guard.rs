//! Session guard for automatic clean up on drop.
//!
//! [`Session::scoped`] is the structured way to guarantee clean up. A
//! [`SessionGuard`] covers the cases where the session's lifetime is not a
//! single async block: when the guard goes out of scope, it spawns
//! [`Session::clean_up`] on the current tokio runtime.

use std::ops::Deref;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::warn;

use blefsm_types::State;

use crate::hooks::{CharacteristicHooks, StreamHooks};
use crate::session::Session;

/// A guard that cleans its session up when dropped.
///
/// # Example
///
/// ```ignore
/// use blefsm_core::SessionGuard;
///
/// async fn stream_once(session: Arc<Session>) -> blefsm_core::Result<()> {
///     let session = SessionGuard::new(session);
///     session.set_target("AA:BB:CC:DD:EE:FF").await?;
///     session.connect().await?;
///     session.stream().await?;
///     // Cleaned up when the guard goes out of scope.
///     Ok(())
/// }
/// ```
pub struct SessionGuard<H: StreamHooks = CharacteristicHooks> {
    session: Option<Arc<Session<H>>>,
}

impl<H: StreamHooks> SessionGuard<H> {
    /// Guard `session`.
    pub fn new(session: Arc<Session<H>>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Take the session back, disarming the guard.
    ///
    /// After calling this, you are responsible for cleaning the session up.
    pub fn into_inner(mut self) -> Arc<Session<H>> {
        match self.session.take() {
            Some(session) => session,
            None => unreachable!("session is only taken by into_inner or drop"),
        }
    }

    /// Get a reference to the session.
    pub fn session(&self) -> &Arc<Session<H>> {
        match self.session.as_ref() {
            Some(session) => session,
            None => unreachable!("session is only taken by into_inner or drop"),
        }
    }
}

impl<H: StreamHooks> Deref for SessionGuard<H> {
    type Target = Session<H>;

    fn deref(&self) -> &Self::Target {
        self.session()
    }
}

impl<H: StreamHooks> Drop for SessionGuard<H> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if session.state() == State::Init {
            return;
        }

        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if !session.clean_up().await {
                    warn!(
                        session = session.id(),
                        state = %session.state(),
                        "Session did not clean up in guard drop"
                    );
                }
            });
        } else {
            warn!(
                session = session.id(),
                "No tokio runtime available for session clean up in guard drop"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::registry::DeviceRegistry;
    use blefsm_types::DiscoveredDevice;

    fn session() -> (Arc<Session>, DeviceRegistry) {
        let registry = DeviceRegistry::new();
        registry.upsert(DiscoveredDevice::new("addr1"));
        let transport = Arc::new(MockTransport::builder().build());
        (Arc::new(Session::new(transport, registry.clone())), registry)
    }

    #[tokio::test]
    async fn test_drop_cleans_up() {
        let (session, registry) = session();
        {
            let guard = SessionGuard::new(Arc::clone(&session));
            guard.set_target("addr1").await.unwrap();
            guard.connect().await.unwrap();
        }

        let mut state = session.watch_state();
        state.wait_for(|s| *s == State::Init).await.unwrap();
        assert!(registry.contains("addr1"));
    }

    #[tokio::test]
    async fn test_into_inner_disarms() {
        let (session, registry) = session();
        let guard = SessionGuard::new(Arc::clone(&session));
        guard.set_target("addr1").await.unwrap();

        let inner = guard.into_inner();
        tokio::task::yield_now().await;
        assert_eq!(inner.state(), State::TargetSet);
        assert!(!registry.contains("addr1"));
    }
}
