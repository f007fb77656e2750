//! One peripheral slot driven through the lifecycle state machine.
//!
//! A [`Session`] claims a device from the shared [`DeviceRegistry`], connects
//! to it through the [`BleTransport`], streams notifications through the
//! caller's [`StreamHooks`] and hands the device back to the registry when it
//! disconnects or a connect attempt fails.
//!
//! Every trigger holds the session lock for its whole guard and action body,
//! so triggers fired concurrently on one session run one after another.
//!
//! # Example
//!
//! ```ignore
//! use blefsm_core::{CharacteristicHooks, Session};
//! use blefsm_types::uuid::HEART_RATE_MEASUREMENT;
//!
//! let hooks = CharacteristicHooks::new(
//!     HEART_RATE_MEASUREMENT,
//!     Arc::new(|payload: &[u8]| println!("{:02X?}", payload)),
//! );
//! let session = Session::with_hooks(transport, registry, hooks);
//!
//! if session.set_target("AA:BB:CC:DD:EE:FF").await? && session.connect().await? {
//!     session.stream().await?;
//! }
//! // ...
//! session.clean_up().await;
//! ```

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use blefsm_types::{DiscoveredDevice, State, Trigger};

use crate::config::SessionConfig;
use crate::error::{Error, GuardFailure, Result};
use crate::events::{EventDispatcher, SessionEvent};
use crate::hooks::{CharacteristicHooks, StreamHooks};
use crate::lifecycle::{self, Action, Guard};
use crate::registry::DeviceRegistry;
use crate::streaming::StreamController;
use crate::transport::{BleTransport, Peripheral};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Something that can be driven back to `Init`.
///
/// Implemented by every [`Session`] so that
/// [`LifecycleManager`](crate::LifecycleManager) can track sessions with
/// different hook types side by side.
#[async_trait]
pub trait CleanUp: Send + Sync {
    /// Process-unique identifier.
    fn id(&self) -> u64;

    /// Current lifecycle state.
    fn state(&self) -> State;

    /// Drive back to `Init`; `true` when every step was clean.
    async fn clean_up(&self) -> bool;
}

/// Outcome of firing one trigger.
enum Fired {
    /// The guard failed and the state did not change.
    Blocked,
    /// The state changed; `clean` is `false` when an action reported a
    /// teardown problem.
    Moved { clean: bool },
}

/// Fields mutated by triggers, guarded by the session lock.
struct SessionCore<H: StreamHooks> {
    target: Option<String>,
    /// The device while it is out of the registry on this session's behalf.
    claimed: Option<DiscoveredDevice>,
    link: Option<Arc<dyn Peripheral>>,
    client: Option<H::Client>,
    hooks: Option<H>,
    stop_signal: CancellationToken,
    stream: Option<StreamController>,
}

/// Connection lifecycle of one peripheral.
pub struct Session<H: StreamHooks = CharacteristicHooks> {
    id: u64,
    transport: Arc<dyn BleTransport>,
    registry: DeviceRegistry,
    connection_timeout: Duration,
    events: EventDispatcher,
    state: watch::Sender<State>,
    last_failure: std::sync::Mutex<Option<GuardFailure>>,
    core: Mutex<SessionCore<H>>,
}

impl<H: StreamHooks> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("connection_timeout", &self.connection_timeout)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session without hooks.
    ///
    /// Install hooks with [`set_hooks`](Self::set_hooks) before streaming.
    pub fn new(transport: Arc<dyn BleTransport>, registry: DeviceRegistry) -> Self {
        Self::build(transport, registry, None)
    }
}

impl<H: StreamHooks> Session<H> {
    /// Create a session that streams through `hooks`.
    pub fn with_hooks(transport: Arc<dyn BleTransport>, registry: DeviceRegistry, hooks: H) -> Self {
        Self::build(transport, registry, Some(hooks))
    }

    fn build(transport: Arc<dyn BleTransport>, registry: DeviceRegistry, hooks: Option<H>) -> Self {
        let (state, _) = watch::channel(State::Init);
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            registry,
            connection_timeout: SessionConfig::default().connection_timeout(),
            events: EventDispatcher::default(),
            state,
            last_failure: std::sync::Mutex::new(None),
            core: Mutex::new(SessionCore {
                target: None,
                claimed: None,
                link: None,
                client: None,
                hooks,
                stop_signal: CancellationToken::new(),
                stream: None,
            }),
        }
    }

    /// Set the connect deadline.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Apply session settings from configuration.
    #[must_use]
    pub fn config(self, config: &SessionConfig) -> Self {
        self.connection_timeout(config.connection_timeout())
    }

    /// Publish state changes and guard failures on `events`.
    #[must_use]
    pub fn events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Process-unique identifier of this session.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// The connect deadline.
    pub fn timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// The registry this session claims from.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Address of the current target, if any.
    pub async fn target(&self) -> Option<String> {
        self.core.lock().await.target.clone()
    }

    /// Why the most recent trigger stayed put, if its guard failed.
    pub fn last_guard_failure(&self) -> Option<GuardFailure> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install or replace the notification hooks.
    ///
    /// Any client wrapped by previous hooks is discarded.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] while streaming, since the running stream
    /// must be torn down by the hooks that set it up.
    pub async fn set_hooks(&self, hooks: H) -> Result<()> {
        let mut core = self.core.lock().await;
        if self.state() == State::Streaming {
            return Err(Error::Unsupported(
                "replacing hooks while streaming".to_string(),
            ));
        }
        core.client = core.link.clone().map(|link| hooks.wrap(link));
        core.hooks = Some(hooks);
        Ok(())
    }

    /// Claim `address` from the registry and make it the target.
    ///
    /// Returns `false`, leaving the session in `Init`, when the registry does
    /// not hold the address.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the session is in `Init`.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn set_target(&self, address: &str) -> Result<bool> {
        let mut core = self.core.lock().await;
        let fired = self.fire(&mut core, Trigger::SetTarget, Some(address)).await?;
        Ok(matches!(fired, Fired::Moved { .. }))
    }

    /// Forget the target, returning a still-held device to the registry.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the session is in `TargetSet`.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn unset_target(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        self.fire(&mut core, Trigger::UnsetTarget, None).await?;
        Ok(())
    }

    /// Connect to the target within the connection timeout.
    ///
    /// Returns `false`, leaving the session in `TargetSet`, when the device
    /// is not available, the transport fails or the deadline passes. The
    /// reason is available from [`last_guard_failure`](Self::last_guard_failure).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the session is in `TargetSet`.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn connect(&self) -> Result<bool> {
        let mut core = self.core.lock().await;
        let fired = self.fire(&mut core, Trigger::Connect, None).await?;
        Ok(matches!(fired, Fired::Moved { .. }))
    }

    /// Disconnect, stopping the stream first when streaming.
    ///
    /// The device returns to the registry and the session moves to
    /// `TargetSet` even when the transport reports an error.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the session is `Connected` or
    /// `Streaming`.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn disconnect(&self) -> Result<()> {
        let mut core = self.core.lock().await;
        self.fire(&mut core, Trigger::Disconnect, None).await?;
        Ok(())
    }

    /// Enable notifications and start streaming in the background.
    ///
    /// Returns as soon as notifications are enabled. Returns `false`,
    /// leaving the session `Connected`, when hooks are missing or fail.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTransition`] unless the session is `Connected`.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn stream(&self) -> Result<bool> {
        let mut core = self.core.lock().await;
        let fired = self.fire(&mut core, Trigger::Stream, None).await?;
        Ok(matches!(fired, Fired::Moved { .. }))
    }

    /// Send a device command through the hooks.
    ///
    /// # Errors
    ///
    /// [`Error::NotStreaming`] outside `Streaming`; otherwise whatever the
    /// hooks return.
    pub async fn send_command(&self, command: &[u8]) -> Result<()> {
        let core = self.core.lock().await;
        let state = self.state();
        if state != State::Streaming {
            return Err(Error::NotStreaming { state });
        }
        match (core.hooks.as_ref(), core.client.as_ref()) {
            (Some(hooks), Some(client)) => hooks.send_command(client, command).await,
            _ => Err(Error::HooksMissing),
        }
    }

    /// Drive the session back to `Init` from any state.
    ///
    /// Stops at the first step whose teardown was not clean and returns
    /// `false`; calling again continues from wherever the session is.
    #[instrument(skip(self), fields(session = self.id))]
    pub async fn clean_up(&self) -> bool {
        let mut core = self.core.lock().await;
        while let Some(trigger) = lifecycle::cleanup_step(self.state()) {
            match self.fire(&mut core, trigger, None).await {
                Ok(Fired::Moved { clean: true }) => {}
                Ok(Fired::Moved { clean: false }) => {
                    warn!(state = %self.state(), "Clean up stopped after an unclean {}", trigger);
                    return false;
                }
                Ok(Fired::Blocked) => {
                    warn!(state = %self.state(), "Clean up blocked on {}", trigger);
                    return false;
                }
                Err(e) => {
                    error!("Clean up failed: {}", e);
                    return false;
                }
            }
        }
        debug!("Session is clean");
        true
    }

    /// Run `body`, then [`clean_up`](Self::clean_up) on every exit path.
    ///
    /// Clean up runs after `Ok`, after `Err` and after a panic, which is
    /// resumed once the session is clean.
    ///
    /// ```ignore
    /// let streamed = session
    ///     .scoped(|s| {
    ///         async move {
    ///             s.set_target("AA:BB:CC:DD:EE:FF").await?;
    ///             s.connect().await?;
    ///             s.stream().await
    ///         }
    ///         .boxed()
    ///     })
    ///     .await?;
    /// ```
    pub async fn scoped<'s, T, F>(&'s self, body: F) -> Result<T>
    where
        F: FnOnce(&'s Self) -> BoxFuture<'s, Result<T>>,
    {
        let outcome = AssertUnwindSafe(body(self)).catch_unwind().await;
        if !self.clean_up().await {
            warn!(session = self.id, state = %self.state(), "Scoped session did not clean up");
        }
        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn fire(
        &self,
        core: &mut SessionCore<H>,
        trigger: Trigger,
        address: Option<&str>,
    ) -> Result<Fired> {
        let from = self.state();
        let transition = lifecycle::transition(from, trigger)?;

        if let Err(failure) = self.check_guard(core, transition.guard, address).await {
            warn!(session = self.id, %trigger, state = %from, "Guard failed: {}", failure);
            self.events.send(SessionEvent::GuardFailed {
                session: self.id,
                trigger,
                state: from,
                reason: failure.to_string(),
            });
            *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(failure);
            return Ok(Fired::Blocked);
        }
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let mut clean = self.run_action(core, transition.before).await;
        self.state.send_replace(transition.dest);
        info!(session = self.id, %trigger, "{} -> {}", from, transition.dest);
        self.events.send(SessionEvent::StateChanged {
            session: self.id,
            trigger,
            from,
            to: transition.dest,
        });
        clean &= self.run_action(core, transition.after).await;

        Ok(Fired::Moved { clean })
    }

    async fn check_guard(
        &self,
        core: &mut SessionCore<H>,
        guard: Guard,
        address: Option<&str>,
    ) -> std::result::Result<(), GuardFailure> {
        match guard {
            Guard::Always => Ok(()),
            Guard::ClaimTarget => {
                let address = address.unwrap_or_default();
                let device = self.registry.try_claim(address)?;
                debug!(session = self.id, address, "Claimed device");
                core.target = Some(address.to_string());
                core.claimed = Some(device);
                Ok(())
            }
            Guard::ConnectWithTimeout => self.connect_with_timeout(core).await,
            Guard::SetupStream => self.setup_stream(core).await,
        }
    }

    async fn run_action(&self, core: &mut SessionCore<H>, action: Action) -> bool {
        match action {
            Action::None => true,
            Action::ReleaseTarget => {
                if let Some(device) = core.claimed.take() {
                    self.registry.release(device);
                }
                core.target = None;
                core.client = None;
                core.link = None;
                true
            }
            Action::Disconnect => self.disconnect_from_device(core).await,
            Action::StopStreamAndDisconnect => {
                let stopped = self.stop_stream(core).await;
                let disconnected = self.disconnect_from_device(core).await;
                stopped && disconnected
            }
            Action::StartStreamTask => {
                let address = core.target.clone().unwrap_or_default();
                core.stream = Some(StreamController::start(
                    address,
                    core.stop_signal.clone(),
                ));
                true
            }
        }
    }

    async fn connect_with_timeout(
        &self,
        core: &mut SessionCore<H>,
    ) -> std::result::Result<(), GuardFailure> {
        let limit = self.connection_timeout;
        let attempt = timeout(limit, self.connect_to_device(core)).await;
        match attempt {
            Ok(result) => result,
            Err(_) => {
                // The abandoned attempt was dropped with the timeout future.
                warn!(session = self.id, "Connect timed out after {:?}", limit);
                self.disconnect_from_device(core).await;
                Err(GuardFailure::ConnectTimeout { duration: limit })
            }
        }
    }

    async fn connect_to_device(
        &self,
        core: &mut SessionCore<H>,
    ) -> std::result::Result<(), GuardFailure> {
        let address = core.target.clone().unwrap_or_default();
        let device = match core.claimed.as_ref() {
            Some(device) => device.clone(),
            None => {
                let device = self.registry.try_claim(&address)?;
                core.claimed = Some(device.clone());
                device
            }
        };

        let link = match self.transport.open(&device).await {
            Ok(link) => link,
            Err(e) => {
                warn!(session = self.id, address = %address, "Failed to open peripheral: {}", e);
                self.disconnect_from_device(core).await;
                return Err(e.into());
            }
        };
        core.link = Some(Arc::clone(&link));
        if let Some(hooks) = core.hooks.as_ref() {
            core.client = Some(hooks.wrap(Arc::clone(&link)));
        }

        match link.connect().await {
            Ok(true) => {
                info!(session = self.id, address = %address, "Connected");
                Ok(())
            }
            Ok(false) => {
                warn!(session = self.id, address = %address, "Transport did not connect");
                core.client = None;
                core.link = None;
                Err(GuardFailure::NotConnected { address })
            }
            Err(e) => {
                warn!(session = self.id, address = %address, "Connect failed: {}", e);
                self.disconnect_from_device(core).await;
                Err(e.into())
            }
        }
    }

    /// Return the device to the registry, then disconnect the link.
    ///
    /// Returns `false` when the transport reported an error.
    async fn disconnect_from_device(&self, core: &mut SessionCore<H>) -> bool {
        if let Some(device) = core.claimed.take() {
            debug!(session = self.id, address = %device.address, "Releasing device");
            self.registry.release(device);
        }
        core.client = None;

        let Some(link) = core.link.take() else {
            return true;
        };
        match link.disconnect().await {
            Ok(()) => {
                info!(session = self.id, address = link.address(), "Disconnected");
                true
            }
            Err(e) => {
                warn!(session = self.id, address = link.address(), "Disconnect failed: {}", e);
                false
            }
        }
    }

    async fn setup_stream(&self, core: &mut SessionCore<H>) -> std::result::Result<(), GuardFailure> {
        core.stop_signal = CancellationToken::new();

        let Some(hooks) = core.hooks.as_ref() else {
            return Err(GuardFailure::HooksMissing);
        };
        if core.client.is_none() {
            let link = core.link.clone().ok_or_else(|| GuardFailure::NotConnected {
                address: core.target.clone().unwrap_or_default(),
            })?;
            core.client = Some(hooks.wrap(link));
        }
        let Some(client) = core.client.as_ref() else {
            return Err(GuardFailure::HooksMissing);
        };

        if hooks.wraps_client() {
            hooks.set_measurement_handler(client)?;
        }
        if let Err(e) = hooks.enable_notifications(client).await {
            warn!(session = self.id, "Failed to enable notifications: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    /// Raise the stop signal, disable notifications and join the stream task.
    ///
    /// Returns `false` when disabling notifications failed.
    async fn stop_stream(&self, core: &mut SessionCore<H>) -> bool {
        core.stop_signal.cancel();

        let clean = match (core.hooks.as_ref(), core.client.as_ref()) {
            (Some(hooks), Some(client)) => match hooks.disable_notifications(client).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(session = self.id, "Failed to disable notifications: {}", e);
                    false
                }
            },
            _ => {
                warn!(session = self.id, "No hooks to disable notifications with");
                false
            }
        };

        if let Some(stream) = core.stream.take() {
            stream.stop().await;
        }
        clean
    }
}

#[async_trait]
impl<H: StreamHooks> CleanUp for Session<H> {
    fn id(&self) -> u64 {
        self.id
    }

    fn state(&self) -> State {
        Session::state(self)
    }

    async fn clean_up(&self) -> bool {
        Session::clean_up(self).await
    }
}

impl<H: StreamHooks> Drop for Session<H> {
    fn drop(&mut self) {
        let state = *self.state.borrow();
        let core = self.core.get_mut();
        core.stop_signal.cancel();
        if let Some(device) = core.claimed.take() {
            warn!(
                session = self.id,
                address = %device.address,
                %state,
                "Session dropped while holding a device, returning it to the registry"
            );
            self.registry.release(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ConnectBehavior, MockTransport, TransportCall};
    use blefsm_types::uuid::HEART_RATE_MEASUREMENT;

    fn hooks() -> CharacteristicHooks {
        CharacteristicHooks::new(HEART_RATE_MEASUREMENT, Arc::new(|_: &[u8]| {}))
    }

    fn setup(addresses: &[&str]) -> (Arc<MockTransport>, DeviceRegistry) {
        let transport = Arc::new(MockTransport::builder().build());
        let registry = DeviceRegistry::new();
        for address in addresses {
            registry.upsert(DiscoveredDevice::new(*address));
        }
        (transport, registry)
    }

    #[tokio::test]
    async fn test_set_target_claims_device() {
        let (transport, registry) = setup(&["addr1", "addr2"]);
        let session = Session::new(transport, registry.clone());

        assert!(session.set_target("addr1").await.unwrap());
        assert_eq!(session.state(), State::TargetSet);
        assert_eq!(session.target().await.as_deref(), Some("addr1"));
        assert!(!registry.contains("addr1"));
        assert!(registry.contains("addr2"));
    }

    #[tokio::test]
    async fn test_set_target_unknown_address_stays_init() {
        let (transport, registry) = setup(&["addr1"]);
        let session = Session::new(transport, registry.clone());

        assert!(!session.set_target("addr9").await.unwrap());
        assert_eq!(session.state(), State::Init);
        assert_eq!(session.target().await, None);
        assert_eq!(
            session.last_guard_failure(),
            Some(GuardFailure::DeviceNotFound {
                address: "addr9".to_string()
            })
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_refused_keeps_device_held() {
        let (transport, registry) = setup(&["addr1"]);
        transport.set_connect_behavior("addr1", ConnectBehavior::Refuse);
        let session = Session::new(transport.clone(), registry.clone());

        session.set_target("addr1").await.unwrap();
        assert!(!session.connect().await.unwrap());
        assert_eq!(session.state(), State::TargetSet);
        assert!(!registry.contains("addr1"));
        assert!(matches!(
            session.last_guard_failure(),
            Some(GuardFailure::NotConnected { .. })
        ));

        session.unset_target().await.unwrap();
        assert!(registry.contains("addr1"));
    }

    #[tokio::test]
    async fn test_stream_without_hooks_fails_guard() {
        let (transport, registry) = setup(&["addr1"]);
        let session = Session::new(transport, registry);

        session.set_target("addr1").await.unwrap();
        assert!(session.connect().await.unwrap());
        assert!(!session.stream().await.unwrap());
        assert_eq!(session.state(), State::Connected);
        assert_eq!(session.last_guard_failure(), Some(GuardFailure::HooksMissing));
    }

    #[tokio::test]
    async fn test_hooks_installed_after_connect() {
        let (transport, registry) = setup(&["addr1"]);
        let session = Session::new(transport.clone(), registry);

        session.set_target("addr1").await.unwrap();
        session.connect().await.unwrap();
        session.set_hooks(hooks()).await.unwrap();
        assert!(session.stream().await.unwrap());
        assert!(
            transport
                .peripheral("addr1")
                .unwrap()
                .is_subscribed(&HEART_RATE_MEASUREMENT)
        );
        assert!(session.set_hooks(hooks()).await.is_err());
    }

    #[tokio::test]
    async fn test_send_command_requires_streaming() {
        let (transport, registry) = setup(&["addr1"]);
        let session = Session::with_hooks(
            transport.clone(),
            registry,
            hooks().with_command_characteristic(blefsm_types::uuid::HEART_RATE_CONTROL_POINT),
        );

        let err = session.send_command(&[0x01]).await.unwrap_err();
        assert!(matches!(err, Error::NotStreaming { state: State::Init }));

        session.set_target("addr1").await.unwrap();
        session.connect().await.unwrap();
        session.stream().await.unwrap();
        session.send_command(&[0x01]).await.unwrap();

        assert!(transport.calls().contains(&TransportCall::Write(
            "addr1".to_string(),
            blefsm_types::uuid::HEART_RATE_CONTROL_POINT,
            vec![0x01],
        )));
    }

    #[tokio::test]
    async fn test_state_changes_are_published() {
        let (transport, registry) = setup(&["addr1"]);
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let session = Session::new(transport, registry).events(events);
        let mut watch = session.watch_state();

        session.set_target("addr1").await.unwrap();

        assert!(watch.has_changed().unwrap());
        assert_eq!(*watch.borrow_and_update(), State::TargetSet);
        match rx.recv().await.unwrap() {
            SessionEvent::StateChanged { session: id, from, to, .. } => {
                assert_eq!(id, session.id());
                assert_eq!(from, State::Init);
                assert_eq!(to, State::TargetSet);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let (transport, registry) = setup(&[]);
        let a = Session::new(transport.clone(), registry.clone());
        let b = Session::new(transport, registry);
        assert_ne!(a.id(), b.id());
    }
}
