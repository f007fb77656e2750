//! In-memory transport for testing.
//!
//! [`MockTransport`] implements [`BleTransport`] without any radio. It
//! records every call it receives, so tests can assert on the exact sequence
//! of transport operations a session performed.
//!
//! # Features
//!
//! - **Scripted discovery**: devices announced when a scan starts, plus
//!   [`MockTransport::announce`] while it runs
//! - **Failure injection**: per-address connect behaviour, failing
//!   disconnect/subscribe/unsubscribe
//! - **Latency simulation**: delay connects to exercise timeouts
//! - **Notification injection**: [`MockPeripheral::notify`] drives the
//!   subscribed handler

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use blefsm_types::DiscoveredDevice;

use crate::error::{Error, Result};
use crate::transport::{BleTransport, DiscoveryCallback, NotificationHandler, Peripheral, ScanHandle};

/// A transport operation observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    ScanStarted,
    ScanStopped,
    Open(String),
    Connect(String),
    Disconnect(String),
    Subscribe(String, Uuid),
    Unsubscribe(String, Uuid),
    Write(String, Uuid, Vec<u8>),
}

/// How a mock peripheral answers `connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Connect successfully.
    #[default]
    Succeed,
    /// Return `Ok(false)`.
    Refuse,
    /// Return a transport error with this message.
    Fail(String),
    /// Never complete.
    Hang,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<TransportCall>>,
    default_connect: Mutex<ConnectBehavior>,
    connect_behaviors: Mutex<HashMap<String, ConnectBehavior>>,
    connect_latency_ms: AtomicU64,
    fail_disconnect: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_unsubscribe: AtomicBool,
    scan_callback: Mutex<Option<DiscoveryCallback>>,
}

impl Shared {
    fn record(&self, call: TransportCall) {
        lock(&self.calls).push(call);
    }

    fn connect_behavior(&self, address: &str) -> ConnectBehavior {
        lock(&self.connect_behaviors)
            .get(address)
            .cloned()
            .unwrap_or_else(|| lock(&self.default_connect).clone())
    }
}

/// Generate a random MAC-style address.
pub fn random_address() -> String {
    let bytes: [u8; 6] = rand::random();
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// A mock BLE stack.
pub struct MockTransport {
    devices: Vec<DiscoveredDevice>,
    shared: Arc<Shared>,
    peripherals: Mutex<HashMap<String, Arc<MockPeripheral>>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("devices", &self.devices.len())
            .field("calls", &lock(&self.shared.calls).len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Create a builder.
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::default()
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.shared.calls).clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.shared.calls).clear();
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &TransportCall) -> usize {
        lock(&self.shared.calls).iter().filter(|c| *c == call).count()
    }

    /// The most recently opened peripheral for `address`.
    pub fn peripheral(&self, address: &str) -> Option<Arc<MockPeripheral>> {
        lock(&self.peripherals).get(address).cloned()
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        lock(&self.shared.scan_callback).is_some()
    }

    /// Report `device` to the running scan.
    ///
    /// Returns `false` when no scan is running.
    pub fn announce(&self, device: DiscoveredDevice) -> bool {
        let callback = lock(&self.shared.scan_callback).clone();
        match callback {
            Some(callback) => {
                callback(device);
                true
            }
            None => false,
        }
    }

    /// Change how connects to `address` behave.
    pub fn set_connect_behavior(&self, address: &str, behavior: ConnectBehavior) {
        lock(&self.shared.connect_behaviors).insert(address.to_string(), behavior);
    }

    /// Change how connects behave for addresses without a specific behaviour.
    pub fn set_default_connect_behavior(&self, behavior: ConnectBehavior) {
        *lock(&self.shared.default_connect) = behavior;
    }

    /// Delay every connect by `latency`.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.shared
            .connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Make `disconnect` fail.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.shared.fail_disconnect.store(fail, Ordering::Relaxed);
    }

    /// Make `subscribe` fail.
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.shared.fail_subscribe.store(fail, Ordering::Relaxed);
    }

    /// Make `unsubscribe` fail.
    pub fn set_fail_unsubscribe(&self, fail: bool) {
        self.shared.fail_unsubscribe.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    async fn scan(&self, on_discovered: DiscoveryCallback) -> Result<Box<dyn ScanHandle>> {
        self.shared.record(TransportCall::ScanStarted);
        *lock(&self.shared.scan_callback) = Some(Arc::clone(&on_discovered));
        for device in &self.devices {
            on_discovered(device.clone());
        }
        Ok(Box::new(MockScanHandle {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn open(&self, device: &DiscoveredDevice) -> Result<Arc<dyn Peripheral>> {
        self.shared
            .record(TransportCall::Open(device.address.clone()));
        let peripheral = Arc::new(MockPeripheral {
            address: device.address.clone(),
            shared: Arc::clone(&self.shared),
            connected: AtomicBool::new(false),
            handlers: Mutex::new(HashMap::new()),
        });
        lock(&self.peripherals).insert(device.address.clone(), Arc::clone(&peripheral));
        Ok(peripheral)
    }
}

struct MockScanHandle {
    shared: Arc<Shared>,
}

#[async_trait]
impl ScanHandle for MockScanHandle {
    async fn stop(self: Box<Self>) -> Result<()> {
        lock(&self.shared.scan_callback).take();
        self.shared.record(TransportCall::ScanStopped);
        Ok(())
    }
}

/// A peripheral handed out by [`MockTransport`].
pub struct MockPeripheral {
    address: String,
    shared: Arc<Shared>,
    connected: AtomicBool,
    handlers: Mutex<HashMap<Uuid, NotificationHandler>>,
}

impl std::fmt::Debug for MockPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPeripheral")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MockPeripheral {
    /// Deliver a notification on `characteristic`.
    ///
    /// Returns `false` when nothing is subscribed to it.
    pub fn notify(&self, characteristic: Uuid, payload: &[u8]) -> bool {
        let handler = lock(&self.handlers).get(&characteristic).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Whether a handler is subscribed to `characteristic`.
    pub fn is_subscribed(&self, characteristic: &Uuid) -> bool {
        lock(&self.handlers).contains_key(characteristic)
    }

    /// Connection flag, without recording a call.
    pub fn is_connected_sync(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Peripheral for MockPeripheral {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<bool> {
        self.shared.record(TransportCall::Connect(self.address.clone()));

        let latency = self.shared.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        match self.shared.connect_behavior(&self.address) {
            ConnectBehavior::Succeed => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(true)
            }
            ConnectBehavior::Refuse => Ok(false),
            ConnectBehavior::Fail(message) => {
                Err(Error::connection_failed(self.address.clone(), message))
            }
            ConnectBehavior::Hang => {
                futures::future::pending::<()>().await;
                Ok(false)
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.shared
            .record(TransportCall::Disconnect(self.address.clone()));
        if self.shared.fail_disconnect.load(Ordering::Relaxed) {
            return Err(Error::Transport("mock disconnect failure".to_string()));
        }
        self.connected.store(false, Ordering::Relaxed);
        lock(&self.handlers).clear();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.is_connected_sync()
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        self.shared
            .record(TransportCall::Subscribe(self.address.clone(), characteristic));
        if self.shared.fail_subscribe.load(Ordering::Relaxed) {
            return Err(Error::Transport("mock subscribe failure".to_string()));
        }
        if !self.is_connected_sync() {
            return Err(Error::Transport(format!("{} is not connected", self.address)));
        }
        lock(&self.handlers).insert(characteristic, handler);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        self.shared
            .record(TransportCall::Unsubscribe(self.address.clone(), characteristic));
        if self.shared.fail_unsubscribe.load(Ordering::Relaxed) {
            return Err(Error::Transport("mock unsubscribe failure".to_string()));
        }
        lock(&self.handlers).remove(&characteristic);
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        self.shared.record(TransportCall::Write(
            self.address.clone(),
            characteristic,
            data.to_vec(),
        ));
        Ok(())
    }
}

/// Builder for [`MockTransport`].
#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    devices: Vec<DiscoveredDevice>,
    default_connect: ConnectBehavior,
    connect_behaviors: HashMap<String, ConnectBehavior>,
    connect_latency: Duration,
}

impl MockTransportBuilder {
    /// Announce `device` whenever a scan starts.
    #[must_use]
    pub fn device(mut self, device: DiscoveredDevice) -> Self {
        self.devices.push(device);
        self
    }

    /// Announce `count` devices with random addresses.
    #[must_use]
    pub fn random_devices(mut self, count: usize) -> Self {
        self.devices
            .extend((0..count).map(|_| DiscoveredDevice::new(random_address())));
        self
    }

    /// Connect behaviour for addresses without a specific one.
    #[must_use]
    pub fn default_connect(mut self, behavior: ConnectBehavior) -> Self {
        self.default_connect = behavior;
        self
    }

    /// Connect behaviour for `address`.
    #[must_use]
    pub fn connect_behavior(mut self, address: &str, behavior: ConnectBehavior) -> Self {
        self.connect_behaviors.insert(address.to_string(), behavior);
        self
    }

    /// Delay every connect.
    #[must_use]
    pub fn connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Build the transport.
    #[must_use]
    pub fn build(self) -> MockTransport {
        let shared = Shared {
            default_connect: Mutex::new(self.default_connect),
            connect_behaviors: Mutex::new(self.connect_behaviors),
            connect_latency_ms: AtomicU64::new(self.connect_latency.as_millis() as u64),
            ..Default::default()
        };
        MockTransport {
            devices: self.devices,
            shared: Arc::new(shared),
            peripherals: Mutex::new(HashMap::new()),
        }
    }
}
