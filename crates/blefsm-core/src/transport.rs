//! Transport capability consumed by the lifecycle engine.
//!
//! The engine never talks to a radio itself. Scanning, connecting,
//! disconnecting and characteristic notify/un-notify go through these traits,
//! which are implemented by [`crate::platform::BtleplugTransport`] (feature
//! `btleplug`) and by [`crate::mock::MockTransport`] for tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use blefsm_types::DiscoveredDevice;

use crate::error::{Error, Result};

/// Callback invoked for every discovered or updated peripheral.
pub type DiscoveryCallback = Arc<dyn Fn(DiscoveredDevice) + Send + Sync>;

/// Callback invoked with the payload of every notification.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Access to the host's BLE stack.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// Start reporting advertisements to `on_discovered`.
    ///
    /// Discovery continues until the returned handle is stopped.
    async fn scan(&self, on_discovered: DiscoveryCallback) -> Result<Box<dyn ScanHandle>>;

    /// Acquire a handle for a previously discovered peripheral.
    ///
    /// The handle is not connected yet.
    async fn open(&self, device: &DiscoveredDevice) -> Result<Arc<dyn Peripheral>>;
}

/// A running transport-level scan.
#[async_trait]
pub trait ScanHandle: Send {
    /// Stop discovery.
    async fn stop(self: Box<Self>) -> Result<()>;
}

/// Handle to one physical peripheral.
#[async_trait]
pub trait Peripheral: Send + Sync + fmt::Debug {
    /// Address of the peripheral.
    fn address(&self) -> &str;

    /// Establish the link.
    ///
    /// `Ok(false)` means the stack answered but the link did not come up.
    async fn connect(&self) -> Result<bool>;

    /// Tear the link down.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the stack reports the link as up.
    async fn is_connected(&self) -> bool;

    /// Enable notifications on `characteristic`, delivering payloads to `handler`.
    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()>;

    /// Disable notifications on `characteristic`.
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()>;

    /// Write `data` to `characteristic` with response.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let _ = data;
        Err(Error::Unsupported(format!("write to {}", characteristic)))
    }
}
