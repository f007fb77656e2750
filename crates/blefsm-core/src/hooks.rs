//! Notification hooks supplied by the caller.
//!
//! Decoding a device's payloads is the caller's business. A session only
//! needs four capabilities to stream: wrap the raw transport handle into
//! whatever client the caller wants, attach a measurement handler, and
//! enable/disable notifications. [`StreamHooks`] bundles them.
//!
//! [`CharacteristicHooks`] covers the common case of one notifying
//! characteristic whose raw payloads go to a closure.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use blefsm_core::hooks::CharacteristicHooks;
//! use blefsm_types::uuid::HEART_RATE_MEASUREMENT;
//!
//! let hooks = CharacteristicHooks::new(
//!     HEART_RATE_MEASUREMENT,
//!     Arc::new(|payload: &[u8]| println!("{:02X?}", payload)),
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{NotificationHandler, Peripheral};

/// Caller-supplied streaming capabilities.
#[async_trait]
pub trait StreamHooks: Send + Sync + 'static {
    /// Client built over the raw transport handle.
    type Client: Send + Sync + 'static;

    /// Build the client used by the remaining hooks.
    fn wrap(&self, peripheral: Arc<dyn Peripheral>) -> Self::Client;

    /// Whether [`wrap`](Self::wrap) layers something over the raw handle.
    ///
    /// When `true`, [`set_measurement_handler`](Self::set_measurement_handler)
    /// runs before notifications are enabled.
    fn wraps_client(&self) -> bool {
        false
    }

    /// Attach the decoding callback to a wrapping client.
    fn set_measurement_handler(&self, client: &Self::Client) -> Result<()> {
        let _ = client;
        Ok(())
    }

    /// Start notifications.
    async fn enable_notifications(&self, client: &Self::Client) -> Result<()>;

    /// Stop notifications.
    async fn disable_notifications(&self, client: &Self::Client) -> Result<()>;

    /// Send a device command while streaming.
    async fn send_command(&self, client: &Self::Client, command: &[u8]) -> Result<()> {
        let _ = (client, command);
        Err(Error::Unsupported("send_command".to_string()))
    }
}

/// Streams one characteristic's raw payloads to a closure.
///
/// The client is the raw transport handle.
#[derive(Clone)]
pub struct CharacteristicHooks {
    characteristic: Uuid,
    handler: NotificationHandler,
    command_characteristic: Option<Uuid>,
}

impl fmt::Debug for CharacteristicHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacteristicHooks")
            .field("characteristic", &self.characteristic)
            .field("command_characteristic", &self.command_characteristic)
            .finish_non_exhaustive()
    }
}

impl CharacteristicHooks {
    /// Notify on `characteristic`, passing each payload to `handler`.
    pub fn new(characteristic: Uuid, handler: NotificationHandler) -> Self {
        Self {
            characteristic,
            handler,
            command_characteristic: None,
        }
    }

    /// Route [`StreamHooks::send_command`] to a writable characteristic.
    #[must_use]
    pub fn with_command_characteristic(mut self, characteristic: Uuid) -> Self {
        self.command_characteristic = Some(characteristic);
        self
    }

    /// The notifying characteristic.
    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }
}

#[async_trait]
impl StreamHooks for CharacteristicHooks {
    type Client = Arc<dyn Peripheral>;

    fn wrap(&self, peripheral: Arc<dyn Peripheral>) -> Self::Client {
        peripheral
    }

    async fn enable_notifications(&self, client: &Self::Client) -> Result<()> {
        debug!(address = client.address(), characteristic = %self.characteristic, "Enabling notifications");
        client
            .subscribe(self.characteristic, Arc::clone(&self.handler))
            .await
    }

    async fn disable_notifications(&self, client: &Self::Client) -> Result<()> {
        debug!(address = client.address(), characteristic = %self.characteristic, "Disabling notifications");
        client.unsubscribe(self.characteristic).await
    }

    async fn send_command(&self, client: &Self::Client, command: &[u8]) -> Result<()> {
        match self.command_characteristic {
            Some(characteristic) => client.write(characteristic, command).await,
            None => Err(Error::Unsupported(
                "no command characteristic configured".to_string(),
            )),
        }
    }
}
