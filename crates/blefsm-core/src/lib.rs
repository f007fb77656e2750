//! Lifecycle engine for Bluetooth Low Energy peripherals.
//!
//! This crate drives a peripheral through discovery, target selection, a
//! timed connect and notification streaming using an explicit finite state
//! machine. A discovered device is always in exactly one place: unclaimed in
//! the shared [`DeviceRegistry`], or held by exactly one [`Session`]. Every
//! failure path hands it back.
//!
//! # Features
//!
//! - **Explicit transitions**: a `(state, trigger)` table in [`lifecycle`];
//!   triggers fired from the wrong state are errors, failed preconditions are
//!   `Ok(false)`
//! - **Background discovery**: [`ScanController`] fills the registry without
//!   blocking the caller
//! - **Bounded connects**: connect attempts are abandoned after the session's
//!   timeout and the device is returned to the registry
//! - **Background streaming**: notifications flow through caller-supplied
//!   [`StreamHooks`] until the session disconnects
//! - **Guaranteed clean up**: [`Session::clean_up`], [`Session::scoped`],
//!   [`SessionGuard`] and [`LifecycleManager::clean_up_all`]
//! - **Pluggable transport**: a btleplug transport behind the `btleplug`
//!   feature, and [`mock::MockTransport`] for tests
//!
//! # Lifecycle
//!
//! | State | Target held | Link open | Accepted triggers |
//! |-------|-------------|-----------|-------------------|
//! | `Init` | no | no | `set_target` |
//! | `TargetSet` | yes | no | `unset_target`, `connect` |
//! | `Connected` | yes | yes | `disconnect`, `stream` |
//! | `Streaming` | yes | yes | `disconnect` |
//!
//! # Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "btleplug")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use blefsm_core::{CharacteristicHooks, LifecycleManager, platform::BtleplugTransport};
//! use blefsm_types::uuid::HEART_RATE_MEASUREMENT;
//!
//! let manager = LifecycleManager::new(Arc::new(BtleplugTransport::new().await?));
//! manager.scanner().scan_for(Duration::from_secs(5)).await?;
//!
//! let session = manager
//!     .session(CharacteristicHooks::new(
//!         HEART_RATE_MEASUREMENT,
//!         Arc::new(|payload: &[u8]| println!("{:02X?}", payload)),
//!     ))
//!     .await;
//!
//! if session.set_target("AA:BB:CC:DD:EE:FF").await? && session.connect().await? {
//!     session.stream().await?;
//!     tokio::time::sleep(Duration::from_secs(30)).await;
//! }
//! manager.clean_up_all().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod hooks;
pub mod lifecycle;
pub mod logging;
pub mod manager;
pub mod mock;
pub mod registry;
pub mod scan;
pub mod session;
pub mod streaming;
pub mod transport;
pub mod util;

#[cfg(feature = "btleplug")]
pub mod platform;

pub use blefsm_types::types;
pub use blefsm_types::uuid;

pub use config::{Config, ConfigError, ScanConfig, SessionConfig};
pub use error::{DeviceNotFoundReason, Error, GuardFailure, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, SessionEvent};
pub use guard::SessionGuard;
pub use hooks::{CharacteristicHooks, StreamHooks};
pub use logging::LogLevel;
pub use manager::LifecycleManager;
pub use registry::DeviceRegistry;
pub use scan::ScanController;
pub use session::{CleanUp, Session};
pub use streaming::StreamController;
pub use transport::{BleTransport, DiscoveryCallback, NotificationHandler, Peripheral, ScanHandle};

pub use blefsm_types::{AdvertisementData, DiscoveredDevice, State, Trigger};
