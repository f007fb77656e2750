//! Platform-agnostic types for the BLE peripheral lifecycle state machine.
//!
//! This crate holds the data shared between the lifecycle engine
//! (`blefsm-core`) and anything that only needs to observe it: the
//! lifecycle [`State`] and [`Trigger`] enums and the [`DiscoveredDevice`]
//! records produced by scanning, plus the standard UUIDs used when
//! streaming notifications.
//!
//! # Example
//!
//! ```
//! use blefsm_types::{DiscoveredDevice, State};
//!
//! let device = DiscoveredDevice::new("AA:BB:CC:DD:EE:FF").with_name("HRM");
//! assert_eq!(device.address, "AA:BB:CC:DD:EE:FF");
//! assert!(!State::Init.holds_target());
//! ```

pub mod types;
pub mod uuid;

pub use types::{AdvertisementData, DiscoveredDevice, State, Trigger};
