//! Core types for the peripheral lifecycle.

use core::fmt;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of a session.
///
/// `Init` is both the initial state and the safe state every session can be
/// driven back to by cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum State {
    /// No target selected.
    #[default]
    Init,
    /// A discovered device has been claimed as the target.
    TargetSet,
    /// The target is connected.
    Connected,
    /// Notifications are flowing from the target.
    Streaming,
}

impl State {
    /// Every state, in lifecycle order.
    pub const ALL: [State; 4] = [
        State::Init,
        State::TargetSet,
        State::Connected,
        State::Streaming,
    ];

    /// Name of the state as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Init => "Init",
            State::TargetSet => "TargetSet",
            State::Connected => "Connected",
            State::Streaming => "Streaming",
        }
    }

    /// Whether a session in this state has a target address.
    #[must_use]
    pub fn holds_target(&self) -> bool {
        !matches!(self, State::Init)
    }

    /// Whether a session in this state owns a live transport handle.
    #[must_use]
    pub fn holds_link(&self) -> bool {
        matches!(self, State::Connected | State::Streaming)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation requested of a session's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Trigger {
    /// Claim a discovered device as the target.
    SetTarget,
    /// Drop the target without connecting.
    UnsetTarget,
    /// Connect to the target.
    Connect,
    /// Tear down the connection (and stream, if any).
    Disconnect,
    /// Enable notifications and keep them flowing in the background.
    Stream,
}

impl Trigger {
    /// Every trigger.
    pub const ALL: [Trigger; 5] = [
        Trigger::SetTarget,
        Trigger::UnsetTarget,
        Trigger::Connect,
        Trigger::Disconnect,
        Trigger::Stream,
    ];

    /// Name of the trigger as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::SetTarget => "set_target",
            Trigger::UnsetTarget => "unset_target",
            Trigger::Connect => "connect",
            Trigger::Disconnect => "disconnect",
            Trigger::Stream => "stream",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advertisement payload last seen for a peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdvertisementData {
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: Option<i16>,
    /// Advertised transmit power in dBm.
    pub tx_power_level: Option<i16>,
    /// Manufacturer specific data keyed by company identifier.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Service data keyed by service UUID.
    pub service_data: HashMap<Uuid, Vec<u8>>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
}

impl AdvertisementData {
    /// Whether the advertisement lists the given service.
    pub fn advertises(&self, service: &Uuid) -> bool {
        self.services.contains(service) || self.service_data.contains_key(service)
    }
}

/// A peripheral observed while scanning.
///
/// The address is opaque and stable for the lifetime of the process: a MAC
/// address on Linux and Windows, a CoreBluetooth UUID on macOS.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiscoveredDevice {
    /// Peripheral address.
    pub address: String,
    /// Device name, if known.
    pub name: Option<String>,
    /// Most recent advertisement.
    pub advertisement: AdvertisementData,
    /// When the advertisement was received.
    pub last_seen: OffsetDateTime,
}

impl DiscoveredDevice {
    /// Create a record for `address` seen just now with an empty advertisement.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            advertisement: AdvertisementData::default(),
            last_seen: OffsetDateTime::now_utc(),
        }
    }

    /// Set the device name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the advertisement payload.
    ///
    /// The advertised local name fills in the device name when none is set.
    #[must_use]
    pub fn with_advertisement(mut self, advertisement: AdvertisementData) -> Self {
        if self.name.is_none() {
            self.name = advertisement.local_name.clone();
        }
        self.advertisement = advertisement;
        self
    }

    /// Signal strength from the last advertisement.
    pub fn rssi(&self) -> Option<i16> {
        self.advertisement.rssi
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_target_and_link_ownership() {
        assert!(!State::Init.holds_target());
        assert!(State::TargetSet.holds_target());
        assert!(State::Connected.holds_target());
        assert!(State::Streaming.holds_target());

        assert!(!State::Init.holds_link());
        assert!(!State::TargetSet.holds_link());
        assert!(State::Connected.holds_link());
        assert!(State::Streaming.holds_link());
    }

    #[test]
    fn test_state_default_is_init() {
        assert_eq!(State::default(), State::Init);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(State::TargetSet.to_string(), "TargetSet");
        assert_eq!(Trigger::UnsetTarget.to_string(), "unset_target");
    }

    #[test]
    fn test_with_advertisement_fills_name() {
        let adv = AdvertisementData {
            local_name: Some("WHOOP 4A0".to_string()),
            rssi: Some(-61),
            ..Default::default()
        };
        let device = DiscoveredDevice::new("AA:BB:CC:DD:EE:FF").with_advertisement(adv);

        assert_eq!(device.name.as_deref(), Some("WHOOP 4A0"));
        assert_eq!(device.rssi(), Some(-61));
        assert_eq!(device.to_string(), "WHOOP 4A0 (AA:BB:CC:DD:EE:FF)");
    }

    #[test]
    fn test_explicit_name_wins_over_advertised() {
        let adv = AdvertisementData {
            local_name: Some("advertised".to_string()),
            ..Default::default()
        };
        let device = DiscoveredDevice::new("addr")
            .with_name("explicit")
            .with_advertisement(adv);
        assert_eq!(device.name.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_advertises_checks_services_and_service_data() {
        let hr = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
        let mut adv = AdvertisementData::default();
        assert!(!adv.advertises(&hr));

        adv.service_data.insert(hr, vec![1]);
        assert!(adv.advertises(&hr));

        adv.service_data.clear();
        adv.services.push(hr);
        assert!(adv.advertises(&hr));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_trigger_serializes_snake_case() {
        let json = serde_json::to_string(&Trigger::SetTarget).unwrap();
        assert_eq!(json, "\"set_target\"");
        let state: State = serde_json::from_str("\"Streaming\"").unwrap();
        assert_eq!(state, State::Streaming);
    }
}
