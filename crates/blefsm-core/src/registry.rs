//! Registry of discovered, unclaimed devices.
//!
//! Scanning upserts devices into the registry; a session claims a device by
//! removing it and releases it by putting it back. Every operation runs under
//! one lock, so two sessions racing to claim the same address cannot both
//! succeed.
//!
//! The registry remembers which addresses are claimed. Advertisements for a
//! claimed device are ignored until it is released, so a scan running while
//! a session holds the device never puts a second copy into the pool.
//!
//! The registry is a cheap handle around shared state. Clone it to hand the
//! same registry to the scanner and to every session.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use blefsm_types::DiscoveredDevice;

use crate::error::{DeviceNotFoundReason, Error, Result};

#[derive(Debug, Default)]
struct Entries {
    devices: HashMap<String, DiscoveredDevice>,
    claimed: HashSet<String>,
}

impl Entries {
    fn take(&mut self, address: &str) -> Option<DiscoveredDevice> {
        let device = self.devices.remove(address)?;
        self.claimed.insert(address.to_string());
        debug!(address, "Claimed device");
        Some(device)
    }
}

/// Shared map from address to discovered device.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // still guards valid data.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite the entry for `device.address`.
    ///
    /// The newest advertisement wins. Ignored while the address is claimed.
    pub fn upsert(&self, device: DiscoveredDevice) {
        let mut entries = self.lock();
        if entries.claimed.contains(&device.address) {
            trace!(address = %device.address, "Ignoring advertisement for claimed device");
            return;
        }
        trace!(address = %device.address, "Upserting discovered device");
        entries.devices.insert(device.address.clone(), device);
    }

    /// Remove and return the device at `address`, if present.
    pub fn claim(&self, address: &str) -> Option<DiscoveredDevice> {
        self.lock().take(address)
    }

    /// Remove and return the device at `address`, explaining a miss.
    ///
    /// # Errors
    ///
    /// [`DeviceNotFoundReason::NoDevicesDiscovered`] when the registry is
    /// empty, [`DeviceNotFoundReason::NotFound`] when only this address is
    /// missing.
    pub fn try_claim(&self, address: &str) -> Result<DiscoveredDevice> {
        let mut entries = self.lock();
        if entries.devices.is_empty() {
            return Err(Error::DeviceNotFound(
                DeviceNotFoundReason::NoDevicesDiscovered,
            ));
        }
        entries
            .take(address)
            .ok_or_else(|| Error::device_not_found(address))
    }

    /// Put a device back, relinquishing exclusive use.
    pub fn release(&self, device: DiscoveredDevice) {
        debug!(address = %device.address, "Released device");
        let mut entries = self.lock();
        entries.claimed.remove(&device.address);
        entries.devices.insert(device.address.clone(), device);
    }

    /// Remove every unclaimed entry.
    ///
    /// Claimed devices stay claimed and return on release.
    pub fn clear(&self) {
        self.lock().devices.clear();
    }

    /// Whether `address` is present (unclaimed).
    pub fn contains(&self, address: &str) -> bool {
        self.lock().devices.contains_key(address)
    }

    /// Whether a session currently holds `address`.
    pub fn is_claimed(&self, address: &str) -> bool {
        self.lock().claimed.contains(address)
    }

    /// Number of unclaimed devices.
    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }

    /// Copy of the entry at `address`, leaving it in place.
    pub fn get(&self, address: &str) -> Option<DiscoveredDevice> {
        self.lock().devices.get(address).cloned()
    }

    /// Copy of every entry, sorted by address.
    pub fn snapshot(&self) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<_> = self.lock().devices.values().cloned().collect();
        devices.sort_by(|a, b| a.address.cmp(&b.address));
        devices
    }

    /// Unclaimed addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<_> = self.lock().devices.keys().cloned().collect();
        addresses.sort();
        addresses
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Upsert(u8),
        Claim(u8),
        Release(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::Upsert),
            (0u8..4).prop_map(Op::Claim),
            (0u8..4).prop_map(Op::Release),
        ]
    }

    proptest! {
        /// An address is never both in the registry and held by a claimant.
        #[test]
        fn address_lives_in_exactly_one_place(ops in proptest::collection::vec(op(), 0..64)) {
            let registry = DeviceRegistry::new();
            let mut held: HashMap<String, DiscoveredDevice> = HashMap::new();

            for op in ops {
                match op {
                    Op::Upsert(n) => {
                        registry.upsert(DiscoveredDevice::new(format!("addr{n}")));
                    }
                    Op::Claim(n) => {
                        let address = format!("addr{n}");
                        if let Some(device) = registry.claim(&address) {
                            prop_assert!(held.insert(address, device).is_none());
                        }
                    }
                    Op::Release(n) => {
                        if let Some(device) = held.remove(&format!("addr{n}")) {
                            registry.release(device);
                        }
                    }
                }

                for address in registry.addresses() {
                    prop_assert!(!held.contains_key(&address));
                }
            }
        }
    }
}
