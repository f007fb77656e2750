//! Transport over the host Bluetooth stack via btleplug.
//!
//! [`BtleplugTransport`] uses the first adapter reported by the platform.
//! Scanning listens to adapter events and reports every discovered or updated
//! peripheral; connecting also discovers services so characteristics can be
//! subscribed to by UUID.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral};
use futures::StreamExt;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use blefsm_types::{AdvertisementData, DiscoveredDevice};

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::transport::{BleTransport, DiscoveryCallback, NotificationHandler, Peripheral, ScanHandle};
use crate::util::{create_identifier, format_peripheral_id, identifier_matches};

/// Get the first available Bluetooth adapter.
pub async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Convert btleplug properties into a registry record.
pub fn discovered_device(identifier: String, properties: PeripheralProperties) -> DiscoveredDevice {
    let advertisement = AdvertisementData {
        local_name: properties.local_name,
        rssi: properties.rssi,
        tx_power_level: properties.tx_power_level,
        manufacturer_data: properties.manufacturer_data,
        service_data: properties.service_data,
        services: properties.services,
    };
    let mut device = DiscoveredDevice::new(identifier).with_advertisement(advertisement);
    device.last_seen = OffsetDateTime::now_utc();
    device
}

async fn describe(peripheral: &PlatformPeripheral) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };
    let identifier = create_identifier(&properties.address.to_string(), &peripheral.id());
    Ok(Some(discovered_device(identifier, properties)))
}

/// BLE transport backed by a btleplug adapter.
#[derive(Debug, Clone)]
pub struct BtleplugTransport {
    adapter: Adapter,
}

impl BtleplugTransport {
    /// Use the first adapter on this host.
    pub async fn new() -> Result<Self> {
        Ok(Self::with_adapter(first_adapter().await?))
    }

    /// Use a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// The adapter in use.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    async fn find_peripheral(&self, address: &str) -> Result<Option<PlatformPeripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            let peripheral_id = format_peripheral_id(&peripheral.id());
            if let Ok(Some(props)) = peripheral.properties().await
                && identifier_matches(&props.address.to_string(), &peripheral_id, address)
            {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    async fn scan(&self, on_discovered: DiscoveryCallback) -> Result<Box<dyn ScanHandle>> {
        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!("Started BLE scan");

        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        let adapter = self.adapter.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) => {
                            let peripheral = match adapter.peripheral(&id).await {
                                Ok(peripheral) => peripheral,
                                Err(e) => {
                                    debug!("Discovered peripheral vanished: {}", e);
                                    continue;
                                }
                            };
                            match describe(&peripheral).await {
                                Ok(Some(device)) => on_discovered(device),
                                Ok(None) => {}
                                Err(e) => debug!("Failed to read peripheral properties: {}", e),
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        });

        Ok(Box::new(BtleplugScan {
            adapter: self.adapter.clone(),
            cancel_token,
            task,
        }))
    }

    async fn open(&self, device: &DiscoveredDevice) -> Result<Arc<dyn Peripheral>> {
        match self.find_peripheral(&device.address).await? {
            Some(peripheral) => Ok(Arc::new(BtleplugPeripheral::new(
                device.address.clone(),
                peripheral,
            ))),
            None => Err(Error::device_not_found(device.address.clone())),
        }
    }
}

struct BtleplugScan {
    adapter: Adapter,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

#[async_trait]
impl ScanHandle for BtleplugScan {
    async fn stop(self: Box<Self>) -> Result<()> {
        self.cancel_token.cancel();
        if let Err(e) = self.task.await {
            warn!("Scan event task ended abnormally: {}", e);
        }
        self.adapter.stop_scan().await?;
        info!("Stopped BLE scan");
        Ok(())
    }
}

/// A connected (or connectable) btleplug peripheral.
pub struct BtleplugPeripheral {
    address: String,
    peripheral: PlatformPeripheral,
    notification_handles: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl fmt::Debug for BtleplugPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtleplugPeripheral")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl BtleplugPeripheral {
    fn new(address: String, peripheral: PlatformPeripheral) -> Self {
        Self {
            address,
            peripheral,
            notification_handles: Mutex::new(HashMap::new()),
        }
    }

    fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| {
                Error::characteristic_not_found(uuid.to_string(), self.peripheral.services().len())
            })
    }

    fn abort_handler(&self, uuid: &Uuid) {
        let handle = self
            .notification_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uuid);
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn abort_all_handlers(&self) {
        let mut handles = self
            .notification_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in handles.drain() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Peripheral for BtleplugPeripheral {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<bool> {
        self.peripheral.connect().await?;
        self.peripheral.discover_services().await?;
        let connected = self.peripheral.is_connected().await?;
        debug!(
            address = %self.address,
            characteristics = self.peripheral.characteristics().len(),
            "Connect finished"
        );
        Ok(connected)
    }

    async fn disconnect(&self) -> Result<()> {
        self.abort_all_handlers();
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        let target = self.find_characteristic(characteristic)?;
        self.peripheral.subscribe(&target).await?;

        let mut stream = self.peripheral.notifications().await?;
        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == characteristic {
                    handler(&notification.value);
                }
            }
        });

        let previous = self
            .notification_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(characteristic, handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        let target = self.find_characteristic(characteristic)?;
        self.abort_handler(&characteristic);
        self.peripheral.unsubscribe(&target).await?;
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let target = self.find_characteristic(characteristic)?;
        self.peripheral
            .write(&target, data, WriteType::WithResponse)
            .await?;
        Ok(())
    }
}

impl Drop for BtleplugPeripheral {
    fn drop(&mut self) {
        self.abort_all_handlers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::BDAddr;

    #[test]
    fn test_discovered_device_from_properties() {
        let mut properties = PeripheralProperties::default();
        properties.address = BDAddr::from([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        properties.local_name = Some("Polar H10".to_string());
        properties.rssi = Some(-60);
        properties.manufacturer_data.insert(0x006B, vec![1, 2]);

        let device = discovered_device("AA:BB:CC:DD:EE:FF".to_string(), properties);
        assert_eq!(device.address, "AA:BB:CC:DD:EE:FF");
        assert_eq!(device.name.as_deref(), Some("Polar H10"));
        assert_eq!(device.rssi(), Some(-60));
        assert_eq!(device.advertisement.manufacturer_data[&0x006B], vec![1, 2]);
    }
}
