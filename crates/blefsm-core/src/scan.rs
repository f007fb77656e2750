//! Background device discovery.
//!
//! [`ScanController`] runs at most one scan at a time. Starting a scan clears
//! the registry and launches a background task that upserts every
//! advertisement into it; stopping raises a signal that the task observes
//! before it stops the transport scan and exits.
//!
//! # Example
//!
//! ```ignore
//! let scanner = ScanController::new(transport, registry.clone());
//! scanner.start_scan().await?;
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! scanner.stop_scan().await;
//! println!("{} devices", registry.len());
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use blefsm_types::DiscoveredDevice;

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, SessionEvent};
use crate::registry::DeviceRegistry;
use crate::transport::{BleTransport, DiscoveryCallback};

struct ActiveScan {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Starts and stops the discovery activity that feeds a [`DeviceRegistry`].
pub struct ScanController {
    transport: Arc<dyn BleTransport>,
    registry: DeviceRegistry,
    events: EventDispatcher,
    active: Mutex<Option<ActiveScan>>,
}

impl std::fmt::Debug for ScanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanController")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ScanController {
    /// Create a controller that fills `registry` from `transport`.
    pub fn new(transport: Arc<dyn BleTransport>, registry: DeviceRegistry) -> Self {
        Self::with_events(transport, registry, EventDispatcher::default())
    }

    /// Create a controller that also publishes discoveries on `events`.
    pub fn with_events(
        transport: Arc<dyn BleTransport>,
        registry: DeviceRegistry,
        events: EventDispatcher,
    ) -> Self {
        Self {
            transport,
            registry,
            events,
            active: Mutex::new(None),
        }
    }

    /// The registry this controller fills.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Copy of the registry's current contents.
    pub fn snapshot(&self) -> Vec<DiscoveredDevice> {
        self.registry.snapshot()
    }

    /// Whether a scan task is running.
    pub async fn is_scanning(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|scan| !scan.handle.is_finished())
    }

    /// Clear the registry and start discovery in the background.
    ///
    /// Returns as soon as the task is spawned. Transport errors inside the
    /// task are logged.
    ///
    /// # Errors
    ///
    /// [`Error::ScanInProgress`] if a previous scan has not been stopped.
    pub async fn start_scan(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if let Some(scan) = active.as_ref() {
            if !scan.handle.is_finished() {
                return Err(Error::ScanInProgress);
            }
            debug!("Previous scan task already finished");
        }

        self.registry.clear();
        let cancel_token = CancellationToken::new();

        let registry = self.registry.clone();
        let events = self.events.clone();
        let on_discovered: DiscoveryCallback = Arc::new(move |device: DiscoveredDevice| {
            events.send(SessionEvent::DeviceDiscovered {
                address: device.address.clone(),
                name: device.name.clone(),
                rssi: device.rssi(),
            });
            registry.upsert(device);
        });

        let transport = Arc::clone(&self.transport);
        let task_token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            let scan = match transport.scan(on_discovered).await {
                Ok(scan) => scan,
                Err(e) => {
                    error!("Failed to start scan: {}", e);
                    return;
                }
            };
            info!("Scanning for devices");

            task_token.cancelled().await;

            if let Err(e) = scan.stop().await {
                warn!("Failed to stop scan cleanly: {}", e);
            }
            info!("Scan stopped");
        });

        *active = Some(ActiveScan {
            cancel_token,
            handle,
        });
        Ok(())
    }

    /// Signal the scan to stop and wait for its task to finish.
    ///
    /// Does nothing if no scan is running.
    pub async fn stop_scan(&self) {
        let Some(scan) = self.active.lock().await.take() else {
            debug!("stop_scan called with no active scan");
            return;
        };
        scan.cancel_token.cancel();
        if let Err(e) = scan.handle.await {
            warn!("Scan task ended abnormally: {}", e);
        }
    }

    /// Scan for `duration`, then stop and return what was found.
    pub async fn scan_for(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        self.start_scan().await?;
        sleep(duration).await;
        self.stop_scan().await;

        let devices = self.snapshot();
        info!("Scan complete. Found {} device(s)", devices.len());
        Ok(devices)
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        if let Ok(active) = self.active.try_lock()
            && let Some(scan) = active.as_ref()
        {
            scan.cancel_token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, TransportCall};

    #[tokio::test]
    async fn test_scan_populates_registry() {
        let transport = Arc::new(
            MockTransport::builder()
                .device(DiscoveredDevice::new("addr1"))
                .device(DiscoveredDevice::new("addr2"))
                .build(),
        );
        let registry = DeviceRegistry::new();
        let scanner = ScanController::new(transport.clone(), registry.clone());

        let devices = scanner.scan_for(Duration::from_millis(20)).await.unwrap();

        assert_eq!(devices.len(), 2);
        assert!(registry.contains("addr1"));
        assert!(!scanner.is_scanning().await);
        assert_eq!(
            transport.calls(),
            vec![TransportCall::ScanStarted, TransportCall::ScanStopped]
        );
    }

    #[tokio::test]
    async fn test_start_scan_clears_registry() {
        let transport = Arc::new(MockTransport::builder().build());
        let registry = DeviceRegistry::new();
        registry.upsert(DiscoveredDevice::new("stale"));

        let scanner = ScanController::new(transport, registry.clone());
        scanner.start_scan().await.unwrap();
        assert!(registry.is_empty());
        scanner.stop_scan().await;
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let transport = Arc::new(MockTransport::builder().build());
        let scanner = ScanController::new(transport, DeviceRegistry::new());

        scanner.start_scan().await.unwrap();
        assert!(matches!(
            scanner.start_scan().await,
            Err(Error::ScanInProgress)
        ));

        scanner.stop_scan().await;
        scanner.start_scan().await.unwrap();
        scanner.stop_scan().await;
    }

    #[tokio::test]
    async fn test_announcements_during_scan_are_upserted() {
        let transport = Arc::new(MockTransport::builder().build());
        let registry = DeviceRegistry::new();
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let scanner = ScanController::with_events(transport.clone(), registry.clone(), events);

        scanner.start_scan().await.unwrap();
        while !transport.is_scanning() {
            tokio::task::yield_now().await;
        }
        transport.announce(DiscoveredDevice::new("late").with_name("Late"));
        scanner.stop_scan().await;

        assert!(registry.contains("late"));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::DeviceDiscovered { ref address, .. } if address == "late"
        ));
    }

    #[tokio::test]
    async fn test_stop_without_scan_is_noop() {
        let transport = Arc::new(MockTransport::builder().build());
        let scanner = ScanController::new(transport.clone(), DeviceRegistry::new());
        scanner.stop_scan().await;
        assert!(transport.calls().is_empty());
    }
}
