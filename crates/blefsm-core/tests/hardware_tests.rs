//! Hardware integration tests for blefsm-core
//!
//! These tests require actual BLE hardware and should be run with:
//! ```
//! cargo test --package blefsm-core --features btleplug --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Configure the device via environment variables:
//! - `BLEFSM_DEVICE`: address of a peripheral exposing Heart Rate Measurement
//!
//! Example:
//! ```
//! BLEFSM_DEVICE="AA:BB:CC:DD:EE:FF" cargo test --package blefsm-core --features btleplug --test hardware_tests -- --ignored --nocapture
//! ```

#![cfg(feature = "btleplug")]

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use blefsm_core::platform::BtleplugTransport;
use blefsm_core::uuid::HEART_RATE_MEASUREMENT;
use blefsm_core::{CharacteristicHooks, LifecycleManager, State};
use tokio::time::timeout;

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Get device address from environment
fn get_device() -> Option<String> {
    env::var("BLEFSM_DEVICE").ok().filter(|s| !s.is_empty())
}

async fn manager() -> LifecycleManager {
    let transport = timeout(BLE_TIMEOUT, BtleplugTransport::new())
        .await
        .expect("adapter lookup timed out")
        .expect("no Bluetooth adapter");
    LifecycleManager::new(Arc::new(transport))
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_populates_registry() {
    let manager = manager().await;
    let devices = manager
        .scanner()
        .scan_for(Duration::from_secs(10))
        .await
        .expect("scan failed");

    println!("Found {} devices", devices.len());
    for device in &devices {
        println!("  {} rssi={:?}", device, device.rssi());
    }
    assert_eq!(devices.len(), manager.registry().len());
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_stream_heart_rate() {
    let Some(address) = get_device() else {
        println!("BLEFSM_DEVICE not set, skipping");
        return;
    };

    let manager = manager().await;
    manager
        .scanner()
        .scan_for(Duration::from_secs(10))
        .await
        .expect("scan failed");

    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let session = manager
        .session(CharacteristicHooks::new(
            HEART_RATE_MEASUREMENT,
            Arc::new(move |payload: &[u8]| {
                println!("notification: {:02X?}", payload);
                seen.fetch_add(1, Ordering::Relaxed);
            }),
        ))
        .await;

    assert!(session.set_target(&address).await.unwrap(), "{} not discovered", address);
    assert!(session.connect().await.unwrap(), "connect failed: {:?}", session.last_guard_failure());
    assert!(session.stream().await.unwrap());
    assert_eq!(session.state(), State::Streaming);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(session.clean_up().await);
    assert!(manager.registry().contains(&address));
    println!("Received {} notifications", count.load(Ordering::Relaxed));
}
