//! Example: Streaming Heart Rate Notifications
//!
//! Scans, claims the given peripheral, connects and prints heart rate
//! measurements until Ctrl-C, then cleans up.
//!
//! Run with: `cargo run --example stream_heart_rate --features btleplug -- <DEVICE_ADDRESS>`

use std::env;
use std::sync::Arc;

use blefsm_core::platform::BtleplugTransport;
use blefsm_core::uuid::HEART_RATE_MEASUREMENT;
use blefsm_core::{CharacteristicHooks, Config, LifecycleManager, logging};

/// Beats per minute from a Heart Rate Measurement payload.
fn decode_bpm(payload: &[u8]) -> Option<u16> {
    let flags = *payload.first()?;
    if flags & 0x01 == 0 {
        payload.get(1).map(|b| u16::from(*b))
    } else {
        Some(u16::from_le_bytes([*payload.get(1)?, *payload.get(2)?]))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_default()?;
    config.validate()?;
    logging::init(config.logging.level);

    let args: Vec<String> = env::args().collect();
    let address = if args.len() > 1 {
        args[1].clone()
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} AA:BB:CC:DD:EE:FF", args[0]);
        std::process::exit(1);
    };

    let transport = BtleplugTransport::new().await?;
    let manager = LifecycleManager::with_config(Arc::new(transport), config.clone());

    println!("Scanning for {:?}...", config.scan.duration());
    let devices = manager.scanner().scan_for(config.scan.duration()).await?;
    for device in &devices {
        println!("  {}", device);
    }

    let session = manager
        .session(CharacteristicHooks::new(
            HEART_RATE_MEASUREMENT,
            Arc::new(|payload: &[u8]| match decode_bpm(payload) {
                Some(bpm) => println!("{} bpm", bpm),
                None => println!("malformed measurement {:02X?}", payload),
            }),
        ))
        .await;

    if !session.set_target(&address).await? {
        eprintln!("{} was not discovered", address);
        std::process::exit(1);
    }
    if !session.connect().await? {
        eprintln!("Could not connect: {:?}", session.last_guard_failure());
        session.clean_up().await;
        std::process::exit(1);
    }
    if session.stream().await? {
        println!("Streaming, press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    } else {
        eprintln!("Could not stream: {:?}", session.last_guard_failure());
    }

    if !manager.clean_up_all().await {
        eprintln!("Clean up was not complete");
    }
    Ok(())
}
