//! Standard Bluetooth SIG UUIDs used with notification streaming.

use uuid::{Uuid, uuid};

// --- Standard BLE Service UUIDs ---

/// Heart Rate service.
pub const HEART_RATE_SERVICE: Uuid = uuid!("0000180d-0000-1000-8000-00805f9b34fb");

/// Battery service.
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

// --- Standard BLE Characteristic UUIDs ---

/// Heart Rate Measurement characteristic (notify).
pub const HEART_RATE_MEASUREMENT: Uuid = uuid!("00002a37-0000-1000-8000-00805f9b34fb");

/// Heart Rate Control Point characteristic (write).
pub const HEART_RATE_CONTROL_POINT: Uuid = uuid!("00002a39-0000-1000-8000-00805f9b34fb");

/// Battery Level characteristic.
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// Expand a 16-bit SIG-assigned number onto the Bluetooth base UUID.
///
/// ```
/// use blefsm_types::uuid::{HEART_RATE_MEASUREMENT, from_short};
///
/// assert_eq!(from_short(0x2A37), HEART_RATE_MEASUREMENT);
/// ```
pub const fn from_short(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5f9b_34fb)
}
