//! Peripheral identifier helpers.
//!
//! Addresses are opaque strings. On macOS the stack hides MAC addresses and
//! reports `00:00:00:00:00:00`, so the peripheral ID stands in for the
//! address there.

#[cfg(feature = "btleplug")]
use btleplug::platform::PeripheralId;

/// Address reported when the platform hides the real one.
pub const UNSET_ADDRESS: &str = "00:00:00:00:00:00";

/// Whether `address` is the placeholder reported on macOS.
pub fn is_unset_address(address: &str) -> bool {
    address == UNSET_ADDRESS
}

/// Lowercase `address` and drop separators so `AA:BB` matches `aabb`.
pub fn normalize_address(address: &str) -> String {
    address
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a peripheral reporting `address` and `peripheral_id` is `wanted`.
pub fn identifier_matches(address: &str, peripheral_id: &str, wanted: &str) -> bool {
    if peripheral_id.eq_ignore_ascii_case(wanted) {
        return true;
    }
    !is_unset_address(address) && normalize_address(address) == normalize_address(wanted)
}

/// Format a peripheral ID as a string.
///
/// ```ignore
/// let formatted = format_peripheral_id(&peripheral.id());
/// ```
#[cfg(feature = "btleplug")]
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// The address a peripheral is registered under.
///
/// Falls back to the peripheral ID where the platform hides the address.
#[cfg(feature = "btleplug")]
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if is_unset_address(address) {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}
