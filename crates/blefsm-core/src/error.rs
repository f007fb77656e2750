//! Error types for blefsm-core.
//!
//! Failures fall into two groups:
//!
//! | Kind | Surfaced as | Examples |
//! |------|-------------|----------|
//! | Hard failure | `Err(`[`Error`]`)` from a session trigger | [`Error::InvalidTransition`], [`Error::NotStreaming`] |
//! | Guard failure | `Ok(false)` plus a [`GuardFailure`] reason | no devices discovered, connect timed out, transport error |
//!
//! Guard failures never escape as errors: anything the transport raises while
//! a transition is being evaluated is logged, converted into a
//! [`GuardFailure`] and recorded on the session (see
//! [`Session::last_guard_failure`](crate::Session::last_guard_failure)).
//!
//! ## Resource-absent failures
//!
//! [`GuardFailure::NoDevicesDiscovered`] and [`GuardFailure::DeviceNotFound`]
//! mean the registry could not supply the device. They are reported
//! separately so callers can decide to rescan rather than retry:
//!
//! ```ignore
//! if !session.connect().await? {
//!     if session.last_guard_failure().is_some_and(|f| f.is_resource_absent()) {
//!         scanner.scan_for(Duration::from_secs(5)).await?;
//!     }
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use blefsm_types::{State, Trigger};

/// Errors produced by the lifecycle engine and its transports.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[cfg(feature = "btleplug")]
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The trigger has no rule for the current state.
    #[error("Cannot {trigger} from state {state}")]
    InvalidTransition {
        /// The rejected trigger.
        trigger: Trigger,
        /// The state the session was in.
        state: State,
        /// Triggers that state does accept.
        accepted: Vec<Trigger>,
    },

    /// A streaming-only command was issued outside of `Streaming`.
    #[error("Session is not streaming (state {state})")]
    NotStreaming {
        /// The state the session was in.
        state: State,
    },

    /// Device not present in the registry or on the radio.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Connection failed.
    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// The peripheral address.
        address: String,
        /// Description of the failure.
        reason: String,
    },

    /// Notification hooks were needed but never installed.
    #[error("Notification hooks are not installed")]
    HooksMissing,

    /// A scan is already running.
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// Required characteristic not found on the peripheral.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// The operation is not supported by this transport or hook set.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Transport-level failure that has no more specific variant.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Reason why a device could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// The registry holds no devices at all.
    NoDevicesDiscovered,
    /// The registry does not hold this address.
    NotFound { address: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevicesDiscovered => write!(f, "no devices discovered"),
            Self::NotFound { address } => write!(f, "device '{}' not found", address),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific address.
    pub fn device_not_found(address: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            address: address.into(),
        })
    }

    /// Create a connection failure.
    pub fn connection_failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }
}

/// Why a guarded transition stayed put.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GuardFailure {
    /// The registry was empty when a claim was attempted.
    NoDevicesDiscovered,
    /// The registry did not hold the requested address.
    DeviceNotFound { address: String },
    /// The connect attempt exceeded its deadline.
    ConnectTimeout { duration: Duration },
    /// The transport completed the connect call without connecting.
    NotConnected { address: String },
    /// Stream setup needed hooks that were never installed.
    HooksMissing,
    /// The transport raised an error.
    Transport(String),
}

impl GuardFailure {
    /// Whether the failure means the registry could not supply the device.
    ///
    /// Callers typically rescan when this returns `true`.
    pub fn is_resource_absent(&self) -> bool {
        matches!(self, Self::NoDevicesDiscovered | Self::DeviceNotFound { .. })
    }
}

impl std::fmt::Display for GuardFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevicesDiscovered => write!(f, "no devices discovered"),
            Self::DeviceNotFound { address } => {
                write!(f, "device '{}' not in discovered devices", address)
            }
            Self::ConnectTimeout { duration } => {
                write!(f, "connect timed out after {:?}", duration)
            }
            Self::NotConnected { address } => write!(f, "transport did not connect to {}", address),
            Self::HooksMissing => write!(f, "notification hooks are not installed"),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl From<Error> for GuardFailure {
    fn from(err: Error) -> Self {
        match err {
            Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesDiscovered) => {
                Self::NoDevicesDiscovered
            }
            Error::DeviceNotFound(DeviceNotFoundReason::NotFound { address }) => {
                Self::DeviceNotFound { address }
            }
            Error::HooksMissing => Self::HooksMissing,
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Result type alias using blefsm-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidTransition {
            trigger: Trigger::Connect,
            state: State::Init,
            accepted: vec![Trigger::SetTarget],
        };
        assert_eq!(err.to_string(), "Cannot connect from state Init");

        let err = Error::device_not_found("AA:BB");
        assert!(err.to_string().contains("AA:BB"));

        let err = Error::characteristic_not_found("0x2A37", 3);
        assert!(err.to_string().contains("3 services"));
    }

    #[test]
    fn test_guard_failure_from_error() {
        let failure: GuardFailure =
            Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesDiscovered).into();
        assert_eq!(failure, GuardFailure::NoDevicesDiscovered);
        assert!(failure.is_resource_absent());

        let failure: GuardFailure = Error::device_not_found("addr1").into();
        assert_eq!(
            failure,
            GuardFailure::DeviceNotFound {
                address: "addr1".to_string()
            }
        );
        assert!(failure.is_resource_absent());

        let failure: GuardFailure = Error::connection_failed("addr1", "refused").into();
        assert!(matches!(failure, GuardFailure::Transport(ref msg) if msg.contains("refused")));
        assert!(!failure.is_resource_absent());
    }

    #[test]
    fn test_timeout_is_not_resource_absent() {
        let failure = GuardFailure::ConnectTimeout {
            duration: Duration::from_millis(200),
        };
        assert_eq!(failure.to_string(), "connect timed out after 200ms");
        assert!(!failure.is_resource_absent());
    }

    #[cfg(feature = "btleplug")]
    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
