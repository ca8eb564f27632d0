//! Unified error types for the sensor beacon.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

use crate::topology::SensorKind;

/// Top-level error type for start-up. Anything reaching `main` halts the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Advertising could not be brought up.
    Advertising(AdvError),

    /// The sensor did not respond or is not the expected part.
    Sensor(DriverError),

    /// The host stack refused the service registration.
    Registration(u32),
}

/// A notification could not be handed to the transport. Never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotifyError {
    /// Characteristic the notification was meant for.
    pub kind: SensorKind,
    /// Raw failure code reported by the host stack.
    pub code: u32,
}

/// ATT protocol errors returned to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttError {
    /// The attribute index is not a readable value in this service.
    InvalidHandle,
    /// The attribute exists but is served by the stack, not by us.
    ReadNotPermitted,
    /// Read offset is past the end of the value.
    InvalidOffset,
    /// The attribute index is outside the service table.
    AttributeNotFound,
}

impl AttError {
    /// ATT error code as sent on the wire.
    pub const fn code(self) -> u8 {
        match self {
            AttError::InvalidHandle => 0x01,
            AttError::ReadNotPermitted => 0x02,
            AttError::InvalidOffset => 0x07,
            AttError::AttributeNotFound => 0x0A,
        }
    }
}

/// Advertising start-up failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvError {
    /// Enabling the BLE stack failed with the given code.
    StackEnable(u32),
    /// Starting connectable advertising failed with the given code.
    AdvertiseStart(u32),
    /// Device name does not fit in the 31-byte scan response.
    PayloadTooLong,
    /// Device name is empty.
    InvalidName,
}

/// Sensor driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// The device did not answer or reported an unexpected chip id.
    NotReady,
    /// A bus transaction failed.
    Bus,
    /// The driver does not provide the requested channel.
    UnsupportedChannel,
    /// A channel was requested before any sample was fetched.
    NoSample,
}

// Convenience conversions

impl From<AdvError> for Error {
    fn from(e: AdvError) -> Self {
        Error::Advertising(e)
    }
}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Error::Sensor(e)
    }
}
