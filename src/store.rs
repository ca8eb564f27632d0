//! Sensor Value Store - latest readings and subscription flags.
//!
//! Shared by the host-stack event context and the sampling task. Each field
//! has exactly one writer (raw values: sampling task, flags: CCC handler),
//! so word-sized atomics with release/acquire ordering are enough to keep
//! cross-context reads whole.

use core::sync::atomic::{AtomicBool, AtomicI16, AtomicU32, Ordering};

use crate::topology::SensorKind;

/// A raw value in the fixed-point unit the characteristic carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RawValue {
    /// Centi-degrees Celsius.
    Temperature(i16),
    /// Pascals.
    Pressure(u32),
}

impl RawValue {
    pub const fn kind(self) -> SensorKind {
        match self {
            RawValue::Temperature(_) => SensorKind::Temperature,
            RawValue::Pressure(_) => SensorKind::Pressure,
        }
    }

    /// Fixed-width little-endian encoding. Returns the bytes and the used length.
    pub fn to_le_bytes(self) -> ([u8; 4], usize) {
        let mut buf = [0u8; 4];
        match self {
            RawValue::Temperature(v) => {
                buf[..2].copy_from_slice(&v.to_le_bytes());
                (buf, 2)
            }
            RawValue::Pressure(v) => {
                buf.copy_from_slice(&v.to_le_bytes());
                (buf, 4)
            }
        }
    }
}

/// Latest temperature/pressure plus per-characteristic notification flags.
pub struct SensorStore {
    temperature: AtomicI16,
    pressure: AtomicU32,
    temperature_subscribed: AtomicBool,
    pressure_subscribed: AtomicBool,
}

impl SensorStore {
    /// Zeroed readings, nobody subscribed.
    pub const fn new() -> Self {
        Self {
            temperature: AtomicI16::new(0),
            pressure: AtomicU32::new(0),
            temperature_subscribed: AtomicBool::new(false),
            pressure_subscribed: AtomicBool::new(false),
        }
    }

    /// Overwrite the stored reading. Leaves subscriptions untouched.
    pub fn update(&self, value: RawValue) {
        match value {
            RawValue::Temperature(v) => self.temperature.store(v, Ordering::Release),
            RawValue::Pressure(v) => self.pressure.store(v, Ordering::Release),
        }
    }

    /// Last stored reading for `kind`.
    pub fn read(&self, kind: SensorKind) -> RawValue {
        match kind {
            SensorKind::Temperature => RawValue::Temperature(self.temperature.load(Ordering::Acquire)),
            SensorKind::Pressure => RawValue::Pressure(self.pressure.load(Ordering::Acquire)),
        }
    }

    /// Record a CCC write for `kind`.
    pub fn set_subscription(&self, kind: SensorKind, enabled: bool) {
        let previous = self.flag(kind).swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(
                "{} notification {}",
                kind.name(),
                if enabled { "enabled" } else { "disabled" }
            );
        } else {
            debug!("{} notification unchanged ({})", kind.name(), enabled);
        }
    }

    pub fn is_subscribed(&self, kind: SensorKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    /// Clear both flags. Called on disconnect; idempotent.
    pub fn reset_subscriptions(&self) {
        self.temperature_subscribed.store(false, Ordering::Release);
        self.pressure_subscribed.store(false, Ordering::Release);
    }

    fn flag(&self, kind: SensorKind) -> &AtomicBool {
        match kind {
            SensorKind::Temperature => &self.temperature_subscribed,
            SensorKind::Pressure => &self.pressure_subscribed,
        }
    }
}

impl Default for SensorStore {
    fn default() -> Self {
        Self::new()
    }
}
