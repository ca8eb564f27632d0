//! Sensor driver boundary and unit conversion.
//!
//! Drivers report each channel as an integer part plus millionths, the
//! same split Zephyr-style sensor APIs use. Temperature is in degrees
//! Celsius, pressure in kilopascals. The conversions below turn those
//! into the fixed-point integers the GATT characteristics carry, using
//! integer arithmetic only (no `libm` on target).

pub mod bmp280;

use crate::error::DriverError;

/// Measurement channels the beacon consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Ambient temperature, °C.
    AmbientTemperature,
    /// Barometric pressure, kPa.
    Pressure,
}

/// A channel reading as `integer + micro / 1_000_000`.
///
/// For negative readings both parts carry the sign (-1.5 is `{-1, -500000}`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorValue {
    pub integer: i32,
    pub micro: i32,
}

impl SensorValue {
    pub const fn new(integer: i32, micro: i32) -> Self {
        Self { integer, micro }
    }

    /// Total value in millionths.
    pub const fn as_micro(self) -> i64 {
        self.integer as i64 * 1_000_000 + self.micro as i64
    }
}

/// Physical sensor collaborator consumed by the sampling loop.
#[allow(async_fn_in_trait)]
pub trait SensorDriver {
    /// Latch a fresh sample for all channels.
    async fn fetch_sample(&mut self) -> Result<(), DriverError>;

    /// Value of `channel` from the last fetched sample.
    async fn channel(&mut self, channel: Channel) -> Result<SensorValue, DriverError>;
}

/// Celsius → centi-degrees, rounded half away from zero, saturated to `i16`.
///
/// `23.456 °C` becomes `2346`, `-5.555 °C` becomes `-556`.
pub fn celsius_to_centi(value: SensorValue) -> i16 {
    const STEP: i64 = 10_000; // micro-degrees per centi-degree
    let micro = value.as_micro();
    let half = if micro < 0 { -STEP / 2 } else { STEP / 2 };
    let centi = (micro + half) / STEP;
    centi.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Kilopascals → pascals, truncated toward zero, saturated to `u32`.
///
/// `101.325 kPa` becomes `101325`. Negative readings clamp to zero.
pub fn kilopascal_to_pascal(value: SensorValue) -> u32 {
    const STEP: i64 = 1_000; // micro-kPa per Pa
    let pascals = value.as_micro() / STEP;
    pascals.clamp(0, u32::MAX as i64) as u32
}
