//! Application-wide constants and compile-time configuration.
//!
//! Timing parameters, radio settings and sensor bus settings live here so
//! they can be tuned in one place.

// BLE

/// Complete local name carried in the scan response.
pub const DEVICE_NAME: &str = "BLE Sensor";

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const ADV_INTERVAL: u32 = 160;

/// Connection interval range requested after connecting (in 1.25 ms units).
/// 80 = 100 ms, 160 = 200 ms. Sensor data changes slowly.
pub const BLE_CONN_INTERVAL_MIN: u16 = 80;
pub const BLE_CONN_INTERVAL_MAX: u16 = 160;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// ATT MTU negotiated with the SoftDevice. The largest payload we send is 4 bytes.
pub const ATT_MTU: u16 = 23;

// Sampling

/// Delay between successful sampling cycles (ms).
pub const SAMPLE_PERIOD_MS: u32 = 5_000;

/// Delay before retrying after a failed sample fetch (ms).
pub const FETCH_RETRY_DELAY_MS: u32 = 100;

// Sensor bus (nRF52840-DK defaults)
//
//   I²C SDA → P0.26
//   I²C SCL → P0.27

/// 7-bit I²C address of the BMP280 (SDO tied low).
pub const BMP280_I2C_ADDRESS: u8 = 0x76;

/// Cadence of the Sampling Loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplerConfig {
    /// Delay after a cycle whose fetch succeeded.
    pub period_ms: u32,
    /// Delay after a cycle whose fetch failed. Not counted against the period.
    pub retry_delay_ms: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: SAMPLE_PERIOD_MS,
            retry_delay_ms: FETCH_RETRY_DELAY_MS,
        }
    }
}
