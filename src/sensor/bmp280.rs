//! Bosch BMP280 temperature/pressure sensor over I²C.
//!
//! Register map (datasheet BST-BMP280-DS001):
//! ```text
//! 0x88..0xA1  calib00..calib25   trimming parameters, little-endian
//! 0xD0        id                 0x58 (BME280 answers 0x60)
//! 0xF4        ctrl_meas          osrs_t[7:5] osrs_p[4:2] mode[1:0]
//! 0xF5        config             t_sb[7:5] filter[4:2]
//! 0xF7..0xFC  press/temp         20-bit raw ADC values, MSB first
//! ```
//! The part runs in normal mode, so every fetch reads the latest
//! conversion without waiting.

use embedded_hal_async::i2c::I2c;

use super::{Channel, SensorDriver, SensorValue};
use crate::error::DriverError;

const REG_CALIB: u8 = 0x88;
const REG_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

const CHIP_ID_BMP280: u8 = 0x58;
const CHIP_ID_BME280: u8 = 0x60;

/// osrs_t = x1, osrs_p = x1, normal mode.
const CTRL_MEAS_NORMAL: u8 = (0b001 << 5) | (0b001 << 2) | 0b11;
/// t_sb = 1000 ms, filter off.
const CONFIG_STANDBY_1S: u8 = 0b101 << 5;

/// Factory trimming parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    /// Decode the 24-byte block starting at 0x88.
    pub fn from_bytes(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Returns `(t_fine, centi-degrees)`.
    pub fn compensate_temperature(&self, adc_t: i32) -> (i32, i32) {
        let t1 = self.t1 as i32;
        let var1 = (((adc_t >> 3) - (t1 << 1)) * self.t2 as i32) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * self.t3 as i32) >> 14;
        let t_fine = var1 + var2;
        (t_fine, (t_fine * 5 + 128) >> 8)
    }

    /// Pressure in Pa as unsigned Q24.8, or `None` if the trimming would divide by zero.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> Option<u32> {
        let mut var1 = t_fine as i64 - 128_000;
        let mut var2 = var1 * var1 * self.p6 as i64;
        var2 += (var1 * self.p5 as i64) << 17;
        var2 += (self.p4 as i64) << 35;
        var1 = ((var1 * var1 * self.p3 as i64) >> 8) + ((var1 * self.p2 as i64) << 12);
        var1 = (((1i64 << 47) + var1) * self.p1 as i64) >> 33;
        if var1 == 0 {
            return None;
        }

        let mut p: i64 = 1_048_576 - adc_p as i64;
        p = (((p << 31) - var2) * 3125) / var1;
        let var1 = (self.p9 as i64 * (p >> 13) * (p >> 13)) >> 25;
        let var2 = (self.p8 as i64 * p) >> 19;
        p = ((p + var1 + var2) >> 8) + ((self.p7 as i64) << 4);
        Some(p as u32)
    }
}

/// Compensated values of the last fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Centi-degrees Celsius.
    pub temperature: i32,
    /// Pascals, Q24.8.
    pub pressure_q24_8: u32,
}

impl Sample {
    pub fn temperature(&self) -> SensorValue {
        SensorValue::new(self.temperature / 100, (self.temperature % 100) * 10_000)
    }

    /// Pressure in kPa.
    pub fn pressure(&self) -> SensorValue {
        // 1 kPa = 256_000 in Q24.8 Pa.
        let integer = self.pressure_q24_8 / 256_000;
        let micro = (self.pressure_q24_8 % 256_000) as u64 * 125 / 32;
        SensorValue::new(integer as i32, micro as i32)
    }
}

pub struct Bmp280<I2C> {
    i2c: I2C,
    address: u8,
    calibration: Calibration,
    sample: Option<Sample>,
}

impl<I2C: I2c> Bmp280<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            calibration: Calibration::default(),
            sample: None,
        }
    }

    /// Probe the chip, load trimming data and start normal-mode conversions.
    pub async fn init(&mut self) -> Result<(), DriverError> {
        let mut id = [0u8; 1];
        self.read(REG_ID, &mut id).await.map_err(|_| DriverError::NotReady)?;
        if id[0] != CHIP_ID_BMP280 && id[0] != CHIP_ID_BME280 {
            error!("BMP280: unexpected chip id {}", id[0]);
            return Err(DriverError::NotReady);
        }

        let mut raw = [0u8; 24];
        self.read(REG_CALIB, &mut raw).await?;
        self.calibration = Calibration::from_bytes(&raw);

        self.write(REG_CONFIG, CONFIG_STANDBY_1S).await?;
        self.write(REG_CTRL_MEAS, CTRL_MEAS_NORMAL).await?;
        info!("BMP280 ready (id {})", id[0]);
        Ok(())
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    async fn read(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DriverError> {
        self.i2c
            .write_read(self.address, &[reg], buf)
            .await
            .map_err(|_| DriverError::Bus)
    }

    async fn write(&mut self, reg: u8, value: u8) -> Result<(), DriverError> {
        self.i2c
            .write(self.address, &[reg, value])
            .await
            .map_err(|_| DriverError::Bus)
    }
}

impl<I2C: I2c> SensorDriver for Bmp280<I2C> {
    async fn fetch_sample(&mut self) -> Result<(), DriverError> {
        let mut raw = [0u8; 6];
        self.read(REG_DATA, &mut raw).await?;

        let adc_p = (raw[0] as i32) << 12 | (raw[1] as i32) << 4 | (raw[2] as i32) >> 4;
        let adc_t = (raw[3] as i32) << 12 | (raw[4] as i32) << 4 | (raw[5] as i32) >> 4;

        let (t_fine, temperature) = self.calibration.compensate_temperature(adc_t);
        let pressure_q24_8 = self
            .calibration
            .compensate_pressure(adc_p, t_fine)
            .ok_or(DriverError::NotReady)?;

        self.sample = Some(Sample { temperature, pressure_q24_8 });
        Ok(())
    }

    async fn channel(&mut self, channel: Channel) -> Result<SensorValue, DriverError> {
        let sample = self.sample.ok_or(DriverError::NoSample)?;
        Ok(match channel {
            Channel::AmbientTemperature => sample.temperature(),
            Channel::Pressure => sample.pressure(),
        })
    }
}
