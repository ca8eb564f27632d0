//! Advertising Controller.
//!
//! Primary payload (21 bytes):
//! ```text
//! 02 01 06            Flags: LE General Discoverable, BR/EDR not supported
//! 11 07 <16 bytes>    Complete list of 128-bit service UUIDs (little-endian)
//! ```
//! Scan response: `<len> 09 <name>` (Complete Local Name).

use heapless::Vec;

use crate::error::AdvError;
use crate::topology::{uuid_le_bytes, SENSOR_SERVICE_UUID};

/// Legacy advertising PDU payload limit.
pub const MAX_ADV_LEN: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_COMPLETE_128_UUIDS: u8 = 0x07;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

const FLAG_LE_GENERAL_DISCOVERABLE: u8 = 0x02;
const FLAG_BR_EDR_NOT_SUPPORTED: u8 = 0x04;

/// Discovery-side half of the host BLE stack.
pub trait BleHost {
    /// Bring up the stack. Returns the stack's raw error code on failure.
    fn enable(&mut self) -> Result<(), u32>;

    /// Start connectable advertising with the given payloads.
    fn start_advertising(&mut self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), u32>;
}

/// Encoded advertising and scan-response payloads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvertisingData {
    adv: Vec<u8, MAX_ADV_LEN>,
    scan: Vec<u8, MAX_ADV_LEN>,
}

impl AdvertisingData {
    pub fn new(name: &str) -> Result<Self, AdvError> {
        if name.is_empty() {
            return Err(AdvError::InvalidName);
        }

        let mut adv = Vec::new();
        push_ad(
            &mut adv,
            AD_TYPE_FLAGS,
            &[FLAG_LE_GENERAL_DISCOVERABLE | FLAG_BR_EDR_NOT_SUPPORTED],
        )?;
        push_ad(&mut adv, AD_TYPE_COMPLETE_128_UUIDS, &uuid_le_bytes(SENSOR_SERVICE_UUID))?;

        let mut scan = Vec::new();
        push_ad(&mut scan, AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes())?;

        Ok(Self { adv, scan })
    }

    pub fn adv_data(&self) -> &[u8] {
        &self.adv
    }

    pub fn scan_data(&self) -> &[u8] {
        &self.scan
    }
}

fn push_ad(buf: &mut Vec<u8, MAX_ADV_LEN>, ad_type: u8, data: &[u8]) -> Result<(), AdvError> {
    let len = u8::try_from(data.len() + 1).map_err(|_| AdvError::PayloadTooLong)?;
    buf.push(len).map_err(|_| AdvError::PayloadTooLong)?;
    buf.push(ad_type).map_err(|_| AdvError::PayloadTooLong)?;
    buf.extend_from_slice(data).map_err(|_| AdvError::PayloadTooLong)
}

pub struct Advertiser<H> {
    host: H,
    data: AdvertisingData,
}

impl<H: BleHost> Advertiser<H> {
    pub fn new(host: H, name: &str) -> Result<Self, AdvError> {
        Ok(Self {
            host,
            data: AdvertisingData::new(name)?,
        })
    }

    /// Enable the stack and start advertising. No retries: failure is fatal.
    pub fn start(&mut self) -> Result<(), AdvError> {
        info!("Initializing BLE Sensor Service");

        self.host.enable().map_err(|code| {
            error!("Bluetooth init failed (err {})", code);
            AdvError::StackEnable(code)
        })?;
        info!("Bluetooth initialized");

        self.host
            .start_advertising(self.data.adv_data(), self.data.scan_data())
            .map_err(|code| {
                error!("Advertising failed to start (err {})", code);
                AdvError::AdvertiseStart(code)
            })?;
        info!("Advertising successfully started");
        Ok(())
    }

    pub fn data(&self) -> &AdvertisingData {
        &self.data
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec as StdVec;

    #[derive(Default)]
    struct FakeHost {
        enable_err: Option<u32>,
        adv_err: Option<u32>,
        calls: StdVec<&'static str>,
        payloads: Option<(StdVec<u8>, StdVec<u8>)>,
    }

    impl BleHost for FakeHost {
        fn enable(&mut self) -> Result<(), u32> {
            self.calls.push("enable");
            self.enable_err.map_or(Ok(()), Err)
        }

        fn start_advertising(&mut self, adv_data: &[u8], scan_data: &[u8]) -> Result<(), u32> {
            self.calls.push("advertise");
            self.payloads = Some((adv_data.to_vec(), scan_data.to_vec()));
            self.adv_err.map_or(Ok(()), Err)
        }
    }

    #[test]
    fn payload_layout_is_byte_exact() {
        let data = AdvertisingData::new("BLE Sensor").unwrap();
        assert_eq!(
            data.adv_data(),
            [
                0x02, 0x01, 0x06, //
                0x11, 0x07, //
                0x56, 0x3F, 0xB3, 0xCD, 0x3D, 0xBB, 0x84, 0xAC, //
                0xF6, 0x45, 0x2A, 0x59, 0xF4, 0xFB, 0xE2, 0x59,
            ]
        );
        assert_eq!(data.scan_data()[..2], [0x0B, 0x09]);
        assert_eq!(&data.scan_data()[2..], b"BLE Sensor");
    }

    #[test]
    fn name_limits() {
        assert_eq!(AdvertisingData::new(""), Err(AdvError::InvalidName));
        // 29 bytes of name + 2 header bytes = 31.
        assert!(AdvertisingData::new(&"x".repeat(29)).is_ok());
        assert_eq!(
            AdvertisingData::new(&"x".repeat(30)),
            Err(AdvError::PayloadTooLong)
        );
    }

    #[test]
    fn start_enables_then_advertises() {
        let mut advertiser = Advertiser::new(FakeHost::default(), "BLE Sensor").unwrap();
        advertiser.start().unwrap();

        let host = advertiser.into_host();
        assert_eq!(host.calls, ["enable", "advertise"]);
        let (adv, scan) = host.payloads.unwrap();
        assert_eq!(adv.len(), 21);
        assert_eq!(scan.len(), 12);
    }

    #[test]
    fn enable_failure_is_fatal_and_skips_advertising() {
        let host = FakeHost { enable_err: Some(5), ..Default::default() };
        let mut advertiser = Advertiser::new(host, "BLE Sensor").unwrap();
        assert_eq!(advertiser.start(), Err(AdvError::StackEnable(5)));
        assert_eq!(advertiser.host().calls, ["enable"]);
    }

    #[test]
    fn advertise_failure_is_propagated() {
        let host = FakeHost { adv_err: Some(0x12), ..Default::default() };
        let mut advertiser = Advertiser::new(host, "BLE Sensor").unwrap();
        assert_eq!(advertiser.start(), Err(AdvError::AdvertiseStart(0x12)));
        assert_eq!(advertiser.host().calls, ["enable", "advertise"]);
    }
}
