//! BLE sensor beacon core.
//!
//! Everything here is hardware-independent and runs on the host:
//!
//! - [`store`] - latest readings and notification flags
//! - [`connection`] - single-peer connection tracking
//! - [`topology`] - attribute table, UUIDs, notification targets
//! - [`service`] - GATT read / CCC write / notify logic
//! - [`sampler`] - periodic sensor → service loop
//! - [`advertising`] - advertising payloads and start-up
//! - [`sensor`] - driver boundary, unit conversion, BMP280 driver
//!
//! Usage: `cargo test`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and wires these pieces to the Nordic SoftDevice.

#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to the modules below.
mod fmt;

pub mod advertising;
pub mod config;
pub mod connection;
pub mod error;
pub mod sampler;
pub mod sensor;
pub mod service;
pub mod store;
pub mod topology;

pub use error::{AdvError, AttError, DriverError, Error, NotifyError};
pub use service::{GattTransport, HostEvent, SensorService};
pub use store::{RawValue, SensorStore};
pub use topology::SensorKind;
