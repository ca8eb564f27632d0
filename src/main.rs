//! BLE sensor beacon firmware for nRF52840 + SoftDevice S140.
//!
//! Boot order:
//! 1. Bring up the BMP280 on TWIM0. A missing sensor is fatal.
//! 2. Enable the SoftDevice and arm the advertising payloads.
//! 3. Register the sensor service.
//! 4. Spawn the SoftDevice, BLE and sampling tasks.

#![no_std]
#![no_main]

mod softdevice;
mod tasks;

use defmt::{info, unwrap};
use embassy_executor::Spawner;
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::{bind_interrupts, peripherals, twim};
use nrf_softdevice::{raw, Softdevice};
use static_cell::StaticCell;

use sensor_beacon::advertising::Advertiser;
use sensor_beacon::config::{BMP280_I2C_ADDRESS, DEVICE_NAME};
use sensor_beacon::sensor::bmp280::Bmp280;
use sensor_beacon::topology::ATTRIBUTE_COUNT;
use sensor_beacon::{AdvError, Error, SensorService, SensorStore};

use softdevice::{ArmedAdvertising, BeaconServer, BeaconService, SoftdeviceHost, SoftdeviceTransport};
use tasks::{ble_task, sampler_task, softdevice_task, SensorBus};

use {defmt_rtt as _, panic_probe as _};

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

static STORE: SensorStore = SensorStore::new();
static SERVICE: StaticCell<BeaconService> = StaticCell::new();
static SERVER: StaticCell<BeaconServer> = StaticCell::new();
static ADVERTISING: StaticCell<ArmedAdvertising> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("BLE sensor beacon starting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);
    let twim = twim::Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());

    let Boot { sensor, sd, armed, handles } = unwrap!(boot(twim).await);

    let service = SERVICE.init(SensorService::new(&STORE, SoftdeviceTransport::new(handles)));
    let server = SERVER.init(BeaconServer::new(service));
    let armed = ADVERTISING.init(armed);
    let sd: &'static Softdevice = sd;

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_task(sd, server, armed)));
    unwrap!(spawner.spawn(sampler_task(sensor, service)));
}

struct Boot {
    sensor: Bmp280<SensorBus>,
    sd: &'static mut Softdevice,
    armed: ArmedAdvertising,
    handles: [u16; ATTRIBUTE_COUNT],
}

/// Sensor, BLE stack and service registration. Any error here is fatal.
async fn boot(twim: SensorBus) -> Result<Boot, Error> {
    let mut sensor = Bmp280::new(twim, BMP280_I2C_ADDRESS);
    sensor.init().await?;
    info!("BMP280 ready");

    let mut advertiser = Advertiser::new(SoftdeviceHost::new(), DEVICE_NAME)?;
    advertiser.start()?;
    let (sd, armed) = advertiser
        .into_host()
        .into_parts()
        .ok_or(AdvError::AdvertiseStart(raw::NRF_ERROR_INVALID_STATE))?;

    let handles = softdevice::register(sd)?;
    Ok(Boot { sensor, sd, armed, handles })
}
