//! Embassy tasks of the firmware.
//!
//! - `softdevice_task` - SoftDevice event pump
//! - `ble_task` - advertise, accept one central, serve GATT until disconnect
//! - `sampler_task` - BMP280 → sensor service every sampling period

use defmt::{info, warn};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::Twim;
use embassy_time::{Delay, Duration, Timer};
use nrf_softdevice::ble::gatt_server;
use nrf_softdevice::ble::peripheral::{self, ConnectableAdvertisement};
use nrf_softdevice::{raw, Softdevice};

use sensor_beacon::config::{
    SamplerConfig, ADV_INTERVAL, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_SLAVE_LATENCY,
    BLE_SUP_TIMEOUT,
};
use sensor_beacon::connection::HCI_SUCCESS;
use sensor_beacon::sampler::Sampler;
use sensor_beacon::sensor::bmp280::Bmp280;
use sensor_beacon::HostEvent;

use crate::softdevice::{ArmedAdvertising, BeaconServer, BeaconService, REASON_UNREPORTED};

pub type SensorBus = Twim<'static, TWISPI0>;

/// Pause before re-advertising after an advertising error.
const ADVERTISE_RETRY_DELAY: Duration = Duration::from_secs(1);

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
pub async fn ble_task(
    sd: &'static Softdevice,
    server: &'static BeaconServer,
    armed: &'static ArmedAdvertising,
) -> ! {
    let service = server.service();
    let config = peripheral::Config {
        interval: ADV_INTERVAL,
        ..Default::default()
    };
    let mut first_attempt = true;

    loop {
        let adv = ConnectableAdvertisement::ScannableUndirected {
            adv_data: &armed.adv_data,
            scan_data: &armed.scan_data,
        };

        let conn = match peripheral::advertise_connectable(sd, adv, &config).await {
            Ok(conn) => conn,
            Err(e) if first_attempt => {
                defmt::panic!("Advertising failed to start: {:?}", e);
            }
            Err(e) => {
                warn!("Advertising error: {:?}, retrying", e);
                Timer::after(ADVERTISE_RETRY_DELAY).await;
                continue;
            }
        };
        first_attempt = false;

        let params = raw::ble_gap_conn_params_t {
            min_conn_interval: BLE_CONN_INTERVAL_MIN,
            max_conn_interval: BLE_CONN_INTERVAL_MAX,
            slave_latency: BLE_SLAVE_LATENCY,
            conn_sup_timeout: BLE_SUP_TIMEOUT,
        };
        if let Err(e) = conn.set_conn_params(params) {
            warn!("Connection parameter update rejected: {:?}", e);
        }

        service.dispatch(HostEvent::Connected {
            handle: conn.clone(),
            status: HCI_SUCCESS,
        });

        let e = gatt_server::run(&conn, server, |_| {}).await;
        info!("GATT server stopped: {:?}", e);

        service.dispatch(HostEvent::Disconnected {
            reason: REASON_UNREPORTED,
        });
    }
}

#[embassy_executor::task]
pub async fn sampler_task(sensor: Bmp280<SensorBus>, service: &'static BeaconService) -> ! {
    let mut sampler = Sampler::new(sensor, service, SamplerConfig::default());
    sampler.run(&mut Delay).await
}
