//! Log output checks. Built only with the `log` feature.
//!
//! Records are captured per test thread, so tests stay independent while
//! sharing the one global logger.

#![cfg(not(feature = "defmt"))]

use std::cell::RefCell;
use std::sync::Once;

use embassy_futures::block_on;
use embedded_hal_async::delay::DelayNs;
use log::{Level, LevelFilter, Log, Metadata, Record};
use sensor_beacon::config::SamplerConfig;
use sensor_beacon::connection::HCI_SUCCESS;
use sensor_beacon::sampler::{CycleOutcome, Sampler};
use sensor_beacon::sensor::{Channel, SensorDriver, SensorValue};
use sensor_beacon::topology::{CCC_INDICATE, CCC_NOTIFY};
use sensor_beacon::{DriverError, GattTransport, HostEvent, SensorKind, SensorService, SensorStore};

thread_local! {
    static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.with(|r| r.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

/// Run `f` and return every record it logged on this thread.
fn captured(f: impl FnOnce()) -> Vec<(Level, String)> {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    RECORDS.with(|r| r.borrow_mut().clear());
    f();
    RECORDS.with(|r| r.take())
}

fn at(records: &[(Level, String)], level: Level) -> Vec<&str> {
    records
        .iter()
        .filter(|(l, _)| *l == level)
        .map(|(_, msg)| msg.as_str())
        .collect()
}

struct Silent;

impl GattTransport for Silent {
    type Handle = u16;

    fn notify(&self, _conn: &u16, _attribute: usize, _payload: &[u8]) -> Result<(), u32> {
        Ok(())
    }
}

struct DeadSensor;

impl SensorDriver for DeadSensor {
    async fn fetch_sample(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Bus)
    }

    async fn channel(&mut self, _channel: Channel) -> Result<SensorValue, DriverError> {
        Err(DriverError::NoSample)
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

#[test]
fn each_failed_fetch_logs_one_warning() {
    let store = SensorStore::new();
    let service = SensorService::new(&store, Silent);
    let mut sampler = Sampler::new(DeadSensor, &service, SamplerConfig::default());

    let records = captured(|| {
        for _ in 0..3 {
            let outcome = block_on(sampler.step(&mut NoDelay));
            assert_eq!(outcome, CycleOutcome::FetchFailed(DriverError::Bus));
        }
    });

    let warnings = at(&records, Level::Warn);
    assert_eq!(warnings.len(), 3);
    assert!(warnings.iter().all(|m| m.contains("fetch failed")));
}

#[test]
fn double_connect_logs_one_error() {
    let store = SensorStore::new();
    let service = SensorService::new(&store, Silent);

    let records = captured(|| {
        service.dispatch(HostEvent::Connected { handle: 1, status: HCI_SUCCESS });
        service.dispatch(HostEvent::Connected { handle: 2, status: HCI_SUCCESS });
    });

    let errors = at(&records, Level::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("already connected"));
    assert_eq!(service.tracker().current(), Some(1));
}

#[test]
fn failed_connect_logs_an_error() {
    let store = SensorStore::new();
    let service = SensorService::new(&store, Silent);

    let records = captured(|| {
        service.dispatch(HostEvent::Connected { handle: 1, status: 0x3E });
    });

    assert_eq!(at(&records, Level::Error).len(), 1);
    assert_eq!(service.tracker().current(), None);
}

#[test]
fn ccc_transitions_log_once_each() {
    let store = SensorStore::new();
    let service = SensorService::new(&store, Silent);
    let ccc = SensorKind::Temperature.ccc_index();

    let records = captured(|| {
        service.dispatch(HostEvent::CccWrite { attribute: ccc, value: CCC_NOTIFY });
        // Same state again: no transition.
        service.dispatch(HostEvent::CccWrite { attribute: ccc, value: CCC_NOTIFY });
        service.dispatch(HostEvent::CccWrite { attribute: ccc, value: CCC_INDICATE });
    });

    assert_eq!(
        at(&records, Level::Info),
        ["Temperature notification enabled", "Temperature notification disabled"]
    );
}
