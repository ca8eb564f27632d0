//! Sampling Loop - periodic driver from the physical sensor into the service.
//!
//! Each cycle:
//! 1. Fetch a sample batch. On failure, log and wait the short retry delay.
//! 2. For temperature and pressure independently: read the channel, convert
//!    to the characteristic's fixed-point unit and `push_update` it.
//! 3. Notify failures are logged and never stop the loop.
//!
//! Then wait one full period.

use embedded_hal_async::delay::DelayNs;

use crate::config::SamplerConfig;
use crate::error::DriverError;
use crate::sensor::{celsius_to_centi, kilopascal_to_pascal, Channel, SensorDriver};
use crate::service::{GattTransport, SensorService};
use crate::store::RawValue;
use crate::topology::SensorKind;

/// What happened to one channel during a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelOutcome {
    /// Value stored; notification sent or not needed.
    Updated(RawValue),
    /// Value stored but the notification failed.
    NotifyFailed(RawValue),
    /// The driver could not provide the channel; nothing stored.
    ReadFailed(DriverError),
}

/// Result of one sampling cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// The sample fetch failed; no channel was touched.
    FetchFailed(DriverError),
    /// The sample was fetched; per-channel results.
    Sampled {
        temperature: ChannelOutcome,
        pressure: ChannelOutcome,
    },
}

impl CycleOutcome {
    /// Delay to wait before the next cycle.
    pub fn next_delay_ms(&self, config: &SamplerConfig) -> u32 {
        match self {
            CycleOutcome::FetchFailed(_) => config.retry_delay_ms,
            CycleOutcome::Sampled { .. } => config.period_ms,
        }
    }
}

pub struct Sampler<'s, 'a, D, T: GattTransport> {
    driver: D,
    service: &'s SensorService<'a, T>,
    config: SamplerConfig,
}

impl<'s, 'a, D: SensorDriver, T: GattTransport> Sampler<'s, 'a, D, T> {
    pub fn new(driver: D, service: &'s SensorService<'a, T>, config: SamplerConfig) -> Self {
        Self { driver, service, config }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run forever.
    pub async fn run(&mut self, delay: &mut impl DelayNs) -> ! {
        info!(
            "Sampling every {} ms (retry {} ms)",
            self.config.period_ms,
            self.config.retry_delay_ms
        );
        loop {
            self.step(delay).await;
        }
    }

    /// One cycle followed by its delay.
    pub async fn step(&mut self, delay: &mut impl DelayNs) -> CycleOutcome {
        let outcome = self.cycle().await;
        delay.delay_ms(outcome.next_delay_ms(&self.config)).await;
        outcome
    }

    /// One cycle without waiting.
    pub async fn cycle(&mut self) -> CycleOutcome {
        if let Err(e) = self.driver.fetch_sample().await {
            warn!("Sensor fetch failed: {:?}", e);
            return CycleOutcome::FetchFailed(e);
        }

        let temperature = self.sample_channel(SensorKind::Temperature).await;
        let pressure = self.sample_channel(SensorKind::Pressure).await;
        CycleOutcome::Sampled { temperature, pressure }
    }

    async fn sample_channel(&mut self, kind: SensorKind) -> ChannelOutcome {
        let channel = match kind {
            SensorKind::Temperature => Channel::AmbientTemperature,
            SensorKind::Pressure => Channel::Pressure,
        };

        let value = match self.driver.channel(channel).await {
            Ok(value) => value,
            Err(e) => {
                warn!("{} channel read failed: {:?}", kind.name(), e);
                return ChannelOutcome::ReadFailed(e);
            }
        };

        let raw = match kind {
            SensorKind::Temperature => RawValue::Temperature(celsius_to_centi(value)),
            SensorKind::Pressure => RawValue::Pressure(kilopascal_to_pascal(value)),
        };
        trace!("{} sample {:?}", kind.name(), raw);

        match self.service.push_update(raw) {
            Ok(()) => ChannelOutcome::Updated(raw),
            Err(e) => {
                warn!("{} notification failed (err {})", kind.name(), e.code);
                ChannelOutcome::NotifyFailed(raw)
            }
        }
    }
}
