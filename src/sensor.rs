//! BME680 access: one-time bring-up and single forced-mode measurements.

use core::time::Duration;

use bme680::{
    Bme680, FieldDataCondition, I2CAddress, IIRFilterSize, OversamplingSetting, PowerMode,
    SettingsBuilder,
};
use embedded_hal_02::blocking::delay::DelayMs;
use embedded_hal_02::blocking::i2c::{Read, Write};
use thiserror::Error;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("sensor did not answer the handshake")]
    Handshake,
    #[error("sensor rejected the measurement profile")]
    Configuration,
    #[error("sensor bring-up was already attempted")]
    Unavailable,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("sensor is not initialized")]
    NotInitialized,
    #[error("failed to trigger a measurement")]
    Trigger,
    #[error("failed to read measurement data")]
    Readout,
    #[error("measurement cycle produced no new data")]
    NoNewData,
}

/// One completed measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub temperature_c: f32,
    pub humidity_percent: f32,
    pub pressure_hpa: f32,
    pub gas_resistance_ohms: f32,
}

/// A sensor the node can bring up once and then sample on demand.
///
/// Neither call retries internally; the scheduler decides what a failure means.
pub trait EnvironmentalSensor {
    fn initialize(&mut self) -> Result<(), InitError>;
    fn acquire(&mut self) -> Result<RawSample, AcquireError>;
}

/// Oversampling, filter and gas heater settings applied after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorProfile {
    pub temperature_oversampling: u8,
    pub pressure_oversampling: u8,
    pub humidity_oversampling: u8,
    pub iir_filter_size: u8,
    pub heater_temp_c: u16,
    pub heater_duration_ms: u16,
    pub ambient_temp_c: i8,
}

impl Default for SensorProfile {
    fn default() -> Self {
        Self {
            temperature_oversampling: 8,
            pressure_oversampling: 4,
            humidity_oversampling: 2,
            iir_filter_size: 3,
            heater_temp_c: 320,
            heater_duration_ms: 150,
            ambient_temp_c: 25,
        }
    }
}

fn oversampling(factor: u8) -> OversamplingSetting {
    match factor {
        0 => OversamplingSetting::OSNone,
        1 => OversamplingSetting::OS1x,
        2 => OversamplingSetting::OS2x,
        3..=4 => OversamplingSetting::OS4x,
        5..=8 => OversamplingSetting::OS8x,
        _ => OversamplingSetting::OS16x,
    }
}

fn filter(size: u8) -> IIRFilterSize {
    match size {
        0 => IIRFilterSize::Size0,
        1 => IIRFilterSize::Size1,
        2..=3 => IIRFilterSize::Size3,
        4..=7 => IIRFilterSize::Size7,
        8..=15 => IIRFilterSize::Size15,
        16..=31 => IIRFilterSize::Size31,
        32..=63 => IIRFilterSize::Size63,
        _ => IIRFilterSize::Size127,
    }
}

enum Device<I2C, D> {
    Idle { i2c: I2C, address: I2CAddress },
    Ready { driver: Bme680<I2C, D>, measurement_ms: u32 },
    Lost,
}

/// BME680 on an embedded-hal 0.2 blocking I2C bus.
pub struct Bme680Sensor<I2C, D> {
    device: Device<I2C, D>,
    delay: D,
    profile: SensorProfile,
}

impl<I2C, D> Bme680Sensor<I2C, D>
where
    I2C: Read + Write,
    D: DelayMs<u8>,
{
    pub fn new(i2c: I2C, delay: D, address: I2CAddress, profile: SensorProfile) -> Self {
        Self {
            device: Device::Idle { i2c, address },
            delay,
            profile,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.device, Device::Ready { .. })
    }

    fn pause(&mut self, mut ms: u32) {
        while ms > 0 {
            let step = ms.min(u8::MAX as u32);
            self.delay.delay_ms(step as u8);
            ms -= step;
        }
    }
}

impl<I2C, D> EnvironmentalSensor for Bme680Sensor<I2C, D>
where
    I2C: Read + Write,
    D: DelayMs<u8>,
{
    fn initialize(&mut self) -> Result<(), InitError> {
        let (i2c, address) = match core::mem::replace(&mut self.device, Device::Lost) {
            Device::Idle { i2c, address } => (i2c, address),
            other => {
                self.device = other;
                return Err(InitError::Unavailable);
            }
        };

        let mut driver = Bme680::init(i2c, &mut self.delay, address).map_err(|_| {
            error!("BME680 handshake failed");
            InitError::Handshake
        })?;

        let profile = self.profile;
        let settings = SettingsBuilder::new()
            .with_temperature_oversampling(oversampling(profile.temperature_oversampling))
            .with_pressure_oversampling(oversampling(profile.pressure_oversampling))
            .with_humidity_oversampling(oversampling(profile.humidity_oversampling))
            .with_temperature_filter(filter(profile.iir_filter_size))
            .with_gas_measurement(
                Duration::from_millis(profile.heater_duration_ms as u64),
                profile.heater_temp_c,
                profile.ambient_temp_c,
            )
            .with_run_gas(true)
            .build();

        let measurement = driver
            .get_profile_dur(&settings.0)
            .map_err(|_| InitError::Configuration)?;
        driver
            .set_sensor_settings(&mut self.delay, settings)
            .map_err(|_| {
                error!("BME680 rejected the measurement profile");
                InitError::Configuration
            })?;

        let measurement_ms = measurement.as_millis() as u32;
        info!(
            "BME680 ready: heater {} C for {} ms, cycle {} ms",
            profile.heater_temp_c,
            profile.heater_duration_ms,
            measurement_ms
        );
        self.device = Device::Ready {
            driver,
            measurement_ms,
        };
        Ok(())
    }

    fn acquire(&mut self) -> Result<RawSample, AcquireError> {
        let measurement_ms = match &mut self.device {
            Device::Ready {
                driver,
                measurement_ms,
            } => {
                driver
                    .set_sensor_mode(&mut self.delay, PowerMode::ForcedMode)
                    .map_err(|_| AcquireError::Trigger)?;
                *measurement_ms
            }
            _ => return Err(AcquireError::NotInitialized),
        };

        self.pause(measurement_ms);

        let Device::Ready { driver, .. } = &mut self.device else {
            return Err(AcquireError::NotInitialized);
        };
        let (data, condition) = driver
            .get_sensor_data(&mut self.delay)
            .map_err(|_| AcquireError::Readout)?;
        if !matches!(condition, FieldDataCondition::NewData) {
            return Err(AcquireError::NoNewData);
        }

        Ok(RawSample {
            temperature_c: data.temperature_celsius(),
            humidity_percent: data.humidity_percent(),
            pressure_hpa: data.pressure_hpa(),
            gas_resistance_ohms: data.gas_resistance_ohm() as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeadBus;

    impl Read for DeadBus {
        type Error = ();
        fn read(&mut self, _addr: u8, _buf: &mut [u8]) -> Result<(), Self::Error> {
            Err(())
        }
    }

    impl Write for DeadBus {
        type Error = ();
        fn write(&mut self, _addr: u8, _bytes: &[u8]) -> Result<(), Self::Error> {
            Err(())
        }
    }

    struct NoDelay;

    impl DelayMs<u8> for NoDelay {
        fn delay_ms(&mut self, _ms: u8) {}
    }

    fn dead_sensor() -> Bme680Sensor<DeadBus, NoDelay> {
        Bme680Sensor::new(DeadBus, NoDelay, I2CAddress::Secondary, SensorProfile::default())
    }

    #[test]
    fn silent_bus_fails_handshake() {
        let mut sensor = dead_sensor();
        assert_eq!(sensor.initialize(), Err(InitError::Handshake));
        assert!(!sensor.is_ready());
    }

    #[test]
    fn bring_up_is_attempted_once() {
        let mut sensor = dead_sensor();
        let _ = sensor.initialize();
        assert_eq!(sensor.initialize(), Err(InitError::Unavailable));
    }

    #[test]
    fn acquire_requires_initialization() {
        let mut sensor = dead_sensor();
        assert_eq!(sensor.acquire(), Err(AcquireError::NotInitialized));
        let _ = sensor.initialize();
        assert_eq!(sensor.acquire(), Err(AcquireError::NotInitialized));
    }

    #[test]
    fn profile_maps_to_driver_settings() {
        let profile = SensorProfile::default();
        assert_eq!(profile.heater_temp_c, 320);
        assert_eq!(profile.heater_duration_ms, 150);
        assert!(matches!(oversampling(8), OversamplingSetting::OS8x));
        assert!(matches!(oversampling(4), OversamplingSetting::OS4x));
        assert!(matches!(oversampling(2), OversamplingSetting::OS2x));
        assert!(matches!(filter(3), IIRFilterSize::Size3));
        assert!(matches!(filter(200), IIRFilterSize::Size127));
    }
}
