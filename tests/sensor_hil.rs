//! On-target checks against a real BME680 on GPIO4 (SDA) / GPIO5 (SCL).
//!
//! Run with `cargo test --features esp32c6 --test sensor_hil` and probe-rs as runner.

#![no_std]
#![no_main]

use panic_rtt_target as _;

esp_bootloader_esp_idf::esp_app_desc!();

#[cfg(test)]
#[embedded_test::tests(executor = esp_hal_embassy::Executor::new())]
mod tests {
    use bme680::I2CAddress;
    use defmt::{assert, info};
    use esp_hal::delay::Delay;
    use esp_hal::i2c::master::{Config as I2cConfig, I2c};
    use esp_hal::time::Rate;
    use esp_hal::timer::systimer::SystemTimer;

    use esp_bme680_aqi_node::aqi::{compute_aqi, AQI_MAX};
    use esp_bme680_aqi_node::hal::{DelayCompat, I2cCompat};
    use esp_bme680_aqi_node::sensor::{
        AcquireError, Bme680Sensor, EnvironmentalSensor, InitError, SensorProfile,
    };
    use esp_bme680_aqi_node::tasks::node::BoardSensor;

    #[init]
    fn init() -> BoardSensor {
        rtt_target::rtt_init_defmt!();

        let peripherals = esp_hal::init(esp_hal::Config::default());
        let timer0 = SystemTimer::new(peripherals.SYSTIMER);
        esp_hal_embassy::init(timer0.alarm0);

        let i2c = I2c::new(
            peripherals.I2C0,
            I2cConfig::default().with_frequency(Rate::from_khz(100)),
        )
        .unwrap()
        .with_sda(peripherals.GPIO4)
        .with_scl(peripherals.GPIO5);

        Bme680Sensor::new(
            I2cCompat::new(i2c),
            DelayCompat::new(Delay::new()),
            I2CAddress::Secondary,
            SensorProfile::default(),
        )
    }

    #[test]
    fn bring_up_then_measure(mut sensor: BoardSensor) {
        assert!(sensor.initialize().is_ok());
        assert!(sensor.is_ready());

        let sample = sensor.acquire().unwrap();
        info!(
            "T={} H={} P={} G={}",
            sample.temperature_c,
            sample.humidity_percent,
            sample.pressure_hpa,
            sample.gas_resistance_ohms
        );
        assert!(sample.temperature_c > -40.0 && sample.temperature_c < 85.0);
        assert!(sample.humidity_percent >= 0.0 && sample.humidity_percent <= 100.0);
        assert!(sample.pressure_hpa > 300.0 && sample.pressure_hpa < 1100.0);
        assert!(sample.gas_resistance_ohms > 0.0);
        assert!(compute_aqi(sample.gas_resistance_ohms, sample.humidity_percent) <= AQI_MAX);
    }

    #[test]
    fn second_bring_up_is_refused(mut sensor: BoardSensor) {
        assert!(sensor.initialize().is_ok());
        assert!(sensor.initialize() == Err(InitError::Unavailable));
    }

    #[test]
    fn acquire_before_bring_up_fails(mut sensor: BoardSensor) {
        assert!(sensor.acquire().err() == Some(AcquireError::NotInitialized));
    }
}
