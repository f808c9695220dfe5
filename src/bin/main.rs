#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use bme680::I2CAddress;
use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::uart::{Config as UartConfig, Uart};
use panic_rtt_target as _;

use esp_bme680_aqi_node::config::NodeIdentity;
use esp_bme680_aqi_node::hal::{DelayCompat, I2cCompat};
use esp_bme680_aqi_node::node::SensorNode;
use esp_bme680_aqi_node::sensor::{Bme680Sensor, SensorProfile};
use esp_bme680_aqi_node::tasks::node::node_task;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Nothing left to do after a fatal setup error except keep the RTT log alive.
async fn park() -> ! {
    loop {
        Timer::after(Duration::from_millis(1000)).await;
    }
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let identity = NodeIdentity::BUILD;

    // Telemetry UART on the default UART0 pins (TX=GPIO16, RX=GPIO17)
    let uart_config = UartConfig::default().with_baudrate(identity.baud_rate);
    let port = match Uart::new(peripherals.UART0, uart_config) {
        Ok(uart) => uart.with_rx(peripherals.GPIO17).with_tx(peripherals.GPIO16),
        Err(_) => {
            error!("UART initialization failed");
            park().await
        }
    };

    // BME680 on GPIO4 (SDA) and GPIO5 (SCL)
    let i2c_config = I2cConfig::default().with_frequency(Rate::from_khz(100));
    let i2c = match I2c::new(peripherals.I2C0, i2c_config) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO4).with_scl(peripherals.GPIO5),
        Err(_) => {
            error!("I2C initialization failed");
            park().await
        }
    };

    // ── wrap esp-hal I²C and delay so they satisfy the driver (eh-0.2) traits ──
    let sensor = Bme680Sensor::new(
        I2cCompat::new(i2c),
        DelayCompat::new(Delay::new()),
        I2CAddress::Secondary,
        SensorProfile::default(),
    );
    let node = SensorNode::new(identity, sensor);

    if spawner.spawn(node_task(node, port)).is_err() {
        error!("Failed to spawn node task");
    }

    // Nothing else to do here; park the main task.
    park().await
}
