use embassy_time::{Duration, Instant, Timer};
use esp_hal::delay::Delay;
use esp_hal::i2c::master::I2c;
use esp_hal::uart::Uart;
use esp_hal::Blocking;

use crate::config::POLL_PERIOD_MS;
use crate::hal::{DelayCompat, I2cCompat};
use crate::node::SensorNode;
use crate::sensor::Bme680Sensor;

pub type BoardSensor = Bme680Sensor<I2cCompat<I2c<'static, Blocking>>, DelayCompat<Delay>>;
pub type BoardPort = Uart<'static, Blocking>;

/// Drives the node forever: boot once, then tick and yield.
#[embassy_executor::task]
pub async fn node_task(mut node: SensorNode<BoardSensor>, mut port: BoardPort) {
    if node.boot(&mut port).is_err() {
        warn!("Failed to write boot status");
    }

    info!("Entering main loop, polling every {} ms", POLL_PERIOD_MS);

    loop {
        // Millisecond clock wraps like the counter the interval math expects.
        let now_ms = Instant::now().as_millis() as u32;
        if node.tick(now_ms, &mut port).is_err() {
            warn!("Serial port error");
        }

        Timer::after(Duration::from_millis(POLL_PERIOD_MS)).await;
    }
}
