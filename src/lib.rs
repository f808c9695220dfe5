#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod aqi;
pub mod config;
pub mod hal;
pub mod node;
pub mod protocol;
pub mod sensor;

#[cfg(feature = "esp32c6")]
pub mod tasks;

pub use aqi::{compute_aqi, AqiCategory};
pub use config::NodeIdentity;
pub use node::{IntervalTimer, SensorNode};
pub use protocol::{Command, Record};
pub use sensor::{AcquireError, EnvironmentalSensor, InitError, RawSample};
