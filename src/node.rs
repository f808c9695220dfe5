//! The node's cooperative main loop.
//!
//! [`SensorNode::tick`] does one bounded slice of work: it pulls at most one
//! complete command line off the serial port, then samples the sensor if the
//! interval has elapsed. The caller supplies the clock and yields between
//! ticks, so the same code runs under the embassy executor and in host tests.

use embedded_io::{Read, ReadReady, Write};

use crate::aqi::{compute_aqi, AqiCategory};
use crate::config::NodeIdentity;
use crate::protocol::{Command, ErrorCode, Feed, LineBuffer, NodeStatus, Record, LINE_CAPACITY};
use crate::sensor::EnvironmentalSensor;

/// Fixed-period trigger on a wrapping millisecond clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTimer {
    interval_ms: u32,
    last_ms: u32,
}

impl IntervalTimer {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: 0,
        }
    }

    /// Survives the clock wrapping past `u32::MAX`.
    pub fn is_due(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.last_ms) >= self.interval_ms
    }

    /// Returns `true` and restarts the period when due.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if self.is_due(now_ms) {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn last_ms(&self) -> u32 {
        self.last_ms
    }
}

/// All mutable state of one node plus its sensor.
pub struct SensorNode<S> {
    identity: NodeIdentity,
    sensor: S,
    ready: bool,
    timer: IntervalTimer,
    reading_count: u32,
    rx: LineBuffer<LINE_CAPACITY>,
}

impl<S: EnvironmentalSensor> SensorNode<S> {
    pub fn new(identity: NodeIdentity, sensor: S) -> Self {
        Self {
            identity,
            sensor,
            ready: false,
            timer: IntervalTimer::new(identity.interval_ms),
            reading_count: 0,
            rx: LineBuffer::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn reading_count(&self) -> u32 {
        self.reading_count
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    /// Brings the sensor up and announces the outcome. Call once, before the
    /// first [`tick`](Self::tick).
    pub fn boot<W: Write>(&mut self, out: &mut W) -> Result<(), W::Error> {
        info!(
            "Node {} at {} starting, interval {} ms",
            self.identity.node_id,
            self.identity.location,
            self.identity.interval_ms
        );
        let status = match self.sensor.initialize() {
            Ok(()) => {
                self.ready = true;
                info!("Sensor ready");
                NodeStatus::Ready
            }
            Err(e) => {
                self.ready = false;
                error!("Sensor bring-up failed: {}, sampling disabled", e);
                NodeStatus::Error
            }
        };
        self.emit(
            out,
            &Record::Status {
                identity: &self.identity,
                status,
            },
        )
    }

    /// One loop iteration at time `now_ms`.
    ///
    /// A port error on the command side does not skip the sampling check;
    /// the first error seen is returned after both halves ran.
    pub fn tick<P>(&mut self, now_ms: u32, port: &mut P) -> Result<(), P::Error>
    where
        P: Read + ReadReady + Write,
    {
        let command = match self.poll_command(port) {
            Ok(Some(command)) => self.dispatch(command, port),
            Ok(None) => Ok(()),
            Err(e) => {
                self.rx.clear();
                warn!("Serial read failed, dropping partial line");
                Err(e)
            }
        };
        let sampling = if self.ready && self.timer.poll(now_ms) {
            self.sample(port)
        } else {
            Ok(())
        };
        command.and(sampling)
    }

    /// Reads ready bytes until one line completes or the port runs dry.
    fn poll_command<P>(&mut self, port: &mut P) -> Result<Option<Command>, P::Error>
    where
        P: Read + ReadReady,
    {
        let mut byte = [0u8; 1];
        while port.read_ready()? {
            if port.read(&mut byte)? == 0 {
                break;
            }
            match self.rx.feed(byte[0]) {
                Feed::Pending => {}
                Feed::Discarded => warn!("Dropped oversized command line"),
                Feed::Complete => {
                    let command = self.rx.line().map(Command::parse);
                    self.rx.clear();
                    return Ok(command);
                }
            }
        }
        Ok(None)
    }

    pub fn dispatch<W: Write>(&mut self, command: Command, out: &mut W) -> Result<(), W::Error> {
        match command {
            Command::Read => {
                if self.ready {
                    self.sample(out)
                } else {
                    warn!("READ ignored, sensor not ready");
                    self.emit(
                        out,
                        &Record::Error {
                            identity: &self.identity,
                            code: ErrorCode::SensorNotReady,
                        },
                    )
                }
            }
            Command::Status => {
                let status = if self.ready {
                    NodeStatus::Ok
                } else {
                    NodeStatus::Error
                };
                self.emit(
                    out,
                    &Record::Status {
                        identity: &self.identity,
                        status,
                    },
                )
            }
            Command::Info => self.emit(
                out,
                &Record::Info {
                    identity: &self.identity,
                    total_readings: self.reading_count,
                },
            ),
            Command::Ping => self.emit(out, &Record::Pong),
            Command::Unknown => {
                debug!("Ignoring unknown command");
                Ok(())
            }
        }
    }

    /// Acquire, convert, report. Only a successful acquisition counts.
    fn sample<W: Write>(&mut self, out: &mut W) -> Result<(), W::Error> {
        match self.sensor.acquire() {
            Ok(sample) => {
                self.reading_count = self.reading_count.wrapping_add(1);
                let aqi = compute_aqi(sample.gas_resistance_ohms, sample.humidity_percent);
                info!(
                    "Reading #{}: {} C, {} %RH, {} hPa, {} ohm, AQI {} ({})",
                    self.reading_count,
                    sample.temperature_c,
                    sample.humidity_percent,
                    sample.pressure_hpa,
                    sample.gas_resistance_ohms,
                    aqi,
                    AqiCategory::from_index(aqi).as_str()
                );
                self.emit(
                    out,
                    &Record::Reading {
                        identity: &self.identity,
                        sample: &sample,
                        aqi,
                        reading_count: self.reading_count,
                    },
                )
            }
            Err(e) => {
                warn!("Reading failed: {}", e);
                self.emit(
                    out,
                    &Record::Error {
                        identity: &self.identity,
                        code: ErrorCode::ReadFailed,
                    },
                )
            }
        }
    }

    fn emit<W: Write>(&self, out: &mut W, record: &Record<'_>) -> Result<(), W::Error> {
        match record.to_line() {
            Ok(line) => out.write_all(line.as_bytes()),
            Err(_) => {
                error!("Record does not fit the line buffer");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embedded_io::ErrorType;

    use super::*;
    use crate::sensor::{AcquireError, InitError, RawSample};

    struct SteadySensor;

    impl EnvironmentalSensor for SteadySensor {
        fn initialize(&mut self) -> Result<(), InitError> {
            Ok(())
        }

        fn acquire(&mut self) -> Result<RawSample, AcquireError> {
            Ok(RawSample {
                temperature_c: 22.0,
                humidity_percent: 40.0,
                pressure_hpa: 1013.0,
                gas_resistance_ohms: 120_000.0,
            })
        }
    }

    #[derive(Default)]
    struct Sink(std::vec::Vec<u8>);

    impl ErrorType for Sink {
        type Error = Infallible;
    }

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn identity() -> NodeIdentity {
        NodeIdentity::new("node_01", "Living Room", 30_000, 115_200).unwrap()
    }

    #[test]
    fn reading_count_wraps_to_zero() {
        let mut node = SensorNode::new(identity(), SteadySensor);
        let mut sink = Sink::default();
        node.boot(&mut sink).unwrap();
        sink.0.clear();
        node.reading_count = u32::MAX;

        node.dispatch(Command::Read, &mut sink).unwrap();
        let text = std::string::String::from_utf8(sink.0).unwrap();
        assert!(text.contains("\"reading_count\":0}"), "{}", text);
        assert_eq!(node.reading_count(), 0);

        let mut sink = Sink::default();
        node.dispatch(Command::Info, &mut sink).unwrap();
        let text = std::string::String::from_utf8(sink.0).unwrap();
        assert!(text.contains("\"total_readings\":0}"), "{}", text);
    }

    #[test]
    fn timer_waits_a_full_interval() {
        let mut timer = IntervalTimer::new(30_000);
        assert!(!timer.poll(0));
        assert!(!timer.poll(29_999));
        assert!(timer.poll(30_000));
        assert_eq!(timer.last_ms(), 30_000);
        assert!(!timer.poll(30_001));
        assert!(!timer.poll(59_999));
        assert!(timer.poll(60_000));
    }

    #[test]
    fn timer_late_poll_restarts_from_now() {
        let mut timer = IntervalTimer::new(30_000);
        assert!(timer.poll(45_000));
        assert!(!timer.poll(74_999));
        assert!(timer.poll(75_000));
    }

    #[test]
    fn timer_survives_clock_wraparound() {
        let mut timer = IntervalTimer::new(30_000);
        let before_wrap = u32::MAX - 9_999;
        assert!(timer.poll(before_wrap));
        assert!(!timer.poll(u32::MAX));
        assert!(!timer.poll(0));
        assert!(!timer.poll(19_999));
        assert!(timer.is_due(20_000));
        assert!(timer.poll(20_000));
        assert!(!timer.poll(20_001));
    }
}
