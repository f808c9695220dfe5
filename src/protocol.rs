//! Line-oriented serial protocol.
//!
//! Host to node: one bare command word per line. Node to host: one compact
//! JSON object per line (NDJSON), written fire-and-forget.

use core::fmt;

use heapless::{String, Vec};

use crate::config::NodeIdentity;
use crate::sensor::RawSample;

/// Worst case is a reading record with both labels fully escaped.
pub const RECORD_CAPACITY: usize = 320;
/// Longest inbound line kept; commands are a handful of bytes.
pub const LINE_CAPACITY: usize = 64;

pub type RecordLine = String<RECORD_CAPACITY>;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read,
    Status,
    Info,
    Ping,
    Unknown,
}

impl Command {
    /// Exact, case-sensitive match after trimming surrounding whitespace.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "READ" => Command::Read,
            "STATUS" => Command::Status,
            "INFO" => Command::Info,
            "PING" => Command::Ping,
            _ => Command::Unknown,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Boot-time bring-up succeeded.
    Ready,
    /// Answer to `STATUS` while the sensor is usable.
    Ok,
    Error,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Ready => "ready",
            NodeStatus::Ok => "ok",
            NodeStatus::Error => "error",
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ReadFailed,
    SensorNotReady,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ReadFailed => "read_failed",
            ErrorCode::SensorNotReady => "sensor_not_ready",
        }
    }
}

/// Everything the node can say to the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Record<'a> {
    Reading {
        identity: &'a NodeIdentity,
        sample: &'a RawSample,
        aqi: u16,
        reading_count: u32,
    },
    Status {
        identity: &'a NodeIdentity,
        status: NodeStatus,
    },
    Info {
        identity: &'a NodeIdentity,
        total_readings: u32,
    },
    Pong,
    Error {
        identity: &'a NodeIdentity,
        code: ErrorCode,
    },
}

fn write_str_value<W: fmt::Write>(out: &mut W, value: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

fn write_float<W: fmt::Write>(out: &mut W, value: f32, decimals: usize) -> fmt::Result {
    if value.is_finite() {
        write!(out, "{:.*}", decimals, value)
    } else {
        out.write_str("null")
    }
}

impl Record<'_> {
    /// Writes the record as one compact JSON object, without a terminator.
    pub fn write_json<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        match self {
            Record::Reading {
                identity,
                sample,
                aqi,
                reading_count,
            } => {
                out.write_str("{\"type\":\"reading\",\"node_id\":")?;
                write_str_value(out, identity.node_id)?;
                out.write_str(",\"location\":")?;
                write_str_value(out, identity.location)?;
                out.write_str(",\"temperature\":")?;
                write_float(out, sample.temperature_c, 2)?;
                out.write_str(",\"humidity\":")?;
                write_float(out, sample.humidity_percent, 2)?;
                out.write_str(",\"pressure\":")?;
                write_float(out, sample.pressure_hpa, 2)?;
                out.write_str(",\"gas_resistance\":")?;
                write_float(out, sample.gas_resistance_ohms, 0)?;
                write!(out, ",\"aqi\":{},\"reading_count\":{}}}", aqi, reading_count)
            }
            Record::Status { identity, status } => {
                out.write_str("{\"type\":\"status\",\"node_id\":")?;
                write_str_value(out, identity.node_id)?;
                write!(out, ",\"status\":\"{}\"}}", status.as_str())
            }
            Record::Info {
                identity,
                total_readings,
            } => {
                out.write_str("{\"type\":\"info\",\"node_id\":")?;
                write_str_value(out, identity.node_id)?;
                out.write_str(",\"location\":")?;
                write_str_value(out, identity.location)?;
                write!(
                    out,
                    ",\"interval\":{},\"total_readings\":{}}}",
                    identity.interval_ms, total_readings
                )
            }
            Record::Pong => out.write_str("{\"type\":\"pong\"}"),
            Record::Error { identity, code } => {
                out.write_str("{\"type\":\"error\",\"node_id\":")?;
                write_str_value(out, identity.node_id)?;
                write!(out, ",\"error\":\"{}\"}}", code.as_str())
            }
        }
    }

    /// Renders the record followed by `\n`, ready to push onto the wire.
    pub fn to_line(&self) -> Result<RecordLine, fmt::Error> {
        let mut line = RecordLine::new();
        self.write_json(&mut line)?;
        line.push('\n').map_err(|_| fmt::Error)?;
        Ok(line)
    }
}

/// Outcome of feeding one byte to a [`LineBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Still collecting.
    Pending,
    /// A terminator arrived; the line is ready in [`LineBuffer::line`].
    Complete,
    /// A terminator arrived for a line that overflowed; it was dropped.
    Discarded,
}

/// Accumulates inbound bytes until a `\n`. `\r` is ignored.
///
/// Bytes beyond the capacity are thrown away up to the next terminator so a
/// runaway line can never be mistaken for a command.
#[derive(Debug, Default)]
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
    overflowed: bool,
    complete: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            overflowed: false,
            complete: false,
        }
    }

    pub fn feed(&mut self, byte: u8) -> Feed {
        if self.complete {
            self.clear();
        }
        match byte {
            b'\n' => {
                if self.overflowed {
                    self.clear();
                    Feed::Discarded
                } else {
                    self.complete = true;
                    Feed::Complete
                }
            }
            b'\r' => Feed::Pending,
            _ => {
                if self.buf.push(byte).is_err() {
                    self.overflowed = true;
                }
                Feed::Pending
            }
        }
    }

    /// The completed line, if the last byte fed was its terminator.
    /// Invalid UTF-8 reads as an empty line.
    pub fn line(&self) -> Option<&str> {
        if !self.complete {
            return None;
        }
        Some(core::str::from_utf8(&self.buf).unwrap_or(""))
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
        self.complete = false;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
