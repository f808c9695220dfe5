//! Gas resistance to air-quality index transfer function.
//!
//! The BME680 metal-oxide element reports a resistance that rises as the air
//! gets cleaner. After a humidity correction the compensated resistance is
//! looked up in a seven-segment table, linearly interpolated inside its
//! segment, rounded and clamped to `0..=500`.

#[allow(unused_imports)]
use num_traits::Float;

pub const AQI_MIN: u16 = 0;
pub const AQI_MAX: u16 = 500;

/// Relative humidity at which no compensation is applied.
pub const REFERENCE_HUMIDITY: f32 = 40.0;
const COMPENSATION_SLOPE: f32 = 0.25;

/// One row of the calibration table.
///
/// `floor` is the exclusive lower edge used for segment selection; `in_lo` and
/// `in_hi` are the bounds used for the interpolation proportion. They differ
/// for the two open-ended rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub floor: f32,
    pub in_lo: f32,
    pub in_hi: f32,
    pub aqi_at_lo: f32,
    pub aqi_at_hi: f32,
}

impl Segment {
    const fn new(floor: f32, in_lo: f32, in_hi: f32, aqi_at_lo: f32, aqi_at_hi: f32) -> Self {
        Self {
            floor,
            in_lo,
            in_hi,
            aqi_at_lo,
            aqi_at_hi,
        }
    }

    fn evaluate(&self, compensated: f32) -> f32 {
        interpolate(compensated, self.in_lo, self.in_hi, self.aqi_at_lo, self.aqi_at_hi)
    }
}

/// Ordered cleanest first. The last row catches everything at or below
/// 20 kΩ, including readings under its 5 kΩ proportion bound.
pub const SEGMENTS: [Segment; 7] = [
    Segment::new(150_000.0, 150_000.0, 300_000.0, 25.0, 0.0),
    Segment::new(100_000.0, 100_000.0, 150_000.0, 50.0, 25.0),
    Segment::new(70_000.0, 70_000.0, 100_000.0, 75.0, 50.0),
    Segment::new(50_000.0, 50_000.0, 70_000.0, 100.0, 75.0),
    Segment::new(35_000.0, 35_000.0, 50_000.0, 150.0, 100.0),
    Segment::new(20_000.0, 20_000.0, 35_000.0, 200.0, 150.0),
    Segment::new(f32::NEG_INFINITY, 5_000.0, 20_000.0, 350.0, 200.0),
];

/// Linear map of `x` from `[in_lo, in_hi]` onto `[out_lo, out_hi]`.
///
/// Either range may be inverted; values outside the input range extrapolate.
pub fn interpolate(x: f32, in_lo: f32, in_hi: f32, out_lo: f32, out_hi: f32) -> f32 {
    out_lo + (x - in_lo) / (in_hi - in_lo) * (out_hi - out_lo)
}

/// Scales the raw gas resistance for the sensor's humidity cross-sensitivity.
pub fn compensate(gas_resistance_ohms: f32, humidity_percent: f32) -> f32 {
    let factor = COMPENSATION_SLOPE * (humidity_percent - REFERENCE_HUMIDITY) / 100.0;
    gas_resistance_ohms * (1.0 + factor)
}

/// Table lookup on an already compensated resistance, before rounding.
pub fn segment_value(compensated: f32) -> f32 {
    let segment = SEGMENTS
        .iter()
        .find(|segment| compensated > segment.floor)
        .unwrap_or(&SEGMENTS[SEGMENTS.len() - 1]);
    segment.evaluate(compensated)
}

/// Rounds and clamps a raw table value into the index range.
///
/// NaN has no meaningful position on the scale and reports as the worst index.
pub fn clamp_index(raw: f32) -> u16 {
    if raw.is_nan() {
        return AQI_MAX;
    }
    raw.round().clamp(AQI_MIN as f32, AQI_MAX as f32) as u16
}

/// AQI for a reading, in `0..=500`. Higher is worse.
pub fn compute_aqi(gas_resistance_ohms: f32, humidity_percent: f32) -> u16 {
    let compensated = compensate(gas_resistance_ohms, humidity_percent);
    clamp_index(segment_value(compensated))
}

/// Health band for an index value, following the usual US EPA breakpoints.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_index(aqi: u16) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthySensitive,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AqiCategory::Good => "good",
            AqiCategory::Moderate => "moderate",
            AqiCategory::UnhealthySensitive => "unhealthy_sensitive",
            AqiCategory::Unhealthy => "unhealthy",
            AqiCategory::VeryUnhealthy => "very_unhealthy",
            AqiCategory::Hazardous => "hazardous",
        }
    }
}
