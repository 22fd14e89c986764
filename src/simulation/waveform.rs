//! Waveform descriptions and the stateful generators built from them
//! Location: src/simulation/waveform.rs
//!
//! A [`WaveformSpec`] is the declarative, serde-facing description of one
//! parameter. A [`WaveformGenerator`] is built from it once and then produces
//! one rounded sample per call, advancing its own time step `t`.

use super::noise_models::GaussianNoise;
use crate::config::constants::waveform::*;
use crate::error::{SimError, SimResult};
use crate::utils::random::{derive_seed, SharedRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Recognized waveform shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveformKind {
    Linear,
    Noise,
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 6] = [
        WaveformKind::Linear,
        WaveformKind::Noise,
        WaveformKind::Sine,
        WaveformKind::Square,
        WaveformKind::Sawtooth,
        WaveformKind::Triangle,
    ];

    /// Canonical configuration spelling
    pub fn as_str(self) -> &'static str {
        match self {
            WaveformKind::Linear => "linear",
            WaveformKind::Noise => "noise",
            WaveformKind::Sine => "sin",
            WaveformKind::Square => "square",
            WaveformKind::Sawtooth => "sawtooth",
            WaveformKind::Triangle => "triangle",
        }
    }

    /// Decimal places kept on every sample
    pub fn precision(self) -> u32 {
        match self {
            WaveformKind::Linear => LINEAR_PRECISION,
            _ => DEFAULT_PRECISION,
        }
    }
}

impl FromStr for WaveformKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(WaveformKind::Linear),
            "noise" => Ok(WaveformKind::Noise),
            "sin" | "sine" => Ok(WaveformKind::Sine),
            "square" => Ok(WaveformKind::Square),
            "sawtooth" => Ok(WaveformKind::Sawtooth),
            "triangle" => Ok(WaveformKind::Triangle),
            other => Err(SimError::UnsupportedWaveform {
                kind: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative description of one parameter's signal
///
/// The kind is kept as the raw configured string so that an unknown kind is
/// reported by [`WaveformGenerator::new`] rather than by the config parser.
/// Omitted numeric fields fall back to the defaults in
/// [`constants::waveform`](crate::config::constants::waveform).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformSpec {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
}

impl WaveformSpec {
    /// Spec with only the kind set; every numeric field takes its default
    pub fn of_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            start: None,
            slope: None,
            mean: None,
            stddev: None,
            amplitude: None,
            frequency: None,
        }
    }

    pub fn linear(start: f64, slope: f64) -> Self {
        Self {
            start: Some(start),
            slope: Some(slope),
            ..Self::of_kind(WaveformKind::Linear.as_str())
        }
    }

    pub fn noise(mean: f64, stddev: f64) -> Self {
        Self {
            mean: Some(mean),
            stddev: Some(stddev),
            ..Self::of_kind(WaveformKind::Noise.as_str())
        }
    }

    /// Sine, square, sawtooth or triangle
    pub fn periodic(kind: WaveformKind, amplitude: f64, frequency: f64) -> Self {
        Self {
            amplitude: Some(amplitude),
            frequency: Some(frequency),
            ..Self::of_kind(kind.as_str())
        }
    }

    pub fn parsed_kind(&self) -> SimResult<WaveformKind> {
        self.kind.parse()
    }

    /// Numeric fields that are present, by name
    pub(crate) fn numeric_fields(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("start", self.start),
            ("slope", self.slope),
            ("mean", self.mean),
            ("stddev", self.stddev),
            ("amplitude", self.amplitude),
            ("frequency", self.frequency),
        ]
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Linear { start: f64, slope: f64 },
    Noise(GaussianNoise),
    Periodic { amplitude: f64, frequency: f64 },
}

/// Stateful sample source for one parameter
///
/// Owns its time step exclusively. Two generators built from the same spec
/// evolve independently, both starting at `t = 0`.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    kind: WaveformKind,
    shape: Shape,
    t: u64,
}

impl WaveformGenerator {
    /// Build a generator, failing fast on an unknown kind
    ///
    /// The shared random source is only used here, to seed the private
    /// generator of a `noise` waveform.
    pub fn new(spec: &WaveformSpec, rng: &SharedRng) -> SimResult<Self> {
        let kind = spec.parsed_kind()?;

        let shape = match kind {
            WaveformKind::Linear => Shape::Linear {
                start: spec.start.unwrap_or(DEFAULT_START),
                slope: spec.slope.unwrap_or(DEFAULT_SLOPE),
            },
            WaveformKind::Noise => Shape::Noise(GaussianNoise::new(
                spec.mean.unwrap_or(DEFAULT_MEAN),
                spec.stddev.unwrap_or(DEFAULT_STDDEV),
                derive_seed(rng),
            )),
            WaveformKind::Sine
            | WaveformKind::Square
            | WaveformKind::Sawtooth
            | WaveformKind::Triangle => Shape::Periodic {
                amplitude: spec.amplitude.unwrap_or(DEFAULT_AMPLITUDE),
                frequency: spec.frequency.unwrap_or(DEFAULT_FREQUENCY),
            },
        };

        Ok(Self { kind, shape, t: 0 })
    }

    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// Number of time steps consumed so far
    pub fn time_step(&self) -> u64 {
        self.t
    }

    /// Sample at the current time step, then advance it
    ///
    /// Noise carries no time dependency and leaves the time step untouched.
    pub fn next_value(&mut self) -> f64 {
        let kind = self.kind;
        let t = self.t as f64;

        let raw = match &mut self.shape {
            Shape::Noise(noise) => return round_to(noise.sample(), kind.precision()),
            Shape::Linear { start, slope } => *start + *slope * t,
            Shape::Periodic {
                amplitude,
                frequency,
            } => *amplitude * unit_cycle(kind, *frequency * t),
        };

        self.t += 1;
        round_to(raw, kind.precision())
    }
}

impl Iterator for WaveformGenerator {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.next_value())
    }
}

/// Unit-amplitude periodic shape evaluated at `phase = f * t` cycles
fn unit_cycle(kind: WaveformKind, phase: f64) -> f64 {
    match kind {
        WaveformKind::Sine => (2.0 * PI * phase).sin(),
        WaveformKind::Square => {
            let s = (2.0 * PI * phase).sin();
            // sin(k*pi) lands a few ulps off zero; those are zero crossings
            if s.abs() < SQUARE_ZERO_EPSILON {
                0.0
            } else {
                s.signum()
            }
        }
        WaveformKind::Sawtooth => 2.0 * centered_fraction(phase),
        WaveformKind::Triangle => 2.0 * (2.0 * centered_fraction(phase)).abs() - 1.0,
        WaveformKind::Linear | WaveformKind::Noise => 0.0,
    }
}

/// `x - floor(x + 0.5)`, in [-0.5, 0.5)
fn centered_fraction(x: f64) -> f64 {
    x - (x + 0.5).floor()
}

/// Round to `decimals` places; never returns -0.0
///
/// Exact ties go to the even neighbour, so `0.0625` becomes `0.062` and
/// `0.125` becomes `0.12`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round_ties_even() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
