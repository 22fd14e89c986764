//! Waveform generation engine
//! Location: src/simulation/mod.rs

pub mod noise_models;
pub mod registry;
pub mod waveform;

pub use noise_models::GaussianNoise;
pub use registry::GeneratorRegistry;
pub use waveform::{round_to, WaveformGenerator, WaveformKind, WaveformSpec};
