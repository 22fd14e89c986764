//! Per-device set of waveform generators
//! Location: src/simulation/registry.rs

use super::waveform::WaveformGenerator;
use crate::config::{DeviceModel, ParameterMap};
use crate::error::{SimError, SimResult};
use crate::utils::random::SharedRng;

/// All generators of one device, in stable parameter order
///
/// Built once from a [`DeviceModel`]; the set of parameters never changes
/// afterwards. One call to [`sample_all`](Self::sample_all) is one tick.
#[derive(Debug, Clone)]
pub struct GeneratorRegistry {
    device_id: String,
    generators: Vec<(String, WaveformGenerator)>,
}

impl GeneratorRegistry {
    /// Build one generator per parameter, stopping at the first bad waveform
    pub fn from_model(model: &DeviceModel, rng: &SharedRng) -> SimResult<Self> {
        Self::from_parameters(&model.id, &model.parameters, rng)
    }

    /// Same as [`from_model`](Self::from_model) for a bare parameter map
    ///
    /// `device_id` is only used to name the device in errors and topics.
    pub fn from_parameters(
        device_id: &str,
        parameters: &ParameterMap,
        rng: &SharedRng,
    ) -> SimResult<Self> {
        let mut generators = Vec::with_capacity(parameters.len());

        for (name, spec) in parameters {
            let generator =
                WaveformGenerator::new(spec, rng).map_err(|e| SimError::InvalidParameter {
                    device: device_id.to_string(),
                    parameter: name.clone(),
                    source: Box::new(e),
                })?;
            generators.push((name.clone(), generator));
        }

        Ok(Self {
            device_id: device_id.to_string(),
            generators,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.generators.iter().map(|(name, _)| name.as_str())
    }

    pub fn generator(&self, parameter: &str) -> Option<&WaveformGenerator> {
        self.generators
            .iter()
            .find(|(name, _)| name == parameter)
            .map(|(_, generator)| generator)
    }

    /// Advance every generator exactly once and collect `(parameter, value)`
    pub fn sample_all(&mut self) -> Vec<(String, f64)> {
        self.generators
            .iter_mut()
            .map(|(name, generator)| (name.clone(), generator.next_value()))
            .collect()
    }
}
