// src/config/device_config.rs
//! Per-device configuration structures

use crate::config::constants::mqtt::RESERVED_TOPIC_CHARS;
use crate::error::{SimError, SimResult};
use crate::simulation::WaveformSpec;
use std::collections::BTreeMap;

/// Parameter name to waveform description, iterated in name order
pub type ParameterMap = BTreeMap<String, WaveformSpec>;

/// One simulated device: its id and the parameters it reports
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceModel {
    pub id: String,
    pub parameters: ParameterMap,
}

impl DeviceModel {
    pub fn new(id: impl Into<String>, parameters: ParameterMap) -> Self {
        Self {
            id: id.into(),
            parameters,
        }
    }

    /// Add one parameter, builder style
    pub fn with_parameter(mut self, name: impl Into<String>, spec: WaveformSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }
}

/// Structural checks on one device entry
///
/// Waveform kinds are not checked here; an unknown kind is
/// reported when the device's generators are built.
pub fn validate_device_model(model: &DeviceModel) -> SimResult<()> {
    let field = format!("devices.{}", model.id);

    validate_topic_segment(&field, "device id", &model.id)?;

    if model.parameters.is_empty() {
        return Err(SimError::config(field, "device has no parameters"));
    }

    for (name, spec) in &model.parameters {
        let param_field = format!("{}.{}", field, name);
        validate_topic_segment(&param_field, "parameter name", name)?;

        for (key, value) in spec.numeric_fields() {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(SimError::config(
                        format!("{}.{}", param_field, key),
                        format!("must be a finite number, got {}", v),
                    ));
                }
            }
        }

        if spec.stddev.is_some_and(|s| s < 0.0) {
            return Err(SimError::config(
                format!("{}.stddev", param_field),
                "must not be negative",
            ));
        }
    }

    Ok(())
}

fn validate_topic_segment(field: &str, what: &str, segment: &str) -> SimResult<()> {
    if segment.is_empty() {
        return Err(SimError::config(field, format!("{} cannot be empty", what)));
    }
    if segment.contains(RESERVED_TOPIC_CHARS) {
        return Err(SimError::config(
            field,
            format!("{} `{}` contains one of / + #", what, segment),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> DeviceModel {
        DeviceModel::new("device1", ParameterMap::new())
            .with_parameter("Temp", WaveformSpec::linear(20.0, 0.1))
    }

    #[test]
    fn test_valid_model() {
        assert!(validate_device_model(&model()).is_ok());
    }

    #[test]
    fn test_unknown_kind_passes_structural_validation() {
        let m = model().with_parameter("Odd", WaveformSpec::of_kind("bogus"));
        assert!(validate_device_model(&m).is_ok());
    }

    #[test]
    fn test_empty_parameters_rejected() {
        let m = DeviceModel::new("device1", ParameterMap::new());
        assert!(matches!(validate_device_model(&m), Err(SimError::Config { .. })));
    }

    #[test]
    fn test_topic_characters_rejected() {
        let m = DeviceModel::new("dev/1", model().parameters);
        assert!(validate_device_model(&m).is_err());

        let m = model().with_parameter("a+b", WaveformSpec::linear(0.0, 1.0));
        assert!(validate_device_model(&m).is_err());
    }

    #[test]
    fn test_non_finite_and_negative_stddev_rejected() {
        let m = model().with_parameter("Nan", WaveformSpec::linear(f64::NAN, 1.0));
        assert!(validate_device_model(&m).is_err());

        let m = model().with_parameter("Neg", WaveformSpec::noise(0.0, -1.0));
        let err = validate_device_model(&m).unwrap_err();
        assert!(err.to_string().contains("stddev"));
    }
}
