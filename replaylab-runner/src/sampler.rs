//! Parameter space and seeded sampler for walk-forward trials.
//!
//! Each numeric parameter has an inclusive `[min, max]` range, optionally
//! snapped to a `step` grid or to integers. Sampled values are layered over a
//! base `ParameterSet`, so fixed settings (partial schedule, flags) pass
//! through untouched.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use replaylab_core::domain::ParameterSet;
use replaylab_core::CoreError;

/// Range for a numeric parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub integer: bool,
}

impl ParamRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            step: None,
            integer: false,
        }
    }

    pub fn integer(min: f64, max: f64) -> Self {
        Self {
            integer: true,
            ..Self::new(min, max)
        }
    }

    pub fn stepped(min: f64, max: f64, step: f64) -> Self {
        Self {
            step: Some(step),
            ..Self::new(min, max)
        }
    }

    fn validate(&self, name: &str) -> Result<(), CoreError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min <= self.max) {
            return Err(CoreError::invalid_param(
                name,
                format!("range must be finite with min <= max, got [{}, {}]", self.min, self.max),
            ));
        }
        if let Some(step) = self.step {
            if !(step.is_finite() && step > 0.0) {
                return Err(CoreError::invalid_param(name, format!("step must be > 0, got {step}")));
            }
        }
        if self.integer && self.min.ceil() > self.max.floor() {
            return Err(CoreError::invalid_param(
                name,
                format!("no integer in [{}, {}]", self.min, self.max),
            ));
        }
        Ok(())
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let value = match self.step {
            Some(step) => {
                let slots = ((self.max - self.min) / step + 1e-9).floor() as u64;
                self.min + rng.gen_range(0..=slots) as f64 * step
            }
            None if self.integer => {
                let lo = self.min.ceil() as i64;
                let hi = self.max.floor() as i64;
                rng.gen_range(lo..=hi) as f64
            }
            None => rng.gen_range(self.min..=self.max),
        };
        if self.integer {
            value.round().clamp(self.min.ceil(), self.max.floor())
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Named ranges to search over. Ordered so sampling is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpace {
    ranges: BTreeMap<String, ParamRange>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.ranges.insert(name.into(), range);
        self
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamRange> {
        self.ranges.get(name)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, range) in &self.ranges {
            range.validate(name)?;
        }
        Ok(())
    }

    /// Draw one value per range and layer them over `base`.
    pub fn sample<R: Rng>(&self, rng: &mut R, base: &ParameterSet) -> ParameterSet {
        let mut params = base.clone();
        for (name, range) in &self.ranges {
            params.insert(name.clone(), range.sample(rng));
        }
        params
    }
}
