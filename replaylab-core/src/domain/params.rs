//! ParameterSet: flat name → value mapping shared by strategies and the risk manager.
//!
//! Absent keys fall back to the caller's default. Present keys with the wrong
//! shape are rejected with `CoreError::InvalidParameter`, never defaulted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    /// Ordered (R-multiple, fraction) pairs.
    Pairs(Vec<(f64, f64)>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(x) => write!(f, "{x}"),
            ParamValue::Pairs(pairs) => {
                f.write_str("[")?;
                for (i, (m, frac)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({m}, {frac})")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<(f64, f64)>> for ParamValue {
    fn from(v: Vec<(f64, f64)>) -> Self {
        ParamValue::Pairs(v)
    }
}

/// Immutable-per-trial parameter mapping. Ordered so hashing and printing
/// are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    /// `self` overlaid with every entry of `overrides`.
    pub fn merged(&self, overrides: &ParameterSet) -> ParameterSet {
        let mut out = self.clone();
        for (k, v) in overrides.iter() {
            out.values.insert(k.clone(), v.clone());
        }
        out
    }

    // ── Typed accessors ──

    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, CoreError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Number(x)) if x.is_finite() => Ok(Some(*x)),
            Some(other) => Err(CoreError::invalid_param(
                name,
                format!("expected a finite number, got {other}"),
            )),
        }
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, CoreError> {
        Ok(self.opt_f64(name)?.unwrap_or(default))
    }

    pub fn opt_usize(&self, name: &str) -> Result<Option<usize>, CoreError> {
        match self.opt_f64(name)? {
            None => Ok(None),
            Some(x) if x >= 0.0 && x.fract() == 0.0 && x <= u32::MAX as f64 => {
                Ok(Some(x as usize))
            }
            Some(x) => Err(CoreError::invalid_param(
                name,
                format!("expected a non-negative integer, got {x}"),
            )),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, CoreError> {
        Ok(self.opt_usize(name)?.unwrap_or(default))
    }

    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, CoreError> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(other) => Err(CoreError::invalid_param(
                name,
                format!("expected a boolean, got {other}"),
            )),
        }
    }

    pub fn pairs_or(&self, name: &str, default: &[(f64, f64)]) -> Result<Vec<(f64, f64)>, CoreError> {
        match self.values.get(name) {
            None => Ok(default.to_vec()),
            Some(ParamValue::Pairs(p)) => Ok(p.clone()),
            Some(other) => Err(CoreError::invalid_param(
                name,
                format!("expected a list of (multiple, fraction) pairs, got {other}"),
            )),
        }
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
