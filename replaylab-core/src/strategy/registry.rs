//! Strategy registry
//!
//! Factory for building strategy adapters by name from a `ParameterSet`.
//! Strategies are selected by configuration, never by inheritance.

use std::collections::BTreeMap;

use crate::domain::ParameterSet;
use crate::error::CoreError;

use super::{DonchianBreakout, HtfTrend, StrategyAdapter};

type Constructor =
    Box<dyn Fn(&ParameterSet) -> Result<Box<dyn StrategyAdapter>, CoreError> + Send + Sync>;

pub struct StrategyRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every built-in adapter.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(HtfTrend::NAME, |p| {
            Ok(Box::new(HtfTrend::from_params(p)?) as Box<dyn StrategyAdapter>)
        });
        registry.register(DonchianBreakout::NAME, |p| {
            Ok(Box::new(DonchianBreakout::from_params(p)?) as Box<dyn StrategyAdapter>)
        });
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ParameterSet) -> Result<Box<dyn StrategyAdapter>, CoreError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Build a fresh adapter. Unknown names are rejected.
    pub fn create(
        &self,
        name: &str,
        params: &ParameterSet,
    ) -> Result<Box<dyn StrategyAdapter>, CoreError> {
        let ctor = self.constructors.get(name).ok_or_else(|| {
            CoreError::invalid_param(
                "strategy",
                format!("unknown strategy '{name}' (known: {})", self.names().join(", ")),
            )
        })?;
        ctor(params)
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(|s| s.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
