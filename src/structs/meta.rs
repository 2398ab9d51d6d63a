use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SimplexError;

pub const ALPHA: &str = "alpha";
pub const BETA: &str = "beta";
pub const GAMMA: &str = "gamma";
pub const TAU: &str = "tau";

/// Named coefficients of the geometric transformations
///
/// - `alpha`: reflection, defaults to 1.0
/// - `beta`: contraction, defaults to 0.5
/// - `gamma`: expansion, defaults to 1.0
/// - `tau`: shrink, defaults to 0.5
///
/// Values are stored as given, the range is not validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaParameters {
    values: HashMap<String, f64>,
}

impl Default for MetaParameters {
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert(ALPHA.to_string(), 1.0);
        values.insert(BETA.to_string(), 0.5);
        values.insert(GAMMA.to_string(), 1.0);
        values.insert(TAU.to_string(), 0.5);
        Self { values }
    }
}

impl MetaParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<f64, SimplexError> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| SimplexError::UnknownKey(name.to_string()))
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Snapshot of the four canonical coefficients for one iteration
    pub fn coefficients(&self) -> Result<Coefficients, SimplexError> {
        Ok(Coefficients {
            alpha: self.get(ALPHA)?,
            beta: self.get(BETA)?,
            gamma: self.get(GAMMA)?,
            tau: self.get(TAU)?,
        })
    }
}

/// Coefficients read once at the start of a cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub tau: f64,
}

impl Coefficients {
    /// Whether the coefficients lie in the usual ranges: alpha, gamma > 0 and 0 < beta, tau < 1
    pub fn conventional(&self) -> bool {
        self.alpha > 0.0
            && self.gamma > 0.0
            && self.beta > 0.0
            && self.beta < 1.0
            && self.tau > 0.0
            && self.tau < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let meta = MetaParameters::default();
        let c = meta.coefficients().unwrap();
        assert_eq!(c.alpha, 1.0);
        assert_eq!(c.beta, 0.5);
        assert_eq!(c.gamma, 1.0);
        assert_eq!(c.tau, 0.5);
        assert!(c.conventional());
    }

    #[test]
    fn test_unknown_key() {
        let meta = MetaParameters::default();
        match meta.get("delta") {
            Err(SimplexError::UnknownKey(key)) => assert_eq!(key, "delta"),
            other => panic!("expected UnknownKey, got {:?}", other),
        }
    }

    #[test]
    fn test_set_overwrites_without_validation() {
        let mut meta = MetaParameters::default();
        meta.set(ALPHA, -2.0);
        meta.set("custom", 3.0);
        assert_eq!(meta.get(ALPHA).unwrap(), -2.0);
        assert_eq!(meta.get("custom").unwrap(), 3.0);
        assert!(!meta.coefficients().unwrap().conventional());
    }
}
