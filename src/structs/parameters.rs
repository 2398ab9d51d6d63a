use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::SimplexError;

/// A single free parameter of the cost function
///
/// Holds the starting value of the search together with the closed interval the
/// parameter is allowed to take. Bounds are plain values, there is no aliasing between
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub start: f64,
    pub left: f64,
    pub right: f64,
}

impl Parameter {
    pub fn new(name: impl Into<String>, start: f64, left: f64, right: f64) -> Self {
        Self {
            name: name.into(),
            start,
            left,
            right,
        }
    }

    /// Distance from the starting value to the closest bound, halved
    pub fn auto_step(&self) -> f64 {
        (self.start - self.left).min(self.right - self.start) / 2.0
    }

    /// Clamp a value into `[left, right]`
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.left {
            self.left
        } else if value > self.right {
            self.right
        } else {
            value
        }
    }

    pub fn validate(&self) -> Result<(), SimplexError> {
        if !(self.start.is_finite() && self.left.is_finite() && self.right.is_finite()) {
            return Err(SimplexError::invalid(format!(
                "parameter {} has non-finite start or bounds",
                self.name
            )));
        }
        if self.left > self.right {
            return Err(SimplexError::invalid(format!(
                "parameter {} has left bound {} above right bound {}",
                self.name, self.left, self.right
            )));
        }
        if self.start < self.left || self.start > self.right {
            return Err(SimplexError::invalid(format!(
                "starting value {} of parameter {} lies outside [{}, {}]",
                self.start, self.name, self.left, self.right
            )));
        }
        Ok(())
    }
}

/// Ordered collection of [Parameter]s
///
/// The order defines the coordinate index of each parameter in a vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    parameters: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    /// Append a parameter, builder style
    pub fn add(mut self, name: impl Into<String>, start: f64, left: f64, right: f64) -> Self {
        self.parameters.push(Parameter::new(name, start, left, right));
        self
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn starts(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.start).collect()
    }

    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| (p.left, p.right)).collect()
    }

    /// Check every parameter and the uniqueness of the names
    pub fn validate(&self) -> Result<(), SimplexError> {
        if self.parameters.is_empty() {
            return Err(SimplexError::invalid(
                "the parameter space must have at least one dimension",
            ));
        }
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            parameter.validate()?;
            if !seen.insert(parameter.name.as_str()) {
                return Err(SimplexError::invalid(format!(
                    "parameter name {} is used more than once",
                    parameter.name
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Parameters {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}

impl FromIterator<Parameter> for Parameters {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        Self {
            parameters: iter.into_iter().collect(),
        }
    }
}
