use dashmap::DashMap;
use eyre::Result;
use ndarray::Array1;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::structs::parameters::Parameters;

/// The function being minimized
///
/// Implementors describe their parameter space through [Parameters] and map a point of
/// that space to a scalar cost. The engine assumes the function is deterministic for a
/// given point within one run.
pub trait CostFunction: Sync {
    fn parameters(&self) -> &Parameters;

    fn dimension(&self) -> usize {
        self.parameters().len()
    }

    fn evaluate(&self, point: &Array1<f64>) -> Result<f64>;
}

impl<C: CostFunction + ?Sized> CostFunction for &C {
    fn parameters(&self) -> &Parameters {
        (**self).parameters()
    }

    fn evaluate(&self, point: &Array1<f64>) -> Result<f64> {
        (**self).evaluate(point)
    }
}

impl<C: CostFunction + ?Sized + Send> CostFunction for Box<C> {
    fn parameters(&self) -> &Parameters {
        (**self).parameters()
    }

    fn evaluate(&self, point: &Array1<f64>) -> Result<f64> {
        (**self).evaluate(point)
    }
}

/// Wraps a plain closure into a [CostFunction]
pub struct FnCost<F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    parameters: Parameters,
    func: F,
}

impl<F> FnCost<F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    pub fn new(parameters: Parameters, func: F) -> Self {
        Self { parameters, func }
    }
}

impl<F> CostFunction for FnCost<F>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn evaluate(&self, point: &Array1<f64>) -> Result<f64> {
        Ok((self.func)(point))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PointKey(Vec<u64>);

impl PointKey {
    fn new(point: &Array1<f64>) -> Self {
        PointKey(point.iter().map(|v| v.to_bits()).collect())
    }
}

/// Memoizes the evaluations of another cost function
///
/// Points are keyed by the exact bit pattern of their coordinates. The cache belongs to
/// the wrapper, so independent runs never share entries.
pub struct CachedCost<C: CostFunction> {
    inner: C,
    cache: DashMap<PointKey, f64>,
    hits: AtomicUsize,
}

impl<C: CostFunction> CachedCost<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            hits: AtomicUsize::new(0),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: CostFunction> CostFunction for CachedCost<C> {
    fn parameters(&self) -> &Parameters {
        self.inner.parameters()
    }

    fn evaluate(&self, point: &Array1<f64>) -> Result<f64> {
        let key = PointKey::new(point);
        if let Some(cost) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(*cost);
        }
        let cost = self.inner.evaluate(point)?;
        self.cache.insert(key, cost);
        Ok(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fn_cost() {
        let params = Parameters::new().add("x", 1.0, -2.0, 2.0);
        let cost = FnCost::new(params, |x: &Array1<f64>| x[0] * x[0]);
        assert_eq!(cost.dimension(), 1);
        assert_eq!(cost.evaluate(&array![3.0]).unwrap(), 9.0);
    }

    #[test]
    fn test_cached_cost_counts_hits() {
        let params = Parameters::new().add("x", 1.0, -2.0, 2.0);
        let calls = AtomicUsize::new(0);
        let cost = CachedCost::new(FnCost::new(params, |x: &Array1<f64>| {
            calls.fetch_add(1, Ordering::Relaxed);
            x[0] + 1.0
        }));
        assert_eq!(cost.evaluate(&array![1.0]).unwrap(), 2.0);
        assert_eq!(cost.evaluate(&array![1.0]).unwrap(), 2.0);
        assert_eq!(cost.evaluate(&array![-0.0]).unwrap(), 1.0);
        assert_eq!(cost.hits(), 1);
        assert_eq!(cost.len(), 2);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }
}
