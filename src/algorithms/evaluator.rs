use ndarray::Array1;
use rayon::prelude::*;
use std::fmt;

use crate::cost::CostFunction;
use crate::error::SimplexError;

/// What an evaluated point stands for within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A vertex of the simplex, by index
    Vertex(usize),
    Centroid,
    Reflection,
    Expansion,
    Contraction,
    /// A shrunk vertex, by the index of its source vertex
    Shrink(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Vertex(i) => write!(f, "vertex {}", i),
            Role::Centroid => write!(f, "centroid"),
            Role::Reflection => write!(f, "reflection"),
            Role::Expansion => write!(f, "expansion"),
            Role::Contraction => write!(f, "contraction"),
            Role::Shrink(i) => write!(f, "shrink {}", i),
        }
    }
}

/// Identifies an evaluation request, unique within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub iteration: usize,
    pub role: Role,
}

impl Tag {
    pub fn new(iteration: usize, role: Role) -> Self {
        Self { iteration, role }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of iteration {}", self.role, self.iteration)
    }
}

/// A point to evaluate, with the tag its answer must carry
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub tag: Tag,
    pub point: Array1<f64>,
}

impl Request {
    pub fn new(tag: Tag, point: Array1<f64>) -> Self {
        Self { tag, point }
    }
}

/// Evaluates batches of points for the engine
///
/// The returned costs follow the order of the batch. An implementation must either
/// return a cost for every request or fail, partial results are never handed back.
pub trait Evaluator {
    fn evaluate(&mut self, batch: &[Request]) -> Result<Vec<f64>, SimplexError>;
}

pub(crate) fn evaluate_one<C: CostFunction + ?Sized>(
    cost: &C,
    point: &Array1<f64>,
) -> Result<f64, SimplexError> {
    cost.evaluate(point)
        .map_err(|e| SimplexError::Evaluation {
            point: point.to_vec(),
            reason: e.to_string(),
        })
}

/// Evaluates one point after the other on the calling thread
pub struct SerialEvaluator<C: CostFunction> {
    cost: C,
}

impl<C: CostFunction> SerialEvaluator<C> {
    pub fn new(cost: C) -> Self {
        Self { cost }
    }
}

impl<C: CostFunction> Evaluator for SerialEvaluator<C> {
    fn evaluate(&mut self, batch: &[Request]) -> Result<Vec<f64>, SimplexError> {
        batch
            .iter()
            .map(|request| evaluate_one(&self.cost, &request.point))
            .collect()
    }
}

/// Evaluates a batch on a rayon thread pool
///
/// Uses the global pool unless a thread count is given.
pub struct RayonEvaluator<C: CostFunction> {
    cost: C,
    pool: Option<rayon::ThreadPool>,
}

impl<C: CostFunction> RayonEvaluator<C> {
    pub fn new(cost: C) -> Self {
        Self { cost, pool: None }
    }

    pub fn with_threads(cost: C, threads: usize) -> Result<Self, SimplexError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SimplexError::invalid(format!("unable to build thread pool: {}", e)))?;
        Ok(Self {
            cost,
            pool: Some(pool),
        })
    }

    fn evaluate_parallel(&self, batch: &[Request]) -> Result<Vec<f64>, SimplexError> {
        batch
            .par_iter()
            .map(|request| evaluate_one(&self.cost, &request.point))
            .collect()
    }
}

impl<C: CostFunction> Evaluator for RayonEvaluator<C> {
    fn evaluate(&mut self, batch: &[Request]) -> Result<Vec<f64>, SimplexError> {
        match &self.pool {
            Some(pool) => pool.install(|| self.evaluate_parallel(batch)),
            None => self.evaluate_parallel(batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::FnCost;
    use crate::structs::parameters::Parameters;
    use ndarray::array;

    fn batch() -> Vec<Request> {
        (0..6)
            .map(|i| Request::new(Tag::new(1, Role::Vertex(i)), array![i as f64, 1.0]))
            .collect()
    }

    #[test]
    fn test_serial_and_rayon_agree() {
        let params = Parameters::new()
            .add("x", 0.0, -10.0, 10.0)
            .add("y", 0.0, -10.0, 10.0);
        let cost = FnCost::new(params, |x: &Array1<f64>| x[0].powi(2) + x[1]);
        let serial = SerialEvaluator::new(&cost).evaluate(&batch()).unwrap();
        let parallel = RayonEvaluator::with_threads(&cost, 3)
            .unwrap()
            .evaluate(&batch())
            .unwrap();
        assert_eq!(serial, vec![1.0, 2.0, 5.0, 10.0, 17.0, 26.0]);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_tag_display() {
        let tag = Tag::new(4, Role::Shrink(2));
        assert_eq!(tag.to_string(), "shrink 2 of iteration 4");
    }
}
