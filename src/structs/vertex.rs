use ndarray::Array1;
use std::cmp::Ordering;
use std::fmt::Write;

use crate::structs::parameters::Parameters;

const COLUMN_WIDTH: usize = 8;

/// A candidate point of the search space and its cost
///
/// The cost is `None` until the point has been evaluated, and is reset whenever the
/// coordinates change.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    point: Array1<f64>,
    cost: Option<f64>,
}

impl Vertex {
    /// Create an unevaluated vertex
    pub fn new(point: Array1<f64>) -> Self {
        Self { point, cost: None }
    }

    pub fn scored(point: Array1<f64>, cost: f64) -> Self {
        Self {
            point,
            cost: Some(cost),
        }
    }

    pub fn point(&self) -> &Array1<f64> {
        &self.point
    }

    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Cost used when comparing vertices, unevaluated and NaN costs rank last
    pub fn rank(&self) -> f64 {
        match self.cost {
            Some(c) if !c.is_nan() => c,
            _ => f64::INFINITY,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.cost.is_some()
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = Some(cost);
    }

    pub fn dimension(&self) -> usize {
        self.point.len()
    }

    /// Clamp every coordinate into its parameter bounds
    ///
    /// Returns `true` if any coordinate moved, in which case the cost is discarded.
    pub fn clamp(&mut self, parameters: &Parameters) -> bool {
        let mut moved = false;
        for (value, parameter) in self.point.iter_mut().zip(parameters.iter()) {
            let clamped = parameter.clamp(*value);
            if clamped != *value {
                *value = clamped;
                moved = true;
            }
        }
        if moved {
            self.cost = None;
        }
        moved
    }

    /// One row of the vertex table, values with two decimals
    pub fn line(&self, label: &str) -> String {
        let mut line = format!("{:>width$}", label, width = COLUMN_WIDTH);
        for value in self.point.iter() {
            let _ = write!(line, "{:>width$.2}", value, width = COLUMN_WIDTH);
        }
        match self.cost {
            Some(cost) => {
                let _ = write!(line, "   f({})={}", label, cost);
            }
            None => {
                let _ = write!(line, "   f({})=unevaluated", label);
            }
        }
        line
    }
}

fn compare_costs(a: &Vertex, b: &Vertex) -> Ordering {
    let key = |v: &Vertex| v.cost.filter(|c| !c.is_nan());
    match (key(a), key(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// The N+1 vertices of the simplex
///
/// The set is not kept ordered, [VertexSet::sort] has to be called explicitly. After
/// sorting, index 0 holds the best vertex and the last index the worst.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexSet {
    vertices: Vec<Vertex>,
}

impl VertexSet {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Dimension of the search space, taken from the first vertex
    pub fn dimension(&self) -> usize {
        self.vertices.first().map(|v| v.dimension()).unwrap_or(0)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn get(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Vertex> {
        self.vertices.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Vertex> {
        self.vertices.iter()
    }

    /// Best vertex, meaningful after [VertexSet::sort]
    pub fn best(&self) -> &Vertex {
        &self.vertices[0]
    }

    /// Worst vertex, meaningful after [VertexSet::sort]
    pub fn worst(&self) -> &Vertex {
        &self.vertices[self.vertices.len() - 1]
    }

    /// Second worst vertex, equal to the best one for a one-dimensional simplex
    pub fn second_worst(&self) -> &Vertex {
        let n = self.vertices.len();
        &self.vertices[n.saturating_sub(2)]
    }

    /// Lowest cost vertex without sorting, the first one wins ties
    pub fn lowest(&self) -> Option<&Vertex> {
        self.vertices.iter().min_by(|a, b| compare_costs(a, b))
    }

    pub fn replace(&mut self, index: usize, vertex: Vertex) {
        self.vertices[index] = vertex;
    }

    /// Stable sort by ascending cost
    pub fn sort(&mut self) {
        self.vertices.sort_by(compare_costs);
    }

    pub fn is_ordered(&self) -> bool {
        self.vertices
            .windows(2)
            .all(|pair| compare_costs(&pair[0], &pair[1]) != Ordering::Greater)
    }

    /// Indices of the vertices that need an evaluation
    pub fn unscored(&self) -> Vec<usize> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_scored())
            .map(|(i, _)| i)
            .collect()
    }

    /// Mean of the first `len - excluded` vertices
    ///
    /// On a sorted set this is the centroid of all but the `excluded` worst vertices.
    pub fn centroid(&self, excluded: usize) -> Array1<f64> {
        let count = self.vertices.len().saturating_sub(excluded).max(1);
        let mut centroid = Array1::<f64>::zeros(self.dimension());
        for vertex in self.vertices.iter().take(count) {
            centroid += vertex.point();
        }
        centroid / count as f64
    }

    /// Average Euclidean distance between the vertices and their centroid
    pub fn size(&self) -> f64 {
        if self.vertices.is_empty() {
            return 0.0;
        }
        let centroid = self.centroid(0);
        let total: f64 = self
            .vertices
            .iter()
            .map(|v| {
                v.point()
                    .iter()
                    .zip(centroid.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .sum();
        total / self.vertices.len() as f64
    }

    /// Clamp every vertex into the bounds, returns how many vertices moved
    pub fn clamp(&mut self, parameters: &Parameters) -> usize {
        self.vertices
            .iter_mut()
            .map(|v| v.clamp(parameters))
            .filter(|moved| *moved)
            .count()
    }

    /// Fixed-width table with a header row of parameter names
    pub fn table(&self, names: &[String]) -> String {
        let mut table = format!("{:>width$}", "", width = COLUMN_WIDTH);
        for name in names {
            let _ = write!(table, "{:>width$}", name, width = COLUMN_WIDTH);
        }
        table.push('\n');
        for (i, vertex) in self.vertices.iter().enumerate() {
            table.push_str(&vertex.line(&format!("A[{}]", i)));
            table.push('\n');
        }
        table
    }
}
