use dashmap::DashMap;
use ndarray::Array1;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::algorithms::evaluator::{Evaluator, Request, Role, SerialEvaluator, Tag};
use crate::algorithms::{Move, Status};
use crate::cost::CostFunction;
use crate::error::SimplexError;
use crate::routines::checkpoint::{Checkpoint, CheckpointState, NoCheckpoint};
use crate::routines::output::{IterationLog, IterationRecord, ProgressWriter, SimplexResult};
use crate::structs::meta::{Coefficients, MetaParameters};
use crate::structs::parameters::Parameters;
use crate::structs::vertex::{Vertex, VertexSet};

/// Key of the additional information entry that aborts a run when non-empty
pub const CHECKBOUNDARY: &str = "checkboundary";

/// `M + alpha (M - W)`
pub fn reflect(centroid: &Array1<f64>, worst: &Array1<f64>, alpha: f64) -> Array1<f64> {
    centroid + &((centroid - worst) * alpha)
}

/// `R + gamma (R - M)`
pub fn expand(reflection: &Array1<f64>, centroid: &Array1<f64>, gamma: f64) -> Array1<f64> {
    reflection + &((reflection - centroid) * gamma)
}

/// `M + beta (P - M)`
pub fn contract(centroid: &Array1<f64>, pivot: &Array1<f64>, beta: f64) -> Array1<f64> {
    centroid + &((pivot - centroid) * beta)
}

/// `tau B + (1 - tau) A`
pub fn shrink(best: &Array1<f64>, vertex: &Array1<f64>, tau: f64) -> Array1<f64> {
    best * tau + &(vertex * (1.0 - tau))
}

/// Starting simplex: the starting point, then one vertex per dimension offset by its step
pub fn initial_vertices(parameters: &Parameters, step_size: &[f64]) -> VertexSet {
    let start = Array1::from(parameters.starts());
    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(Vertex::new(start.clone()));
    for (i, step) in step_size.iter().enumerate() {
        let mut point = start.clone();
        point[i] += step;
        vertices.push(Vertex::new(point));
    }
    VertexSet::new(vertices)
}

/// Shared view on the additional information of an engine
///
/// Cloning the handle is cheap. Setting [CHECKBOUNDARY] to a non-empty value from any
/// thread stops the engine before its next iteration.
#[derive(Debug, Clone, Default)]
pub struct InformationHandle {
    map: Arc<DashMap<String, String>>,
}

impl InformationHandle {
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|value| value.clone())
    }

    /// Raise the abort flag with a message
    pub fn abort(&self, reason: impl Into<String>) {
        self.set(CHECKBOUNDARY, reason);
    }
}

/// Everything the engine mutates while iterating
#[derive(Debug, Clone)]
pub struct EngineState {
    pub vertices: VertexSet,
    pub iteration: usize,
    pub stopping_iteration: usize,
    pub function_name: String,
    pub evaluations: usize,
    pub step_size: Vec<f64>,
    pub status: Status,
    information: InformationHandle,
}

impl EngineState {
    fn new(stopping_iteration: usize) -> Self {
        let information = InformationHandle::default();
        information.set(CHECKBOUNDARY, "");
        Self {
            vertices: VertexSet::new(Vec::new()),
            iteration: 0,
            stopping_iteration,
            function_name: "function".to_string(),
            evaluations: 0,
            step_size: Vec::new(),
            status: Status::Starting,
            information,
        }
    }

    pub fn additional_information(&self, key: &str) -> Option<String> {
        self.information.get(key)
    }

    /// Message of the abort flag, if raised
    pub fn abort_requested(&self) -> Option<String> {
        self.information
            .get(CHECKBOUNDARY)
            .filter(|reason| !reason.is_empty())
    }
}

/// Bounded Nelder-Mead simplex engine
///
/// Each engine owns its state, independent runs can proceed concurrently on separate
/// engines.
pub struct Simplex {
    state: EngineState,
    meta: MetaParameters,
    step_size: Option<Vec<f64>>,
    checkpoint: Box<dyn Checkpoint>,
    progress: Option<ProgressWriter>,
    speculative: bool,
    stop_file: Option<PathBuf>,
    log: IterationLog,
}

impl Simplex {
    pub fn new(stopping_iteration: usize) -> Self {
        Self {
            state: EngineState::new(stopping_iteration),
            meta: MetaParameters::default(),
            step_size: None,
            checkpoint: Box::new(NoCheckpoint),
            progress: None,
            speculative: false,
            stop_file: None,
            log: IterationLog::new(),
        }
    }

    /// Override the automatic step sizes used to build the starting simplex
    pub fn set_step_size(&mut self, step_size: Vec<f64>) {
        self.step_size = Some(step_size);
    }

    pub fn set_meta_parameter(&mut self, name: impl Into<String>, value: f64) {
        self.meta.set(name, value);
    }

    pub fn set_meta_parameters(&mut self, meta: MetaParameters) {
        self.meta = meta;
    }

    pub fn meta_parameter(&self, name: &str) -> Result<f64, SimplexError> {
        self.meta.get(name)
    }

    pub fn meta_parameters(&self) -> &MetaParameters {
        &self.meta
    }

    pub fn set_stopping_iteration(&mut self, stopping_iteration: usize) {
        self.state.stopping_iteration = stopping_iteration;
    }

    pub fn set_function_name(&mut self, name: impl Into<String>) {
        self.state.function_name = name.into();
    }

    pub fn function_name(&self) -> &str {
        &self.state.function_name
    }

    pub fn set_additional_information(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state.information.set(key, value);
    }

    pub fn additional_information(&self, key: &str) -> Option<String> {
        self.state.additional_information(key)
    }

    /// Handle that stays valid while [Simplex::run] borrows the engine
    pub fn information_handle(&self) -> InformationHandle {
        self.state.information.clone()
    }

    pub fn set_checkpoint(&mut self, checkpoint: impl Checkpoint + 'static) {
        self.checkpoint = Box::new(checkpoint);
    }

    pub fn set_progress(&mut self, progress: ProgressWriter) {
        self.progress = Some(progress);
    }

    /// Evaluate the expansion point together with the reflection
    pub fn set_speculative(&mut self, speculative: bool) {
        self.speculative = speculative;
    }

    /// The run stops before the next iteration once this file exists
    pub fn set_stop_file(&mut self, path: impl AsRef<Path>) {
        self.stop_file = Some(path.as_ref().to_path_buf());
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Minimize `cost`, evaluating on the calling thread
    pub fn run<C: CostFunction>(&mut self, cost: &C) -> Result<SimplexResult, SimplexError> {
        let mut evaluator = SerialEvaluator::new(cost);
        self.run_with(cost.parameters(), &mut evaluator)
    }

    /// Minimize over `parameters`, delegating every evaluation to `evaluator`
    pub fn run_with(
        &mut self,
        parameters: &Parameters,
        evaluator: &mut dyn Evaluator,
    ) -> Result<SimplexResult, SimplexError> {
        let coefficients = self.meta.coefficients()?;
        if !coefficients.conventional() {
            tracing::warn!(
                "Unconventional meta-parameters: alpha={}, beta={}, gamma={}, tau={}",
                coefficients.alpha,
                coefficients.beta,
                coefficients.gamma,
                coefficients.tau
            );
        }
        self.initialize(parameters)?;
        self.state.status = Status::InProgress;
        tracing::info!(
            "Start. Current iteration = {} of {}",
            self.state.iteration,
            self.state.stopping_iteration
        );

        let status = loop {
            if let Some(status) = self.check_stopping_condition() {
                break status;
            }
            let coefficients = self.meta.coefficients()?;
            let span = tracing::info_span!("", "{}", format!("Iteration {}", self.state.iteration));
            let _enter = span.enter();
            let step = self.cycle(parameters, evaluator, &coefficients)?;
            self.record(step);
            self.save_checkpoint();
        };

        self.finish(parameters, evaluator, status)
    }

    fn initialize(&mut self, parameters: &Parameters) -> Result<(), SimplexError> {
        parameters.validate()?;
        let n = parameters.len();
        let step_size = match &self.step_size {
            Some(steps) if steps.len() != n => {
                return Err(SimplexError::invalid(format!(
                    "{} step sizes given for {} parameters",
                    steps.len(),
                    n
                )))
            }
            Some(steps) if steps.iter().any(|s| !s.is_finite()) => {
                return Err(SimplexError::invalid("step sizes must be finite"))
            }
            Some(steps) => steps.clone(),
            None => parameters.iter().map(|p| p.auto_step()).collect(),
        };

        if let Some(path) = &self.stop_file {
            if path.exists() {
                tracing::info!("Removing existing stop file prior to run");
                fs::remove_file(path).map_err(|e| {
                    SimplexError::invalid(format!(
                        "unable to remove previous stop file {:?}: {}",
                        path, e
                    ))
                })?;
            }
        }

        let (mut vertices, iteration) = match self.checkpoint.restore()? {
            Some(saved) => {
                saved.check_shape(n)?;
                tracing::info!(
                    "Resuming from checkpoint saved at {} (iteration {})",
                    saved.saved_at,
                    saved.iteration
                );
                (saved.vertex_set(), saved.iteration)
            }
            None => (initial_vertices(parameters, &step_size), 0),
        };
        let moved = vertices.clamp(parameters);
        if moved > 0 {
            tracing::debug!("{} vertices moved onto the bounds", moved);
        }

        self.state.vertices = vertices;
        self.state.iteration = iteration;
        self.state.evaluations = 0;
        self.state.step_size = step_size;
        self.log = IterationLog::new();
        Ok(())
    }

    /// Advance the counter, or tell why the run has to stop
    ///
    /// The budget is checked first. A raised flag stops the run without advancing.
    fn check_stopping_condition(&mut self) -> Option<Status> {
        if let Some(reason) = self.state.abort_requested() {
            tracing::info!("{}", reason);
            return Some(Status::Aborted(reason));
        }
        if let Some(path) = &self.stop_file {
            if path.exists() {
                tracing::info!("Stopfile detected - breaking");
                return Some(Status::ManualStop);
            }
        }
        if self.state.iteration >= self.state.stopping_iteration {
            tracing::info!("Maximum number of iterations reached");
            return Some(Status::MaxIterations);
        }
        self.state.iteration += 1;
        None
    }

    fn evaluate(
        &mut self,
        evaluator: &mut dyn Evaluator,
        batch: &[Request],
    ) -> Result<Vec<f64>, SimplexError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let costs = evaluator.evaluate(batch)?;
        if costs.len() != batch.len() {
            return Err(SimplexError::UnexpectedMessage {
                tag: batch[0].tag,
                detail: format!("{} costs returned for {} points", costs.len(), batch.len()),
            });
        }
        self.state.evaluations += batch.len();
        Ok(costs)
    }

    fn evaluate_point(
        &mut self,
        evaluator: &mut dyn Evaluator,
        tag: Tag,
        point: &Array1<f64>,
    ) -> Result<f64, SimplexError> {
        let costs = self.evaluate(evaluator, &[Request::new(tag, point.clone())])?;
        Ok(costs[0])
    }

    /// Score every vertex without a cost as one batch
    fn evaluate_vertices(
        &mut self,
        evaluator: &mut dyn Evaluator,
        iteration: usize,
    ) -> Result<(), SimplexError> {
        let pending = self.state.vertices.unscored();
        let batch: Vec<Request> = pending
            .iter()
            .map(|&i| {
                Request::new(
                    Tag::new(iteration, Role::Vertex(i)),
                    self.state.vertices.vertices()[i].point().clone(),
                )
            })
            .collect();
        let costs = self.evaluate(evaluator, &batch)?;
        for (i, cost) in pending.into_iter().zip(costs) {
            if let Some(vertex) = self.state.vertices.get_mut(i) {
                vertex.set_cost(cost);
            }
        }
        Ok(())
    }

    fn replace_worst(&mut self, mut vertex: Vertex, parameters: &Parameters) {
        if vertex.clamp(parameters) {
            tracing::debug!("Replacement vertex clamped into bounds");
        }
        let worst = self.state.vertices.len() - 1;
        self.state.vertices.replace(worst, vertex);
    }

    fn cycle(
        &mut self,
        parameters: &Parameters,
        evaluator: &mut dyn Evaluator,
        c: &Coefficients,
    ) -> Result<Move, SimplexError> {
        let iteration = self.state.iteration;

        self.evaluate_vertices(evaluator, iteration)?;
        self.state.vertices.sort();
        tracing::debug!(
            "Ordered simplex:\n{}",
            self.state.vertices.table(&parameters.names())
        );
        if let Some(progress) = self.progress.as_mut() {
            if let Err(e) = progress.record_vertices(iteration, &self.state.vertices) {
                tracing::warn!("Unable to write vertex table: {}", e);
            }
        }

        let n = self.state.vertices.len() - 1;
        let centroid = self.state.vertices.centroid(1);
        let worst = self.state.vertices.worst().point().clone();
        let f_best = self.state.vertices.best().rank();
        let f_second_worst = self.state.vertices.second_worst().rank();
        let f_worst = self.state.vertices.worst().rank();

        let reflection = reflect(&centroid, &worst, c.alpha);
        let expansion = expand(&reflection, &centroid, c.gamma);

        let mut batch = vec![
            Request::new(Tag::new(iteration, Role::Centroid), centroid.clone()),
            Request::new(Tag::new(iteration, Role::Reflection), reflection.clone()),
        ];
        if self.speculative {
            batch.push(Request::new(
                Tag::new(iteration, Role::Expansion),
                expansion.clone(),
            ));
        }
        let costs = self.evaluate(evaluator, &batch)?;
        let (f_centroid, f_reflection) = (costs[0], costs[1]);
        tracing::debug!("f(M)={} f(Ar)={}", f_centroid, f_reflection);

        let step = if f_reflection < f_best {
            let f_expansion = match costs.get(2) {
                Some(&f) => f,
                None => {
                    self.evaluate_point(evaluator, Tag::new(iteration, Role::Expansion), &expansion)?
                }
            };
            if f_expansion < f_reflection {
                self.replace_worst(Vertex::scored(expansion, f_expansion), parameters);
                Move::Expand
            } else {
                self.replace_worst(Vertex::scored(reflection, f_reflection), parameters);
                Move::Reflect
            }
        } else if f_reflection < f_second_worst {
            self.replace_worst(Vertex::scored(reflection, f_reflection), parameters);
            Move::ReflectAccept
        } else {
            let pivot = if f_reflection < f_worst {
                &reflection
            } else {
                &worst
            };
            let contraction = contract(&centroid, pivot, c.beta);
            let f_contraction = self.evaluate_point(
                evaluator,
                Tag::new(iteration, Role::Contraction),
                &contraction,
            )?;
            if f_contraction < f_worst {
                self.replace_worst(Vertex::scored(contraction, f_contraction), parameters);
                Move::Contract
            } else {
                self.shrink_all(parameters, evaluator, c.tau, n)?;
                Move::Shrink
            }
        };
        tracing::debug!("Move: {}", step);
        Ok(step)
    }

    /// Move every vertex but the best halfway (for tau = 0.5) towards the best
    fn shrink_all(
        &mut self,
        parameters: &Parameters,
        evaluator: &mut dyn Evaluator,
        tau: f64,
        n: usize,
    ) -> Result<(), SimplexError> {
        let iteration = self.state.iteration;
        let best = self.state.vertices.best().point().clone();
        let batch: Vec<Request> = (1..=n)
            .map(|i| {
                Request::new(
                    Tag::new(iteration, Role::Shrink(i)),
                    shrink(&best, self.state.vertices.vertices()[i].point(), tau),
                )
            })
            .collect();
        let costs = self.evaluate(evaluator, &batch)?;
        for (i, (request, cost)) in (1..=n).zip(batch.into_iter().zip(costs)) {
            let mut vertex = Vertex::scored(request.point, cost);
            vertex.clamp(parameters);
            self.state.vertices.replace(i, vertex);
        }
        Ok(())
    }

    fn record(&mut self, step: Move) {
        let vertices = &self.state.vertices;
        let Some(best) = vertices.lowest() else {
            return;
        };
        let worst_cost = vertices
            .iter()
            .filter_map(|v| v.cost())
            .fold(f64::NEG_INFINITY, f64::max);
        self.log.push(IterationRecord {
            iteration: self.state.iteration,
            step,
            best_cost: best.rank(),
            worst_cost,
            size: vertices.size(),
            best: best.point().to_vec(),
        });
        tracing::info!(
            "Iteration {}: {} f(best)={:.6e} size={:.4e}",
            self.state.iteration,
            step,
            best.rank(),
            vertices.size()
        );
        if let Some(progress) = self.progress.as_mut() {
            if let Err(e) = progress.record_best(self.state.iteration, best) {
                tracing::warn!("Unable to write best vertex: {}", e);
            }
        }
    }

    fn save_checkpoint(&mut self) {
        let state = CheckpointState::capture(&self.state.vertices, self.state.iteration);
        if let Err(e) = self.checkpoint.save(&state) {
            tracing::warn!("Unable to save checkpoint: {}", e);
        }
    }

    fn finish(
        &mut self,
        parameters: &Parameters,
        evaluator: &mut dyn Evaluator,
        status: Status,
    ) -> Result<SimplexResult, SimplexError> {
        // tagged past the last iteration so the final batch never reuses a tag
        self.evaluate_vertices(evaluator, self.state.iteration + 1)?;
        self.state.vertices.sort();
        self.state.status = status.clone();
        let best = self.state.vertices.best();
        tracing::info!(
            "{} after {} iterations and {} evaluations, f(best)={}",
            status,
            self.state.iteration,
            self.state.evaluations,
            best.rank()
        );
        Ok(SimplexResult::new(
            parameters.names(),
            best,
            self.state.iteration,
            self.state.evaluations,
            status,
            std::mem::take(&mut self.log),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::FnCost;
    use crate::structs::meta::ALPHA;
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Keeps every request it forwards
    struct Recording<E> {
        inner: E,
        requests: Vec<Request>,
    }

    impl<E: Evaluator> Evaluator for Recording<E> {
        fn evaluate(&mut self, batch: &[Request]) -> Result<Vec<f64>, SimplexError> {
            self.requests.extend_from_slice(batch);
            self.inner.evaluate(batch)
        }
    }

    /// Keeps every saved state
    #[derive(Clone, Default)]
    struct Snapshots(Arc<Mutex<Vec<CheckpointState>>>);

    impl Checkpoint for Snapshots {
        fn save(&mut self, state: &CheckpointState) -> Result<(), SimplexError> {
            self.0.lock().unwrap().push(state.clone());
            Ok(())
        }

        fn restore(&mut self) -> Result<Option<CheckpointState>, SimplexError> {
            Ok(None)
        }
    }

    fn quadratic() -> FnCost<impl Fn(&Array1<f64>) -> f64 + Sync> {
        let params = Parameters::new()
            .add("x", 5.0, -10.0, 10.0)
            .add("y", 5.0, -10.0, 10.0);
        FnCost::new(params, |p: &Array1<f64>| p[0].powi(2) + p[1].powi(2))
    }

    #[test]
    fn test_reflection() {
        let r = reflect(&array![1.0, 0.0], &array![0.0, 2.0], 1.0);
        assert!((r[0] - 2.0).abs() < 1e-12);
        assert!((r[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_shrink_keeps_vertices_distinct() {
        let best = array![0.0, 0.0];
        let sources = [array![2.0, 0.0], array![0.0, 2.0], array![2.0, 2.0]];
        let shrunk: Vec<Array1<f64>> = sources.iter().map(|v| shrink(&best, v, 0.5)).collect();
        assert_eq!(shrunk[0], array![1.0, 0.0]);
        assert_eq!(shrunk[1], array![0.0, 1.0]);
        assert_eq!(shrunk[2], array![1.0, 1.0]);
    }

    #[test]
    fn test_engine_shrinks_each_vertex_from_its_own_source() {
        let params = Parameters::new()
            .add("x", 1.0, -10.0, 10.0)
            .add("y", 2.0, -10.0, 10.0)
            .add("z", -3.0, -10.0, 10.0);
        let f = |p: &Array1<f64>| {
            (p[0].abs() + 2.0 * p[1].abs() + 3.0 * p[2].abs()).sqrt() + (10.0 * p[0]).sin().abs()
        };
        let cost = FnCost::new(params.clone(), f);
        let snapshots = Snapshots::default();
        let mut engine = Simplex::new(200);
        engine.set_checkpoint(snapshots.clone());
        let mut evaluator = Recording {
            inner: SerialEvaluator::new(&cost),
            requests: Vec::new(),
        };
        let result = engine.run_with(&params, &mut evaluator).unwrap();

        let iteration = result
            .log()
            .records()
            .iter()
            .find(|r| r.step == Move::Shrink)
            .map(|r| r.iteration)
            .expect("the run never shrank");
        assert!(iteration > 1);

        // simplex as the shrinking cycle ordered it
        let states = snapshots.0.lock().unwrap();
        let saved = states.iter().find(|s| s.iteration == iteration - 1).unwrap();
        let mut ordered = saved.vertex_set();
        for i in 0..ordered.len() {
            let vertex = ordered.get_mut(i).unwrap();
            if !vertex.is_scored() {
                let c = f(vertex.point());
                vertex.set_cost(c);
            }
        }
        ordered.sort();

        let shrunk: Vec<&Request> = evaluator
            .requests
            .iter()
            .filter(|r| r.tag.iteration == iteration && matches!(r.tag.role, Role::Shrink(_)))
            .collect();
        assert_eq!(shrunk.len(), 3);
        for request in &shrunk {
            if let Role::Shrink(i) = request.tag.role {
                let expected = shrink(ordered.best().point(), ordered.vertices()[i].point(), 0.5);
                assert_eq!(request.point, expected);
            }
        }
        for (a, request) in shrunk.iter().enumerate() {
            for other in &shrunk[a + 1..] {
                assert_ne!(request.point, other.point);
            }
        }
    }

    #[test]
    fn test_initial_vertices_use_auto_step() {
        let cost = quadratic();
        let set = initial_vertices(cost.parameters(), &[2.5, 2.5]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.vertices()[1].point(), &array![7.5, 5.0]);
        assert_eq!(set.vertices()[2].point(), &array![5.0, 7.5]);
    }

    #[test]
    fn test_zero_budget_returns_initial_best() {
        let cost = quadratic();
        let mut engine = Simplex::new(0);
        let result = engine.run(&cost).unwrap();
        assert_eq!(result.iterations(), 0);
        assert_eq!(result.evaluations(), 3);
        assert_eq!(result.values(), &[5.0, 5.0]);
        assert_eq!(result.cost(), 50.0);
        assert_eq!(result.status(), &Status::MaxIterations);
        assert!(result.log().is_empty());
    }

    #[test]
    fn test_converges_on_quadratic() {
        let cost = quadratic();
        let mut engine = Simplex::new(50);
        let result = engine.run(&cost).unwrap();
        assert_eq!(result.iterations(), 50);
        assert!(result.cost() < 1e-3);
        assert!(result.get("x").unwrap().abs() < 0.05);
        assert!(result.get("y").unwrap().abs() < 0.05);
        assert_eq!(result.log().len(), 50);
    }

    #[test]
    fn test_speculative_takes_the_same_path() {
        let cost = FnCost::new(
            Parameters::new()
                .add("a", 4.0, -5.0, 5.0)
                .add("b", 3.0, -5.0, 5.0),
            |p: &Array1<f64>| (p[0] - 1.0).powi(2) + 3.0 * (p[1] + 2.0).powi(2),
        );
        let plain = Simplex::new(40).run(&cost).unwrap();
        let mut engine = Simplex::new(40);
        engine.set_speculative(true);
        let speculative = engine.run(&cost).unwrap();
        assert_eq!(plain.values(), speculative.values());
        assert_eq!(plain.log(), speculative.log());
        assert!(speculative.evaluations() >= plain.evaluations());
    }

    #[test]
    fn test_minimum_outside_bounds_ends_on_bound() {
        let cost = FnCost::new(
            Parameters::new()
                .add("x", 0.0, -10.0, 10.0)
                .add("y", 1.0, -10.0, 10.0),
            |p: &Array1<f64>| (p[0] + 20.0).powi(2) + p[1].powi(2),
        );
        let result = Simplex::new(80).run(&cost).unwrap();
        assert_eq!(result.get("x"), Some(-10.0));
        assert!((result.cost() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_flag_set_before_run_stops_immediately() {
        let cost = quadratic();
        let mut engine = Simplex::new(50);
        engine.set_additional_information(CHECKBOUNDARY, "out of boundary");
        let result = engine.run(&cost).unwrap();
        assert_eq!(result.iterations(), 0);
        assert_eq!(
            result.status(),
            &Status::Aborted("out of boundary".to_string())
        );
        assert_eq!(result.evaluations(), 3);
    }

    #[test]
    fn test_flag_wins_over_spent_budget() {
        let cost = quadratic();
        let mut engine = Simplex::new(0);
        engine.set_additional_information(CHECKBOUNDARY, "abort");
        let result = engine.run(&cost).unwrap();
        assert_eq!(result.status(), &Status::Aborted("abort".to_string()));
        assert_eq!(result.iterations(), 0);
        assert_eq!(engine.state().iteration, 0);
    }

    #[test]
    fn test_flag_raised_during_run() {
        let mut engine = Simplex::new(1000);
        let handle = engine.information_handle();
        let calls = AtomicUsize::new(0);
        let params = Parameters::new()
            .add("x", 5.0, -10.0, 10.0)
            .add("y", 5.0, -10.0, 10.0);
        let cost = FnCost::new(params, move |p: &Array1<f64>| {
            if calls.fetch_add(1, Ordering::SeqCst) == 20 {
                handle.abort("enough");
            }
            p[0].powi(2) + p[1].powi(2)
        });
        let result = engine.run(&cost).unwrap();
        assert!(matches!(result.status(), Status::Aborted(_)));
        assert!(result.iterations() < 20);
        assert_eq!(engine.state().iteration, result.iterations());
        assert_eq!(&engine.state().status, result.status());
        assert_eq!(result.log().len(), result.iterations());
    }

    #[test]
    fn test_step_size_length_is_checked() {
        let cost = quadratic();
        let mut engine = Simplex::new(5);
        engine.set_step_size(vec![1.0]);
        assert!(matches!(
            engine.run(&cost),
            Err(SimplexError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_missing_meta_parameter() {
        let cost = quadratic();
        let mut engine = Simplex::new(5);
        engine.meta = serde_json::from_str(r#"{"values":{"alpha":1.0}}"#).unwrap();
        engine.set_meta_parameter(ALPHA, 2.0);
        assert_eq!(engine.meta_parameter(ALPHA).unwrap(), 2.0);
        assert!(matches!(
            engine.run(&cost),
            Err(SimplexError::UnknownKey(_))
        ));
    }
}
