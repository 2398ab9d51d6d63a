//! Bounded Nelder-Mead simplex optimizer
//!
//! The [Simplex](algorithms::simplex::Simplex) engine minimizes a
//! [CostFunction](cost::CostFunction) over a box of [Parameters](structs::parameters::Parameters).
//! Evaluations go through an [Evaluator](algorithms::evaluator::Evaluator): serially, on a
//! rayon pool, or dispatched to workers by a [Coordinator](algorithms::parallel::Coordinator).
//! Engine state can be checkpointed after every iteration and restored on the next run.

/// Provides the engine, the evaluators and the message-passing coordinator
pub mod algorithms;
/// The cost function boundary
pub mod cost;
/// Entry points for running the optimizer from [Settings](routines::settings::Settings)
pub mod entrypoints;
/// Error type of the library
pub mod error;
/// Checkpoints, logging, output and settings
pub mod routines;
/// Value types of the simplex
pub mod structs;

pub use crate::entrypoints::fit;

/// A collection of commonly used items
pub mod prelude {
    pub use crate::algorithms::evaluator::{
        Evaluator, RayonEvaluator, Request, Role, SerialEvaluator, Tag,
    };
    pub use crate::algorithms::parallel::{Coordinator, ThreadTransport, Transport};
    pub use crate::algorithms::simplex::{InformationHandle, Simplex, CHECKBOUNDARY};
    pub use crate::algorithms::{Move, Status};
    pub use crate::cost::{CachedCost, CostFunction, FnCost};
    pub use crate::entrypoints::{engine, fit, fit_with};
    pub use crate::error::SimplexError;
    pub use crate::routines::checkpoint::{
        Checkpoint, CheckpointState, FileCheckpoint, MemoryCheckpoint, NoCheckpoint,
    };
    pub use crate::routines::logger;
    pub use crate::routines::output::{IterationLog, SimplexResult};
    pub use crate::routines::settings::{self, Evaluation, Settings};
    pub use crate::structs::meta::MetaParameters;
    pub use crate::structs::parameters::{Parameter, Parameters};
    pub use crate::structs::vertex::{Vertex, VertexSet};
}
