use serde_derive::{Deserialize, Serialize};

pub mod evaluator;
pub mod parallel;
pub mod simplex;

/// Represents the status of the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Engine is starting up
    Starting,
    /// Engine is currently iterating
    InProgress,
    /// Engine stopped after exhausting the iteration budget
    MaxIterations,
    /// Engine stopped because the `checkboundary` flag was raised, with its message
    Aborted(String),
    /// Engine stopped because the stop file appeared
    ManualStop,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Starting => write!(f, "Starting"),
            Status::InProgress => write!(f, "In progress"),
            Status::MaxIterations => write!(f, "Maximum iterations reached"),
            Status::Aborted(reason) => write!(f, "Aborted: {}", reason),
            Status::ManualStop => write!(f, "Manual stop requested"),
        }
    }
}

/// The transformation applied during one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    /// The expansion point replaced the worst vertex
    Expand,
    /// The reflection beat the best vertex and was kept over the expansion
    Reflect,
    /// The reflection beat the second worst vertex
    ReflectAccept,
    /// The contraction point replaced the worst vertex
    Contract,
    /// Every vertex but the best moved towards the best
    Shrink,
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Move::Expand => "expand",
            Move::Reflect => "reflect",
            Move::ReflectAccept => "reflect-accept",
            Move::Contract => "contract",
            Move::Shrink => "shrink",
        };
        write!(f, "{}", tag)
    }
}
