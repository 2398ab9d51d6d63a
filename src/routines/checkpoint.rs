use ndarray::Array1;
use serde_derive::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::SimplexError;
use crate::structs::vertex::{Vertex, VertexSet};

/// Version written into every checkpoint, bumped whenever the layout changes
pub const CHECKPOINT_VERSION: u32 = 1;

/// A vertex as stored in a checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVertex {
    pub point: Vec<f64>,
    /// Non-finite costs are stored as `null` and evaluated again on resume
    pub cost: Option<f64>,
}

/// Persisted engine state: the simplex and the iteration counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub version: u32,
    pub iteration: usize,
    pub saved_at: String,
    pub vertices: Vec<StoredVertex>,
}

impl CheckpointState {
    pub fn capture(vertices: &VertexSet, iteration: usize) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            iteration,
            saved_at: chrono::Utc::now().to_rfc3339(),
            vertices: vertices
                .iter()
                .map(|v| StoredVertex {
                    point: v.point().to_vec(),
                    cost: v.cost().filter(|c| c.is_finite()),
                })
                .collect(),
        }
    }

    pub fn vertex_set(&self) -> VertexSet {
        VertexSet::new(
            self.vertices
                .iter()
                .map(|stored| {
                    let point = Array1::from(stored.point.clone());
                    match stored.cost {
                        Some(cost) => Vertex::scored(point, cost),
                        None => Vertex::new(point),
                    }
                })
                .collect(),
        )
    }

    pub fn encode(&self) -> Result<Vec<u8>, SimplexError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| SimplexError::Checkpoint(format!("unable to encode state: {}", e)))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SimplexError> {
        let state: CheckpointState = serde_json::from_slice(bytes)
            .map_err(|e| SimplexError::Checkpoint(format!("unable to decode state: {}", e)))?;
        if state.version != CHECKPOINT_VERSION {
            return Err(SimplexError::Checkpoint(format!(
                "unsupported checkpoint version {} (expected {})",
                state.version, CHECKPOINT_VERSION
            )));
        }
        Ok(state)
    }

    /// Check that the stored simplex fits a problem of the given dimension
    pub fn check_shape(&self, dimension: usize) -> Result<(), SimplexError> {
        if self.vertices.len() != dimension + 1 {
            return Err(SimplexError::invalid(format!(
                "checkpoint holds {} vertices, a {}-dimensional simplex needs {}",
                self.vertices.len(),
                dimension,
                dimension + 1
            )));
        }
        if let Some(v) = self.vertices.iter().find(|v| v.point.len() != dimension) {
            return Err(SimplexError::invalid(format!(
                "checkpoint vertex has {} coordinates, expected {}",
                v.point.len(),
                dimension
            )));
        }
        Ok(())
    }
}

/// Opaque storage for [CheckpointState]
///
/// `restore` returns `Ok(None)` when nothing was saved yet.
pub trait Checkpoint: Send {
    fn save(&mut self, state: &CheckpointState) -> Result<(), SimplexError>;
    fn restore(&mut self) -> Result<Option<CheckpointState>, SimplexError>;
}

/// Discards every state, runs always start fresh
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    fn save(&mut self, _state: &CheckpointState) -> Result<(), SimplexError> {
        Ok(())
    }

    fn restore(&mut self) -> Result<Option<CheckpointState>, SimplexError> {
        Ok(None)
    }
}

/// Keeps the encoded state in memory, clones share the same slot
#[derive(Debug, Default, Clone)]
pub struct MemoryCheckpoint {
    slot: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_none()).unwrap_or(true)
    }
}

impl Checkpoint for MemoryCheckpoint {
    fn save(&mut self, state: &CheckpointState) -> Result<(), SimplexError> {
        let bytes = state.encode()?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SimplexError::Checkpoint("checkpoint slot is poisoned".into()))?;
        *slot = Some(bytes);
        Ok(())
    }

    fn restore(&mut self) -> Result<Option<CheckpointState>, SimplexError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| SimplexError::Checkpoint("checkpoint slot is poisoned".into()))?;
        slot.as_deref().map(CheckpointState::decode).transpose()
    }
}

/// Stores the state as JSON in a file
///
/// The state is written to a temporary sibling first and then renamed over the target,
/// so an interrupted save leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the stored state, if any
    pub fn remove(&self) -> Result<(), SimplexError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                SimplexError::Checkpoint(format!("unable to remove {:?}: {}", self.path, e))
            })?;
        }
        Ok(())
    }
}

impl Checkpoint for FileCheckpoint {
    fn save(&mut self, state: &CheckpointState) -> Result<(), SimplexError> {
        let io = |e: std::io::Error| {
            SimplexError::Checkpoint(format!("unable to write {:?}: {}", self.path, e))
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent).map_err(io)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, state.encode()?).map_err(io)?;
        fs::rename(&tmp, &self.path).map_err(io)?;
        Ok(())
    }

    fn restore(&mut self) -> Result<Option<CheckpointState>, SimplexError> {
        if !self.path.exists() {
            return Ok(None);
        }
        tracing::info!("Loading checkpoint from {:?}", self.path);
        let bytes = fs::read(&self.path).map_err(|e| {
            SimplexError::Checkpoint(format!("unable to read {:?}: {}", self.path, e))
        })?;
        CheckpointState::decode(&bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn state() -> CheckpointState {
        let set = VertexSet::new(vec![
            Vertex::scored(array![0.1, 0.2], 1.0 / 3.0),
            Vertex::scored(array![1e-300, -7.25], f64::INFINITY),
            Vertex::new(array![std::f64::consts::PI, 2.0]),
        ]);
        CheckpointState::capture(&set, 7)
    }

    #[test]
    fn test_encode_decode() {
        let original = state();
        let decoded = CheckpointState::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.vertices[1].cost, None);
        assert_eq!(decoded.vertices[0].cost.unwrap().to_bits(), (1.0f64 / 3.0).to_bits());
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let mut original = state();
        original.version = CHECKPOINT_VERSION + 1;
        let bytes = serde_json::to_vec(&original).unwrap();
        assert!(matches!(
            CheckpointState::decode(&bytes),
            Err(SimplexError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_check_shape() {
        let s = state();
        assert!(s.check_shape(2).is_ok());
        assert!(s.check_shape(3).is_err());
    }

    #[test]
    fn test_memory_checkpoint() {
        let mut checkpoint = MemoryCheckpoint::new();
        assert!(checkpoint.restore().unwrap().is_none());
        let original = state();
        checkpoint.save(&original).unwrap();
        let shared = checkpoint.clone();
        assert!(!shared.is_empty());
        assert_eq!(checkpoint.restore().unwrap(), Some(original));
    }
}
