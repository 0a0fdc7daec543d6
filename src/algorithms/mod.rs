//! Per-voxel correspondence algorithms.
//!
//! Each algorithm answers one question: given one voxel's source fixels and
//! target fixels, which source fixels contribute to each target fixel?
//! Answers use voxel-local source indices; the matching driver translates
//! them to dataset-global indices.
//!
//! Three strategies are provided behind the common `Correspondence` trait:
//!
//! + `Nearest` — threshold-gated nearest neighbour, one source per target
//!   at most. Reproduces legacy one-to-one behaviour.
//!
//! + `Ismrm2018` / `Ni2022` — combinatorial searches minimising a total
//!   per-voxel cost. They share the search engine and differ only in how
//!   the orientation and density terms are weighted.

pub mod nearest;
pub mod combinatorial;

pub use nearest::Nearest;
pub use combinatorial::{CombinatorialParams, PruningPolicy, Ismrm2018, Ni2022};

use crate::{Costf32, Fixel};

/// One voxel's worth of correspondence: for each target fixel, the
/// voxel-local indices of its contributing source fixels, plus the total
/// cost of the chosen assignment where the algorithm computes one.
pub struct VoxelAssignment {
    pub origins: Vec<Vec<u32>>,
    pub cost: Option<Costf32>,
}

impl VoxelAssignment {
    /// The degenerate-but-valid answer for voxels missing fixels on either
    /// side: every target unassigned, no cost computed
    pub fn unassigned(targets: usize) -> Self {
        Self { origins: vec![vec![]; targets], cost: None }
    }
}

/// The strategy contract: a pure function of one voxel's fixels, safe to
/// invoke concurrently on disjoint voxels.
pub trait Correspondence: Sync {

    fn correspond(&self, source: &[Fixel], target: &[Fixel]) -> VoxelAssignment;

    /// Whether this algorithm reports a per-voxel cost worth exporting
    fn exports_cost(&self) -> bool { false }
}
