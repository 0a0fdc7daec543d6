//! The voxel-parallel driver that fills a `Mapping`.
//!
//! Every voxel of the (shared) grid is processed independently: gather the
//! voxel's source and target fixels, run the configured algorithm, and
//! translate the voxel-local answer into dataset-global indices. Because
//! every target fixel belongs to exactly one voxel, the per-voxel results
//! touch disjoint mapping entries (and disjoint cost-volume voxels, and
//! disjoint remapped-direction slots), so the final scatter is a plain
//! sequential pass over the collected results and the output is identical
//! for any thread count or interleaving.

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array3, ShapeBuilder};
use rayon::prelude::*;

use crate::{
    Costf32, Direction, FixelError, Index1_u, Mapping, Result,
    algorithms::Correspondence,
    dataset::FixelDataset,
};

pub struct Matcher<'d> {
    source: &'d FixelDataset,
    target: &'d FixelDataset,
    algorithm: &'d dyn Correspondence,
}

pub struct MatchOutput {
    pub mapping: Mapping,
    /// Winning per-voxel total cost; NaN where the algorithm never
    /// searched (empty voxels). Only present for cost-exporting algorithms.
    pub cost: Option<Array3<Costf32>>,
    /// Source directions antipodally corrected towards the first target
    /// each source fixel was matched to; unmatched fixels keep theirs.
    pub remapped: Option<Vec<Direction>>,
}

/// One voxel's contribution, produced in parallel, scattered sequentially
struct VoxelResult {
    voxel: Index1_u,
    origins: Vec<Vec<u32>>,
    cost: Option<Costf32>,
}

impl<'d> Matcher<'d> {

    pub fn new(source: &'d FixelDataset,
               target: &'d FixelDataset,
               algorithm: &'d dyn Correspondence,
    ) -> Result<Self> {
        if source.grid() != target.grid() {
            return Err(FixelError::InvalidParameter(format!(
                "source and target datasets must share one voxel grid: {:?} vs {:?}",
                source.grid().n, target.grid().n)));
        }
        Ok(Self { source, target, algorithm })
    }

    pub fn run(&self, export_remapped: bool, show_progress: bool) -> MatchOutput {
        let grid = self.target.grid();
        let n_voxels = grid.len();

        let bar = if show_progress { ProgressBar::new(n_voxels as u64) } else { ProgressBar::hidden() };
        bar.set_style(ProgressStyle::default_bar()
                      .template("determining fixel correspondence [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")
                      .unwrap());

        // ------ The parallel phase: one worker owns one voxel at a time -----
        let results: Vec<VoxelResult> = (0..n_voxels)
            .into_par_iter()
            .filter_map(|v| {
                let result = self.one_voxel(v);
                bar.inc(1);
                result
            })
            .collect();
        bar.finish_and_clear();

        // ------ Sequential scatter into the pre-sized outputs ---------------
        let mut mapping = Mapping::new(self.source.len() as u32, self.target.len() as u32);
        let [nx, ny, nz] = grid.n;
        let mut cost = self.algorithm.exports_cost()
            .then(|| Array3::from_elem((nx, ny, nz).f(), f32::NAN));
        let mut remapped = export_remapped.then(|| self.source.directions().to_vec());
        let mut already_flipped = vec![false; if export_remapped { self.source.len() } else { 0 }];

        for VoxelResult { voxel, origins, cost: voxel_cost } in results {
            let s_offset = self.source.offset_at(voxel);
            let t_offset = self.target.offset_at(voxel);

            for (local_t, local_sources) in origins.iter().enumerate() {
                let target_global = t_offset as usize + local_t;
                let sources_global: Vec<u32> = local_sources.iter().map(|&ls| s_offset + ls).collect();

                if let Some(remapped) = remapped.as_mut() {
                    let t_dir = self.target.direction(target_global as u32);
                    for &sg in &sources_global {
                        let sg = sg as usize;
                        // The first objective target decides the antipodal
                        // orientation
                        if !already_flipped[sg] {
                            already_flipped[sg] = true;
                            if remapped[sg].dot(&t_dir) < 0.0 {
                                remapped[sg] = -remapped[sg];
                            }
                        }
                    }
                }

                mapping.set(target_global, sources_global);
            }

            if let (Some(c), Some(image)) = (voxel_cost, cost.as_mut()) {
                let [x, y, z] = grid.index3(voxel);
                image[[x, y, z]] = c;
            }
        }

        MatchOutput { mapping, cost, remapped }
    }

    fn one_voxel(&self, v: Index1_u) -> Option<VoxelResult> {
        if self.target.count_at(v) == 0 {
            // Nothing to assign and nothing to flip; the cost stays NaN
            return None;
        }
        let source_fixels = self.source.fixels_at(v);
        let target_fixels = self.target.fixels_at(v);
        let assignment = self.algorithm.correspond(&source_fixels, &target_fixels);
        debug_assert_eq!(assignment.origins.len(), target_fixels.len());
        Some(VoxelResult { voxel: v, origins: assignment.origins, cost: assignment.cost })
    }
}
