//! Threshold-gated nearest-neighbour correspondence.
//!
//! For every target fixel, find the source fixel in the same voxel with the
//! smallest angular distance and assign it iff that angle is *strictly*
//! below the configured threshold; a target whose nearest source sits
//! exactly on the boundary stays unassigned. No combinatorial search, no
//! cost function; O(|S|×|T|) per voxel.

use crate::{Fixel, FixelError, Result};
use super::{Correspondence, VoxelAssignment};

pub const DEFAULT_MAX_ANGLE_DEG: f32 = 45.0;

pub struct Nearest {
    // Angle strictly-below-threshold becomes dot strictly-above-cosine
    cos_threshold: f32,
}

impl Nearest {

    pub fn new(max_angle_deg: f32) -> Result<Self> {
        if !(0.0..=90.0).contains(&max_angle_deg) {
            return Err(FixelError::InvalidParameter(format!(
                "nearest-neighbour angle threshold must lie in [0,90] degrees, got {max_angle_deg}")));
        }
        Ok(Self { cos_threshold: max_angle_deg.to_radians().cos() })
    }
}

impl Default for Nearest {
    fn default() -> Self { Self::new(DEFAULT_MAX_ANGLE_DEG).unwrap() }
}

impl Correspondence for Nearest {

    fn correspond(&self, source: &[Fixel], target: &[Fixel]) -> VoxelAssignment {
        let origins = target.iter().map(|t| {
            let mut best: Option<(u32, f32)> = None;
            for (i, s) in source.iter().enumerate() {
                let dp = t.absdot(s);
                // Strict comparison: ties go to the first-enumerated source
                if best.map_or(true, |(_, b)| dp > b) {
                    best = Some((i as u32, dp));
                }
            }
            match best {
                Some((i, dp)) if dp > self.cos_threshold => vec![i],
                _ => vec![],
            }
        }).collect();
        VoxelAssignment { origins, cost: None }
    }
}
