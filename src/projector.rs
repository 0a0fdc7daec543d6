//! Projection of per-fixel quantitative values through a finished
//! correspondence mapping: one aggregate value per target fixel.
//!
//! Each source fixel's contribution is implicitly down-weighted by its
//! fan-out (a fixel feeding three targets contributes a third of its value
//! to each) and optionally modulated by an explicit per-fixel weights file.
//! Unmapped targets receive a configurable fill value; the ambiguity flags
//! replace many-to-one or one-to-many aggregates with NaN sentinels
//! instead. Target fixels are aggregated independently, so the pass
//! parallelises over target indices with no shared mutable state.

use rayon::prelude::*;

use crate::{Direction, FixelError, Mapping, Result, Weightf32};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Metric {
    /// Fan-out-weighted sum of source values
    Sum,
    /// Weighted mean of source values
    Mean,
    /// Number of contributing source fixels
    Count,
    /// Angle between the target direction and the weighted mean source direction
    Angle,
}

#[derive(Clone, Copy, Debug)]
pub struct FillSettings {
    /// Output value for target fixels with no corresponding source fixel
    pub value: f32,
    /// Emit NaN where several source fixels map to one target
    pub nan_many2one: bool,
    /// Emit NaN for every target touched by a source fixel that also feeds another
    pub nan_one2many: bool,
}

impl Default for FillSettings {
    fn default() -> Self {
        Self { value: 0.0, nan_many2one: false, nan_one2many: false }
    }
}

pub struct Projector<'m> {
    mapping: &'m Mapping,
    values: &'m [f32],
    source_directions: &'m [Direction],
    target_directions: &'m [Direction],
    metric: Metric,
    fill: FillSettings,
    explicit_weights: Option<&'m [Weightf32]>,
    /// 1 / fan-out per source fixel; 0 for fixels that feed no target
    implicit_weights: Vec<Weightf32>,
}

impl<'m> Projector<'m> {

    pub fn new(mapping: &'m Mapping,
               values: &'m [f32],
               source_directions: &'m [Direction],
               target_directions: &'m [Direction],
               metric: Metric,
               fill: FillSettings,
               explicit_weights: Option<&'m [Weightf32]>,
    ) -> Result<Self> {
        let source_fixels = mapping.source_fixels() as usize;
        let mismatch = |what, found| FixelError::InvalidParameter(format!(
            "{what}: expected {source_fixels} entries to match the mapping's source fixels, found {found}"));
        if values.len() != source_fixels {
            return Err(mismatch("input data file", values.len()));
        }
        if source_directions.len() != source_fixels {
            return Err(mismatch("source directions", source_directions.len()));
        }
        if let Some(w) = explicit_weights {
            if w.len() != source_fixels {
                return Err(mismatch("fixel weights file", w.len()));
            }
        }
        if target_directions.len() != mapping.len() {
            return Err(FixelError::InvalidParameter(format!(
                "target directions ({}) do not match the mapping's target fixels ({})",
                target_directions.len(), mapping.len())));
        }

        // Fan-out of every source fixel, needed both for the one-to-many
        // sentinel and for the implicit contribution weights
        let mut objectives_per_source = vec![0u32; source_fixels];
        for target in 0..mapping.len() {
            for &s in &mapping[target] {
                objectives_per_source[s as usize] += 1;
            }
        }
        let implicit_weights = objectives_per_source.iter()
            .map(|&n| if n > 0 { 1.0 / n as f32 } else { 0.0 })
            .collect();

        Ok(Self {
            mapping, values, source_directions, target_directions,
            metric, fill, explicit_weights, implicit_weights,
        })
    }

    /// One scalar per target fixel
    pub fn project(&self) -> Vec<f32> {
        (0..self.mapping.len())
            .into_par_iter()
            .map(|target| self.project_one(target))
            .collect()
    }

    fn project_one(&self, target: usize) -> f32 {
        let sources = &self.mapping[target];
        if sources.is_empty() {
            return self.fill.value;
        }
        if sources.len() > 1 && self.fill.nan_many2one {
            return f32::NAN;
        }

        let mut values  = Vec::with_capacity(sources.len());
        let mut weights = Vec::with_capacity(sources.len());
        for &s in sources {
            let s = s as usize;
            let implicit = self.implicit_weights[s];
            if self.fill.nan_one2many && implicit < 1.0 {
                return f32::NAN;
            }
            values.push(self.values[s]);
            weights.push(match self.explicit_weights {
                Some(w) => implicit * w[s],
                None    => implicit,
            });
        }

        match self.metric {
            Metric::Sum => values.iter().zip(&weights).map(|(v, w)| v * w).sum(),
            Metric::Mean => {
                let weighted: f32 = values.iter().zip(&weights).map(|(v, w)| v * w).sum();
                weighted / weights.iter().sum::<f32>()
            }
            Metric::Count => sources.len() as f32,
            Metric::Angle => {
                let out_dir = self.target_directions[target];
                let mut mean_dir = Direction::zeros();
                for (&s, &w) in sources.iter().zip(&weights) {
                    let dir = self.source_directions[s as usize];
                    let flip = if out_dir.dot(&dir) < 0.0 { -1.0 } else { 1.0 };
                    mean_dir += dir * w * flip;
                }
                mean_dir.normalize_mut();
                out_dir.dot(&mean_dir).clamp(-1.0, 1.0).acos()
            }
        }
    }
}
