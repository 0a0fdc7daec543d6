//! Combinatorial cost-minimising correspondence.
//!
//! Within one voxel, the search explores assignments of source-fixel
//! subsets ("origins") to target fixels ("objectives"), bounded by
//! `max_origins` sources per target and `max_objectives` targets per
//! source, and keeps the assignment with the lowest total cost. Where a
//! source fixel serves several targets its density is split evenly across
//! them (fan-out), so the cost of a candidate is only defined for the voxel
//! as a whole; candidates are therefore enumerated by depth-first search
//! over targets and costed at the leaves.
//!
//! Enumeration order is fixed — per target: the empty set, then subsets of
//! increasing size in lexicographic index order — and the incumbent is only
//! replaced by a strictly cheaper candidate, so ties break towards the
//! first-enumerated assignment and results are reproducible.
//!
//! The two published cost functions share this engine: `Ismrm2018` uses a
//! fixed weighting of the orientation and density terms, `Ni2022` exposes
//! the weighting through two constants.

use itertools::Itertools;

use crate::{Costf32, Direction, Fixel, FixelError, Result};
use crate::cost::CostLookup;
use super::{Correspondence, VoxelAssignment};

pub const DEFAULT_MAX_ORIGINS:    usize = 3;
pub const DEFAULT_MAX_OBJECTIVES: usize = 3;

/// Directional-convexity pruning of the candidate space.
///
/// Source fixels that are near-orthogonal to one another are never
/// proposed as joint origins of a single target, and a source fixel is
/// never proposed to serve two near-orthogonal targets. This keeps the
/// search tractable for voxels with many fixels. Voxels with fewer than
/// `min_fixels` fixels on the relevant side bypass the pruning and allow
/// any grouping.
///
/// The exact rule is deliberately a policy rather than a constant: "near
/// orthogonal" means an absolute direction dot product below
/// `min_abs_dot`.
#[derive(Clone, Copy, Debug)]
pub struct PruningPolicy {
    pub enabled: bool,
    pub min_abs_dot: f32,
    pub min_fixels: usize,
}

impl Default for PruningPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_abs_dot: 75.0_f32.to_radians().cos(),
            min_fixels: 4,
        }
    }
}

impl PruningPolicy {
    pub fn disabled() -> Self { Self { enabled: false, ..Self::default() } }
}

#[derive(Clone, Copy, Debug)]
pub struct CombinatorialParams {
    pub max_origins: usize,
    pub max_objectives: usize,
    pub pruning: PruningPolicy,
    pub export_cost: bool,
}

impl CombinatorialParams {

    pub fn new(max_origins: usize, max_objectives: usize) -> Result<Self> {
        if max_origins == 0 || max_objectives == 0 {
            return Err(FixelError::InvalidParameter(
                "max_origins and max_objectives must both be at least 1".into()));
        }
        Ok(Self {
            max_origins,
            max_objectives,
            pruning: PruningPolicy::default(),
            export_cost: false,
        })
    }

    pub fn export_cost(mut self, yes: bool) -> Self { self.export_cost = yes; self }

    pub fn pruning(mut self, policy: PruningPolicy) -> Self { self.pruning = policy; self }
}

impl Default for CombinatorialParams {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ORIGINS, DEFAULT_MAX_OBJECTIVES).unwrap()
    }
}

// ----- Cost models -----------------------------------------------------------

/// How one (origin subset → target) pairing is costed, given the density
/// contributed by the origins after fan-out splitting and the absolute dot
/// product between the target direction and the density-weighted mean
/// origin direction.
trait CostModel: Sync {
    fn matched(&self, lookup: &CostLookup, contributed: f32, dp: f32, target_density: f32) -> Costf32;
    fn unmatched(&self, target_density: f32) -> Costf32;
}

/// Cost function of Smith & Connelly, Proc ISMRM 2018: the angular penalty
/// is scaled by the density actually matched, and the residual density
/// difference is penalised linearly.
pub struct Ismrm2018 {
    params: CombinatorialParams,
    lookup: CostLookup,
}

impl Ismrm2018 {
    pub fn new(params: CombinatorialParams) -> Self {
        Self { params, lookup: CostLookup::default() }
    }
}

impl CostModel for Ismrm2018 {
    fn matched(&self, lookup: &CostLookup, contributed: f32, dp: f32, target_density: f32) -> Costf32 {
        lookup.lookup(dp) * contributed.min(target_density) + (contributed - target_density).abs()
    }
    fn unmatched(&self, target_density: f32) -> Costf32 {
        target_density
    }
}

impl Correspondence for Ismrm2018 {
    fn correspond(&self, source: &[Fixel], target: &[Fixel]) -> VoxelAssignment {
        search(&self.params, &self.lookup, self, source, target)
    }
    fn exports_cost(&self) -> bool { self.params.export_cost }
}

pub const DEFAULT_ALPHA: f32 = 1.0;
pub const DEFAULT_BETA:  f32 = 1.0;

/// Alternative cost function (Smith & Connelly, publication pending):
/// `alpha` modulates the orientation term, here scaled by the mean of the
/// matched and target densities, and `beta` the density-difference term.
pub struct Ni2022 {
    params: CombinatorialParams,
    lookup: CostLookup,
    alpha: f32,
    beta: f32,
}

impl Ni2022 {

    pub fn new(params: CombinatorialParams) -> Self {
        Self { params, lookup: CostLookup::default(), alpha: DEFAULT_ALPHA, beta: DEFAULT_BETA }
    }

    pub fn set_constants(&mut self, alpha: f32, beta: f32) {
        self.alpha = alpha;
        self.beta = beta;
    }
}

impl CostModel for Ni2022 {
    fn matched(&self, lookup: &CostLookup, contributed: f32, dp: f32, target_density: f32) -> Costf32 {
        self.alpha * lookup.lookup(dp) * 0.5 * (contributed + target_density)
            + self.beta * (contributed - target_density).abs()
    }
    fn unmatched(&self, target_density: f32) -> Costf32 {
        self.beta * target_density
    }
}

impl Correspondence for Ni2022 {
    fn correspond(&self, source: &[Fixel], target: &[Fixel]) -> VoxelAssignment {
        search(&self.params, &self.lookup, self, source, target)
    }
    fn exports_cost(&self) -> bool { self.params.export_cost }
}

// ----- The shared search engine ----------------------------------------------

fn search<M: CostModel>(
    params: &CombinatorialParams,
    lookup: &CostLookup,
    model:  &M,
    source: &[Fixel],
    target: &[Fixel],
) -> VoxelAssignment {
    if source.is_empty() || target.is_empty() {
        return VoxelAssignment::unassigned(target.len());
    }

    let subsets = candidate_subsets(source, params);
    let target_compat = compatibility(target, params.pruning);

    let mut dfs = Search {
        lookup, model, source, target,
        max_objectives: params.max_objectives as u32,
        subsets: &subsets,
        target_compat,
        fanout: vec![0; source.len()],
        serving: vec![vec![]; source.len()],
        chosen: vec![0; target.len()],
        best: None,
    };
    dfs.recurse(0);

    let (cost, choice) = dfs.best
        .expect("the all-unassigned candidate is always enumerated");
    let origins = choice.into_iter().map(|id| subsets[id].clone()).collect();
    VoxelAssignment { origins, cost: Some(cost) }
}

struct Search<'v, M: CostModel> {
    lookup: &'v CostLookup,
    model:  &'v M,
    source: &'v [Fixel],
    target: &'v [Fixel],
    max_objectives: u32,
    /// Candidate origin subsets, shared by all targets; index 0 is empty
    subsets: &'v [Vec<u32>],
    /// Pairwise target compatibility, row-major; `None` disables the check
    target_compat: Option<Vec<bool>>,
    /// Per source: number of targets currently served
    fanout: Vec<u32>,
    /// Per source: which targets are currently served
    serving: Vec<Vec<usize>>,
    /// Per target: index into `subsets` along the current search path
    chosen: Vec<usize>,
    best: Option<(Costf32, Vec<usize>)>,
}

impl<'v, M: CostModel> Search<'v, M> {

    fn recurse(&mut self, depth: usize) {
        if depth == self.target.len() {
            let cost = self.assignment_cost();
            // Strictly-cheaper replacement keeps the first-enumerated
            // candidate on ties
            if self.best.as_ref().map_or(true, |(b, _)| cost < *b) {
                self.best = Some((cost, self.chosen.clone()));
            }
            return;
        }

        'subset: for (id, subset) in self.subsets.iter().enumerate() {
            for &si in subset {
                let si = si as usize;
                if self.fanout[si] >= self.max_objectives { continue 'subset; }
                if let Some(compat) = &self.target_compat {
                    let n = self.target.len();
                    // One source serving two near-orthogonal targets is
                    // never proposed
                    if self.serving[si].iter().any(|&prev| !compat[prev * n + depth]) {
                        continue 'subset;
                    }
                }
            }
            for &si in subset {
                self.fanout[si as usize] += 1;
                self.serving[si as usize].push(depth);
            }
            self.chosen[depth] = id;
            self.recurse(depth + 1);
            for &si in subset {
                self.fanout[si as usize] -= 1;
                self.serving[si as usize].pop();
            }
        }
    }

    /// Total cost of the complete assignment currently described by
    /// `chosen` and `fanout`
    fn assignment_cost(&self) -> Costf32 {
        let mut total = 0.0;
        for (t, &id) in self.target.iter().zip(&self.chosen) {
            let subset = &self.subsets[id];
            if subset.is_empty() {
                total += self.model.unmatched(t.density);
                continue;
            }
            let mut contributed = 0.0;
            let mut mean_dir = Direction::zeros();
            for &si in subset {
                let s = &self.source[si as usize];
                let w = s.density / self.fanout[si as usize] as f32;
                contributed += w;
                mean_dir += w * s.oriented_towards(&t.direction);
            }
            let norm = mean_dir.norm();
            let dp = if norm > 1e-6 {
                (mean_dir.dot(&t.direction) / norm).abs().min(1.0)
            } else {
                // Degenerate combination: treat as fully perpendicular
                0.0
            };
            total += self.model.matched(self.lookup, contributed, dp, t.density);
        }
        total
    }
}

/// Enumerate candidate origin subsets: the empty set, then sizes
/// 1..=max_origins in lexicographic index order. With pruning active,
/// subsets pairing near-orthogonal source fixels are dropped.
fn candidate_subsets(source: &[Fixel], params: &CombinatorialParams) -> Vec<Vec<u32>> {
    let compat = compatibility(source, params.pruning);
    let n = source.len();
    let mut subsets = vec![vec![]];
    for size in 1..=params.max_origins.min(n) {
        for combo in (0..n as u32).combinations(size) {
            if let Some(c) = &compat {
                let convex = combo.iter()
                    .tuple_combinations()
                    .all(|(&a, &b)| c[a as usize * n + b as usize]);
                if !convex { continue; }
            }
            subsets.push(combo);
        }
    }
    subsets
}

/// Pairwise compatibility matrix under the pruning policy; `None` when the
/// policy is off or the voxel has too few fixels for the convex grouping
fn compatibility(fixels: &[Fixel], pruning: PruningPolicy) -> Option<Vec<bool>> {
    if !pruning.enabled || fixels.len() < pruning.min_fixels {
        return None;
    }
    let n = fixels.len();
    let mut c = vec![true; n * n];
    for i in 0..n {
        for j in i + 1..n {
            let ok = fixels[i].absdot(&fixels[j]) >= pruning.min_abs_dot;
            c[i * n + j] = ok;
            c[j * n + i] = ok;
        }
    }
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn fx(deg_from_x: f32, density: f32) -> Fixel {
        let rad = deg_from_x.to_radians();
        Fixel::new(Direction::new(rad.cos(), rad.sin(), 0.0), density)
    }

    #[test]
    fn identical_voxels_map_one_to_one_at_zero_cost() {
        let fixels = [fx(0.0, 0.7), fx(90.0, 0.4)];
        let ismrm = Ismrm2018::new(CombinatorialParams::default());
        let ni = Ni2022::new(CombinatorialParams::default());
        for algo in [&ismrm as &dyn Correspondence, &ni] {
            let a = algo.correspond(&fixels, &fixels);
            assert_eq!(a.origins, vec![vec![0], vec![1]]);
            assert_float_eq!(a.cost.unwrap(), 0.0, abs <= 1e-4);
        }
    }

    #[test]
    fn antipodal_source_still_matches_perfectly() {
        let t = [fx(0.0, 1.0)];
        let s = [Fixel::new(Direction::new(-1.0, 0.0, 0.0), 1.0)];
        let a = Ismrm2018::new(CombinatorialParams::default()).correspond(&s, &t);
        assert_eq!(a.origins, vec![vec![0]]);
        assert_float_eq!(a.cost.unwrap(), 0.0, abs <= 1e-4);
    }

    #[test]
    fn empty_sides_are_valid_and_uncosted() {
        let algo = Ni2022::new(CombinatorialParams::default());
        let a = algo.correspond(&[], &[fx(0.0, 1.0), fx(90.0, 1.0)]);
        assert_eq!(a.origins, vec![Vec::<u32>::new(), vec![]]);
        assert!(a.cost.is_none());
        assert!(algo.correspond(&[fx(0.0, 1.0)], &[]).origins.is_empty());
    }

    #[test]
    fn fan_out_splits_density_across_objectives() {
        // One source of density 1.0 facing two identical targets of
        // density 0.5: serving both at fan-out 2 is a perfect match
        let s = [fx(0.0, 1.0)];
        let t = [fx(0.0, 0.5), fx(0.0, 0.5)];
        let params = CombinatorialParams::new(3, 2).unwrap();
        let a = Ni2022::new(params).correspond(&s, &t);
        assert_eq!(a.origins, vec![vec![0], vec![0]]);
        assert_float_eq!(a.cost.unwrap(), 0.0, abs <= 1e-4);

        // With max_objectives = 1 that candidate is out of bounds and no
        // assignment beats leaving both targets unmatched
        let params = CombinatorialParams::new(3, 1).unwrap();
        let a = Ni2022::new(params).correspond(&s, &t);
        assert_eq!(a.origins, vec![Vec::<u32>::new(), vec![]]);
    }

    #[test]
    fn merged_origins_match_a_split_target() {
        // Two sources whose density sums to the single target's: merging
        // them is cheaper than any single-origin assignment
        let s = [fx(-10.0, 0.5), fx(10.0, 0.5)];
        let t = [fx(0.0, 1.0)];
        let a = Ismrm2018::new(CombinatorialParams::default()).correspond(&s, &t);
        assert_eq!(a.origins, vec![vec![0, 1]]);
    }

    #[test]
    fn ni2022_constants_reweight_the_terms() {
        // A badly rotated source with exactly matching density
        let s = [fx(80.0, 1.0)];
        let t = [fx(0.0, 1.0)];

        // Ignoring orientation entirely: assignment is free, so it happens
        let mut algo = Ni2022::new(CombinatorialParams::default());
        algo.set_constants(0.0, 1.0);
        let a = algo.correspond(&s, &t);
        assert_eq!(a.origins, vec![vec![0]]);
        assert_float_eq!(a.cost.unwrap(), 0.0, abs <= 1e-4);

        // Orientation dominating: leaving the target unmatched is cheaper
        algo.set_constants(1e6, 1.0);
        let a = algo.correspond(&s, &t);
        assert_eq!(a.origins, vec![Vec::<u32>::new()]);
    }

    #[test]
    fn pruning_never_pairs_near_orthogonal_sources() {
        let source = [fx(0.0, 1.0), fx(10.0, 1.0), fx(85.0, 1.0), fx(95.0, 1.0)];
        let params = CombinatorialParams::default();
        let subsets = candidate_subsets(&source, &params);
        for subset in &subsets {
            assert!(!(subset.contains(&0) && subset.contains(&2)),
                    "near-orthogonal pair proposed jointly: {subset:?}");
            assert!(!(subset.contains(&1) && subset.contains(&3)),
                    "near-orthogonal pair proposed jointly: {subset:?}");
        }
        // Near-parallel pairs survive the pruning
        assert!(subsets.iter().any(|s| s.contains(&0) && s.contains(&1)));

        // Below min_fixels the pruning is bypassed: any grouping allowed
        let few = [fx(0.0, 1.0), fx(90.0, 1.0)];
        let subsets = candidate_subsets(&few, &params);
        assert!(subsets.iter().any(|s| s.contains(&0) && s.contains(&1)));
    }

    // Optimality check on small synthetic voxels: the chosen assignment's cost
    // must not exceed that of any other enumerable candidate respecting
    // the bounds. The brute force below re-enumerates the whole candidate
    // space independently of the DFS.
    #[test]
    fn chosen_assignment_is_optimal_among_candidates() {
        let mut rng = StdRng::seed_from_u64(20220456);
        let params = CombinatorialParams::default().pruning(PruningPolicy::disabled());
        let mut random_fixels = |n: usize| -> Vec<Fixel> {
            (0..n).map(|_| {
                let dir = Direction::new(
                    rng.gen::<f32>() * 2.0 - 1.0,
                    rng.gen::<f32>() * 2.0 - 1.0,
                    rng.gen::<f32>() * 2.0 - 1.0,
                );
                Fixel::new(dir, rng.gen::<f32>() + 0.1)
            }).collect()
        };
        for trial in 0..20 {
            let ns = trial % 4 + 1;
            let nt = (trial / 4) % 4 + 1;
            let source = random_fixels(ns);
            let target = random_fixels(nt);

            let model = Ni2022::new(params);
            let reported = search(&params, &model.lookup, &model, &source, &target)
                .cost.unwrap();

            let subsets = candidate_subsets(&source, &params);
            let mut cheapest = f32::INFINITY;
            brute_force(&subsets, &source, &target, &params, &model, &model.lookup,
                        &mut vec![], &mut cheapest);
            assert_float_eq!(reported, cheapest, abs <= 1e-4);
        }
    }

    /// Exhaustive enumeration by nested choice, independent of `Search`
    #[allow(clippy::too_many_arguments)]
    fn brute_force<M: CostModel>(
        subsets: &[Vec<u32>],
        source: &[Fixel],
        target: &[Fixel],
        params: &CombinatorialParams,
        model: &M,
        lookup: &CostLookup,
        chosen: &mut Vec<usize>,
        cheapest: &mut f32,
    ) {
        if chosen.len() == target.len() {
            let mut fanout = vec![0u32; source.len()];
            for &id in chosen.iter() {
                for &si in &subsets[id] { fanout[si as usize] += 1; }
            }
            if fanout.iter().any(|&f| f > params.max_objectives as u32) { return; }
            let search = Search {
                lookup,
                model, source, target,
                max_objectives: params.max_objectives as u32,
                subsets,
                target_compat: None,
                fanout,
                serving: vec![],
                chosen: chosen.clone(),
                best: None,
            };
            *cheapest = cheapest.min(search.assignment_cost());
            return;
        }
        for id in 0..subsets.len() {
            chosen.push(id);
            brute_force(subsets, source, target, params, model, lookup, chosen, cheapest);
            chosen.pop();
        }
    }
}
