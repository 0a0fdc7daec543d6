//! Fast lookup for the angular penalisation term used by the combinatorial
//! cost functions.
//!
//! The penalty for a direction mismatch is `tan(acos(dp))`, where `dp` is
//! the absolute dot product between two unit directions: zero for parallel
//! directions, and growing without bound as they approach perpendicular.
//! The combinatorial search evaluates this for every candidate pairing in
//! every voxel, so rather than paying for `acos`/`tan` each time, the curve
//! is tabulated once at construction and queried by linear interpolation.
//! Doubling the resolution halves the interpolation error.

pub const DEFAULT_RESOLUTION: usize = 1000;

pub struct CostLookup {
    data: Vec<f32>,
    multiplier: f32,
}

impl CostLookup {

    pub fn new(resolution: usize) -> Self {
        let mut data = Vec::with_capacity(resolution + 2);
        for bin in 0..=resolution {
            let dp = bin as f64 / resolution as f64;
            data.push(dp.acos().tan() as f32);
        }
        // Pad the table so that interpolation at dp == 1.0 does not read
        // past the end
        data.push(0.0);
        Self { data, multiplier: resolution as f32 }
    }

    /// Interpolated angular cost for `dp` in [0,1]. Callers are responsible
    /// for folding antipodal directions into this range first.
    pub fn lookup(&self, dp: f32) -> f32 {
        debug_assert!((0.0..=1.0).contains(&dp));
        let position = dp * self.multiplier;
        let lower = position.floor() as usize;
        let mu = position - lower as f32;
        (1.0 - mu) * self.data[lower] + mu * self.data[lower + 1]
    }
}

impl Default for CostLookup {
    fn default() -> Self { Self::new(DEFAULT_RESOLUTION) }
}
