//! The fixel-dataset collaborator: a voxel grid, a per-voxel count/offset
//! index into flat per-fixel arrays, and the gather operation handing one
//! voxel's fixels to the matching algorithms.
//!
//! On disk a dataset is a directory of raw arrays tied together by a TOML
//! header (see the `io` module): `index.raw` holds one (count, offset) pair
//! of u32 per voxel in raster order, `directions.raw` three f32 per fixel,
//! `density.raw` one f32 per fixel. Further quantitative per-fixel values
//! live in standalone data files of one f32 per fixel.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::{BoxDim_u, Densityf32, Direction, Fixel, FixelError, Grid, Index1_u, Result};
use crate::io::{self, raw};

pub const HEADER_FILE:     &str = "header.toml";
pub const INDEX_FILE:      &str = "index.raw";
pub const DIRECTIONS_FILE: &str = "directions.raw";
pub const DENSITY_FILE:    &str = "density.raw";

#[derive(Serialize, Deserialize)]
struct DatasetHeader {
    n: BoxDim_u,
    fixels: usize,
}

#[derive(Debug)]
pub struct FixelDataset {
    grid: Grid,
    counts: Vec<u32>,
    offsets: Vec<u32>,
    directions: Vec<Direction>,
    densities: Vec<Densityf32>,
}

impl FixelDataset {

    /// Build a dataset from one list of fixels per voxel, in raster order
    pub fn from_voxel_fixels(grid: Grid, per_voxel: Vec<Vec<Fixel>>) -> Result<Self> {
        if per_voxel.len() != grid.len() {
            return Err(FixelError::InvalidParameter(format!(
                "got fixel lists for {} voxels, but the grid {:?} has {}",
                per_voxel.len(), grid.n, grid.len())));
        }
        let mut counts  = Vec::with_capacity(grid.len());
        let mut offsets = Vec::with_capacity(grid.len());
        let mut directions = vec![];
        let mut densities  = vec![];
        for fixels in per_voxel {
            counts.push(fixels.len() as u32);
            offsets.push(directions.len() as u32);
            for f in fixels {
                directions.push(f.direction);
                densities.push(f.density);
            }
        }
        Ok(Self { grid, counts, offsets, directions, densities })
    }

    pub fn grid(&self) -> Grid { self.grid }

    /// Total number of fixels in the dataset
    pub fn len(&self) -> usize { self.directions.len() }

    pub fn is_empty(&self) -> bool { self.directions.is_empty() }

    pub fn directions(&self) -> &[Direction] { &self.directions }
    pub fn densities(&self)  -> &[Densityf32] { &self.densities }

    /// First global fixel index belonging to voxel `v`
    pub fn offset_at(&self, v: Index1_u) -> u32 { self.offsets[v] }

    /// Number of fixels in voxel `v`
    pub fn count_at(&self, v: Index1_u) -> u32 { self.counts[v] }

    pub fn direction(&self, global: u32) -> Direction { self.directions[global as usize] }

    /// Gather the fixels of voxel `v` into a fresh working buffer.
    /// Local index `i` within the result corresponds to global index
    /// `offset_at(v) + i`.
    pub fn fixels_at(&self, v: Index1_u) -> Vec<Fixel> {
        let lo = self.offsets[v] as usize;
        let hi = lo + self.counts[v] as usize;
        (lo..hi)
            .map(|i| Fixel::new(self.directions[i], self.densities[i]))
            .collect()
    }

    /// A copy of this dataset with the same voxel-fixel structure but
    /// replaced directions: used for the remapped-source export
    pub fn with_directions(&self, directions: Vec<Direction>) -> Result<Self> {
        if directions.len() != self.len() {
            return Err(FixelError::InvalidParameter(format!(
                "replacement directions ({}) do not match dataset fixel count ({})",
                directions.len(), self.len())));
        }
        Ok(Self {
            grid: self.grid,
            counts: self.counts.clone(),
            offsets: self.offsets.clone(),
            directions,
            densities: self.densities.clone(),
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::create_output_dir(dir)?;
        io::write_toml(&dir.join(HEADER_FILE),
                       &DatasetHeader { n: self.grid.n, fixels: self.len() })?;
        let index = self.counts.iter().zip(&self.offsets).flat_map(|(&c, &o)| [c, o]);
        let path = dir.join(INDEX_FILE);
        raw::write_u32(index, &path).map_err(FixelError::io(path))?;
        let path = dir.join(DIRECTIONS_FILE);
        raw::write_f32(self.directions.iter().flat_map(|d| [d.x, d.y, d.z]), &path)
            .map_err(FixelError::io(path))?;
        let path = dir.join(DENSITY_FILE);
        raw::write_f32(self.densities.iter().copied(), &path).map_err(FixelError::io(path))
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let DatasetHeader { n, fixels } = io::read_toml(&dir.join(HEADER_FILE))?;
        let grid = Grid::new(n);

        let path = dir.join(INDEX_FILE);
        let index = raw::read_u32(&path).map_err(FixelError::io(&path))?;
        if index.len() != 2 * grid.len() {
            return Err(FixelError::LengthMismatch {
                path, what: "index entries (count,offset per voxel)",
                expected: 2 * grid.len(), found: index.len(),
            });
        }
        let counts:  Vec<u32> = index.iter().step_by(2).copied().collect();
        let offsets: Vec<u32> = index.iter().skip(1).step_by(2).copied().collect();

        let path = dir.join(DIRECTIONS_FILE);
        let dirs = raw::read_f32(&path).map_err(FixelError::io(&path))?;
        if dirs.len() != 3 * fixels {
            return Err(FixelError::LengthMismatch {
                path, what: "direction components",
                expected: 3 * fixels, found: dirs.len(),
            });
        }
        let directions = dirs.chunks_exact(3)
            .map(|c| Direction::new(c[0], c[1], c[2]))
            .collect();

        let path = dir.join(DENSITY_FILE);
        let densities = raw::read_f32(&path).map_err(FixelError::io(&path))?;
        if densities.len() != fixels {
            return Err(FixelError::LengthMismatch {
                path, what: "density values", expected: fixels, found: densities.len(),
            });
        }

        let dataset = Self { grid, counts, offsets, directions, densities };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Every voxel's (count, offset) span must lie within the flat arrays
    fn validate(&self) -> Result<()> {
        let fixels = self.len();
        for v in 0..self.grid.len() {
            let end = self.offsets[v] as usize + self.counts[v] as usize;
            if end > fixels {
                return Err(FixelError::CorruptIndex { voxel: self.grid.index3(v), fixels });
            }
        }
        Ok(())
    }
}

// ----- Quantitative per-fixel data files -------------------------------------

/// Read a per-fixel data file and check its cardinality against the dataset
/// it is paired with
pub fn read_data_file(path: &Path, expected_fixels: usize) -> Result<Vec<f32>> {
    let data = raw::read_f32(path).map_err(FixelError::io(path))?;
    if data.len() != expected_fixels {
        return Err(FixelError::LengthMismatch {
            path: path.to_owned(), what: "fixel values",
            expected: expected_fixels, found: data.len(),
        });
    }
    Ok(data)
}

pub fn write_data_file(path: &Path, data: &[f32]) -> Result<()> {
    raw::write_f32(data.iter().copied(), path).map_err(FixelError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    fn fx(x: f32, y: f32, z: f32, density: f32) -> Fixel {
        Fixel::new(Direction::new(x, y, z), density)
    }

    fn sample() -> FixelDataset {
        FixelDataset::from_voxel_fixels(Grid::new([2, 1, 1]), vec![
            vec![fx(1.0, 0.0, 0.0, 0.5), fx(0.0, 1.0, 0.0, 0.25)],
            vec![fx(0.0, 0.0, 1.0, 1.0)],
        ]).unwrap()
    }

    #[test]
    fn gather_respects_voxel_spans() {
        let d = sample();
        assert_eq!(d.len(), 3);
        assert_eq!(d.fixels_at(0).len(), 2);
        assert_eq!(d.fixels_at(1).len(), 1);
        assert_eq!(d.offset_at(1), 2);
        assert_float_eq!(d.fixels_at(1)[0].density, 1.0, abs <= 0.0);
    }

    #[test]
    fn save_load_roundtrip() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("fixels");
        let original = sample();
        original.save(&dir)?;
        let reloaded = FixelDataset::load(&dir)?;
        assert_eq!(reloaded.grid(), original.grid());
        assert_eq!(reloaded.len(), original.len());
        for v in 0..original.grid().len() {
            assert_eq!(reloaded.fixels_at(v), original.fixels_at(v));
        }
        Ok(())
    }

    #[test]
    fn truncated_data_file_is_rejected() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("fixels");
        sample().save(&dir)?;
        write_data_file(&dir.join(DENSITY_FILE), &[1.0])?;
        let err = FixelDataset::load(&dir).unwrap_err();
        assert!(matches!(err, FixelError::LengthMismatch { .. }));
        Ok(())
    }

    #[test]
    fn data_file_cardinality_is_checked() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fd.raw");
        write_data_file(&path, &[1.0, 2.0])?;
        assert_eq!(read_data_file(&path, 2)?, vec![1.0, 2.0]);
        assert!(matches!(read_data_file(&path, 3),
                         Err(FixelError::LengthMismatch { .. })));
        Ok(())
    }
}
