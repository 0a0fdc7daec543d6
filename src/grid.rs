//! The 3-D voxel grid on which both fixel datasets are defined, and
//! conversion between 1-d (raster) and 3-d voxel indices.

use serde::{Serialize, Deserialize};

use crate::{BoxDim_u, Index1_u, Index3_u};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub n: BoxDim_u,
}

impl Grid {

    pub fn new(n: BoxDim_u) -> Self { Self { n } }

    /// Total number of voxels
    pub fn len(&self) -> usize {
        let [nx, ny, nz] = self.n;
        nx * ny * nz
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn index1(&self, i3: Index3_u) -> Index1_u { index3_to_1(i3, self.n) }
    pub fn index3(&self, i1: Index1_u) -> Index3_u { index1_to_3(i1, self.n) }
}

// --------------------------------------------------------------------------------
//                  Conversion between 1d and 3d indices
//
// Raster order: x varies fastest, z slowest.

use std::ops::{Add, Div, Mul, Rem};

pub fn index3_to_1<T>([ix, iy, iz]: [T; 3], [nx, ny, _nz]: [T; 3]) -> T
where
    T: Mul<Output = T> + Add<Output = T>
{
    ix + (iy + iz * ny) * nx
}

#[allow(clippy::many_single_char_names)]
pub fn index1_to_3<T>(i: T, [nx, ny, _nz]: [T; 3]) -> [T; 3]
where
    T: Mul<Output = T> +
    Div<Output = T> +
    Rem<Output = T> +
    Copy
{
    let z = i / (nx * ny);
    let r = i % (nx * ny);
    let y = r / nx;
    let x = r % nx;
    [x,y,z]
}
