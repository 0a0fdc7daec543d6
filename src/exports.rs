pub type Densityf32 = f32;
pub type Costf32    = f32;
pub type Weightf32  = f32;

#[allow(non_camel_case_types)] pub type Index1_u = usize;
#[allow(non_camel_case_types)] pub type Index3_u = [usize; 3];
#[allow(non_camel_case_types)] pub type BoxDim_u = [usize; 3];

/// Fixel directions are plain unit 3-vectors
pub type Direction = nalgebra::Vector3<f32>;

pub use crate::error::{FixelError, Result};
pub use crate::fixel::Fixel;
pub use crate::grid::Grid;
pub use crate::dataset::FixelDataset;
pub use crate::mapping::Mapping;
