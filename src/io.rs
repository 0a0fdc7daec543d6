//! On-disk representations.
//!
//! Every artefact is a flat little-endian raw binary array accompanied by a
//! small TOML header describing its shape; directories group the files
//! belonging to one fixel dataset or one correspondence mapping.

pub mod raw;

use std::path::{Path, PathBuf};

use ndarray::{Array3, ShapeBuilder};
use serde::{Serialize, de::DeserializeOwned, Deserialize};

use crate::{BoxDim_u, FixelError, Result};

pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(FixelError::io(path))?;
    toml::from_str(&text).map_err(|e| FixelError::Header {
        path: path.to_owned(),
        message: e.to_string(),
    })
}

pub fn write_toml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = toml::to_string(value).map_err(|e| FixelError::Header {
        path: path.to_owned(),
        message: e.to_string(),
    })?;
    std::fs::write(path, text).map_err(FixelError::io(path))
}

/// Create a fresh output directory, refusing to touch an existing one:
/// partially overwriting a fixel directory would leave it inconsistent.
pub fn create_output_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(FixelError::OutputExists(path.to_owned()));
    }
    std::fs::create_dir_all(path).map_err(FixelError::io(path))
}

// ----- Standalone 3-D scalar volumes (e.g. the per-voxel cost image) ---------

#[derive(Serialize, Deserialize)]
struct VolumeHeader {
    n: BoxDim_u,
}

fn volume_header_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("toml")
}

/// Write `volume` as raw f32 in raster order (x fastest), with a sidecar
/// TOML header recording the grid dimensions.
pub fn save_volume(path: &Path, volume: &Array3<f32>) -> Result<()> {
    let (nx, ny, nz) = volume.dim();
    write_toml(&volume_header_path(path), &VolumeHeader { n: [nx, ny, nz] })?;
    let data = volume.as_slice_memory_order()
        .expect("freshly built volumes are contiguous");
    raw::write_f32(data.iter().copied(), path).map_err(FixelError::io(path))
}

pub fn load_volume(path: &Path) -> Result<Array3<f32>> {
    let VolumeHeader { n: [nx, ny, nz] } = read_toml(&volume_header_path(path))?;
    let data = raw::read_f32(path).map_err(FixelError::io(path))?;
    if data.len() != nx * ny * nz {
        return Err(FixelError::LengthMismatch {
            path: path.to_owned(),
            what: "voxel values",
            expected: nx * ny * nz,
            found: data.len(),
        });
    }
    // Column-major so that the first axis (x) varies fastest, matching the
    // raster order on disk
    Ok(Array3::from_shape_vec((nx, ny, nz).f(), data)
        .expect("shape just checked against data length"))
}
