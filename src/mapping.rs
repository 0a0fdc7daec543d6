//! The correspondence mapping: for every target fixel, the ordered list of
//! source fixels that contribute to it.
//!
//! The outer length is fixed at construction to the target fixel count; a
//! target with no assignment holds an empty list, which is a valid state,
//! not an error. The order of each inner list is preserved across a
//! save/load round trip.
//!
//! On disk a mapping is a directory holding `header.toml` (source and
//! target fixel counts), `index.raw` (one u32 count per target fixel) and
//! `data.raw` (the ragged lists flattened, 32-bit source indices). The
//! optional inverse export writes the transposed structure alongside as
//! `inverse_index.raw` / `inverse_data.raw`, keyed by source fixel.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::{FixelError, Result};
use crate::io::{self, raw};

pub const HEADER_FILE:        &str = "header.toml";
pub const INDEX_FILE:         &str = "index.raw";
pub const DATA_FILE:          &str = "data.raw";
pub const INVERSE_INDEX_FILE: &str = "inverse_index.raw";
pub const INVERSE_DATA_FILE:  &str = "inverse_data.raw";

#[derive(Serialize, Deserialize)]
struct MappingHeader {
    source_fixels: u32,
    target_fixels: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mapping {
    source_fixels: u32,
    m: Vec<Vec<u32>>,
}

impl Mapping {

    /// Construct empty: every target fixel starts with no assignment
    pub fn new(source_fixels: u32, target_fixels: u32) -> Self {
        Self { source_fixels, m: vec![vec![]; target_fixels as usize] }
    }

    /// Number of target fixels
    pub fn len(&self) -> usize { self.m.len() }

    pub fn is_empty(&self) -> bool { self.m.is_empty() }

    pub fn source_fixels(&self) -> u32 { self.source_fixels }

    /// Replace the assignment of one target fixel
    pub fn set(&mut self, target: usize, sources: Vec<u32>) {
        assert!(target < self.m.len());
        debug_assert!(sources.iter().all(|&s| s < self.source_fixels));
        self.m[target] = sources;
    }

    /// The reverse view: for each source fixel, the targets it contributes
    /// to, in ascending target order. Derived by one scan of all entries.
    pub fn inverse(&self) -> Vec<Vec<u32>> {
        let mut inv = vec![vec![]; self.source_fixels as usize];
        for (target, sources) in self.m.iter().enumerate() {
            for &s in sources {
                inv[s as usize].push(target as u32);
            }
        }
        inv
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        io::create_output_dir(dir)?;
        self.write_files(dir)
    }

    /// As `save`, additionally exporting the source-keyed transpose
    pub fn save_with_inverse(&self, dir: &Path) -> Result<()> {
        self.save(dir)?;
        let inv = self.inverse();
        write_ragged(&inv, &dir.join(INVERSE_INDEX_FILE), &dir.join(INVERSE_DATA_FILE))
    }

    fn write_files(&self, dir: &Path) -> Result<()> {
        io::write_toml(&dir.join(HEADER_FILE), &MappingHeader {
            source_fixels: self.source_fixels,
            target_fixels: self.m.len() as u32,
        })?;
        write_ragged(&self.m, &dir.join(INDEX_FILE), &dir.join(DATA_FILE))
    }

    /// Reconstruct from persisted form. With `import_inverse` the persisted
    /// structure is interpreted as a source→target mapping and transposed.
    pub fn load(dir: &Path, import_inverse: bool) -> Result<Self> {
        let MappingHeader { source_fixels, target_fixels } =
            io::read_toml(&dir.join(HEADER_FILE))?;
        let m = read_ragged(&dir.join(INDEX_FILE), &dir.join(DATA_FILE),
                            target_fixels as usize, source_fixels)?;
        let loaded = Self { source_fixels, m };
        if import_inverse {
            // The keyed-by entries become the sources of the transpose
            let mut flipped = Self::new(target_fixels, source_fixels);
            flipped.m = loaded.inverse();
            Ok(flipped)
        } else {
            Ok(loaded)
        }
    }
}

impl std::ops::Index<usize> for Mapping {
    type Output = [u32];
    fn index(&self, target: usize) -> &[u32] { &self.m[target] }
}

fn write_ragged(lists: &[Vec<u32>], index_path: &Path, data_path: &Path) -> Result<()> {
    raw::write_u32(lists.iter().map(|l| l.len() as u32), index_path)
        .map_err(FixelError::io(index_path))?;
    raw::write_u32(lists.iter().flatten().copied(), data_path)
        .map_err(FixelError::io(data_path))
}

fn read_ragged(index_path: &Path, data_path: &Path,
               entries: usize, max_index: u32) -> Result<Vec<Vec<u32>>> {
    let counts = raw::read_u32(index_path).map_err(FixelError::io(index_path))?;
    if counts.len() != entries {
        return Err(FixelError::LengthMismatch {
            path: index_path.to_owned(), what: "index entries",
            expected: entries, found: counts.len(),
        });
    }
    let data = raw::read_u32(data_path).map_err(FixelError::io(data_path))?;
    let total = counts.iter().map(|&c| c as usize).sum::<usize>();
    if data.len() != total {
        return Err(FixelError::LengthMismatch {
            path: data_path.to_owned(), what: "assignment entries",
            expected: total, found: data.len(),
        });
    }
    if let Some(&bad) = data.iter().find(|&&i| i >= max_index) {
        return Err(FixelError::Header {
            path: data_path.to_owned(),
            message: format!("stored index {bad} out of range (dataset has {max_index} fixels)"),
        });
    }
    let mut lists = Vec::with_capacity(entries);
    let mut cursor = 0;
    for &c in &counts {
        lists.push(data[cursor..cursor + c as usize].to_vec());
        cursor += c as usize;
    }
    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn sample() -> Mapping {
        // 5 source fixels, 8 target fixels; source 4 feeds targets 3 and 7
        let mut m = Mapping::new(5, 8);
        m.set(0, vec![2]);
        m.set(3, vec![4, 0]);
        m.set(7, vec![4]);
        m
    }

    #[test]
    fn unset_targets_are_empty_not_errors() {
        let m = sample();
        assert_eq!(m.len(), 8);
        assert_eq!(&m[1], &[] as &[u32]);
        assert_eq!(&m[3], &[4, 0]);
    }

    #[test]
    fn inverse_counts_each_occurrence_once() {
        let inv = sample().inverse();
        assert_eq!(inv.len(), 5);
        assert_eq!(inv[4], vec![3, 7]);
        assert_eq!(inv[2], vec![0]);
        assert_eq!(inv[1], Vec::<u32>::new());
    }

    #[test]
    fn save_load_preserves_order_exactly() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("correspondence");
        let original = sample();
        original.save(&dir)?;
        let reloaded = Mapping::load(&dir, false)?;
        assert_eq!(reloaded, original);
        // Assignment order is semantically meaningful: [4, 0] must not
        // come back as [0, 4]
        assert_eq!(&reloaded[3], &[4, 0]);
        Ok(())
    }

    #[test]
    fn import_inverse_builds_the_transpose() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("correspondence");
        let original = sample();
        original.save(&dir)?;
        let flipped = Mapping::load(&dir, true)?;
        assert_eq!(flipped.len(), 5);
        assert_eq!(flipped.source_fixels(), 8);
        // Transposing twice recovers the original as sets (ascending order)
        let mut expected: Vec<Vec<u32>> = (0..8).map(|t| original[t].to_vec()).collect();
        for e in &mut expected { e.sort_unstable(); }
        assert_eq!(flipped.inverse(), expected);
        Ok(())
    }

    #[test]
    fn inverse_export_writes_source_keyed_files() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("correspondence");
        sample().save_with_inverse(&dir)?;
        let counts = raw::read_u32(&dir.join(INVERSE_INDEX_FILE)).unwrap();
        assert_eq!(counts, vec![1, 0, 1, 0, 2]);
        let data = raw::read_u32(&dir.join(INVERSE_DATA_FILE)).unwrap();
        assert_eq!(data, vec![3, 0, 3, 7]);
        Ok(())
    }

    #[test]
    fn out_of_range_stored_index_is_rejected() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("correspondence");
        sample().save(&dir)?;
        // Overwrite the data file with an index beyond the source count
        raw::write_u32([9, 4, 0, 4], &dir.join(DATA_FILE)).unwrap();
        assert!(matches!(Mapping::load(&dir, false),
                         Err(FixelError::Header { .. })));
        Ok(())
    }
}
