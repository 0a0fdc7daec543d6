//! End-to-end: build two small fixel datasets, match them, persist the
//! mapping, reload it and project a quantitative value through it.

use float_eq::assert_float_eq;
#[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

use fixelcorr::{Direction, Fixel, FixelDataset, Grid, Mapping};
use fixelcorr::algorithms::{CombinatorialParams, Ni2022};
use fixelcorr::dataset::{read_data_file, write_data_file};
use fixelcorr::matcher::Matcher;
use fixelcorr::projector::{FillSettings, Metric, Projector};

fn fx(deg_from_x: f32, density: f32) -> Fixel {
    let rad = deg_from_x.to_radians();
    Fixel::new(Direction::new(rad.cos(), rad.sin(), 0.0), density)
}

#[test]
fn match_save_load_project() {
    let grid = Grid::new([2, 2, 2]);
    let mut source_voxels = vec![vec![]; grid.len()];
    let mut target_voxels = vec![vec![]; grid.len()];

    // A populated voxel with two crossing fibre populations, slightly
    // rotated between source and target
    source_voxels[0] = vec![fx(0.0, 1.0), fx(90.0, 0.6)];
    target_voxels[0] = vec![fx(4.0, 1.0), fx(86.0, 0.6)];
    // A voxel where one source fibre splits into two targets
    source_voxels[3] = vec![fx(0.0, 1.0)];
    target_voxels[3] = vec![fx(-8.0, 0.5), fx(8.0, 0.5)];
    // A target fixel with no source counterpart
    target_voxels[6] = vec![fx(45.0, 0.4)];

    let source = FixelDataset::from_voxel_fixels(grid, source_voxels).unwrap();
    let target = FixelDataset::from_voxel_fixels(grid, target_voxels).unwrap();

    let algorithm = Ni2022::new(CombinatorialParams::default());
    let matcher = Matcher::new(&source, &target, &algorithm).unwrap();
    let output = matcher.run(false, false);

    assert_eq!(output.mapping.len(), target.len());
    assert_eq!(&output.mapping[0], &[0]);
    assert_eq!(&output.mapping[1], &[1]);
    // Source fixel 2 fans out over both targets of voxel 3
    assert_eq!(&output.mapping[2], &[2]);
    assert_eq!(&output.mapping[3], &[2]);
    // Unmatched target stays empty
    assert_eq!(&output.mapping[4], &[] as &[u32]);

    // ---- Persistence round trip ----------------------------------------
    let tmp = tempfile::tempdir().unwrap();
    let mapping_dir = tmp.path().join("correspondence");
    output.mapping.save(&mapping_dir).unwrap();
    let reloaded = Mapping::load(&mapping_dir, false).unwrap();
    assert_eq!(reloaded, output.mapping);

    // ---- Projection through the reloaded mapping -----------------------
    let values = [10.0, 6.0, 4.0];
    write_data_file(&tmp.path().join("fd.raw"), &values).unwrap();
    let values = read_data_file(&tmp.path().join("fd.raw"), source.len()).unwrap();

    let projector = Projector::new(&reloaded, &values,
                                   source.directions(), target.directions(),
                                   Metric::Sum,
                                   FillSettings { value: -1.0, ..Default::default() },
                                   None).unwrap();
    let projected = projector.project();

    assert_float_eq!(projected[0], 10.0, abs <= 1e-6);
    assert_float_eq!(projected[1], 6.0, abs <= 1e-6);
    // The fanned-out source contributes half its value to each target
    assert_float_eq!(projected[2], 2.0, abs <= 1e-6);
    assert_float_eq!(projected[3], 2.0, abs <= 1e-6);
    // Unmapped target receives the fill value
    assert_float_eq!(projected[4], -1.0, abs <= 1e-6);
}
