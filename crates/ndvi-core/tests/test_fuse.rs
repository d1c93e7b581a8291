#[allow(dead_code)]
mod common;

use std::collections::BTreeMap;

use ndarray::Array2;

use ndvi_core::consts::RAW_NODATA;
use ndvi_core::fuse::{fuse_first_valid, fuse_or, fuse_scenes};
use ndvi_core::raster::MaskedScene;

use common::geobox;

fn scene(nir: Vec<u16>, cloud: Vec<bool>) -> MaskedScene {
    let mut bands = BTreeMap::new();
    bands.insert("nir".to_string(), Array2::from_shape_vec((1, 3), nir).unwrap());
    MaskedScene {
        grid: geobox(1, 3),
        bands,
        cloud_mask: Array2::from_shape_vec((1, 3), cloud).unwrap(),
    }
}

#[test]
fn test_first_valid_respects_contributor_order() {
    let a = Array2::from_shape_vec((1, 3), vec![RAW_NODATA, 10, RAW_NODATA]).unwrap();
    let b = Array2::from_shape_vec((1, 3), vec![20, 30, RAW_NODATA]).unwrap();
    let fused = fuse_first_valid(&[&a, &b], RAW_NODATA).unwrap();
    assert_eq!(fused.as_slice().unwrap(), &[20, 10, RAW_NODATA]);

    let reversed = fuse_first_valid(&[&b, &a], RAW_NODATA).unwrap();
    assert_eq!(reversed.as_slice().unwrap(), &[20, 30, RAW_NODATA]);
}

#[test]
fn test_or_fusion_is_monotonic() {
    let a = Array2::from_shape_vec((1, 3), vec![true, false, false]).unwrap();
    let b = Array2::from_shape_vec((1, 3), vec![false, false, true]).unwrap();
    let c = Array2::from_shape_vec((1, 3), vec![false, true, false]).unwrap();

    let two = fuse_or(&[&a, &b]).unwrap();
    let three = fuse_or(&[&a, &b, &c]).unwrap();
    for (before, after) in two.iter().zip(three.iter()) {
        assert!(!before || *after, "adding a contributor un-masked a pixel");
    }
    assert_eq!(three.as_slice().unwrap(), &[true, true, true]);
}

#[test]
fn test_fusion_needs_a_contributor() {
    assert!(fuse_first_valid(&[], RAW_NODATA).is_err());
    assert!(fuse_or(&[]).is_err());
    assert!(fuse_scenes(Vec::new()).is_err());
}

#[test]
fn test_fusion_shape_mismatch() {
    let a = Array2::from_elem((1, 3), 1u16);
    let b = Array2::from_elem((2, 3), 1u16);
    assert!(fuse_first_valid(&[&a, &b], RAW_NODATA).is_err());
}

#[test]
fn test_fuse_scenes_uses_separate_reducers() {
    let first = scene(vec![RAW_NODATA, 11, 12], vec![false, false, true]);
    let second = scene(vec![21, 22, 23], vec![true, false, false]);
    let fused = fuse_scenes(vec![first, second]).unwrap();
    assert_eq!(fused.bands["nir"].as_slice().unwrap(), &[21, 11, 12]);
    assert_eq!(fused.cloud_mask.as_slice().unwrap(), &[true, false, true]);
}

#[test]
fn test_single_scene_passes_through() {
    let only = scene(vec![1, 2, 3], vec![false, true, false]);
    let fused = fuse_scenes(vec![only.clone()]).unwrap();
    assert_eq!(fused.bands, only.bands);
    assert_eq!(fused.cloud_mask, only.cloud_mask);
}
