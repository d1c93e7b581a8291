#[allow(dead_code)]
mod common;

use std::collections::BTreeMap;

use ndarray::{Array2, Array3};

use ndvi_core::consts::RAW_NODATA;
use ndvi_core::error::NdviError;
use ndvi_core::mask::erase_masked;
use ndvi_core::mask::qa::{BitQuery, CategoryQuery, QA_PIXEL_FIELDS, SCL_CATEGORIES};
use ndvi_core::raster::RawComposite;
use ndvi_core::sensor::{SensorFamily, SensorsConfig};

use common::*;

fn flags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// ---------------------------------------------------------------------------
// Flag decoding
// ---------------------------------------------------------------------------

#[test]
fn test_bit_query_matches_any_flag() {
    let q = BitQuery::compile(
        QA_PIXEL_FIELDS,
        &flags(&[("cloud", "high_confidence"), ("cloud_shadow", "high_confidence")]),
    )
    .unwrap();
    assert!(q.matches(1 << 3));
    assert!(q.matches(1 << 4));
    assert!(!q.matches(QA_CLEAR));
}

#[test]
fn test_bit_query_multi_bit_field() {
    let q = BitQuery::compile(QA_PIXEL_FIELDS, &flags(&[("cloud_confidence", "medium")])).unwrap();
    assert!(q.matches(2 << 8));
    assert!(!q.matches(3 << 8));
    assert!(!q.matches(1 << 8));
}

#[test]
fn test_unknown_flag_is_config_error() {
    let err = BitQuery::compile(QA_PIXEL_FIELDS, &flags(&[("clouds", "high_confidence")])).unwrap_err();
    assert!(matches!(err, NdviError::UnknownFlag { .. }));

    let err = BitQuery::compile(QA_PIXEL_FIELDS, &flags(&[("cloud", "very_high")])).unwrap_err();
    assert!(matches!(err, NdviError::UnknownFlag { .. }));
}

#[test]
fn test_category_query() {
    let q = CategoryQuery::compile(SCL_CATEGORIES, &["cloud high probability".to_string()]).unwrap();
    assert!(q.matches(SCL_CLOUD_HIGH));
    assert!(!q.matches(SCL_VEGETATION));

    let err = CategoryQuery::compile(SCL_CATEGORIES, &["fog".to_string()]).unwrap_err();
    assert!(matches!(err, NdviError::UnknownCategory(_)));
}

// ---------------------------------------------------------------------------
// Native masking
// ---------------------------------------------------------------------------

#[test]
fn test_landsat_masking_keeps_only_index_bands() {
    let grid = geobox(3, 3);
    let masker = SensorFamily::Landsat.masker(&SensorsConfig::default()).unwrap();
    let masked = masker.apply(uniform_landsat(&grid, 20_000, 11_000, QA_CLEAR)).unwrap();
    let names: Vec<&str> = masked.bands.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["nir", "red"]);
    assert!(masked.cloud_mask.iter().all(|&c| !c));
    assert!(masked.bands["nir"].iter().all(|&v| v == 20_000));
}

#[test]
fn test_landsat_cloud_flag_sets_mask_not_values() {
    let grid = geobox(2, 2);
    let masker = SensorFamily::Landsat.masker(&SensorsConfig::default()).unwrap();
    let masked = masker.apply(uniform_landsat(&grid, 20_000, 11_000, QA_CLOUD)).unwrap();
    assert!(masked.cloud_mask.iter().all(|&c| c));
    // Cloud only erases after fusion and cleanup.
    assert!(masked.bands["red"].iter().all(|&v| v == 11_000));
}

#[test]
fn test_landsat_nodata_flag_erases_values() {
    let grid = geobox(2, 2);
    let masker = SensorFamily::Landsat.masker(&SensorsConfig::default()).unwrap();
    let masked = masker.apply(uniform_landsat(&grid, 20_000, 11_000, QA_NODATA)).unwrap();
    assert!(masked.bands["nir"].iter().all(|&v| v == RAW_NODATA));
    assert!(masked.cloud_mask.iter().all(|&c| !c));
}

#[test]
fn test_value_screen_rejects_nonpositive_and_saturated() {
    let grid = geobox(1, 3);
    let masker = SensorFamily::Landsat.masker(&SensorsConfig::default()).unwrap();
    // 7000 * 2.75e-5 - 0.2 < 0; 65455 is saturated.
    let nir = Array2::from_shape_vec((1, 3), vec![7_000u16, 65_455, 20_000]).unwrap();
    let red = Array2::from_elem((1, 3), 11_000u16);
    let qa = Array2::from_elem((1, 3), QA_CLEAR);
    let masked = masker.apply(landsat_scene(&grid, nir, red, qa)).unwrap();
    assert_eq!(masked.bands["red"][[0, 0]], RAW_NODATA);
    assert_eq!(masked.bands["red"][[0, 1]], RAW_NODATA);
    assert_eq!(masked.bands["red"][[0, 2]], 11_000);
}

#[test]
fn test_bright_blue_is_dilated_into_cloud_mask() {
    let grid = geobox(13, 13);
    let masker = SensorFamily::Landsat.masker(&SensorsConfig::default()).unwrap();
    let mut scene = uniform_landsat(&grid, 20_000, 11_000, QA_CLEAR);
    scene.bands.get_mut("blue").unwrap()[[6, 6]] = 21_000;
    let masked = masker.apply(scene).unwrap();
    assert!(masked.cloud_mask[[6, 6]]);
    assert!(masked.cloud_mask[[6, 11]], "radius-5 disk reaches five pixels out");
    assert!(!masked.cloud_mask[[6, 12]]);
    assert!(!masked.cloud_mask[[0, 0]]);
}

#[test]
fn test_sentinel2_masking() {
    let grid = geobox(2, 2);
    let masker = SensorFamily::Sentinel2.masker(&SensorsConfig::default()).unwrap();

    let clear = masker.apply(uniform_sentinel2(&grid, 5_000, 1_000, SCL_VEGETATION)).unwrap();
    assert!(clear.cloud_mask.iter().all(|&c| !c));
    assert!(clear.bands["nir_2"].iter().all(|&v| v == 5_000));

    let cloudy = masker.apply(uniform_sentinel2(&grid, 5_000, 1_000, SCL_CLOUD_HIGH)).unwrap();
    assert!(cloudy.cloud_mask.iter().all(|&c| c));

    let empty = masker.apply(uniform_sentinel2(&grid, 5_000, 1_000, SCL_NODATA)).unwrap();
    assert!(empty.bands["red"].iter().all(|&v| v == RAW_NODATA));
}

#[test]
fn test_missing_quality_band() {
    let grid = geobox(2, 2);
    let masker = SensorFamily::Landsat.masker(&SensorsConfig::default()).unwrap();
    let mut scene = uniform_landsat(&grid, 20_000, 11_000, QA_CLEAR);
    scene.bands.remove("QA_PIXEL");
    let err = masker.apply(scene).unwrap_err();
    assert!(matches!(err, NdviError::MissingBand(ref b) if b == "QA_PIXEL"));
}

// ---------------------------------------------------------------------------
// Erasure
// ---------------------------------------------------------------------------

#[test]
fn test_erase_masked_only_touches_cloud() {
    let mut bands = BTreeMap::new();
    bands.insert("nir".to_string(), Array3::from_elem((2, 1, 2), 20_000u16));
    let mut cloud = Array3::from_elem((2, 1, 2), false);
    cloud[[1, 0, 1]] = true;
    let mut composite = RawComposite {
        family: SensorFamily::Landsat,
        times: vec![utc(2024, 3, 1, 10), utc(2024, 3, 9, 10)],
        bands,
        cloud_mask: cloud.clone(),
    };
    erase_masked(&mut composite, &cloud).unwrap();
    let nir = &composite.bands["nir"];
    assert_eq!(nir[[1, 0, 1]], RAW_NODATA);
    assert_eq!(nir[[1, 0, 0]], 20_000);
    assert_eq!(nir[[0, 0, 1]], 20_000);
}

#[test]
fn test_erase_masked_shape_mismatch() {
    let mut composite = RawComposite {
        family: SensorFamily::Landsat,
        times: vec![utc(2024, 3, 1, 10)],
        bands: BTreeMap::new(),
        cloud_mask: Array3::from_elem((1, 2, 2), false),
    };
    let err = erase_masked(&mut composite, &Array3::from_elem((1, 3, 2), false)).unwrap_err();
    assert!(matches!(err, NdviError::ShapeMismatch { .. }));
}
