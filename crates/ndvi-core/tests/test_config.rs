use ndvi_core::consts::{DEFAULT_CHUNK_SIZE, DEFAULT_MIN_NUM_OBS, DEFAULT_ROLLING_WINDOW};
use ndvi_core::error::NdviError;
use ndvi_core::load::{GroupBy, Resampling};
use ndvi_core::mask::{MaskFilter, MorphOp};
use ndvi_core::period::YearMonth;
use ndvi_core::pipeline::config::{AnomalyConfig, ClimatologyConfig};
use ndvi_core::pipeline::PipelineStage;
use ndvi_core::reduce::Smoothing;
use ndvi_core::sensor::SensorFamily;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_anomaly_defaults() {
    let c = AnomalyConfig::default();
    assert_eq!(c.families, vec![SensorFamily::Landsat, SensorFamily::Sentinel2]);
    assert_eq!(
        c.mask_filters,
        vec![MaskFilter(MorphOp::Opening, 5), MaskFilter(MorphOp::Dilation, 5)]
    );
    assert_eq!(c.smoothing.rolling_window, DEFAULT_ROLLING_WINDOW);
    assert_eq!(c.smoothing.statistic, Smoothing::Mean);
    assert_eq!(c.min_num_obs, DEFAULT_MIN_NUM_OBS);
    assert!((c.water_threshold - 0.85).abs() < 1e-6);
    assert_eq!(c.load.resampling, Resampling::Bilinear);
    assert_eq!(c.load.group_by, GroupBy::SolarDay);
    assert_eq!(c.load.chunks.x, DEFAULT_CHUNK_SIZE);
    assert!(c.validate().is_ok());
}

#[test]
fn test_climatology_defaults() {
    let c = ClimatologyConfig::default();
    assert_eq!(c.families, vec![SensorFamily::LandsatLegacy, SensorFamily::Landsat]);
    assert!(c.mask_filters.is_empty());
    assert!(c.sensors.legacy_calibration.is_none());
    assert!(c.validate().is_ok());
}

#[test]
fn test_landsat_profiles_differ_by_cirrus() {
    let c = ClimatologyConfig::default();
    assert!(!c.sensors.landsat_legacy.cloud_flags.contains_key("cirrus"));
    assert!(c.sensors.landsat.cloud_flags.contains_key("cirrus"));
}

// ---------------------------------------------------------------------------
// TOML parsing
// ---------------------------------------------------------------------------

#[test]
fn test_empty_toml_is_default() {
    assert_eq!(AnomalyConfig::from_toml_str("").unwrap(), AnomalyConfig::default());
    assert_eq!(ClimatologyConfig::from_toml_str("").unwrap(), ClimatologyConfig::default());
}

#[test]
fn test_anomaly_toml_overrides() {
    let text = r#"
        families = ["landsat"]
        mask_filters = [["closing", 2]]
        min_num_obs = 10
        water_threshold = 0.9

        [load]
        resampling = "nearest"
        group_by = "time"
        chunks = { x = 256, y = 128 }

        [smoothing]
        rolling_window = 5
        statistic = "median"
    "#;
    let c = AnomalyConfig::from_toml_str(text).unwrap();
    assert_eq!(c.families, vec![SensorFamily::Landsat]);
    assert_eq!(c.mask_filters, vec![MaskFilter(MorphOp::Closing, 2)]);
    assert_eq!(c.min_num_obs, 10);
    assert_eq!(c.load.resampling, Resampling::Nearest);
    assert_eq!(c.load.group_by, GroupBy::Time);
    assert_eq!((c.load.chunks.x, c.load.chunks.y), (256, 128));
    assert_eq!(c.smoothing.rolling_window, 5);
    assert_eq!(c.smoothing.statistic, Smoothing::Median);
}

#[test]
fn test_climatology_toml_calibration() {
    let text = r#"
        [sensors.legacy_calibration]
        slope = 1.03
        intercept = -0.01
    "#;
    let c = ClimatologyConfig::from_toml_str(text).unwrap();
    let cal = c.sensors.legacy_calibration.unwrap();
    assert!((cal.slope - 1.03).abs() < 1e-6);
    assert!((cal.intercept + 0.01).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_zero_rolling_window_rejected() {
    let err = AnomalyConfig::from_toml_str("[smoothing]\nrolling_window = 0").unwrap_err();
    assert!(matches!(err, NdviError::Config(_)));
}

#[test]
fn test_zero_chunk_rejected() {
    let err = ClimatologyConfig::from_toml_str("[load]\nchunks = { x = 0, y = 10 }").unwrap_err();
    assert!(matches!(err, NdviError::Config(_)));
}

#[test]
fn test_zero_slope_rejected() {
    let text = "[sensors.legacy_calibration]\nslope = 0.0\nintercept = 0.1";
    assert!(matches!(
        ClimatologyConfig::from_toml_str(text).unwrap_err(),
        NdviError::Config(_)
    ));
}

#[test]
fn test_water_threshold_out_of_range() {
    assert!(AnomalyConfig::from_toml_str("water_threshold = 1.2").is_err());
    assert!(AnomalyConfig::from_toml_str("water_threshold = 0.0").is_err());
}

#[test]
fn test_unknown_flag_in_profile_rejected() {
    let mut c = AnomalyConfig::default();
    c.sensors
        .landsat
        .cloud_flags
        .insert("haze".to_string(), "high_confidence".to_string());
    assert!(matches!(c.validate().unwrap_err(), NdviError::UnknownFlag { .. }));
}

#[test]
fn test_duplicate_family_rejected() {
    assert!(AnomalyConfig::from_toml_str(r#"families = ["landsat", "landsat"]"#).is_err());
    assert!(AnomalyConfig::from_toml_str("families = []").is_err());
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let err = AnomalyConfig::from_toml_str("min_num_obs = \"many\"").unwrap_err();
    assert!(matches!(err, NdviError::Toml(_)));
}

// ---------------------------------------------------------------------------
// Display / small types
// ---------------------------------------------------------------------------

#[test]
fn test_stage_display() {
    assert_eq!(format!("{}", PipelineStage::Normalization), "Normalizing against climatology");
    assert_eq!(format!("{}", PipelineStage::Loading), "Loading observations");
}

#[test]
fn test_family_from_product() {
    assert_eq!(SensorFamily::from_product("ls5_sr"), Some(SensorFamily::LandsatLegacy));
    assert_eq!(SensorFamily::from_product("ls9_sr"), Some(SensorFamily::Landsat));
    assert_eq!(SensorFamily::from_product("s2_l2a"), Some(SensorFamily::Sentinel2));
    assert_eq!(SensorFamily::from_product("modis"), None);
    assert_eq!(SensorFamily::Landsat.to_string(), "ls89");
}

#[test]
fn test_year_month() {
    let p = YearMonth::new(2024, 3).unwrap();
    assert_eq!(p.to_string(), "2024-03");
    assert_eq!((p.year(), p.month()), (2024, 3));
    assert!(YearMonth::new(2024, 13).is_err());
    assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"year":2024,"month":3}"#);
    let back: YearMonth = serde_json::from_str(r#"{"year":2024,"month":3}"#).unwrap();
    assert_eq!(back, p);
}

#[test]
fn test_year_month_deserialize_rejects_out_of_range_month() {
    let err = serde_json::from_str::<YearMonth>(r#"{"year":2024,"month":13}"#).unwrap_err();
    assert!(err.to_string().contains("outside 1..=12"), "{err}");
    assert!(serde_json::from_str::<YearMonth>(r#"{"year":2024,"month":0}"#).is_err());
}
