use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CLEANUP_RADIUS, DEFAULT_MIN_NUM_OBS, DEFAULT_ROLLING_WINDOW, DEFAULT_WATER_THRESHOLD};
use crate::error::{NdviError, Result};
use crate::geobox::ChunkShape;
use crate::load::{GroupBy, Resampling};
use crate::mask::{MaskFilter, MorphOp};
use crate::normalize::NormalizeParams;
use crate::reduce::Smoothing;
use crate::sensor::{SensorFamily, SensorsConfig};

/// How observations are brought onto the output grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default)]
    pub resampling: Resampling,
    #[serde(default)]
    pub group_by: GroupBy,
    #[serde(default)]
    pub chunks: ChunkShape,
}

impl LoadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunks.x == 0 || self.chunks.y == 0 {
            return Err(NdviError::Config(format!(
                "chunk shape must be non-zero, got {}x{}",
                self.chunks.x, self.chunks.y
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Centered window length along time, in slots.
    pub rolling_window: usize,
    #[serde(default)]
    pub statistic: Smoothing,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            rolling_window: DEFAULT_ROLLING_WINDOW,
            statistic: Smoothing::default(),
        }
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rolling_window == 0 {
            return Err(NdviError::Config("rolling_window must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClimatologyConfig {
    #[serde(default = "default_climatology_families")]
    pub families: Vec<SensorFamily>,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    /// Cleanup applied to the fused cloud mask before erasure.
    #[serde(default)]
    pub mask_filters: Vec<MaskFilter>,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
}

fn default_climatology_families() -> Vec<SensorFamily> {
    vec![SensorFamily::LandsatLegacy, SensorFamily::Landsat]
}

impl Default for ClimatologyConfig {
    fn default() -> Self {
        Self {
            families: default_climatology_families(),
            load: LoadConfig::default(),
            sensors: SensorsConfig::default(),
            mask_filters: Vec::new(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl ClimatologyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_families(&self.families)?;
        self.load.validate()?;
        self.sensors.validate()?;
        self.smoothing.validate()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    #[serde(default = "default_anomaly_families")]
    pub families: Vec<SensorFamily>,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default = "default_anomaly_filters")]
    pub mask_filters: Vec<MaskFilter>,
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    #[serde(default = "default_min_num_obs")]
    pub min_num_obs: i16,
    #[serde(default = "default_water_threshold")]
    pub water_threshold: f32,
}

fn default_anomaly_families() -> Vec<SensorFamily> {
    vec![SensorFamily::Landsat, SensorFamily::Sentinel2]
}

fn default_anomaly_filters() -> Vec<MaskFilter> {
    vec![
        MaskFilter(MorphOp::Opening, DEFAULT_CLEANUP_RADIUS),
        MaskFilter(MorphOp::Dilation, DEFAULT_CLEANUP_RADIUS),
    ]
}

fn default_min_num_obs() -> i16 {
    DEFAULT_MIN_NUM_OBS
}

fn default_water_threshold() -> f32 {
    DEFAULT_WATER_THRESHOLD
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            families: default_anomaly_families(),
            load: LoadConfig::default(),
            sensors: SensorsConfig::default(),
            mask_filters: default_anomaly_filters(),
            smoothing: SmoothingConfig::default(),
            min_num_obs: DEFAULT_MIN_NUM_OBS,
            water_threshold: DEFAULT_WATER_THRESHOLD,
        }
    }
}

impl AnomalyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn normalize_params(&self) -> NormalizeParams {
        NormalizeParams {
            min_num_obs: self.min_num_obs,
            water_threshold: self.water_threshold,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_families(&self.families)?;
        self.load.validate()?;
        self.sensors.validate()?;
        self.smoothing.validate()?;
        self.normalize_params().validate()
    }
}

fn validate_families(families: &[SensorFamily]) -> Result<()> {
    if families.is_empty() {
        return Err(NdviError::Config("at least one sensor family is required".into()));
    }
    for (i, family) in families.iter().enumerate() {
        if families[..i].contains(family) {
            return Err(NdviError::Config(format!("sensor family '{family}' listed twice")));
        }
    }
    Ok(())
}
