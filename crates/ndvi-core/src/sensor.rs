//! Sensor families and their per-family processing profiles.
//!
//! Each family answers the same two questions: how to mask a native scene
//! and how to bring its digital numbers onto the common reflectance scale.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{
    LANDSAT_OFFSET, LANDSAT_SATURATION, LANDSAT_SCALE, MISSED_CLOUD_BLUE_THRESHOLD,
    MISSED_CLOUD_DILATION, SENTINEL2_OFFSET, SENTINEL2_SATURATION, SENTINEL2_SCALE,
};
use crate::error::{NdviError, Result};
use crate::harmonize::CrossSensorCalibration;
use crate::mask::qa::{BitQuery, CategoryQuery, QA_PIXEL_FIELDS, SCL_CATEGORIES};
use crate::mask::NativeMasker;

/// Group of sensors sharing one masking and harmonization rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFamily {
    /// Landsat 5 TM and Landsat 7 ETM+.
    LandsatLegacy,
    /// Landsat 8 and 9 OLI; the reference radiometric scale.
    Landsat,
    /// Sentinel-2 MSI.
    Sentinel2,
}

impl SensorFamily {
    /// Map a catalog product name onto its family.
    pub fn from_product(product: &str) -> Option<Self> {
        match product {
            "ls5_sr" | "ls7_sr" => Some(Self::LandsatLegacy),
            "ls8_sr" | "ls9_sr" => Some(Self::Landsat),
            "s2_l2a" => Some(Self::Sentinel2),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::LandsatLegacy => "ls57",
            Self::Landsat => "ls89",
            Self::Sentinel2 => "s2",
        }
    }

    /// Bands to request from the band reader, quality layer included.
    pub fn input_bands(&self, sensors: &SensorsConfig) -> Vec<String> {
        let (bands, mask_band) = match self {
            Self::LandsatLegacy => (&sensors.landsat_legacy.bands, &sensors.landsat_legacy.mask_band),
            Self::Landsat => (&sensors.landsat.bands, &sensors.landsat.mask_band),
            Self::Sentinel2 => (&sensors.sentinel2.bands, &sensors.sentinel2.mask_band),
        };
        bands.iter().cloned().chain(std::iter::once(mask_band.clone())).collect()
    }

    /// Build the native-grid masking transform for this family.
    pub fn masker(&self, sensors: &SensorsConfig) -> Result<NativeMasker> {
        match self {
            Self::LandsatLegacy | Self::Landsat => {
                let profile = self.landsat_profile(sensors).clone();
                let cloud = BitQuery::compile(QA_PIXEL_FIELDS, &profile.cloud_flags)?;
                let nodata = BitQuery::compile(QA_PIXEL_FIELDS, &profile.nodata_flags)?;
                Ok(NativeMasker::Landsat {
                    profile,
                    cloud,
                    nodata,
                })
            }
            Self::Sentinel2 => {
                let profile = sensors.sentinel2.clone();
                let cloud = CategoryQuery::compile(SCL_CATEGORIES, &profile.cloud_categories)?;
                let nodata = CategoryQuery::compile(SCL_CATEGORIES, &profile.nodata_categories)?;
                Ok(NativeMasker::Sentinel2 {
                    profile,
                    cloud,
                    nodata,
                })
            }
        }
    }

    /// Scale, offset and index band names used when harmonizing this family.
    pub fn radiometry(&self, sensors: &SensorsConfig) -> Radiometry {
        match self {
            Self::LandsatLegacy | Self::Landsat => {
                let p = self.landsat_profile(sensors);
                Radiometry {
                    scale: p.scale,
                    offset: p.offset,
                    index_bands: p.index_bands.clone(),
                }
            }
            Self::Sentinel2 => Radiometry {
                scale: sensors.sentinel2.scale,
                offset: sensors.sentinel2.offset,
                index_bands: sensors.sentinel2.index_bands.clone(),
            },
        }
    }

    /// Cross-sensor correction onto the reference scale, if this family needs one.
    pub fn calibration(&self, sensors: &SensorsConfig) -> Result<Option<CrossSensorCalibration>> {
        match self {
            Self::LandsatLegacy => sensors
                .legacy_calibration
                .map(Some)
                .ok_or_else(|| {
                    NdviError::Config(
                        "legacy Landsat data present but no legacy_calibration configured".into(),
                    )
                }),
            Self::Landsat | Self::Sentinel2 => Ok(None),
        }
    }

    fn landsat_profile<'a>(&self, sensors: &'a SensorsConfig) -> &'a LandsatProfile {
        match self {
            Self::LandsatLegacy => &sensors.landsat_legacy,
            _ => &sensors.landsat,
        }
    }
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Names of the two bands the vegetation index is computed from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBands {
    pub nir: String,
    pub red: String,
}

impl IndexBands {
    pub fn new(nir: &str, red: &str) -> Self {
        Self {
            nir: nir.to_string(),
            red: red.to_string(),
        }
    }

    pub fn contains(&self, band: &str) -> bool {
        self.nir == band || self.red == band
    }
}

/// Rescaling parameters resolved for one family.
#[derive(Clone, Debug, PartialEq)]
pub struct Radiometry {
    pub scale: f32,
    pub offset: f32,
    pub index_bands: IndexBands,
}

/// Flags pixels whose band value reveals cloud the QA layer missed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrightnessScreen {
    pub band: String,
    /// Digital numbers at or above this value are flagged.
    pub threshold: u16,
    /// Disk radius applied to the flag before it joins the cloud mask.
    pub dilation: usize,
}

impl Default for BrightnessScreen {
    fn default() -> Self {
        Self {
            band: "blue".to_string(),
            threshold: MISSED_CLOUD_BLUE_THRESHOLD,
            dilation: MISSED_CLOUD_DILATION,
        }
    }
}

/// Masking and radiometry profile for a Landsat Collection 2 family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandsatProfile {
    /// Bands read and screened; only `index_bands` survive masking.
    pub bands: Vec<String>,
    pub mask_band: String,
    pub index_bands: IndexBands,
    /// `QA_PIXEL` flag name -> value name marking cloud.
    pub cloud_flags: BTreeMap<String, String>,
    /// `QA_PIXEL` flag name -> value name marking no-data.
    pub nodata_flags: BTreeMap<String, String>,
    pub scale: f32,
    pub offset: f32,
    pub saturation: u16,
    pub brightness_screen: Option<BrightnessScreen>,
}

impl LandsatProfile {
    /// Landsat 5/7: cloud and cloud shadow.
    pub fn legacy() -> Self {
        Self::with_cloud_flags(&["cloud", "cloud_shadow"])
    }

    /// Landsat 8/9: cloud, cloud shadow and cirrus.
    pub fn modern() -> Self {
        Self::with_cloud_flags(&["cloud", "cloud_shadow", "cirrus"])
    }

    fn with_cloud_flags(flags: &[&str]) -> Self {
        Self {
            bands: ["red", "nir", "green", "blue"].iter().map(|s| s.to_string()).collect(),
            mask_band: "QA_PIXEL".to_string(),
            index_bands: IndexBands::new("nir", "red"),
            cloud_flags: flags
                .iter()
                .map(|f| (f.to_string(), "high_confidence".to_string()))
                .collect(),
            nodata_flags: [("nodata".to_string(), "true".to_string())].into_iter().collect(),
            scale: LANDSAT_SCALE,
            offset: LANDSAT_OFFSET,
            saturation: LANDSAT_SATURATION,
            brightness_screen: Some(BrightnessScreen::default()),
        }
    }
}

/// Masking and radiometry profile for Sentinel-2 L2A.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sentinel2Profile {
    pub bands: Vec<String>,
    pub mask_band: String,
    pub index_bands: IndexBands,
    /// `SCL` categories marking cloud.
    pub cloud_categories: Vec<String>,
    /// `SCL` categories marking no-data.
    pub nodata_categories: Vec<String>,
    pub scale: f32,
    pub offset: f32,
    pub saturation: u16,
}

impl Default for Sentinel2Profile {
    fn default() -> Self {
        Self {
            bands: vec!["red".to_string(), "nir_2".to_string()],
            mask_band: "SCL".to_string(),
            index_bands: IndexBands::new("nir_2", "red"),
            cloud_categories: [
                "cloud high probability",
                "cloud medium probability",
                "thin cirrus",
                "cloud shadows",
                "saturated or defective",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            nodata_categories: vec!["no data".to_string()],
            scale: SENTINEL2_SCALE,
            offset: SENTINEL2_OFFSET,
            saturation: SENTINEL2_SATURATION,
        }
    }
}

/// Profiles for every supported family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default = "LandsatProfile::legacy")]
    pub landsat_legacy: LandsatProfile,
    #[serde(default = "LandsatProfile::modern")]
    pub landsat: LandsatProfile,
    #[serde(default)]
    pub sentinel2: Sentinel2Profile,
    /// Linear correction of legacy Landsat NDVI onto the Landsat 8 scale.
    #[serde(default)]
    pub legacy_calibration: Option<CrossSensorCalibration>,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            landsat_legacy: LandsatProfile::legacy(),
            landsat: LandsatProfile::modern(),
            sentinel2: Sentinel2Profile::default(),
            legacy_calibration: None,
        }
    }
}

impl SensorsConfig {
    pub fn validate(&self) -> Result<()> {
        for family in [SensorFamily::LandsatLegacy, SensorFamily::Landsat, SensorFamily::Sentinel2] {
            family.masker(self)?;
            let radiometry = family.radiometry(self);
            if !radiometry.scale.is_finite() || radiometry.scale == 0.0 || !radiometry.offset.is_finite() {
                return Err(NdviError::Config(format!(
                    "{family}: scale must be finite and non-zero, offset finite"
                )));
            }
        }
        for (family, bands, index) in [
            ("ls57", &self.landsat_legacy.bands, &self.landsat_legacy.index_bands),
            ("ls89", &self.landsat.bands, &self.landsat.index_bands),
            ("s2", &self.sentinel2.bands, &self.sentinel2.index_bands),
        ] {
            for band in [&index.nir, &index.red] {
                if !bands.contains(band) {
                    return Err(NdviError::Config(format!(
                        "{family}: index band '{band}' is not in the loaded band list"
                    )));
                }
            }
        }
        for (family, screen, bands) in [
            ("ls57", &self.landsat_legacy.brightness_screen, &self.landsat_legacy.bands),
            ("ls89", &self.landsat.brightness_screen, &self.landsat.bands),
        ] {
            if let Some(screen) = screen {
                if !bands.contains(&screen.band) {
                    return Err(NdviError::Config(format!(
                        "{family}: brightness screen band '{}' is not loaded",
                        screen.band
                    )));
                }
            }
        }
        if let Some(calibration) = &self.legacy_calibration {
            calibration.validate()?;
        }
        Ok(())
    }
}
