use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::{Array2, Array3, Axis};

use crate::error::{NdviError, Result};
use crate::geobox::{ChunkWindow, GeoBox};
use crate::sensor::SensorFamily;

/// Longitude/latitude envelope of an acquisition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Footprint {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl Footprint {
    pub fn center_longitude(&self) -> f64 {
        (self.min_lon + self.max_lon) / 2.0
    }
}

/// Catalog metadata for one sensor acquisition.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationMeta {
    /// Catalog identifier, used to pin contributor order within a fused slot.
    pub id: String,
    /// Catalog product name, e.g. `ls8_sr` or `s2_l2a`.
    pub product: String,
    pub time: DateTime<Utc>,
    pub footprint: Footprint,
}

impl ObservationMeta {
    pub fn family(&self) -> Option<SensorFamily> {
        SensorFamily::from_product(&self.product)
    }
}

/// Raw bands of one observation on its native grid, quality layer included.
#[derive(Clone, Debug)]
pub struct NativeScene {
    pub grid: GeoBox,
    pub bands: BTreeMap<String, Array2<u16>>,
}

impl NativeScene {
    pub fn band(&self, name: &str) -> Result<&Array2<u16>> {
        self.bands
            .get(name)
            .ok_or_else(|| NdviError::MissingBand(name.to_string()))
    }

    /// Every band must cover the native grid exactly.
    pub fn check_shapes(&self) -> Result<()> {
        let expected = [self.grid.height, self.grid.width];
        for (name, band) in &self.bands {
            if band.shape() != expected {
                return Err(NdviError::shape_mismatch(
                    format!("band '{name}'"),
                    &expected,
                    band.shape(),
                ));
            }
        }
        Ok(())
    }
}

/// An observation after quality masking: value bands with excluded pixels set
/// to no-data, plus the unfiltered cloud mask (`true` = cloud).
#[derive(Clone, Debug)]
pub struct MaskedScene {
    pub grid: GeoBox,
    pub bands: BTreeMap<String, Array2<u16>>,
    pub cloud_mask: Array2<bool>,
}

/// Time-ordered stack of fused slots for one sensor family, in raw units.
///
/// Arrays are shaped `(time, y, x)`; `times[i]` is the time of slot `i` and
/// the slots are strictly sorted by time.
#[derive(Clone, Debug)]
pub struct RawComposite {
    pub family: SensorFamily,
    pub times: Vec<DateTime<Utc>>,
    pub bands: BTreeMap<String, Array3<u16>>,
    pub cloud_mask: Array3<bool>,
}

impl RawComposite {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Spatial (height, width).
    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.cloud_mask.dim();
        (h, w)
    }

    pub fn band(&self, name: &str) -> Result<&Array3<u16>> {
        self.bands
            .get(name)
            .ok_or_else(|| NdviError::MissingBand(name.to_string()))
    }

    /// Copy of the spatial window across every slot.
    pub fn window(&self, window: &ChunkWindow) -> RawComposite {
        RawComposite {
            family: self.family,
            times: self.times.clone(),
            bands: self
                .bands
                .iter()
                .map(|(name, band)| (name.clone(), window.slice3(band)))
                .collect(),
            cloud_mask: window.slice3(&self.cloud_mask),
        }
    }
}

/// Rescaled reflectance bands (`NaN` = no-data).
#[derive(Clone, Debug)]
pub struct ReflectanceStack {
    pub family: SensorFamily,
    pub times: Vec<DateTime<Utc>>,
    pub bands: BTreeMap<String, Array3<f32>>,
}

impl ReflectanceStack {
    pub fn band(&self, name: &str) -> Result<&Array3<f32>> {
        self.bands
            .get(name)
            .ok_or_else(|| NdviError::MissingBand(name.to_string()))
    }
}

/// Vegetation-index time series shaped `(time, y, x)`, `NaN` = no-data.
#[derive(Clone, Debug)]
pub struct IndexSeries {
    pub times: Vec<DateTime<Utc>>,
    pub values: Array3<f32>,
}

impl IndexSeries {
    pub fn empty(height: usize, width: usize) -> Self {
        Self {
            times: Vec::new(),
            values: Array3::from_elem((0, height, width), f32::NAN),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn spatial_shape(&self) -> (usize, usize) {
        let (_, h, w) = self.values.dim();
        (h, w)
    }

    /// Per-slot rasters in time order.
    pub fn slots(&self) -> impl Iterator<Item = (&DateTime<Utc>, ndarray::ArrayView2<'_, f32>)> {
        self.times.iter().zip(self.values.axis_iter(Axis(0)))
    }
}
