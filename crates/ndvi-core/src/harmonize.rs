//! Radiometric harmonization: digital numbers to reflectance, and the
//! cross-sensor correction of legacy Landsat onto the Landsat 8 scale.

use std::collections::BTreeMap;

use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{FLOAT_NODATA, RAW_NODATA};
use crate::error::{NdviError, Result};
use crate::raster::{RawComposite, ReflectanceStack};
use crate::sensor::Radiometry;

/// Linear model `reference = slope * sensor + intercept`, inverted when applied.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSensorCalibration {
    pub slope: f32,
    pub intercept: f32,
}

impl CrossSensorCalibration {
    pub fn validate(&self) -> Result<()> {
        if !self.slope.is_finite() || self.slope == 0.0 {
            return Err(NdviError::Config(format!(
                "legacy_calibration.slope must be finite and non-zero, got {}",
                self.slope
            )));
        }
        if !self.intercept.is_finite() {
            return Err(NdviError::Config(format!(
                "legacy_calibration.intercept must be finite, got {}",
                self.intercept
            )));
        }
        Ok(())
    }

    /// `(v - intercept) / slope` in place; `NaN` stays `NaN`.
    pub fn apply(&self, values: &mut Array3<f32>) {
        let (slope, intercept) = (self.slope, self.intercept);
        values.par_mapv_inplace(|v| (v - intercept) / slope);
    }
}

/// `dn * scale + offset`, computed in `f64`; raw no-data becomes `NaN`.
pub fn rescale(raw: &Array3<u16>, scale: f32, offset: f32, nodata: u16) -> Array3<f32> {
    let (scale, offset) = (scale as f64, offset as f64);
    let mut out = Array3::from_elem(raw.dim(), FLOAT_NODATA);
    Zip::from(&mut out).and(raw).par_for_each(|o, &dn| {
        if dn != nodata {
            *o = (dn as f64 * scale + offset) as f32;
        }
    });
    out
}

/// Rescale the index bands of a composite onto reflectance.
pub fn harmonize(composite: RawComposite, radiometry: &Radiometry) -> Result<ReflectanceStack> {
    let mut bands = BTreeMap::new();
    for name in [&radiometry.index_bands.nir, &radiometry.index_bands.red] {
        let raw = composite.band(name)?;
        bands.insert(
            name.clone(),
            rescale(raw, radiometry.scale, radiometry.offset, RAW_NODATA),
        );
    }
    debug!(
        family = %composite.family,
        slots = composite.len(),
        scale = radiometry.scale,
        offset = radiometry.offset,
        "Rescaled to reflectance"
    );
    Ok(ReflectanceStack {
        family: composite.family,
        times: composite.times,
        bands,
    })
}
