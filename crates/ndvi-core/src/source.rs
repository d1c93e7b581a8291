//! Read-only collaborators the pipelines are given at construction.
//!
//! Every call is single-shot and blocking; retries and caching belong to the
//! implementor.

use ndarray::Array2;

use crate::error::{NdviError, Result};
use crate::geobox::{ChunkWindow, GeoBox};
use crate::raster::{NativeScene, ObservationMeta};

/// Reads named bands of one observation at native resolution.
pub trait BandReader: Send + Sync {
    fn read(&self, observation: &ObservationMeta, bands: &[String]) -> Result<NativeScene>;
}

/// Supplies the climatology baseline for one calendar month.
pub trait BaselineSource: Send + Sync {
    /// `month` is 1..=12.
    fn fetch(&self, geobox: &GeoBox, month: u32) -> Result<BaselineMonth>;
}

/// Supplies per-pixel water-occurrence frequency in `[0, 1]` (`NaN` = unknown).
pub trait WaterMaskSource: Send + Sync {
    fn fetch(&self, geobox: &GeoBox) -> Result<Array2<f32>>;
}

/// Climatology baseline for one calendar month.
#[derive(Clone, Debug, PartialEq)]
pub struct BaselineMonth {
    pub mean: Array2<f32>,
    pub stddev: Array2<f32>,
    pub count: Array2<i16>,
}

impl BaselineMonth {
    pub fn check_shape(&self, shape: (usize, usize)) -> Result<()> {
        let expected = [shape.0, shape.1];
        for (what, found) in [
            ("baseline mean", self.mean.shape()),
            ("baseline stddev", self.stddev.shape()),
            ("baseline count", self.count.shape()),
        ] {
            if found != expected {
                return Err(NdviError::shape_mismatch(what, &expected, found));
            }
        }
        Ok(())
    }

    pub fn window(&self, window: &ChunkWindow) -> BaselineMonth {
        BaselineMonth {
            mean: window.slice2(&self.mean).to_owned(),
            stddev: window.slice2(&self.stddev).to_owned(),
            count: window.slice2(&self.count).to_owned(),
        }
    }
}
