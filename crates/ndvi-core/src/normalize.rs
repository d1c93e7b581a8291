//! Climatology-relative normalization of a period mean, with the
//! permanent-water exclusion.

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{COUNT_NODATA, DEFAULT_MIN_NUM_OBS, DEFAULT_WATER_THRESHOLD};
use crate::error::{NdviError, Result};
use crate::index::finite_or_nan;
use crate::reduce::PeriodStats;
use crate::source::BaselineMonth;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizeParams {
    /// Baseline pixels with fewer observations are not trusted.
    pub min_num_obs: i16,
    /// Water frequency at or above which a pixel is excluded.
    pub water_threshold: f32,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            min_num_obs: DEFAULT_MIN_NUM_OBS,
            water_threshold: DEFAULT_WATER_THRESHOLD,
        }
    }
}

impl NormalizeParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.water_threshold > 0.0 && self.water_threshold <= 1.0) {
            return Err(NdviError::Config(format!(
                "water_threshold must be in (0, 1], got {}",
                self.water_threshold
            )));
        }
        if self.min_num_obs < 0 {
            return Err(NdviError::Config(format!(
                "min_num_obs must be non-negative, got {}",
                self.min_num_obs
            )));
        }
        Ok(())
    }
}

/// Normalized outputs for one chunk or one full geobox.
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyTile {
    pub mean: Array2<f32>,
    pub anomaly: Array2<f32>,
    pub clear_count: Array2<i16>,
}

/// `true` where the baseline has at least `min_num_obs` observations.
pub fn confidence_mask(count: &Array2<i16>, min_num_obs: i16) -> Array2<bool> {
    count.mapv(|c| c >= min_num_obs)
}

/// `(mean - baseline_mean) / baseline_stddev`, `NaN` where untrusted or not finite.
pub fn standardize(
    mean: &Array2<f32>,
    baseline_mean: &Array2<f32>,
    baseline_stddev: &Array2<f32>,
    trusted: &Array2<bool>,
) -> Array2<f32> {
    let mut out = Array2::from_elem(mean.dim(), f32::NAN);
    Zip::from(&mut out)
        .and(mean)
        .and(baseline_mean)
        .and(baseline_stddev)
        .and(trusted)
        .for_each(|o, &m, &bm, &bs, &ok| {
            if ok && bs != 0.0 {
                *o = finite_or_nan((m - bm) / bs);
            }
        });
    out
}

/// `true` where the pixel is permanent water. Unknown frequency counts as dry.
pub fn water_mask(frequency: &Array2<f32>, threshold: f32) -> Array2<bool> {
    frequency.mapv(|f| if f.is_nan() { false } else { f >= threshold })
}

pub fn normalize(
    stats: &PeriodStats,
    baseline: &BaselineMonth,
    water_frequency: &Array2<f32>,
    params: &NormalizeParams,
) -> Result<AnomalyTile> {
    let (h, w) = stats.mean.dim();
    baseline.check_shape((h, w))?;
    if water_frequency.dim() != (h, w) {
        return Err(NdviError::shape_mismatch(
            "water frequency",
            &[h, w],
            water_frequency.shape(),
        ));
    }

    let trusted = confidence_mask(&baseline.count, params.min_num_obs);
    let mut anomaly = standardize(&stats.mean, &baseline.mean, &baseline.stddev, &trusted);
    let mut mean = stats.mean.clone();
    let mut clear_count = stats.clear_count.clone();

    let water = water_mask(water_frequency, params.water_threshold);
    let mut excluded = 0usize;
    Zip::from(&mut mean)
        .and(&mut anomaly)
        .and(&mut clear_count)
        .and(&water)
        .for_each(|m, a, c, &is_water| {
            if is_water {
                *m = f32::NAN;
                *a = f32::NAN;
                *c = COUNT_NODATA;
                excluded += 1;
            }
        });
    debug!(water_pixels = excluded, "Applied permanent-water exclusion");

    Ok(AnomalyTile {
        mean,
        anomaly,
        clear_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stddev_is_nan() {
        let one = |v: f32| Array2::from_elem((1, 1), v);
        let out = standardize(&one(0.5), &one(0.4), &one(0.0), &Array2::from_elem((1, 1), true));
        assert!(out[[0, 0]].is_nan());
    }

    #[test]
    fn nan_frequency_is_dry() {
        let freq = Array2::from_elem((1, 1), f32::NAN);
        assert!(!water_mask(&freq, 0.85)[[0, 0]]);
    }
}
