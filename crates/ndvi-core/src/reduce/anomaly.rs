use ndarray::{Array2, Axis};

use crate::error::Result;
use crate::raster::IndexSeries;

use super::rolling::{clear_count, rolling_smooth, validity, Smoothing};

/// Per-pixel collapse of one calendar month of index values.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodStats {
    pub mean: Array2<f32>,
    pub clear_count: Array2<i16>,
}

/// Smooth the series along time and collapse it to a per-pixel mean.
///
/// `clear_count` counts valid slots before smoothing. Pixels with no valid
/// slot get a `NaN` mean and a count of `0`.
pub fn reduce_period(series: &IndexSeries, window: usize, stat: Smoothing) -> Result<PeriodStats> {
    let valid = validity(&series.values);
    let clear_count = clear_count(&valid);
    let smoothed = rolling_smooth(&series.values, window, stat)?;
    let mean = smoothed.map_axis(Axis(0), |lane| {
        let (sum, n) = lane
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0f64, 0usize), |(s, n), &v| (s + v as f64, n + 1));
        if n == 0 {
            f32::NAN
        } else {
            (sum / n as f64) as f32
        }
    });
    Ok(PeriodStats { mean, clear_count })
}
