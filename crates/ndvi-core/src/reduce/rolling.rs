use ndarray::{Array2, Array3, ArrayView1, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{NdviError, Result};

/// Statistic computed over each rolling window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
    #[default]
    Mean,
    Median,
}

impl std::fmt::Display for Smoothing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Median => write!(f, "median"),
        }
    }
}

/// `true` where the series holds a finite value.
pub fn validity(values: &Array3<f32>) -> Array3<bool> {
    values.mapv(f32::is_finite)
}

/// Number of valid slots per pixel.
pub fn clear_count(valid: &Array3<bool>) -> Array2<i16> {
    valid.map_axis(Axis(0), |lane| lane.iter().filter(|&&v| v).count() as i16)
}

/// Centered rolling statistic along the time axis.
///
/// The window at slot `i` covers `[i - window / 2, i - window / 2 + window)`,
/// clipped to the series; one valid sample suffices. Slots that were no-data
/// before smoothing stay no-data.
pub fn rolling_smooth(values: &Array3<f32>, window: usize, stat: Smoothing) -> Result<Array3<f32>> {
    if window == 0 {
        return Err(NdviError::Config("rolling_window must be at least 1".into()));
    }
    let mut out = Array3::from_elem(values.dim(), f32::NAN);
    if values.len_of(Axis(0)) == 0 {
        return Ok(out);
    }
    Zip::from(out.lanes_mut(Axis(0)))
        .and(values.lanes(Axis(0)))
        .par_for_each(|dst, src| smooth_lane(src, dst, window, stat));
    Ok(out)
}

fn smooth_lane(src: ArrayView1<f32>, mut dst: ArrayViewMut1<f32>, window: usize, stat: Smoothing) {
    let n = src.len();
    let half = window / 2;
    let mut buf = Vec::with_capacity(window);
    for i in 0..n {
        if !src[i].is_finite() {
            continue;
        }
        let start = i.saturating_sub(half);
        let end = (i + window - half).min(n);
        buf.clear();
        buf.extend(src.slice(ndarray::s![start..end]).iter().copied().filter(|v| v.is_finite()));
        dst[i] = match stat {
            Smoothing::Mean => buf.iter().map(|&v| v as f64).sum::<f64>() as f32 / buf.len() as f32,
            Smoothing::Median => median(&mut buf),
        };
    }
}

/// Median of finite samples; `NaN` when empty.
pub fn median(samples: &mut [f32]) -> f32 {
    let n = samples.len();
    if n == 0 {
        f32::NAN
    } else if n == 1 {
        samples[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *samples.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        samples.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        samples[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (samples[mid - 1] + samples[mid]) / 2.0
    }
}
