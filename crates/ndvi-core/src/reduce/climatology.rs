use ndarray::{Array2, Array3, Axis, Zip};
use tracing::debug;

use crate::consts::MONTHS_PER_YEAR;
use crate::error::Result;
use crate::period::month_index;
use crate::raster::IndexSeries;

use super::rolling::{rolling_smooth, validity, Smoothing};

/// Statistics of every smoothed value falling in one calendar month.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthStats {
    pub mean: Array2<f32>,
    /// Population standard deviation (`ddof = 0`).
    pub stddev: Array2<f32>,
    pub count: Array2<i16>,
}

impl MonthStats {
    fn empty(height: usize, width: usize) -> Self {
        Self {
            mean: Array2::from_elem((height, width), f32::NAN),
            stddev: Array2::from_elem((height, width), f32::NAN),
            count: Array2::zeros((height, width)),
        }
    }
}

/// Twelve calendar months, January first.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyStats {
    pub months: Vec<MonthStats>,
}

/// Smooth the series along time, then group by calendar month.
///
/// A month with no valid sample at a pixel gets `NaN` mean and stddev and a
/// count of `0`. Months absent from the series are entirely empty.
pub fn reduce_monthly(series: &IndexSeries, window: usize, stat: Smoothing) -> Result<MonthlyStats> {
    let (h, w) = series.spatial_shape();
    let smoothed = rolling_smooth(&series.values, window, stat)?;

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); MONTHS_PER_YEAR];
    for (i, t) in series.times.iter().enumerate() {
        members[month_index(t)].push(i);
    }

    let months = members
        .iter()
        .enumerate()
        .map(|(m, slots)| {
            if slots.is_empty() {
                return MonthStats::empty(h, w);
            }
            debug!(month = m + 1, slots = slots.len(), "Reducing calendar month");
            month_stats(&smoothed.select(Axis(0), slots))
        })
        .collect();
    Ok(MonthlyStats { months })
}

fn month_stats(values: &Array3<f32>) -> MonthStats {
    let (_, h, w) = values.dim();
    let mut stats = MonthStats::empty(h, w);
    let valid = validity(values);
    Zip::from(&mut stats.mean)
        .and(&mut stats.stddev)
        .and(&mut stats.count)
        .and(values.lanes(Axis(0)))
        .and(valid.lanes(Axis(0)))
        .par_for_each(|mean, std, count, lane, ok| {
            let mut n = 0usize;
            let mut sum = 0.0f64;
            for (&v, &keep) in lane.iter().zip(ok.iter()) {
                if keep {
                    n += 1;
                    sum += v as f64;
                }
            }
            *count = n as i16;
            if n == 0 {
                return;
            }
            let mu = sum / n as f64;
            let var = lane
                .iter()
                .zip(ok.iter())
                .filter(|&(_, &keep)| keep)
                .map(|(&v, _)| (v as f64 - mu).powi(2))
                .sum::<f64>()
                / n as f64;
            *mean = mu as f32;
            *std = var.sqrt() as f32;
        });
    stats
}
