use ndarray::{concatenate, Array3, ArrayView3, Axis, Zip};
use num_traits::Float;
use tracing::debug;

use crate::error::{NdviError, Result};
use crate::raster::{IndexSeries, ReflectanceStack};
use crate::sensor::IndexBands;

/// Any non-finite value collapses to `NaN`.
pub fn finite_or_nan<T: Float>(v: T) -> T {
    if v.is_finite() {
        v
    } else {
        T::nan()
    }
}

/// `(nir - red) / (nir + red)` per pixel; non-finite results are `NaN`.
pub fn normalized_difference(nir: &Array3<f32>, red: &Array3<f32>) -> Result<Array3<f32>> {
    if nir.dim() != red.dim() {
        return Err(NdviError::shape_mismatch("index bands", nir.shape(), red.shape()));
    }
    let mut out = Array3::from_elem(nir.dim(), f32::NAN);
    Zip::from(&mut out)
        .and(nir)
        .and(red)
        .par_for_each(|o, &n, &r| *o = finite_or_nan((n - r) / (n + r)));
    Ok(out)
}

/// NDVI of one family's reflectance stack.
pub fn ndvi(stack: &ReflectanceStack, bands: &IndexBands) -> Result<IndexSeries> {
    let values = normalized_difference(stack.band(&bands.nir)?, stack.band(&bands.red)?)?;
    Ok(IndexSeries {
        times: stack.times.clone(),
        values,
    })
}

/// Concatenate per-family series and stably sort the result by time.
///
/// Ties keep the order in which the families were given. With no series the
/// result is an empty series of the given spatial shape.
pub fn merge_series(series: &[&IndexSeries], shape: (usize, usize)) -> Result<IndexSeries> {
    let expected = [shape.0, shape.1];
    for s in series {
        let (h, w) = s.spatial_shape();
        if [h, w] != expected {
            return Err(NdviError::shape_mismatch("index series", &expected, &[h, w]));
        }
    }
    if series.is_empty() {
        return Ok(IndexSeries::empty(shape.0, shape.1));
    }

    let times: Vec<_> = series.iter().flat_map(|s| s.times.iter().copied()).collect();
    let views: Vec<ArrayView3<f32>> = series.iter().map(|s| s.values.view()).collect();
    let values = concatenate(Axis(0), &views)
        .map_err(|e| NdviError::Graph(format!("cannot concatenate index series: {e}")))?;
    debug!(families = series.len(), slots = times.len(), "Merged index series");
    Ok(sort_by_time(IndexSeries { times, values }))
}

fn sort_by_time(series: IndexSeries) -> IndexSeries {
    let mut order: Vec<usize> = (0..series.times.len()).collect();
    order.sort_by_key(|&i| series.times[i]);
    if order.iter().enumerate().all(|(pos, &i)| pos == i) {
        return series;
    }
    IndexSeries {
        times: order.iter().map(|&i| series.times[i]).collect(),
        values: series.values.select(Axis(0), &order),
    }
}

/// Reset index values outside `[0, 1]` to `NaN`.
pub fn mask_valid_range(series: &mut IndexSeries) {
    series.values.par_mapv_inplace(|v| {
        if (0.0..=1.0).contains(&v) {
            v
        } else {
            f32::NAN
        }
    });
}
