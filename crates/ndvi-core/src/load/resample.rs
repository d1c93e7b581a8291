use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::reproject::CrsTransform;
use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::Result;
use crate::geobox::GeoBox;

/// Fractional pixel positions closer than this to a pixel centre snap onto it.
const SNAP_TOLERANCE: f64 = 1e-6;

/// Spatial resampling used when moving native rasters onto the output grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
    Nearest,
    #[default]
    Bilinear,
}

impl std::fmt::Display for Resampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
        }
    }
}

/// Fractional native (row, col) of every output pixel centre.
///
/// Built once per scene and shared by all of its bands and its cloud mask.
/// Output pixel centres are projected into the native CRS before the affine
/// step, so native grids in another CRS resample like any other grid.
#[derive(Clone, Debug)]
pub struct PixelMap {
    /// `None` when native and output grids coincide.
    positions: Option<Array2<(f64, f64)>>,
}

impl PixelMap {
    pub fn new(native: &GeoBox, target: &GeoBox) -> Result<Self> {
        if native == target {
            return Ok(Self { positions: None });
        }
        let to_native = CrsTransform::new(&target.crs, &native.crs)?;
        let mut positions = Array2::from_elem(target.shape(), (f64::NAN, f64::NAN));
        let mut unprojectable = 0usize;
        for ((row, col), pos) in positions.indexed_iter_mut() {
            let (x, y) = target.pixel_center(row, col);
            match to_native.apply(x, y) {
                Ok((nx, ny)) => {
                    let (rf, cf) = native.to_pixel(nx, ny);
                    *pos = (snap(rf), snap(cf));
                }
                Err(_) => unprojectable += 1,
            }
        }
        if unprojectable > 0 {
            debug!(
                unprojectable,
                from = %target.crs,
                to = %native.crs,
                "Output pixels fall outside the native projection"
            );
        }
        Ok(Self {
            positions: Some(positions),
        })
    }

    pub fn is_identity(&self) -> bool {
        self.positions.is_none()
    }
}

/// Resample a raw value band through `map`.
///
/// Output pixels outside the native footprint become `nodata`. Bilinear
/// interpolation is no-data aware: any neighbour with non-zero weight that
/// holds `nodata` makes the output pixel `nodata`.
pub fn resample_values(src: &Array2<u16>, map: &PixelMap, method: Resampling, nodata: u16) -> Array2<u16> {
    let Some(positions) = &map.positions else {
        return src.clone();
    };
    sample_positions(positions, nodata, |rf, cf| {
        if !inside(rf, cf, src.dim()) {
            return nodata;
        }
        match method {
            Resampling::Nearest => {
                let (r, c) = nearest_index(rf, cf, src.dim());
                src[[r, c]]
            }
            Resampling::Bilinear => bilinear(src, rf, cf, nodata),
        }
    })
}

/// Resample a boolean mask through `map` with nearest neighbour.
/// Pixels outside the native footprint are `false`.
pub fn resample_mask(src: &Array2<bool>, map: &PixelMap) -> Array2<bool> {
    let Some(positions) = &map.positions else {
        return src.clone();
    };
    sample_positions(positions, false, |rf, cf| {
        if !inside(rf, cf, src.dim()) {
            return false;
        }
        let (r, c) = nearest_index(rf, cf, src.dim());
        src[[r, c]]
    })
}

fn sample_positions<T, F>(positions: &Array2<(f64, f64)>, fill: T, sample: F) -> Array2<T>
where
    T: Copy + Send + Sync,
    F: Fn(f64, f64) -> T + Sync,
{
    let mut out = Array2::from_elem(positions.dim(), fill);
    let parallel = positions.len() >= PARALLEL_PIXEL_THRESHOLD;
    let zip = Zip::from(&mut out).and(positions);
    let fill_pixel = |v: &mut T, &(rf, cf): &(f64, f64)| *v = sample(rf, cf);
    if parallel {
        zip.par_for_each(fill_pixel);
    } else {
        zip.for_each(fill_pixel);
    }
    out
}

fn snap(v: f64) -> f64 {
    let rounded = v.round();
    if (v - rounded).abs() < SNAP_TOLERANCE {
        rounded
    } else {
        v
    }
}

fn inside(rf: f64, cf: f64, (h, w): (usize, usize)) -> bool {
    rf >= -0.5 && rf < h as f64 - 0.5 && cf >= -0.5 && cf < w as f64 - 0.5
}

fn nearest_index(rf: f64, cf: f64, (h, w): (usize, usize)) -> (usize, usize) {
    let r = (rf + 0.5).floor().clamp(0.0, (h - 1) as f64) as usize;
    let c = (cf + 0.5).floor().clamp(0.0, (w - 1) as f64) as usize;
    (r, c)
}

fn bilinear(src: &Array2<u16>, rf: f64, cf: f64, nodata: u16) -> u16 {
    let (h, w) = src.dim();
    let r0f = rf.floor();
    let c0f = cf.floor();
    let fy = rf - r0f;
    let fx = cf - c0f;
    let clamp_r = |r: f64| r.clamp(0.0, (h - 1) as f64) as usize;
    let clamp_c = |c: f64| c.clamp(0.0, (w - 1) as f64) as usize;
    let (r0, r1) = (clamp_r(r0f), clamp_r(r0f + 1.0));
    let (c0, c1) = (clamp_c(c0f), clamp_c(c0f + 1.0));

    let taps = [
        (r0, c0, (1.0 - fy) * (1.0 - fx)),
        (r0, c1, (1.0 - fy) * fx),
        (r1, c0, fy * (1.0 - fx)),
        (r1, c1, fy * fx),
    ];
    let mut acc = 0.0f64;
    for (r, c, weight) in taps {
        if weight <= 0.0 {
            continue;
        }
        let v = src[[r, c]];
        if v == nodata {
            return nodata;
        }
        acc += weight * v as f64;
    }
    acc.round().clamp(0.0, u16::MAX as f64) as u16
}
