use ndarray::{Array2, ArrayViewMut1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Binary morphological operation applied to a cloud mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphOp {
    /// Erosion then dilation: removes specks smaller than the element.
    Opening,
    /// Dilation then erosion: fills holes smaller than the element.
    Closing,
    Dilation,
    Erosion,
}

impl std::fmt::Display for MorphOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opening => write!(f, "opening"),
            Self::Closing => write!(f, "closing"),
            Self::Dilation => write!(f, "dilation"),
            Self::Erosion => write!(f, "erosion"),
        }
    }
}

/// One cleanup step: an operation with a disk structuring element of the
/// given radius. Serialized as `["opening", 5]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskFilter(pub MorphOp, pub usize);

impl MaskFilter {
    pub fn op(&self) -> MorphOp {
        self.0
    }

    pub fn radius(&self) -> usize {
        self.1
    }

    /// How far (in pixels) this step can move a mask edge.
    pub fn reach(&self) -> usize {
        match self.0 {
            MorphOp::Opening | MorphOp::Closing => 2 * self.1,
            MorphOp::Dilation | MorphOp::Erosion => self.1,
        }
    }
}

/// Halo a chunk needs so that cleanup inside it matches whole-raster cleanup.
pub fn cleanup_halo(filters: &[MaskFilter]) -> usize {
    filters.iter().map(MaskFilter::reach).sum()
}

/// Apply cleanup steps in order.
pub fn mask_cleanup(mask: &Array2<bool>, filters: &[MaskFilter]) -> Array2<bool> {
    filters.iter().fold(mask.clone(), |acc, filter| match filter.op() {
        MorphOp::Opening => binary_opening(&acc, filter.radius()),
        MorphOp::Closing => binary_closing(&acc, filter.radius()),
        MorphOp::Dilation => binary_dilation(&acc, filter.radius()),
        MorphOp::Erosion => binary_erosion(&acc, filter.radius()),
    })
}

/// Offsets of a disk structuring element: all (dr, dc) with dr² + dc² <= r².
pub fn disk_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r * r {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

/// Morphological opening (erosion followed by dilation) with a disk.
pub fn binary_opening(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let eroded = binary_erosion(mask, radius);
    binary_dilation(&eroded, radius)
}

/// Morphological closing (dilation followed by erosion) with a disk.
pub fn binary_closing(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let dilated = binary_dilation(mask, radius);
    binary_erosion(&dilated, radius)
}

/// Binary dilation: a pixel becomes true if ANY pixel under the disk is true.
/// Out-of-bounds pixels count as false.
pub fn binary_dilation(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.clone();
    }
    let offsets = disk_offsets(radius);
    sweep(mask, |row, col| {
        offsets
            .iter()
            .any(|&(dr, dc)| neighbour(mask, row, col, dr, dc).unwrap_or(false))
    })
}

/// Binary erosion: a pixel stays true only if ALL pixels under the disk are
/// true. Out-of-bounds pixels count as true, so the raster border does not
/// erode inwards.
pub fn binary_erosion(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.clone();
    }
    let offsets = disk_offsets(radius);
    sweep(mask, |row, col| {
        mask[[row, col]]
            && offsets
                .iter()
                .all(|&(dr, dc)| neighbour(mask, row, col, dr, dc).unwrap_or(true))
    })
}

fn neighbour(mask: &Array2<bool>, row: usize, col: usize, dr: isize, dc: isize) -> Option<bool> {
    let (h, w) = mask.dim();
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nr >= h as isize || nc < 0 || nc >= w as isize {
        return None;
    }
    Some(mask[[nr as usize, nc as usize]])
}

/// Evaluate `pixel` at every position, row-parallel for large masks.
fn sweep<F>(mask: &Array2<bool>, pixel: F) -> Array2<bool>
where
    F: Fn(usize, usize) -> bool + Sync,
{
    let (h, w) = mask.dim();
    let mut result = Array2::from_elem((h, w), false);
    let fill_row = |(row, mut out): (usize, ArrayViewMut1<bool>)| {
        for (col, v) in out.iter_mut().enumerate() {
            *v = pixel(row, col);
        }
    };
    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        result
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(fill_row);
    } else {
        result.axis_iter_mut(Axis(0)).enumerate().for_each(fill_row);
    }
    result
}
