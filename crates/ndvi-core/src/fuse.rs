//! Fusion of observations that fall into the same time slot.
//!
//! Value bands and the cloud mask use separate reducers: values take the
//! first valid contributor, the mask is the logical OR of all contributors.

use std::collections::BTreeMap;

use ndarray::{Array2, Zip};

use crate::consts::RAW_NODATA;
use crate::error::{NdviError, Result};
use crate::raster::MaskedScene;

/// Pixel-wise first non-no-data value, in contributor order.
pub fn fuse_first_valid(layers: &[&Array2<u16>], nodata: u16) -> Result<Array2<u16>> {
    let first = layers
        .first()
        .ok_or_else(|| NdviError::Config("fusion needs at least one contributor".into()))?;
    let mut fused = (*first).clone();
    for layer in &layers[1..] {
        check_same_shape(&fused, layer)?;
        Zip::from(&mut fused).and(*layer).for_each(|out, &v| {
            if *out == nodata {
                *out = v;
            }
        });
    }
    Ok(fused)
}

/// Pixel-wise logical OR: masked if any contributor is masked.
pub fn fuse_or(masks: &[&Array2<bool>]) -> Result<Array2<bool>> {
    let first = masks
        .first()
        .ok_or_else(|| NdviError::Config("fusion needs at least one contributor".into()))?;
    let mut fused = (*first).clone();
    for mask in &masks[1..] {
        check_same_shape(&fused, mask)?;
        Zip::from(&mut fused).and(*mask).for_each(|out, &m| *out |= m);
    }
    Ok(fused)
}

/// Default fuser for masked scenes already resampled onto the output grid.
///
/// Contributors must be supplied in their pinned order; every contributor
/// must carry the same band set.
pub fn fuse_scenes(mut scenes: Vec<MaskedScene>) -> Result<MaskedScene> {
    if scenes.len() == 1 {
        if let Some(only) = scenes.pop() {
            return Ok(only);
        }
    }
    let first = scenes
        .first()
        .ok_or_else(|| NdviError::Config("fusion needs at least one contributor".into()))?;
    let names: Vec<String> = first.bands.keys().cloned().collect();

    let mut bands = BTreeMap::new();
    for name in &names {
        let layers = scenes
            .iter()
            .map(|s| s.bands.get(name).ok_or_else(|| NdviError::MissingBand(name.clone())))
            .collect::<Result<Vec<_>>>()?;
        bands.insert(name.clone(), fuse_first_valid(&layers, RAW_NODATA)?);
    }
    let masks: Vec<&Array2<bool>> = scenes.iter().map(|s| &s.cloud_mask).collect();
    let cloud_mask = fuse_or(&masks)?;

    Ok(MaskedScene {
        grid: first.grid.clone(),
        bands,
        cloud_mask,
    })
}

fn check_same_shape<A, B>(a: &Array2<A>, b: &Array2<B>) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(NdviError::shape_mismatch("fusion contributor", a.shape(), b.shape()));
    }
    Ok(())
}
