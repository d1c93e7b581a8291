//! Quality masking: decoding quality layers, screening band values and
//! erasing cloud from fused composites.

pub mod morphology;
pub mod qa;

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, Zip};
use tracing::debug;

use crate::consts::RAW_NODATA;
use crate::error::{NdviError, Result};
use crate::raster::{MaskedScene, NativeScene, RawComposite};
use crate::sensor::{BrightnessScreen, IndexBands, LandsatProfile, Sentinel2Profile};

use self::morphology::binary_dilation;
use self::qa::{BitQuery, CategoryQuery};

pub use self::morphology::{cleanup_halo, mask_cleanup, MaskFilter, MorphOp};

/// Per-family transform run on each observation at native resolution,
/// before any resampling.
#[derive(Clone, Debug)]
pub enum NativeMasker {
    Landsat {
        profile: LandsatProfile,
        cloud: BitQuery,
        nodata: BitQuery,
    },
    Sentinel2 {
        profile: Sentinel2Profile,
        cloud: CategoryQuery,
        nodata: CategoryQuery,
    },
}

impl NativeMasker {
    pub fn apply(&self, scene: NativeScene) -> Result<MaskedScene> {
        scene.check_shapes()?;
        match self {
            Self::Landsat {
                profile,
                cloud,
                nodata,
            } => mask_landsat(scene, profile, cloud, nodata),
            Self::Sentinel2 {
                profile,
                cloud,
                nodata,
            } => mask_sentinel2(scene, profile, cloud, nodata),
        }
    }
}

fn mask_landsat(
    mut scene: NativeScene,
    profile: &LandsatProfile,
    cloud: &BitQuery,
    nodata: &BitQuery,
) -> Result<MaskedScene> {
    let qa = scene
        .bands
        .remove(&profile.mask_band)
        .ok_or_else(|| NdviError::MissingBand(profile.mask_band.clone()))?;

    let valid = value_screen(&scene, &profile.bands, profile.scale, profile.offset, profile.saturation)?;

    let mut cloud_mask = cloud.apply(&qa);
    if let Some(screen) = &profile.brightness_screen {
        let missed = missed_cloud(&scene, screen)?;
        Zip::from(&mut cloud_mask).and(&missed).for_each(|c, &m| *c |= m);
    }

    let flagged_nodata = nodata.apply(&qa);
    let keep = combine_keep(&valid, &flagged_nodata);

    Ok(MaskedScene {
        grid: scene.grid,
        bands: keep_good_only(scene.bands, &keep, &profile.index_bands),
        cloud_mask,
    })
}

fn mask_sentinel2(
    mut scene: NativeScene,
    profile: &Sentinel2Profile,
    cloud: &CategoryQuery,
    nodata: &CategoryQuery,
) -> Result<MaskedScene> {
    let scl = scene
        .bands
        .remove(&profile.mask_band)
        .ok_or_else(|| NdviError::MissingBand(profile.mask_band.clone()))?;

    let valid = value_screen(&scene, &profile.bands, profile.scale, profile.offset, profile.saturation)?;
    let cloud_mask = cloud.apply(&scl);
    let flagged_nodata = nodata.apply(&scl);
    let keep = combine_keep(&valid, &flagged_nodata);

    Ok(MaskedScene {
        grid: scene.grid,
        bands: keep_good_only(scene.bands, &keep, &profile.index_bands),
        cloud_mask,
    })
}

/// `true` where every listed band holds a positive, unsaturated reflectance.
///
/// A digital number is positive once rescaled when it exceeds
/// `-offset / scale`; saturated values are those at or above `saturation`.
pub fn value_screen(
    scene: &NativeScene,
    bands: &[String],
    scale: f32,
    offset: f32,
    saturation: u16,
) -> Result<Array2<bool>> {
    let floor = -(offset as f64) / scale as f64;
    let mut valid = Array2::from_elem(scene.grid.shape(), true);
    for name in bands {
        let band = scene.band(name)?;
        Zip::from(&mut valid).and(band).for_each(|v, &dn| {
            *v &= (dn as f64) > floor && dn < saturation;
        });
    }
    Ok(valid)
}

/// Bright-band flag, dilated before it is combined with the QA cloud mask.
fn missed_cloud(scene: &NativeScene, screen: &BrightnessScreen) -> Result<Array2<bool>> {
    let band = scene.band(&screen.band)?;
    let flagged = band.mapv(|dn| dn >= screen.threshold);
    Ok(binary_dilation(&flagged, screen.dilation))
}

fn combine_keep(valid: &Array2<bool>, flagged_nodata: &Array2<bool>) -> Array2<bool> {
    let mut keep = valid.clone();
    Zip::from(&mut keep)
        .and(flagged_nodata)
        .for_each(|k, &n| *k &= !n);
    keep
}

/// Set every pixel outside `keep` to no-data and drop screening-only bands.
fn keep_good_only(
    bands: BTreeMap<String, Array2<u16>>,
    keep: &Array2<bool>,
    index_bands: &IndexBands,
) -> BTreeMap<String, Array2<u16>> {
    bands
        .into_iter()
        .filter(|(name, _)| index_bands.contains(name))
        .map(|(name, mut band)| {
            Zip::from(&mut band).and(keep).for_each(|v, &k| {
                if !k {
                    *v = RAW_NODATA;
                }
            });
            (name, band)
        })
        .collect()
}

/// Set value pixels under `cloud` to no-data in every slot of a composite.
pub fn erase_masked(composite: &mut RawComposite, cloud: &Array3<bool>) -> Result<()> {
    let expected = composite.cloud_mask.shape().to_vec();
    if cloud.shape() != expected.as_slice() {
        return Err(NdviError::shape_mismatch("cloud erasure", &expected, cloud.shape()));
    }
    let mut erased = 0usize;
    for band in composite.bands.values_mut() {
        Zip::from(band).and(cloud).for_each(|v, &c| {
            if c && *v != RAW_NODATA {
                *v = RAW_NODATA;
                erased += 1;
            }
        });
    }
    debug!(family = %composite.family, erased, "Erased cloud-masked pixels");
    Ok(())
}
