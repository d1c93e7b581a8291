//! Ingestion: fetch each observation, mask it on its native grid, resample it
//! onto the output geobox and fuse same-slot observations.

pub mod group;
pub mod reproject;
pub mod resample;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ndarray::{stack, Array3, ArrayView2, Axis};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::RAW_NODATA;
use crate::error::{NdviError, Result, StageContext};
use crate::geobox::GeoBox;
use crate::pipeline::{PipelineStage, ProgressReporter};
use crate::raster::{MaskedScene, NativeScene, ObservationMeta, RawComposite};
use crate::sensor::SensorFamily;
use crate::source::BandReader;

pub use self::group::{group_observations, solar_day, GroupBy, Slot};
pub use self::reproject::{proj_definition, CrsTransform};
pub use self::resample::{resample_mask, resample_values, PixelMap, Resampling};

/// Everything the loader needs to build one family's composite.
#[derive(Clone, Debug)]
pub struct LoadRequest<'a> {
    pub family: SensorFamily,
    pub observations: &'a [ObservationMeta],
    pub bands: Vec<String>,
    pub geobox: &'a GeoBox,
    pub group_by: GroupBy,
    pub resampling: Resampling,
}

/// Load one sensor family into a time-sorted composite on the output grid.
///
/// `native_transform` runs on every observation before resampling, so
/// masking sees native pixels. `fuser` collapses the resampled observations
/// of a slot, which arrive in pinned contributor order. A family without
/// observations yields `Ok(None)`.
pub fn load_with_native_transform<T, F>(
    reader: &dyn BandReader,
    request: &LoadRequest<'_>,
    native_transform: T,
    fuser: F,
    reporter: &dyn ProgressReporter,
) -> Result<Option<RawComposite>>
where
    T: Fn(NativeScene) -> Result<MaskedScene> + Sync,
    F: Fn(Vec<MaskedScene>) -> Result<MaskedScene> + Sync,
{
    let family = request.family;
    let geobox = request.geobox;
    let observations = request.observations;
    if observations.is_empty() {
        debug!(%family, "No observations for sensor family, skipping");
        return Ok(None);
    }

    let slots = group_observations(observations, request.group_by);
    info!(
        %family,
        observations = observations.len(),
        slots = slots.len(),
        group_by = %request.group_by,
        "Loading sensor family"
    );

    reporter.begin_stage(PipelineStage::Loading, Some(observations.len()));
    let mut scenes = Vec::with_capacity(observations.len());
    for (i, meta) in observations.iter().enumerate() {
        let scene = reader
            .read(meta, &request.bands)
            .map_err(|e| NdviError::Source(format!("observation '{}': {e}", meta.id)))
            .in_stage(PipelineStage::Loading, Some(family), geobox)?;
        scenes.push(scene);
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Masking, Some(scenes.len()));
    let resampled: Vec<MaskedScene> = scenes
        .into_par_iter()
        .map(|scene| {
            let map = PixelMap::new(&scene.grid, geobox).in_stage(PipelineStage::Loading, Some(family), geobox)?;
            let masked = native_transform(scene).in_stage(PipelineStage::Masking, Some(family), geobox)?;
            Ok(to_output_grid(masked, &map, geobox, request.resampling))
        })
        .collect::<Result<Vec<_>>>()?;
    reporter.finish_stage();

    let mut pool: Vec<Option<MaskedScene>> = resampled.into_iter().map(Some).collect();
    let slot_inputs: Vec<(DateTime<Utc>, Vec<MaskedScene>)> = slots
        .iter()
        .map(|slot| {
            let members = slot
                .members
                .iter()
                .filter_map(|&i| pool[i].take())
                .collect::<Vec<_>>();
            (slot.time, members)
        })
        .collect();

    reporter.begin_stage(PipelineStage::Fusion, Some(slot_inputs.len()));
    let fused: Vec<(DateTime<Utc>, MaskedScene)> = slot_inputs
        .into_par_iter()
        .map(|(time, members)| Ok((time, fuser(members)?)))
        .collect::<Result<Vec<_>>>()
        .in_stage(PipelineStage::Fusion, Some(family), geobox)?;
    reporter.finish_stage();

    let composite = stack_slots(family, fused).in_stage(PipelineStage::Fusion, Some(family), geobox)?;
    debug!(%family, slots = composite.len(), "Composite assembled");
    Ok(Some(composite))
}

fn to_output_grid(scene: MaskedScene, map: &PixelMap, geobox: &GeoBox, method: Resampling) -> MaskedScene {
    let bands = scene
        .bands
        .iter()
        .map(|(name, band)| (name.clone(), resample_values(band, map, method, RAW_NODATA)))
        .collect();
    let cloud_mask = resample_mask(&scene.cloud_mask, map);
    MaskedScene {
        grid: geobox.clone(),
        bands,
        cloud_mask,
    }
}

/// Stack fused slots (already in time order) along a new leading axis.
fn stack_slots(family: SensorFamily, fused: Vec<(DateTime<Utc>, MaskedScene)>) -> Result<RawComposite> {
    let names: Vec<String> = fused
        .first()
        .map(|(_, s)| s.bands.keys().cloned().collect())
        .unwrap_or_default();

    let mut bands = BTreeMap::new();
    for name in &names {
        let views = fused
            .iter()
            .map(|(_, s)| {
                s.bands
                    .get(name)
                    .map(|b| b.view())
                    .ok_or_else(|| NdviError::MissingBand(name.clone()))
            })
            .collect::<Result<Vec<ArrayView2<u16>>>>()?;
        bands.insert(name.clone(), stack_views(&views)?);
    }
    let masks: Vec<ArrayView2<bool>> = fused.iter().map(|(_, s)| s.cloud_mask.view()).collect();
    let cloud_mask = stack_views(&masks)?;
    let times = fused.into_iter().map(|(t, _)| t).collect();

    Ok(RawComposite {
        family,
        times,
        bands,
        cloud_mask,
    })
}

fn stack_views<T: Clone>(views: &[ArrayView2<T>]) -> Result<Array3<T>> {
    stack(Axis(0), views).map_err(|e| NdviError::Source(format!("cannot stack slots: {e}")))
}
