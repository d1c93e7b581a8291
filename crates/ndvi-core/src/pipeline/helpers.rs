use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ndarray::{s, Array3, Axis};
use tracing::{debug, info, warn};

use crate::error::{NdviError, Result, StageContext};
use crate::fuse::fuse_scenes;
use crate::geobox::{ChunkWindow, GeoBox};
use crate::harmonize::{harmonize, CrossSensorCalibration};
use crate::index::{mask_valid_range, merge_series, ndvi};
use crate::load::{load_with_native_transform, LoadRequest};
use crate::mask::{erase_masked, mask_cleanup, MaskFilter};
use crate::normalize::AnomalyTile;
use crate::raster::{IndexSeries, ObservationMeta, RawComposite};
use crate::reduce::{MonthlyStats, PeriodStats};
use crate::sensor::{Radiometry, SensorFamily, SensorsConfig};
use crate::source::BandReader;

use super::config::LoadConfig;
use super::types::{PipelineStage, ProgressReporter};

/// Buffer type flowing through a pipeline's task graph.
pub(super) enum ChunkValue {
    Series(IndexSeries),
    Period(PeriodStats),
    Monthly(MonthlyStats),
    Tile(AnomalyTile),
}

impl ChunkValue {
    pub(super) fn series(&self) -> Result<&IndexSeries> {
        match self {
            Self::Series(s) => Ok(s),
            _ => Err(NdviError::Graph("expected an index series".into())),
        }
    }

    pub(super) fn period(&self) -> Result<&PeriodStats> {
        match self {
            Self::Period(p) => Ok(p),
            _ => Err(NdviError::Graph("expected period statistics".into())),
        }
    }
}

/// One family's fused composite and the rules to harmonize it.
pub(super) struct FamilyComposite {
    pub composite: RawComposite,
    pub radiometry: Radiometry,
    pub calibration: Option<CrossSensorCalibration>,
}

/// Split observations by sensor family, keeping only the configured families.
///
/// Each family keeps the catalog order of its observations.
pub(super) fn partition_by_family(
    observations: &[ObservationMeta],
    families: &[SensorFamily],
) -> BTreeMap<SensorFamily, Vec<ObservationMeta>> {
    let mut groups: BTreeMap<SensorFamily, Vec<ObservationMeta>> = BTreeMap::new();
    for meta in observations {
        match meta.family() {
            Some(family) if families.contains(&family) => {
                groups.entry(family).or_default().push(meta.clone());
            }
            Some(family) => {
                warn!(observation = %meta.id, %family, "Sensor family not used by this product, ignoring");
            }
            None => {
                warn!(observation = %meta.id, product = %meta.product, "Unknown product, ignoring");
            }
        }
    }
    groups
}

/// Load, mask and fuse every configured family that has observations.
///
/// Families come back in configured order; absent families are skipped.
pub(super) fn load_families(
    reader: &dyn BandReader,
    observations: &[ObservationMeta],
    families: &[SensorFamily],
    sensors: &SensorsConfig,
    load: &LoadConfig,
    geobox: &GeoBox,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<Arc<FamilyComposite>>> {
    let mut groups = partition_by_family(observations, families);
    let mut loaded = Vec::new();
    for &family in families {
        let Some(group) = groups.remove(&family) else {
            debug!(%family, geobox = %geobox, "No coverage for sensor family");
            continue;
        };
        let calibration = family
            .calibration(sensors)
            .in_stage(PipelineStage::Harmonization, Some(family), geobox)?;
        let masker = family
            .masker(sensors)
            .in_stage(PipelineStage::Masking, Some(family), geobox)?;
        let request = LoadRequest {
            family,
            observations: &group,
            bands: family.input_bands(sensors),
            geobox,
            group_by: load.group_by,
            resampling: load.resampling,
        };
        let composite = load_with_native_transform(
            reader,
            &request,
            |scene| masker.apply(scene),
            fuse_scenes,
            reporter,
        )?;
        if let Some(composite) = composite {
            loaded.push(Arc::new(FamilyComposite {
                composite,
                radiometry: family.radiometry(sensors),
                calibration,
            }));
        }
    }
    info!(families = loaded.len(), geobox = %geobox, "Loaded sensor families");
    Ok(loaded)
}

/// Earliest and latest slot time across the loaded families.
pub(super) fn time_range(families: &[Arc<FamilyComposite>]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let times = families.iter().flat_map(|f| f.composite.times.iter().copied());
    let min = times.clone().min()?;
    let max = times.max()?;
    Some((min, max))
}

/// Chunk-local path from a fused composite to a calibrated NDVI series.
///
/// The cloud mask is cleaned on a halo-padded window so neighbourhood
/// filters see the same pixels they would on the full grid, then cropped
/// back to the chunk before erasure.
pub(super) fn prepare_chunk(
    family: &FamilyComposite,
    window: &ChunkWindow,
    filters: &[MaskFilter],
    halo: usize,
) -> Result<IndexSeries> {
    let (height, width) = family.composite.spatial_shape();
    let mut chunk = family.composite.window(window);

    if !filters.is_empty() {
        let (outer, (row_off, col_off)) = window.with_halo(halo, height, width);
        let padded = outer.slice3(&family.composite.cloud_mask);
        let mut cleaned = Array3::from_elem(chunk.cloud_mask.dim(), false);
        for (slot, mut out) in cleaned.axis_iter_mut(Axis(0)).enumerate() {
            let full = mask_cleanup(&padded.index_axis(Axis(0), slot).to_owned(), filters);
            out.assign(&full.slice(s![row_off..row_off + window.rows, col_off..col_off + window.cols]));
        }
        chunk.cloud_mask = cleaned;
    }

    let cloud = chunk.cloud_mask.clone();
    erase_masked(&mut chunk, &cloud)?;

    let stack = harmonize(chunk, &family.radiometry)?;
    let mut series = ndvi(&stack, &family.radiometry.index_bands)?;
    if let Some(calibration) = &family.calibration {
        calibration.apply(&mut series.values);
    }
    Ok(series)
}

/// Merge the chunk's family series and drop out-of-range index values.
pub(super) fn merge_chunk(inputs: &[&ChunkValue], window: &ChunkWindow) -> Result<IndexSeries> {
    let series = inputs
        .iter()
        .map(|v| v.series())
        .collect::<Result<Vec<_>>>()?;
    let mut merged = merge_series(&series, (window.rows, window.cols))?;
    mask_valid_range(&mut merged);
    Ok(merged)
}
