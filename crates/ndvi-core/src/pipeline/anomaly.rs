use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info};

use crate::compute::TaskGraph;
use crate::consts::COUNT_NODATA;
use crate::error::{NdviError, Result, StageContext};
use crate::geobox::{stitch, GeoBox};
use crate::mask::cleanup_halo;
use crate::normalize::normalize;
use crate::output::AnomalyRaster;
use crate::period::YearMonth;
use crate::raster::ObservationMeta;
use crate::reduce::reduce_period;
use crate::source::{BandReader, BaselineSource, WaterMaskSource};

use super::config::AnomalyConfig;
use super::helpers::{load_families, merge_chunk, prepare_chunk, ChunkValue};
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Monthly NDVI anomaly from modern Landsat and Sentinel-2, standardized
/// against the climatology baseline and masked by permanent water.
pub struct AnomalyPipeline {
    config: AnomalyConfig,
    reader: Arc<dyn BandReader>,
    baseline: Arc<dyn BaselineSource>,
    water: Arc<dyn WaterMaskSource>,
}

impl AnomalyPipeline {
    pub fn new(
        config: AnomalyConfig,
        reader: Arc<dyn BandReader>,
        baseline: Arc<dyn BaselineSource>,
        water: Arc<dyn WaterMaskSource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reader,
            baseline,
            water,
        })
    }

    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    pub fn run(
        &self,
        observations: &[ObservationMeta],
        geobox: &GeoBox,
        period: YearMonth,
    ) -> Result<AnomalyRaster> {
        self.run_reported(observations, geobox, period, Arc::new(NoOpReporter))
    }

    /// Every observation must fall within `period`; the check runs before
    /// anything is fetched.
    pub fn run_reported(
        &self,
        observations: &[ObservationMeta],
        geobox: &GeoBox,
        period: YearMonth,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<AnomalyRaster> {
        geobox.validate()?;
        check_period(observations, period)?;
        let config = &self.config;
        info!(
            geobox = %geobox,
            %period,
            observations = observations.len(),
            "Starting anomaly run"
        );

        let shape = geobox.shape();
        let baseline = self
            .baseline
            .fetch(geobox, period.month())
            .and_then(|b| b.check_shape(shape).map(|_| b))
            .in_stage(PipelineStage::Normalization, None, geobox)?;
        let water = self
            .water
            .fetch(geobox)
            .and_then(|w| {
                if w.dim() != shape {
                    return Err(NdviError::shape_mismatch("water frequency", &[shape.0, shape.1], w.shape()));
                }
                Ok(w)
            })
            .in_stage(PipelineStage::Normalization, None, geobox)?;
        let baseline = Arc::new(baseline);
        let water = Arc::new(water);

        let families = load_families(
            self.reader.as_ref(),
            observations,
            &config.families,
            &config.sensors,
            &config.load,
            geobox,
            reporter.as_ref(),
        )?;

        let filters = Arc::new(config.mask_filters.clone());
        let halo = cleanup_halo(&filters);
        let window_len = config.smoothing.rolling_window;
        let statistic = config.smoothing.statistic;
        let params = config.normalize_params();
        let chunks = geobox.chunks(config.load.chunks);
        debug!(chunks = chunks.len(), halo, "Chunking output grid");

        let mut graph = TaskGraph::<ChunkValue>::new();
        let mut outputs = Vec::with_capacity(chunks.len());
        for window in &chunks {
            let window = *window;
            let chunk_box = geobox.window(&window);
            let mut family_nodes = Vec::with_capacity(families.len());
            for family in &families {
                let family = Arc::clone(family);
                let filters = Arc::clone(&filters);
                let chunk_box = chunk_box.clone();
                let sensor = family.composite.family;
                family_nodes.push(graph.task(
                    format!("prepare {sensor} chunk {}", window.index),
                    &[],
                    move |_| {
                        prepare_chunk(&family, &window, &filters, halo)
                            .map(ChunkValue::Series)
                            .in_stage(PipelineStage::IndexCalculation, Some(sensor), &chunk_box)
                    },
                )?);
            }

            let merge_box = chunk_box.clone();
            let merged = graph.task(format!("merge chunk {}", window.index), &family_nodes, move |inputs| {
                merge_chunk(inputs, &window)
                    .map(ChunkValue::Series)
                    .in_stage(PipelineStage::IndexCalculation, None, &merge_box)
            })?;

            let reduce_box = chunk_box.clone();
            let reduced = graph.task(format!("reduce chunk {}", window.index), &[merged], move |inputs| {
                let series = inputs[0].series()?;
                reduce_period(series, window_len, statistic)
                    .map(ChunkValue::Period)
                    .in_stage(PipelineStage::Reduction, None, &reduce_box)
            })?;

            let baseline = Arc::clone(&baseline);
            let water = Arc::clone(&water);
            let normalized = graph.task(format!("normalize chunk {}", window.index), &[reduced], move |inputs| {
                let stats = inputs[0].period()?;
                let water = window.slice2(&*water).to_owned();
                normalize(stats, &baseline.window(&window), &water, &params)
                    .map(ChunkValue::Tile)
                    .in_stage(PipelineStage::Normalization, None, &chunk_box)
            })?;
            outputs.push(normalized);
        }

        info!(chunks = chunks.len(), tasks = graph.task_count(), "Executing anomaly graph");
        reporter.begin_stage(PipelineStage::Reduction, Some(graph.task_count()));
        let results = graph.execute(&outputs, reporter.as_ref())?;
        reporter.finish_stage();

        reporter.begin_stage(PipelineStage::Assembly, Some(chunks.len()));
        let mut ndvi_mean = Array2::from_elem(shape, f32::NAN);
        let mut ndvi_std_anomaly = Array2::from_elem(shape, f32::NAN);
        let mut clear_count = Array2::from_elem(shape, COUNT_NODATA);
        for (i, (window, value)) in chunks.iter().zip(results).enumerate() {
            let ChunkValue::Tile(tile) = value else {
                return Err(NdviError::Graph("expected an anomaly tile".into()))
                    .in_stage(PipelineStage::Assembly, None, geobox);
            };
            stitch(&mut ndvi_mean, window, &tile.mean)?;
            stitch(&mut ndvi_std_anomaly, window, &tile.anomaly)?;
            stitch(&mut clear_count, window, &tile.clear_count)?;
            reporter.advance(i + 1);
        }
        reporter.finish_stage();

        info!(geobox = %geobox, %period, "Anomaly run complete");
        Ok(AnomalyRaster {
            geobox: geobox.clone(),
            period,
            time: period.month_end(),
            ndvi_mean,
            ndvi_std_anomaly,
            clear_count,
        })
    }
}

/// Anomaly runs cover exactly one calendar month.
fn check_period(observations: &[ObservationMeta], period: YearMonth) -> Result<()> {
    for meta in observations {
        if !period.contains(&meta.time) {
            return Err(NdviError::MultiMonth {
                expected: period,
                found: YearMonth::of(&meta.time),
                observation: meta.id.clone(),
            });
        }
    }
    Ok(())
}
