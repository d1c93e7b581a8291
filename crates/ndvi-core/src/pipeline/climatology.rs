use std::sync::Arc;

use ndarray::Array2;
use tracing::info;

use crate::compute::TaskGraph;
use crate::consts::MONTHS_PER_YEAR;
use crate::error::{NdviError, Result, StageContext};
use crate::geobox::{stitch, GeoBox};
use crate::mask::cleanup_halo;
use crate::output::ClimatologyRaster;
use crate::raster::ObservationMeta;
use crate::reduce::{reduce_monthly, MonthStats};
use crate::source::BandReader;

use super::config::ClimatologyConfig;
use super::helpers::{load_families, merge_chunk, prepare_chunk, time_range, ChunkValue};
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Monthly NDVI climatology from legacy and modern Landsat.
pub struct ClimatologyPipeline {
    config: ClimatologyConfig,
    reader: Arc<dyn BandReader>,
}

impl ClimatologyPipeline {
    pub fn new(config: ClimatologyConfig, reader: Arc<dyn BandReader>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, reader })
    }

    pub fn config(&self) -> &ClimatologyConfig {
        &self.config
    }

    pub fn run(&self, observations: &[ObservationMeta], geobox: &GeoBox) -> Result<ClimatologyRaster> {
        self.run_reported(observations, geobox, Arc::new(NoOpReporter))
    }

    pub fn run_reported(
        &self,
        observations: &[ObservationMeta],
        geobox: &GeoBox,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<ClimatologyRaster> {
        geobox.validate()?;
        let config = &self.config;
        info!(
            geobox = %geobox,
            observations = observations.len(),
            families = config.families.len(),
            "Starting climatology run"
        );

        let families = load_families(
            self.reader.as_ref(),
            observations,
            &config.families,
            &config.sensors,
            &config.load,
            geobox,
            reporter.as_ref(),
        )?;
        let span = time_range(&families);

        let filters = Arc::new(config.mask_filters.clone());
        let halo = cleanup_halo(&filters);
        let window_len = config.smoothing.rolling_window;
        let statistic = config.smoothing.statistic;
        let chunks = geobox.chunks(config.load.chunks);

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

            let reduced = graph.task(format!("monthly chunk {}", window.index), &[merged], move |inputs| {
                let series = inputs[0].series()?;
                reduce_monthly(series, window_len, statistic)
                    .map(ChunkValue::Monthly)
                    .in_stage(PipelineStage::Reduction, None, &chunk_box)
            })?;
            outputs.push(reduced);
        }

        info!(chunks = chunks.len(), tasks = graph.task_count(), "Executing climatology graph");
        reporter.begin_stage(PipelineStage::Reduction, Some(graph.task_count()));
        let results = graph.execute(&outputs, reporter.as_ref())?;
        reporter.finish_stage();

        reporter.begin_stage(PipelineStage::Assembly, Some(MONTHS_PER_YEAR));
        let tiles = chunks
            .iter()
            .zip(results)
            .map(|(window, value)| match value {
                ChunkValue::Monthly(stats) => Ok((*window, stats)),
                _ => Err(NdviError::Graph("expected monthly statistics".into())),
            })
            .collect::<Result<Vec<_>>>()
            .in_stage(PipelineStage::Assembly, None, geobox)?;

        let shape = geobox.shape();
        let mut months = Vec::with_capacity(MONTHS_PER_YEAR);
        for m in 0..MONTHS_PER_YEAR {
            let mut month = MonthStats {
                mean: Array2::from_elem(shape, f32::NAN),
                stddev: Array2::from_elem(shape, f32::NAN),
                count: Array2::zeros(shape),
            };
            for (window, stats) in &tiles {
                let tile = &stats.months[m];
                stitch(&mut month.mean, window, &tile.mean)?;
                stitch(&mut month.stddev, window, &tile.stddev)?;
                stitch(&mut month.count, window, &tile.count)?;
            }
            months.push(month);
            reporter.advance(m + 1);
        }
        reporter.finish_stage();

        info!(geobox = %geobox, ?span, "Climatology run complete");
        Ok(ClimatologyRaster {
            geobox: geobox.clone(),
            months,
            time_range: span,
        })
    }
}
