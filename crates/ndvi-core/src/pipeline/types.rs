/// Pipeline processing stage, used for progress reporting and error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Masking,
    Fusion,
    Harmonization,
    IndexCalculation,
    Reduction,
    Normalization,
    Assembly,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading observations"),
            Self::Masking => write!(f, "Masking"),
            Self::Fusion => write!(f, "Fusing time slots"),
            Self::Harmonization => write!(f, "Harmonizing sensors"),
            Self::IndexCalculation => write!(f, "Computing NDVI"),
            Self::Reduction => write!(f, "Reducing time series"),
            Self::Normalization => write!(f, "Normalizing against climatology"),
            Self::Assembly => write!(f, "Assembling output"),
        }
    }
}

/// Thread-safe progress reporting for the pipelines.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (observations, chunk tasks), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// Work items within the current stage completed so far.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run` delegates to `run_reported`.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
