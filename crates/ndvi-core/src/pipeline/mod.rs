pub mod config;
mod anomaly;
mod climatology;
mod helpers;
mod types;

pub use anomaly::AnomalyPipeline;
pub use climatology::ClimatologyPipeline;
pub use types::{NoOpReporter, PipelineStage, ProgressReporter};
