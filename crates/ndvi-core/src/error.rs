use thiserror::Error;

use crate::geobox::GeoBox;
use crate::period::YearMonth;
use crate::pipeline::PipelineStage;
use crate::sensor::SensorFamily;

#[derive(Error, Debug)]
pub enum NdviError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown quality flag '{flag}' (value '{value}')")]
    UnknownFlag { flag: String, value: String },

    #[error("Unknown quality category '{0}'")]
    UnknownCategory(String),

    #[error("Missing band '{0}'")]
    MissingBand(String),

    #[error("Shape mismatch in {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Cannot project {crs}: {reason}")]
    Projection { crs: String, reason: String },

    #[error("Anomaly run covers {expected} but observation '{observation}' is from {found}")]
    MultiMonth {
        expected: YearMonth,
        found: YearMonth,
        observation: String,
    },

    #[error("Data source error: {0}")]
    Source(String),

    #[error("Task graph error: {0}")]
    Graph(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{stage} failed (sensor: {sensor}, geobox: {geobox}): {source}")]
    Stage {
        stage: PipelineStage,
        sensor: String,
        geobox: String,
        #[source]
        source: Box<NdviError>,
    },
}

pub type Result<T> = std::result::Result<T, NdviError>;

impl NdviError {
    pub fn shape_mismatch(what: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// The stage an error was raised in, if it carries stage context.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, with any stage context stripped.
    pub fn root(&self) -> &NdviError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Attach stage, sensor family and geobox identity to a failing result.
///
/// Errors that already carry stage context are passed through untouched so
/// the innermost stage is the one reported.
pub trait StageContext<T> {
    fn in_stage(self, stage: PipelineStage, sensor: Option<SensorFamily>, geobox: &GeoBox)
        -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn in_stage(
        self,
        stage: PipelineStage,
        sensor: Option<SensorFamily>,
        geobox: &GeoBox,
    ) -> Result<T> {
        self.map_err(|err| match err {
            NdviError::Stage { .. } => err,
            other => NdviError::Stage {
                stage,
                sensor: sensor.map_or_else(|| "-".to_string(), |s| s.to_string()),
                geobox: geobox.label(),
                source: Box::new(other),
            },
        })
    }
}
