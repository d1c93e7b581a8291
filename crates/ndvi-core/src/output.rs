//! Final products and their band layout.

use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Array2;

use crate::consts::{COUNT_NODATA, MONTH_ABBREVIATIONS};
use crate::geobox::GeoBox;
use crate::period::YearMonth;
use crate::reduce::MonthStats;

/// Typed pixel data of one output band.
#[derive(Clone, Debug, PartialEq)]
pub enum BandData {
    F32(Array2<f32>),
    I16(Array2<i16>),
}

/// No-data tag carried with an output band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoData {
    Nan,
    Value(i16),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputBand {
    pub name: String,
    pub data: BandData,
    pub nodata: NoData,
}

impl OutputBand {
    fn f32(name: impl Into<String>, data: Array2<f32>) -> Self {
        Self {
            name: name.into(),
            data: BandData::F32(data),
            nodata: NoData::Nan,
        }
    }

    fn i16(name: impl Into<String>, data: Array2<i16>, nodata: i16) -> Self {
        Self {
            name: name.into(),
            data: BandData::I16(data),
            nodata: NoData::Value(nodata),
        }
    }
}

/// One month's anomaly product on the output geobox.
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyRaster {
    pub geobox: GeoBox,
    pub period: YearMonth,
    /// Month-end date of `period`.
    pub time: NaiveDate,
    pub ndvi_mean: Array2<f32>,
    pub ndvi_std_anomaly: Array2<f32>,
    pub clear_count: Array2<i16>,
}

impl AnomalyRaster {
    pub fn crs(&self) -> &str {
        &self.geobox.crs
    }

    /// `ndvi_mean`, `ndvi_std_anomaly`, `clear_count`.
    pub fn bands(&self) -> Vec<OutputBand> {
        vec![
            OutputBand::f32("ndvi_mean", self.ndvi_mean.clone()),
            OutputBand::f32("ndvi_std_anomaly", self.ndvi_std_anomaly.clone()),
            OutputBand::i16("clear_count", self.clear_count.clone(), COUNT_NODATA),
        ]
    }
}

/// Monthly climatology product on the output geobox.
#[derive(Clone, Debug, PartialEq)]
pub struct ClimatologyRaster {
    pub geobox: GeoBox,
    /// Twelve months, January first.
    pub months: Vec<MonthStats>,
    /// First and last slot time that contributed, if any did.
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl ClimatologyRaster {
    pub fn crs(&self) -> &str {
        &self.geobox.crs
    }

    /// `mean_jan..mean_dec`, then `stddev_*`, then `count_*`.
    pub fn bands(&self) -> Vec<OutputBand> {
        let named = || self.months.iter().zip(MONTH_ABBREVIATIONS);
        let mut bands = Vec::with_capacity(self.months.len() * 3);
        bands.extend(named().map(|(m, abbr)| OutputBand::f32(format!("mean_{abbr}"), m.mean.clone())));
        bands.extend(named().map(|(m, abbr)| OutputBand::f32(format!("stddev_{abbr}"), m.stddev.clone())));
        bands.extend(
            named().map(|(m, abbr)| OutputBand::i16(format!("count_{abbr}"), m.count.clone(), COUNT_NODATA)),
        );
        bands
    }
}
