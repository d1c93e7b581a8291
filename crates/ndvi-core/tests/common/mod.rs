use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use ndarray::Array2;

use ndvi_core::consts::{LANDSAT_OFFSET, LANDSAT_SCALE, SENTINEL2_OFFSET, SENTINEL2_SCALE};
use ndvi_core::error::{NdviError, Result};
use ndvi_core::geobox::GeoBox;
use ndvi_core::raster::{Footprint, NativeScene, ObservationMeta};
use ndvi_core::source::{BandReader, BaselineMonth, BaselineSource, WaterMaskSource};

pub const CRS: &str = "EPSG:6933";

/// `QA_PIXEL` word of a clear land pixel (bit 6).
pub const QA_CLEAR: u16 = 1 << 6;
/// `QA_PIXEL` word of a high-confidence cloud (bit 3, confidence bits 8-9 = high).
pub const QA_CLOUD: u16 = (1 << 3) | (3 << 8);
/// `QA_PIXEL` word of a fill pixel (bit 0).
pub const QA_NODATA: u16 = 1;

pub const SCL_NODATA: u16 = 0;
pub const SCL_VEGETATION: u16 = 4;
pub const SCL_CLOUD_HIGH: u16 = 9;

/// Landsat green/blue digital numbers well inside the valid range.
pub const LANDSAT_GREEN_DN: u16 = 9_000;
pub const LANDSAT_BLUE_DN: u16 = 8_000;

pub fn utc(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// 30 m grid in the output CRS with its top-left corner at (0, 30 * height).
pub fn geobox(height: usize, width: usize) -> GeoBox {
    GeoBox::new(CRS, (0.0, 30.0 * height as f64), (30.0, -30.0), (height, width)).with_name("test-tile")
}

/// Footprint centred on the prime meridian, so the solar day is the UTC day.
pub fn footprint() -> Footprint {
    Footprint {
        min_lon: -0.5,
        min_lat: 10.0,
        max_lon: 0.5,
        max_lat: 11.0,
    }
}

pub fn meta(id: &str, product: &str, time: DateTime<Utc>) -> ObservationMeta {
    ObservationMeta {
        id: id.to_string(),
        product: product.to_string(),
        time,
        footprint: footprint(),
    }
}

pub fn landsat_scene(grid: &GeoBox, nir: Array2<u16>, red: Array2<u16>, qa: Array2<u16>) -> NativeScene {
    let shape = grid.shape();
    let mut bands = BTreeMap::new();
    bands.insert("nir".to_string(), nir);
    bands.insert("red".to_string(), red);
    bands.insert("green".to_string(), Array2::from_elem(shape, LANDSAT_GREEN_DN));
    bands.insert("blue".to_string(), Array2::from_elem(shape, LANDSAT_BLUE_DN));
    bands.insert("QA_PIXEL".to_string(), qa);
    NativeScene {
        grid: grid.clone(),
        bands,
    }
}

pub fn uniform_landsat(grid: &GeoBox, nir: u16, red: u16, qa: u16) -> NativeScene {
    let shape = grid.shape();
    landsat_scene(
        grid,
        Array2::from_elem(shape, nir),
        Array2::from_elem(shape, red),
        Array2::from_elem(shape, qa),
    )
}

pub fn uniform_sentinel2(grid: &GeoBox, nir: u16, red: u16, scl: u16) -> NativeScene {
    let shape = grid.shape();
    let mut bands = BTreeMap::new();
    bands.insert("nir_2".to_string(), Array2::from_elem(shape, nir));
    bands.insert("red".to_string(), Array2::from_elem(shape, red));
    bands.insert("SCL".to_string(), Array2::from_elem(shape, scl));
    NativeScene {
        grid: grid.clone(),
        bands,
    }
}

fn reflectance(dn: u16, scale: f32, offset: f32) -> f32 {
    (dn as f64 * scale as f64 + offset as f64) as f32
}

/// NDVI the pipeline produces for a pair of Landsat digital numbers.
pub fn landsat_ndvi(nir: u16, red: u16) -> f32 {
    let n = reflectance(nir, LANDSAT_SCALE, LANDSAT_OFFSET);
    let r = reflectance(red, LANDSAT_SCALE, LANDSAT_OFFSET);
    (n - r) / (n + r)
}

/// NDVI the pipeline produces for a pair of Sentinel-2 digital numbers.
pub fn sentinel2_ndvi(nir: u16, red: u16) -> f32 {
    let n = reflectance(nir, SENTINEL2_SCALE, SENTINEL2_OFFSET);
    let r = reflectance(red, SENTINEL2_SCALE, SENTINEL2_OFFSET);
    (n - r) / (n + r)
}

/// Landsat digital number for a reflectance.
pub fn landsat_dn(reflectance: f64) -> u16 {
    ((reflectance - LANDSAT_OFFSET as f64) / LANDSAT_SCALE as f64).round() as u16
}

/// Band reader over scenes held in memory, keyed by observation id.
#[derive(Default)]
pub struct InMemoryBandReader {
    scenes: HashMap<String, NativeScene>,
    reads: AtomicUsize,
}

impl InMemoryBandReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scene(mut self, id: &str, scene: NativeScene) -> Self {
        self.scenes.insert(id.to_string(), scene);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl BandReader for InMemoryBandReader {
    fn read(&self, observation: &ObservationMeta, bands: &[String]) -> Result<NativeScene> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let scene = self
            .scenes
            .get(&observation.id)
            .ok_or_else(|| NdviError::Source(format!("no scene for '{}'", observation.id)))?;
        let mut picked = BTreeMap::new();
        for band in bands {
            let data = scene.band(band)?;
            picked.insert(band.clone(), data.clone());
        }
        Ok(NativeScene {
            grid: scene.grid.clone(),
            bands: picked,
        })
    }
}

/// Baseline source returning one fixed month and recording what was asked.
pub struct StaticBaseline {
    month: BaselineMonth,
    requested: Mutex<Vec<u32>>,
}

impl StaticBaseline {
    pub fn uniform(shape: (usize, usize), mean: f32, stddev: f32, count: i16) -> Self {
        Self::new(BaselineMonth {
            mean: Array2::from_elem(shape, mean),
            stddev: Array2::from_elem(shape, stddev),
            count: Array2::from_elem(shape, count),
        })
    }

    pub fn new(month: BaselineMonth) -> Self {
        Self {
            month,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

impl BaselineSource for StaticBaseline {
    fn fetch(&self, _geobox: &GeoBox, month: u32) -> Result<BaselineMonth> {
        self.requested.lock().unwrap().push(month);
        Ok(self.month.clone())
    }
}

/// Water source returning a fixed frequency raster.
pub struct StaticWater {
    frequency: Array2<f32>,
    fetches: AtomicUsize,
}

impl StaticWater {
    pub fn new(frequency: Array2<f32>) -> Self {
        Self {
            frequency,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn dry(shape: (usize, usize)) -> Self {
        Self::new(Array2::zeros(shape))
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl WaterMaskSource for StaticWater {
    fn fetch(&self, _geobox: &GeoBox) -> Result<Array2<f32>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.frequency.clone())
    }
}

/// Bitwise equality that treats identical `NaN` payloads as equal.
pub fn same_bits(a: &Array2<f32>, b: &Array2<f32>) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
}
