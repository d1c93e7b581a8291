/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Raw digital-number no-data value shared by every supported sensor.
pub const RAW_NODATA: u16 = 0;

/// No-data value of real-valued rasters after rescaling.
pub const FLOAT_NODATA: f32 = f32::NAN;

/// No-data value of output clear-count bands.
pub const COUNT_NODATA: i16 = -1;

/// Landsat Collection 2 surface-reflectance scale factor.
pub const LANDSAT_SCALE: f32 = 0.000_027_5;

/// Landsat Collection 2 surface-reflectance additive offset.
pub const LANDSAT_OFFSET: f32 = -0.2;

/// Landsat digital numbers at or above this value are saturated.
pub const LANDSAT_SATURATION: u16 = 65_455;

/// Sentinel-2 L2A reflectance scale factor.
pub const SENTINEL2_SCALE: f32 = 0.0001;

/// Sentinel-2 L2A reflectance additive offset.
pub const SENTINEL2_OFFSET: f32 = 0.0;

/// Sentinel-2 digital numbers at or above this value are saturated.
pub const SENTINEL2_SATURATION: u16 = 65_535;

/// Blue-band digital number (about 0.375 reflectance) above which a Landsat
/// pixel is treated as cloud the QA band missed.
pub const MISSED_CLOUD_BLUE_THRESHOLD: u16 = 20_910;

/// Disk radius used to dilate the missed-cloud flag.
pub const MISSED_CLOUD_DILATION: usize = 5;

/// Default centered rolling window length along the time dimension.
pub const DEFAULT_ROLLING_WINDOW: usize = 3;

/// Default minimum baseline observation count for a trusted climatology pixel.
pub const DEFAULT_MIN_NUM_OBS: i16 = 20;

/// Default water-occurrence frequency at which a pixel counts as permanent water.
pub const DEFAULT_WATER_THRESHOLD: f32 = 0.85;

/// Default spatial chunk edge length in pixels.
pub const DEFAULT_CHUNK_SIZE: usize = 1600;

/// Default radius of the post-fusion cloud-mask opening and dilation.
pub const DEFAULT_CLEANUP_RADIUS: usize = 5;

/// Number of calendar months in a climatology product.
pub const MONTHS_PER_YEAR: usize = 12;

/// Lowercase month abbreviations used in output band names.
pub const MONTH_ABBREVIATIONS: [&str; MONTHS_PER_YEAR] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
