pub mod compute;
pub mod consts;
pub mod error;
pub mod fuse;
pub mod geobox;
pub mod harmonize;
pub mod index;
pub mod load;
pub mod mask;
pub mod normalize;
pub mod output;
pub mod period;
pub mod pipeline;
pub mod raster;
pub mod reduce;
pub mod sensor;
pub mod source;
