use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{NdviError, Result};

/// proj definition for a CRS name.
///
/// Accepts `EPSG:<code>` (case-insensitive) for the codes the pipeline meets
/// in practice, or a raw `+proj=...` string.
pub fn proj_definition(crs: &str) -> Option<String> {
    let crs = crs.trim();
    if crs.starts_with("+proj=") {
        return Some(crs.to_string());
    }
    let (authority, code) = crs.split_once(':')?;
    if !authority.eq_ignore_ascii_case("epsg") {
        return None;
    }
    let code: u32 = code.trim().parse().ok()?;
    let definition = match code {
        4326 => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
        3857 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
            .to_string(),
        // Global equal-area grid of the output products.
        6933 => "+proj=cea +lat_ts=30 +lon_0=0 +x_0=0 +y_0=0 +datum=WGS84 +units=m +no_defs".to_string(),
        3577 => "+proj=aea +lat_0=0 +lon_0=132 +lat_1=-18 +lat_2=-36 +x_0=0 +y_0=0 +ellps=GRS80 +units=m +no_defs"
            .to_string(),
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs", code - 32600),
        32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs", code - 32700),
        _ => return None,
    };
    Some(definition)
}

fn is_geographic(definition: &str) -> bool {
    definition.contains("+proj=longlat") || definition.contains("+proj=latlong")
}

fn same_crs(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

struct Projection {
    proj: Proj,
    geographic: bool,
}

impl Projection {
    fn parse(crs: &str) -> Result<Self> {
        let definition = proj_definition(crs).ok_or_else(|| NdviError::Projection {
            crs: crs.to_string(),
            reason: "unsupported coordinate reference system".to_string(),
        })?;
        let proj = Proj::from_proj_string(&definition).map_err(|e| NdviError::Projection {
            crs: crs.to_string(),
            reason: format!("{e:?}"),
        })?;
        Ok(Self {
            proj,
            geographic: is_geographic(&definition),
        })
    }
}

/// Point transform between two coordinate reference systems.
///
/// Geographic systems take and return degrees.
pub struct CrsTransform {
    source: String,
    target: String,
    projections: Option<(Projection, Projection)>,
}

impl std::fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("identity", &self.is_identity())
            .finish_non_exhaustive()
    }
}

impl CrsTransform {
    pub fn new(source: &str, target: &str) -> Result<Self> {
        let projections = if same_crs(source, target) {
            None
        } else {
            Some((Projection::parse(source)?, Projection::parse(target)?))
        };
        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
            projections,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.projections.is_none()
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let Some((src, dst)) = &self.projections else {
            return Ok((x, y));
        };
        let mut point = if src.geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(&src.proj, &dst.proj, &mut point).map_err(|e| NdviError::Projection {
            crs: self.target.clone(),
            reason: format!("cannot transform ({x}, {y}) from {}: {e:?}", self.source),
        })?;
        if dst.geographic {
            Ok((point.0.to_degrees(), point.1.to_degrees()))
        } else {
            Ok((point.0, point.1))
        }
    }
}
