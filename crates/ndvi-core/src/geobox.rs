use std::fmt;

use ndarray::{s, Array2, Array3, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_CHUNK_SIZE;
use crate::error::{NdviError, Result};

/// A north-up pixel grid: extent, resolution and coordinate reference system.
///
/// `origin_x`/`origin_y` locate the outer corner of pixel (0, 0). Pixel
/// centres sit half a pixel inside that corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub crs: String,
    pub origin_x: f64,
    pub origin_y: f64,
    pub resolution_x: f64,
    /// Usually negative: rows run southwards.
    pub resolution_y: f64,
    pub width: usize,
    pub height: usize,
    /// Optional tile identity used in diagnostics.
    #[serde(default)]
    pub name: Option<String>,
}

impl GeoBox {
    pub fn new(
        crs: impl Into<String>,
        origin: (f64, f64),
        resolution: (f64, f64),
        shape: (usize, usize),
    ) -> Self {
        Self {
            crs: crs.into(),
            origin_x: origin.0,
            origin_y: origin.1,
            resolution_x: resolution.0,
            resolution_y: resolution.1,
            height: shape.0,
            width: shape.1,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// (height, width), matching ndarray's (row, column) order.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(NdviError::Config(format!("geobox {} is empty", self.label())));
        }
        let finite = [self.origin_x, self.origin_y, self.resolution_x, self.resolution_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.resolution_x == 0.0 || self.resolution_y == 0.0 {
            return Err(NdviError::Config(format!(
                "geobox {} has a degenerate transform",
                self.label()
            )));
        }
        Ok(())
    }

    /// World coordinates of the centre of pixel (row, col).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.resolution_x,
            self.origin_y + (row as f64 + 0.5) * self.resolution_y,
        )
    }

    /// Fractional (row, col) of a world coordinate; integers are pixel centres.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (y - self.origin_y) / self.resolution_y - 0.5,
            (x - self.origin_x) / self.resolution_x - 0.5,
        )
    }

    /// Sub-grid covered by a chunk window.
    pub fn window(&self, window: &ChunkWindow) -> GeoBox {
        GeoBox {
            crs: self.crs.clone(),
            origin_x: self.origin_x + window.col as f64 * self.resolution_x,
            origin_y: self.origin_y + window.row as f64 * self.resolution_y,
            resolution_x: self.resolution_x,
            resolution_y: self.resolution_y,
            width: window.cols,
            height: window.rows,
            name: self.name.clone(),
        }
    }

    /// Split the grid into non-overlapping chunk windows in row-major order.
    pub fn chunks(&self, shape: ChunkShape) -> Vec<ChunkWindow> {
        let step_y = shape.y.max(1);
        let step_x = shape.x.max(1);
        let mut windows = Vec::new();
        for row in (0..self.height).step_by(step_y) {
            for col in (0..self.width).step_by(step_x) {
                windows.push(ChunkWindow {
                    index: windows.len(),
                    row,
                    col,
                    rows: step_y.min(self.height - row),
                    cols: step_x.min(self.width - col),
                });
            }
        }
        windows
    }

    /// Human-readable identity for log lines and error context.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "{}:{}x{}@({}, {})",
                self.crs, self.width, self.height, self.origin_x, self.origin_y
            ),
        }
    }
}

impl fmt::Display for GeoBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Spatial chunk shape in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkShape {
    pub x: usize,
    pub y: usize,
}

impl Default for ChunkShape {
    fn default() -> Self {
        Self {
            x: DEFAULT_CHUNK_SIZE,
            y: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A rectangular region of the output grid processed as one unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkWindow {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

impl ChunkWindow {
    /// Grow the window by `halo` pixels on every side, clamped to the grid.
    ///
    /// Returns the outer window and this window's (row, col) offset inside it.
    pub fn with_halo(&self, halo: usize, height: usize, width: usize) -> (ChunkWindow, (usize, usize)) {
        let row = self.row.saturating_sub(halo);
        let col = self.col.saturating_sub(halo);
        let row_end = (self.row + self.rows + halo).min(height);
        let col_end = (self.col + self.cols + halo).min(width);
        let outer = ChunkWindow {
            index: self.index,
            row,
            col,
            rows: row_end - row,
            cols: col_end - col,
        };
        (outer, (self.row - row, self.col - col))
    }

    pub fn slice2<'a, T>(&self, array: &'a Array2<T>) -> ArrayView2<'a, T> {
        array.slice(s![self.row..self.row + self.rows, self.col..self.col + self.cols])
    }

    pub fn slice3<T: Clone>(&self, array: &Array3<T>) -> Array3<T> {
        array
            .slice(s![.., self.row..self.row + self.rows, self.col..self.col + self.cols])
            .to_owned()
    }
}

/// Copy a chunk result into its place in the full-size output.
pub fn stitch<T: Clone>(target: &mut Array2<T>, window: &ChunkWindow, tile: &Array2<T>) -> Result<()> {
    if tile.dim() != (window.rows, window.cols) {
        return Err(NdviError::shape_mismatch(
            "chunk stitch",
            &[window.rows, window.cols],
            tile.shape(),
        ));
    }
    target
        .slice_mut(s![window.row..window.row + window.rows, window.col..window.col + window.cols])
        .assign(tile);
    Ok(())
}
