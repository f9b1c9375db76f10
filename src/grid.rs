//! Curvilinear ocean-model grid
//!
//! A [`Grid`] holds the 2-D longitude and latitude arrays of a model grid such
//! as ORCA025 (`nav_lon`/`nav_lat`). Cells are addressed by `(row, col)`,
//! which the output files call `(y, x)`.

use crate::errors::{EmSitdError, Result};
use ndarray::{s, Array2, ArrayView2};

/// Index of a grid cell, `(row, col)` in array order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub row: usize,
    pub col: usize,
}

impl GridIndex {
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for GridIndex {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Fixed curvilinear grid of cell-centre coordinates in degrees
#[derive(Debug, Clone)]
pub struct Grid {
    lon: Array2<f64>,
    lat: Array2<f64>,
}

impl Grid {
    /// Build a grid from equal-shape longitude and latitude arrays.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::DimensionMismatch`] if the shapes differ and
    /// [`EmSitdError::EmptyGrid`] if the grid has no cells.
    pub fn new(lon: Array2<f64>, lat: Array2<f64>) -> Result<Self> {
        if lon.shape() != lat.shape() {
            return Err(EmSitdError::DimensionMismatch {
                what: "grid longitude/latitude shape".to_string(),
                left: format!("{:?}", lon.shape()),
                right: format!("{:?}", lat.shape()),
            });
        }
        if lon.is_empty() {
            return Err(EmSitdError::EmptyGrid);
        }
        Ok(Self { lon, lat })
    }

    /// Keep rows up to and including the last row that has any latitude
    /// below `lat_limit`.
    ///
    /// ORCA grids start at the southern boundary, so this cuts a
    /// Southern-Ocean subset without touching the column layout.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::EmptyGrid`] if no latitude is below the limit.
    pub fn crop_south_of(&self, lat_limit: f64) -> Result<Self> {
        let last_row = self
            .lat
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&lat| lat < lat_limit))
            .map(|(i, _)| i)
            .last()
            .ok_or(EmSitdError::EmptyGrid)?;

        Self::new(
            self.lon.slice(s![..=last_row, ..]).to_owned(),
            self.lat.slice(s![..=last_row, ..]).to_owned(),
        )
    }

    /// `(rows, cols)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.lon.dim()
    }

    /// Total number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    /// Always false for a constructed grid
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    #[must_use]
    pub fn lon(&self) -> ArrayView2<'_, f64> {
        self.lon.view()
    }

    #[must_use]
    pub fn lat(&self) -> ArrayView2<'_, f64> {
        self.lat.view()
    }

    /// `(lon, lat)` of one cell, `None` outside the grid
    #[must_use]
    pub fn coords(&self, index: GridIndex) -> Option<(f64, f64)> {
        let lon = self.lon.get((index.row, index.col))?;
        let lat = self.lat.get((index.row, index.col))?;
        Some((*lon, *lat))
    }
}
