//! em_sitd: EM sea-ice thickness surveys on ocean-model grids
//!
//! Electromagnetic (EM) sensors towed along a ship track measure snow plus
//! ice thickness. This crate maps such surveys onto a curvilinear ocean-model
//! grid (ORCA025 by default), bins them into ice thickness categories as a
//! monthly gridded distribution, and compares the result with the category
//! distribution simulated by a sea-ice model.
//!
//! ## Pipeline
//!
//! 1. [`matcher`]: nearest grid cell for every observation, by great-circle
//!    distance
//! 2. [`binner`]: category assignment and monthly `(category, y, x)` counts,
//!    sealed whenever the calendar month changes
//! 3. [`netcdf_io`]: persistence of sealed months as a SITD NetCDF file
//! 4. [`compare`]: per-cell KS or rank-sum comparison against a model distribution
//!
//! ## Module Organization
//!
//! - [`grid`]: the curvilinear grid and cell indices
//! - [`categories`]: thickness category boundaries
//! - [`observations`]: EM observation records and their readers
//! - [`config`]: sampling run configuration
//! - [`pipeline`]: complete sampling and comparison runs
//! - [`metadata`]: inspection of SITD files
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust
//! use em_sitd::prelude::*;
//! use ndarray::array;
//!
//! let grid = Grid::new(
//!     array![[0.0, 1.0], [0.0, 1.0]],
//!     array![[0.0, 0.0], [1.0, 1.0]],
//! ).unwrap();
//! assert_eq!(nearest_index(&grid, 0.1, 0.1), GridIndex::new(0, 0));
//!
//! let bounds = CategoryBounds::new(vec![0.5, 1.0, 99.0]).unwrap();
//! assert_eq!(bounds.category_of(0.7).unwrap(), Some(1));
//! ```

pub mod binner;
pub mod categories;
pub mod compare;
pub mod config;
pub mod errors;
pub mod grid;
pub mod matcher;
pub mod metadata;
pub mod netcdf_io;
pub mod observations;
pub mod parallel;
pub mod pipeline;

pub use errors::{EmSitdError, Result};

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::binner::{
        bin_series, BatchStats, BinOutcome, HistogramSink, MonthKey, MonthlyAccumulator,
        SealedMonth,
    };
    pub use crate::categories::CategoryBounds;
    pub use crate::compare::ComparisonTest;
    pub use crate::config::SamplingConfig;
    pub use crate::errors::{EmSitdError, Result};
    pub use crate::grid::{Grid, GridIndex};
    pub use crate::matcher::{haversine_km, nearest_index, nearest_indices};
    pub use crate::netcdf_io::{SitdDataset, SitdWriter};
    pub use crate::observations::{Observation, ReadOptions, ThicknessWindow};
    pub use crate::parallel::ParallelConfig;
    pub use crate::pipeline::{run_comparison, run_sampling, ComparisonSpec, SurveyInput};
}
