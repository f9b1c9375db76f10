//! Nearest-neighbour matching of observation points to grid cells
//!
//! Distances are great-circle distances on a sphere of radius
//! [`EARTH_RADIUS_KM`]. The search is an exhaustive scan of the grid per query
//! point; queries are independent and are spread over the rayon pool.

use crate::errors::{EmSitdError, Result};
use crate::grid::{Grid, GridIndex};
use rayon::prelude::*;
use tracing::debug;

/// Earth radius used for haversine distances (km)
pub const EARTH_RADIUS_KM: f64 = 6372.795;

/// Great-circle distance in km between two points given in degrees.
#[must_use]
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // rounding can push h just outside [0, 1]
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Nearest cell to `(lon, lat)` together with its distance in km.
///
/// Ties go to the first cell in row-major order. The query must be finite:
/// a NaN distance never compares smaller, so a non-finite query comes back
/// as `(0, 0)` at infinite distance. [`nearest_indices`] checks for this.
#[must_use]
pub fn nearest_with_distance(grid: &Grid, lon: f64, lat: f64) -> (GridIndex, f64) {
    let mut best = GridIndex::new(0, 0);
    let mut best_dist = f64::INFINITY;

    for (((row, col), &glon), &glat) in grid.lon().indexed_iter().zip(grid.lat().iter()) {
        let dist = haversine_km(lon, lat, glon, glat);
        if dist < best_dist {
            best_dist = dist;
            best = GridIndex::new(row, col);
        }
    }

    (best, best_dist)
}

/// Nearest cell to a single query point
#[must_use]
pub fn nearest_index(grid: &Grid, lon: f64, lat: f64) -> GridIndex {
    nearest_with_distance(grid, lon, lat).0
}

/// Nearest cell for every `(lons[i], lats[i])`, in query order.
///
/// # Errors
///
/// Returns [`EmSitdError::DimensionMismatch`] if `lons` and `lats` differ in
/// length, and [`EmSitdError::InvalidCoordinate`] for the first query that is
/// NaN or infinite.
pub fn nearest_indices(grid: &Grid, lons: &[f64], lats: &[f64]) -> Result<Vec<GridIndex>> {
    if lons.len() != lats.len() {
        return Err(EmSitdError::DimensionMismatch {
            what: "query longitudes/latitudes".to_string(),
            left: lons.len().to_string(),
            right: lats.len().to_string(),
        });
    }
    if let Some((index, (&lon, &lat))) = lons
        .iter()
        .zip(lats)
        .enumerate()
        .find(|(_, (lon, lat))| !lon.is_finite() || !lat.is_finite())
    {
        return Err(EmSitdError::InvalidCoordinate { index, lon, lat });
    }

    debug!(
        queries = lons.len(),
        cells = grid.len(),
        threads = rayon::current_num_threads(),
        "matching observations to grid"
    );

    Ok(lons
        .par_iter()
        .zip(lats.par_iter())
        .map(|(&lon, &lat)| nearest_index(grid, lon, lat))
        .collect())
}
