//! Per-cell ice thickness distributions

use crate::errors::{EmSitdError, Result};
use ndarray::{Array2, Array3, ArrayView3, Axis, Zip};

/// Convert `(category, y, x)` counts or concentrations into per-cell
/// fractions that sum to one.
///
/// Cells whose total is zero or not finite carry no distribution and are set
/// to NaN in every category.
#[must_use]
pub fn normalise_distribution(values: ArrayView3<'_, f64>) -> Array3<f64> {
    let mut out = values.to_owned();
    for mut lane in out.lanes_mut(Axis(0)) {
        let total = lane.sum();
        if total > 0.0 && total.is_finite() {
            lane /= total;
        } else {
            lane.fill(f64::NAN);
        }
    }
    out
}

/// Mean thickness per cell of a normalised distribution, weighting each
/// category by its representative thickness.
///
/// # Errors
///
/// Returns [`EmSitdError::DimensionMismatch`] if `thickness` does not have one
/// entry per category.
pub fn mean_thickness(fractions: ArrayView3<'_, f64>, thickness: &[f64]) -> Result<Array2<f64>> {
    let (nc, ny, nx) = fractions.dim();
    if thickness.len() != nc {
        return Err(EmSitdError::DimensionMismatch {
            what: "category thicknesses vs categories".to_string(),
            left: thickness.len().to_string(),
            right: nc.to_string(),
        });
    }

    let mut mean = Array2::<f64>::zeros((ny, nx));
    for (frac, &h) in fractions.outer_iter().zip(thickness) {
        Zip::from(&mut mean).and(&frac).for_each(|m, &f| *m += f * h);
    }
    Ok(mean)
}
