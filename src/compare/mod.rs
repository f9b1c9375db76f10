//! Observed versus modelled ice thickness distributions
//!
//! Both sides are reduced to per-cell category fractions, then compared cell
//! by cell with a two-sample test.
//!
//! # Organization
//!
//! - [`distribution`]: per-cell normalisation and mean thickness
//! - [`ks`]: the two-sample Kolmogorov-Smirnov test
//! - [`rank`]: the Wilcoxon rank-sum (Mann-Whitney U) test

pub mod distribution;
pub mod ks;
pub mod rank;

pub use distribution::{mean_thickness, normalise_distribution};
pub use ks::{kolmogorov_sf, ks_2samp, KsResult};
pub use rank::{rank_sum_test, RankSumResult};

use crate::errors::{EmSitdError, Result};
use ndarray::{Array2, ArrayView3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Two-sample test applied in every grid cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonTest {
    /// Kolmogorov-Smirnov
    #[default]
    Ks,
    /// Wilcoxon rank-sum, exact when there are no ties
    MannWhitney,
}

impl ComparisonTest {
    /// Two-sided p-value of `a` against `b`, `None` when undefined
    #[must_use]
    pub fn p_value(self, a: &[f64], b: &[f64]) -> Option<f64> {
        match self {
            Self::Ks => ks_2samp(a, b).map(|r| r.p_value),
            Self::MannWhitney => rank_sum_test(a, b).map(|r| r.p_value),
        }
    }
}

impl fmt::Display for ComparisonTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ks => write!(f, "two-sample KS"),
            Self::MannWhitney => write!(f, "Wilcoxon rank-sum"),
        }
    }
}

/// p-value of `test` for every grid cell, comparing the category fractions
/// of `observed` and `modelled` (both `(category, y, x)`).
///
/// With `skip_last` the final (sentinel) category is left out of both
/// samples. Cells where either side has a NaN are NaN in the result.
///
/// # Errors
///
/// Returns [`EmSitdError::DimensionMismatch`] if the shapes differ and
/// [`EmSitdError::ConfigError`] if no category is left to compare.
pub fn pvalue_map(
    observed: ArrayView3<'_, f64>,
    modelled: ArrayView3<'_, f64>,
    skip_last: bool,
    test: ComparisonTest,
) -> Result<Array2<f64>> {
    if observed.dim() != modelled.dim() {
        return Err(EmSitdError::DimensionMismatch {
            what: "observed vs modelled distributions".to_string(),
            left: format!("{:?}", observed.dim()),
            right: format!("{:?}", modelled.dim()),
        });
    }
    let (nc, ny, nx) = observed.dim();
    let used = if skip_last { nc.saturating_sub(1) } else { nc };
    if used == 0 {
        return Err(EmSitdError::ConfigError(
            "no categories left to compare".to_string(),
        ));
    }

    info!(
        %test,
        cells = ny * nx,
        categories = used,
        threads = rayon::current_num_threads(),
        "computing p-values"
    );

    let values: Vec<f64> = (0..ny * nx)
        .into_par_iter()
        .map(|flat_idx| {
            let (y, x) = (flat_idx / nx, flat_idx % nx);
            let obs: Vec<f64> = (0..used).map(|c| observed[[c, y, x]]).collect();
            let model: Vec<f64> = (0..used).map(|c| modelled[[c, y, x]]).collect();
            if obs.iter().chain(&model).any(|v| v.is_nan()) {
                return f64::NAN;
            }
            test.p_value(&obs, &model).unwrap_or(f64::NAN)
        })
        .collect();

    Ok(Array2::from_shape_vec((ny, nx), values)?)
}
