//! Ice thickness categories
//!
//! Categories are defined by their upper boundaries. Category `i` covers
//! `(B[i-1], B[i]]` and category 0 covers `[0, B[0]]`. The last boundary is
//! expected to be a sentinel (99 m in the LIM3 setup) so that every physical
//! thickness lands in some category.

use crate::errors::{EmSitdError, Result};
use serde::{Deserialize, Serialize};

/// Upper boundaries of the five default LIM3 categories on ORCA025 (m).
///
/// Values as reported in NEMO's `ocean.output` for `jpl = 5`.
pub const LIM3_ORCA025_BOUNDARIES: [f64; 5] = [
    0.454_016_742_415_552,
    1.129_313_823_083_63,
    2.141_458_988_947_97,
    3.670_596_409_915_54,
    99.0,
];

/// Thickness used in place of the sentinel boundary when computing
/// representative category thicknesses (m).
pub const DEFAULT_CATEGORY_CAP: f64 = 5.0;

/// Strictly increasing category upper boundaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct CategoryBounds {
    upper: Vec<f64>,
}

impl CategoryBounds {
    /// Validate and wrap a boundary sequence.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::InvalidBoundaries`] for an empty sequence, a
    /// non-finite or negative boundary, or a sequence that is not strictly
    /// increasing.
    pub fn new(upper: Vec<f64>) -> Result<Self> {
        if upper.is_empty() {
            return Err(EmSitdError::InvalidBoundaries(
                "at least one boundary is required".to_string(),
            ));
        }
        if let Some(bad) = upper.iter().find(|b| !b.is_finite() || **b < 0.0) {
            return Err(EmSitdError::InvalidBoundaries(format!(
                "boundary {bad} is not a finite non-negative thickness"
            )));
        }
        if let Some(pair) = upper.windows(2).find(|w| w[1] <= w[0]) {
            return Err(EmSitdError::InvalidBoundaries(format!(
                "boundaries must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { upper })
    }

    /// Number of categories
    #[must_use]
    pub fn len(&self) -> usize {
        self.upper.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upper.is_empty()
    }

    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Largest boundary
    #[must_use]
    pub fn max(&self) -> f64 {
        self.upper[self.upper.len() - 1]
    }

    /// Category of a thickness value.
    ///
    /// Negative values mark missing readings and yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::OutOfRange`] if `value` exceeds every boundary,
    /// and for NaN, which fits no category either.
    pub fn category_of(&self, value: f64) -> Result<Option<usize>> {
        if value < 0.0 {
            return Ok(None);
        }
        // upper is sorted, so this is the first boundary >= value
        let idx = self.upper.partition_point(|&b| b < value);
        if idx == self.upper.len() || value.is_nan() {
            return Err(EmSitdError::OutOfRange {
                value,
                max: self.max(),
            });
        }
        Ok(Some(idx))
    }

    /// Category edges `[0, B[0], ..., B[n-2], cap]` with the sentinel replaced
    /// by `cap`.
    #[must_use]
    pub fn edges_with_cap(&self, cap: f64) -> Vec<f64> {
        let mut edges = Vec::with_capacity(self.upper.len() + 1);
        edges.push(0.0);
        edges.extend_from_slice(&self.upper[..self.upper.len() - 1]);
        edges.push(cap);
        edges
    }

    /// Midpoint thickness of every category, sentinel replaced by `cap`
    #[must_use]
    pub fn midpoints(&self, cap: f64) -> Vec<f64> {
        self.edges_with_cap(cap)
            .windows(2)
            .map(|w| (w[0] + w[1]) / 2.0)
            .collect()
    }
}

impl Default for CategoryBounds {
    fn default() -> Self {
        Self {
            upper: LIM3_ORCA025_BOUNDARIES.to_vec(),
        }
    }
}

impl TryFrom<Vec<f64>> for CategoryBounds {
    type Error = EmSitdError;

    fn try_from(upper: Vec<f64>) -> Result<Self> {
        Self::new(upper)
    }
}

impl From<CategoryBounds> for Vec<f64> {
    fn from(bounds: CategoryBounds) -> Self {
        bounds.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bounds() -> CategoryBounds {
        CategoryBounds::new(vec![0.5, 1.0, 99.0]).unwrap()
    }

    #[test]
    fn assigns_documented_categories() {
        let b = bounds();
        assert_eq!(b.category_of(0.3).unwrap(), Some(0));
        assert_eq!(b.category_of(0.7).unwrap(), Some(1));
        assert_eq!(b.category_of(50.0).unwrap(), Some(2));
        assert_eq!(b.category_of(-1.0).unwrap(), None);
    }

    #[test]
    fn boundary_values_belong_to_lower_category() {
        let b = bounds();
        assert_eq!(b.category_of(0.0).unwrap(), Some(0));
        assert_eq!(b.category_of(0.5).unwrap(), Some(0));
        assert_eq!(b.category_of(1.0).unwrap(), Some(1));
        assert_eq!(b.category_of(99.0).unwrap(), Some(2));
    }

    #[test]
    fn above_all_boundaries_is_an_error() {
        assert!(matches!(
            bounds().category_of(120.0),
            Err(EmSitdError::OutOfRange { .. })
        ));
        assert!(bounds().category_of(f64::NAN).is_err());
    }

    #[test]
    fn category_satisfies_interval_property() {
        let b = CategoryBounds::default();
        for step in 0..=1000 {
            let v = f64::from(step) * 0.01;
            let i = b.category_of(v).unwrap().unwrap();
            let lower = if i == 0 { 0.0 } else { b.upper()[i - 1] };
            assert!(lower < v || (i == 0 && v >= 0.0), "v={v} i={i}");
            assert!(v <= b.upper()[i], "v={v} i={i}");
        }
    }

    #[test]
    fn rejects_bad_sequences() {
        assert!(CategoryBounds::new(vec![]).is_err());
        assert!(CategoryBounds::new(vec![1.0, 1.0]).is_err());
        assert!(CategoryBounds::new(vec![2.0, 1.0, 99.0]).is_err());
        assert!(CategoryBounds::new(vec![0.5, f64::INFINITY]).is_err());
    }

    #[test]
    fn midpoints_replace_sentinel_with_cap() {
        let mids = bounds().midpoints(DEFAULT_CATEGORY_CAP);
        assert_eq!(mids.len(), 3);
        assert_relative_eq!(mids[0], 0.25);
        assert_relative_eq!(mids[1], 0.75);
        assert_relative_eq!(mids[2], 3.0);
    }

    #[test]
    fn deserializes_with_validation() {
        let ok: CategoryBounds = serde_json::from_str("[0.5, 1.0, 99.0]").unwrap();
        assert_eq!(ok, bounds());
        assert!(serde_json::from_str::<CategoryBounds>("[1.0, 0.5]").is_err());
    }
}
