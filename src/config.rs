//! Sampling run configuration
//!
//! [`SamplingConfig`] collects everything that shapes one sampling run. The
//! defaults reproduce the ORCA025/LIM3 setup: `nav_lon`/`nav_lat` grid
//! variables, a Southern-Ocean crop at 55°S, five LIM3 categories and a
//! `(0, 3 m]` thickness window. A JSON file can override any field:
//!
//! ```json
//! { "lat_limit": -60.0, "boundaries": [0.5, 1.0, 2.0, 99.0] }
//! ```

use crate::categories::CategoryBounds;
use crate::errors::Result;
use crate::observations::ThicknessWindow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for mapping EM observations onto a model grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Name of the 2-D longitude variable in the grid file
    pub lon_var: String,
    /// Name of the 2-D latitude variable in the grid file
    pub lat_var: String,
    /// Crop the grid to rows south of this latitude, `None` keeps all rows
    pub lat_limit: Option<f64>,
    /// Category upper boundaries (m)
    pub boundaries: CategoryBounds,
    /// Reader-side thickness window, `None` keeps every reading
    pub window: Option<ThicknessWindow>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            lon_var: "nav_lon".to_string(),
            lat_var: "nav_lat".to_string(),
            lat_limit: Some(-55.0),
            boundaries: CategoryBounds::default(),
            window: Some(ThicknessWindow::default()),
        }
    }
}

impl SamplingConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and a configuration
    /// error for malformed JSON or invalid boundaries.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed JSON or invalid boundaries.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    #[must_use]
    pub fn with_boundaries(mut self, boundaries: CategoryBounds) -> Self {
        self.boundaries = boundaries;
        self
    }

    #[must_use]
    pub fn with_lat_limit(mut self, lat_limit: Option<f64>) -> Self {
        self.lat_limit = lat_limit;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Option<ThicknessWindow>) -> Self {
        self.window = window;
        self
    }
}
