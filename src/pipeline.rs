//! End-to-end runs: sampling EM surveys onto a grid, and comparing the result
//! with a model
//!
//! A sampling run is all-or-nothing: the first configuration or data error
//! aborts it, leaving a partially written output file behind.

use crate::binner::{HistogramSink, MonthlyAccumulator};
use crate::categories::DEFAULT_CATEGORY_CAP;
use crate::compare::{mean_thickness, normalise_distribution, pvalue_map, ComparisonTest};
use crate::config::SamplingConfig;
use crate::errors::{EmSitdError, Result};
use crate::grid::Grid;
use crate::matcher::nearest_indices;
use crate::netcdf_io::{
    read_grid, read_model_categories, read_sitd, write_maps, MapLayer, SitdWriter,
};
use crate::observations::{coordinates, read_observations, ReadOptions};
use ndarray::Array2;
use netcdf::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// One observation file and its year correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyInput {
    pub path: PathBuf,
    pub year_offset: i32,
}

impl SurveyInput {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            year_offset: 0,
        }
    }

    #[must_use]
    pub const fn with_year_offset(mut self, year_offset: i32) -> Self {
        self.year_offset = year_offset;
        self
    }
}

/// Counters of a finished sampling run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingReport {
    pub files: usize,
    /// Observations left after the thickness window
    pub observations: usize,
    pub counted: usize,
    pub skipped: usize,
    pub time_steps: usize,
    pub grid_shape: (usize, usize),
}

/// Read the grid named by `config`, cropped to `config.lat_limit`
///
/// # Errors
///
/// Returns NetCDF or grid construction errors.
pub fn load_grid(file: &File, config: &SamplingConfig) -> Result<Grid> {
    let grid = read_grid(file, &config.lon_var, &config.lat_var)?;
    match config.lat_limit {
        Some(limit) => {
            let cropped = grid.crop_south_of(limit)?;
            info!(full = ?grid.shape(), cropped = ?cropped.shape(), lat_limit = limit, "cropped grid");
            Ok(cropped)
        }
        None => Ok(grid),
    }
}

/// Bin every survey file, in the given order, into one monthly SITD file.
///
/// Files must be ordered in time; a month may span consecutive files.
///
/// # Errors
///
/// Returns the first configuration, I/O, NetCDF or data error.
pub fn run_sampling(
    config: &SamplingConfig,
    grid_path: &Path,
    inputs: &[SurveyInput],
    output_path: &Path,
) -> Result<SamplingReport> {
    if inputs.is_empty() {
        return Err(EmSitdError::ConfigError(
            "no observation files given".to_string(),
        ));
    }

    let grid_file = netcdf::open(grid_path)?;
    let grid = load_grid(&grid_file, config)?;
    let mut writer = SitdWriter::create(
        output_path,
        &grid,
        &config.boundaries,
        Some((&grid_file, config.lon_var.as_str(), config.lat_var.as_str())),
    )?;

    let mut acc = MonthlyAccumulator::new(config.boundaries.clone(), grid.shape());
    let mut report = SamplingReport {
        grid_shape: grid.shape(),
        ..SamplingReport::default()
    };

    for input in inputs {
        let options = ReadOptions {
            window: config.window,
            year_offset: input.year_offset,
        };
        let observations = read_observations(&input.path, options)?;
        let (lons, lats) = coordinates(&observations);
        let indices = nearest_indices(&grid, &lons, &lats)?;
        let stats = acc.accumulate_batch(&observations, &indices, &mut writer)?;

        info!(
            path = %input.path.display(),
            counted = stats.counted,
            skipped = stats.skipped,
            sealed = stats.sealed,
            "processed survey file"
        );
        report.files += 1;
        report.observations += observations.len();
        report.counted += stats.counted;
        report.skipped += stats.skipped;
    }

    if let Some(last) = acc.finalize() {
        writer.store(&last)?;
    }
    report.time_steps = writer.finish()?;

    Ok(report)
}

/// Settings for comparing a SITD file with a model category field
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSpec {
    /// SITD time steps summed into the observed distribution
    pub observed_steps: Vec<usize>,
    /// Model category variable, e.g. LIM3 `siconcat`
    pub model_var: String,
    pub model_step: usize,
    /// Leave the sentinel category out of the test
    pub skip_last: bool,
    pub test: ComparisonTest,
    /// Upper edge (m) standing in for the sentinel boundary when computing
    /// mean thickness
    pub thickness_cap: f64,
}

impl Default for ComparisonSpec {
    fn default() -> Self {
        Self {
            observed_steps: vec![0],
            model_var: "siconcat".to_string(),
            model_step: 0,
            skip_last: true,
            test: ComparisonTest::default(),
            thickness_cap: DEFAULT_CATEGORY_CAP,
        }
    }
}

/// Outcome of a comparison run
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub p_values: Array2<f64>,
    /// Mean thickness (m) of the observed distribution per cell
    pub observed_mean: Array2<f64>,
    /// Mean thickness (m) of the modelled distribution per cell
    pub modelled_mean: Array2<f64>,
    /// Cells with a p-value
    pub compared_cells: usize,
    /// Cells where the distributions differ at the 5 % level
    pub significant_cells: usize,
}

/// Per-cell p-values of observed versus modelled category distributions,
/// plus the mean thickness of each side. With `output_path` the three maps
/// are written as `pvalue`, `em_mean_thickness` and `model_mean_thickness`.
///
/// # Errors
///
/// Returns NetCDF errors, a dimension error when the two grids differ, and
/// configuration errors for out-of-range time steps.
pub fn run_comparison(
    sitd_path: &Path,
    model_path: &Path,
    spec: &ComparisonSpec,
    output_path: Option<&Path>,
) -> Result<ComparisonReport> {
    let dataset = read_sitd(&netcdf::open(sitd_path)?)?;
    let observed = normalise_distribution(dataset.summed_counts(&spec.observed_steps)?.view());

    let model_file = netcdf::open(model_path)?;
    let modelled = normalise_distribution(
        read_model_categories(&model_file, &spec.model_var, spec.model_step)?.view(),
    );

    let p_values = pvalue_map(observed.view(), modelled.view(), spec.skip_last, spec.test)?;
    let compared_cells = p_values.iter().filter(|p| !p.is_nan()).count();
    let significant_cells = p_values.iter().filter(|&&p| p < 0.05).count();

    let thickness = dataset.bounds.midpoints(spec.thickness_cap);
    let observed_mean = mean_thickness(observed.view(), &thickness)?;
    let modelled_mean = mean_thickness(modelled.view(), &thickness)?;

    info!(test = %spec.test, compared_cells, significant_cells, "compared distributions");

    if let Some(path) = output_path {
        let long_name = format!("{} p-value, EM vs model ice thickness distribution", spec.test);
        write_maps(
            path,
            &dataset.grid,
            &[
                MapLayer {
                    name: "pvalue",
                    long_name: &long_name,
                    units: None,
                    data: p_values.view(),
                },
                MapLayer {
                    name: "em_mean_thickness",
                    long_name: "EM mean ice thickness",
                    units: Some("m"),
                    data: observed_mean.view(),
                },
                MapLayer {
                    name: "model_mean_thickness",
                    long_name: "model mean ice thickness",
                    units: Some("m"),
                    data: modelled_mean.view(),
                },
            ],
        )?;
    }

    Ok(ComparisonReport {
        p_values,
        observed_mean,
        modelled_mean,
        compared_cells,
        significant_cells,
    })
}
