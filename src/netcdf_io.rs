//! NetCDF I/O for grids, gridded ice thickness distributions and comparison maps
//!
//! The SITD (sea-ice thickness distribution) output layout is
//!
//! ```text
//! dimensions: time = UNLIMITED, ncatice, y, x
//! int   time(time)                    days since <first observation date>,
//!                                     tagged with each month's last date
//! float hiceb(ncatice)                category upper boundaries [m]
//! int   sitd(time, ncatice, y, x)     EM count per category, fill 0
//! float nav_lon(y, x), nav_lat(y, x)  copied from the grid file
//! ```

use crate::binner::{HistogramSink, SealedMonth};
use crate::categories::CategoryBounds;
use crate::errors::{EmSitdError, Result};
use crate::grid::Grid;
use chrono::{NaiveDate, Utc};
use ndarray::{Array2, Array3, Array4, ArrayView2};
use netcdf::{create, AttributeValue, File, FileMut, Variable, VariableMut};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

/// Fill value for masked cells in comparison maps
pub const MAP_FILL_VALUE: f32 = 1.0e20;

fn variable<'f>(file: &'f File, name: &str) -> Result<Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| EmSitdError::VariableNotFound {
            var: name.to_string(),
        })
}

fn variable_mut<'f>(file: &'f mut FileMut, name: &str) -> Result<VariableMut<'f>> {
    file.variable_mut(name)
        .ok_or_else(|| EmSitdError::VariableNotFound {
            var: name.to_string(),
        })
}

fn shape_of(var: &Variable<'_>) -> Vec<usize> {
    var.dimensions().iter().map(netcdf::Dimension::len).collect()
}

fn read_2d(file: &File, name: &str) -> Result<Array2<f64>> {
    let var = variable(file, name)?;
    let shape = shape_of(&var);
    let &[rows, cols] = shape.as_slice() else {
        return Err(EmSitdError::DimensionMismatch {
            what: format!("rank of '{name}'"),
            left: shape.len().to_string(),
            right: "2".to_string(),
        });
    };
    let values = var.get_values::<f64, _>(..)?;
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}

/// Numeric `_FillValue` or `missing_value` of a variable, if any
fn fill_value(var: &Variable<'_>) -> Option<f64> {
    ["_FillValue", "missing_value"].iter().find_map(|name| {
        match var.attribute(name)?.value().ok()? {
            AttributeValue::Float(v) => Some(f64::from(v)),
            AttributeValue::Double(v) => Some(v),
            AttributeValue::Int(v) => Some(f64::from(v)),
            AttributeValue::Short(v) => Some(f64::from(v)),
            _ => None,
        }
    })
}

fn string_attribute(var: &Variable<'_>, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Read a curvilinear grid from the named 2-D coordinate variables.
///
/// # Errors
///
/// Returns [`EmSitdError::VariableNotFound`] for a missing variable, a
/// dimension error if either is not 2-D, and grid construction errors.
pub fn read_grid(file: &File, lon_var: &str, lat_var: &str) -> Result<Grid> {
    let lon = read_2d(file, lon_var)?;
    let lat = read_2d(file, lat_var)?;
    debug!(shape = ?lon.dim(), lon_var, lat_var, "read grid coordinates");
    Grid::new(lon, lat)
}

/// Copy the attributes of `src` onto an `f32` variable `dst`.
///
/// `_FillValue` must match the variable type, so it is converted instead of
/// copied verbatim.
fn copy_attributes(src: &Variable<'_>, dst: &mut VariableMut<'_>) -> Result<()> {
    if let Some(fv) = fill_value(src) {
        #[allow(clippy::cast_possible_truncation)]
        let fv = fv as f32;
        dst.put_attribute("_FillValue", fv)?;
    }
    for attr in src.attributes().filter(|a| a.name() != "_FillValue") {
        match attr.value() {
            Ok(value) => {
                dst.put_attribute(attr.name(), value)?;
            }
            Err(e) => warn!(attribute = attr.name(), error = %e, "skipped unreadable attribute"),
        }
    }
    Ok(())
}

/// Coordinate variables written next to every gridded output
const COORDINATE_NAMES: (&str, &str) = ("nav_lon", "nav_lat");

/// Write `nav_lon`/`nav_lat` (y, x). With a `source` file, attributes are
/// copied from its named longitude and latitude variables.
fn write_coordinates(
    file: &mut FileMut,
    grid: &Grid,
    source: Option<(&File, &str, &str)>,
) -> Result<()> {
    let layers = [
        (COORDINATE_NAMES.0, grid.lon(), source.map(|(f, lon, _)| (f, lon))),
        (COORDINATE_NAMES.1, grid.lat(), source.map(|(f, _, lat)| (f, lat))),
    ];
    for (name, data, src) in layers {
        let mut var = file.add_variable::<f32>(name, &["y", "x"])?;
        match src.and_then(|(f, src_name)| f.variable(src_name)) {
            Some(src) => copy_attributes(&src, &mut var)?,
            None => {
                let (units, standard_name) = if name == COORDINATE_NAMES.0 {
                    ("degrees_east", "longitude")
                } else {
                    ("degrees_north", "latitude")
                };
                var.put_attribute("units", units)?;
                var.put_attribute("standard_name", standard_name)?;
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        let values: Vec<f32> = data.iter().map(|&v| v as f32).collect();
        var.put_values(&values, ..)?;
    }
    Ok(())
}

fn remove_existing(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Appends sealed months to a SITD file
pub struct SitdWriter {
    file: FileMut,
    time_index: usize,
    reference: Option<NaiveDate>,
    shape: (usize, usize, usize),
}

impl SitdWriter {
    /// Create the output file, its dimensions, `hiceb` and grid coordinates.
    ///
    /// `grid_source` names the grid file and its longitude and latitude
    /// variables, whose attributes are copied onto `nav_lon`/`nav_lat`;
    /// without it minimal CF attributes are written. An existing file at
    /// `output_path` is replaced.
    ///
    /// # Errors
    ///
    /// Returns NetCDF or I/O errors from creating the file.
    pub fn create(
        output_path: &Path,
        grid: &Grid,
        bounds: &CategoryBounds,
        grid_source: Option<(&File, &str, &str)>,
    ) -> Result<Self> {
        remove_existing(output_path)?;
        let mut file = create(output_path)?;
        let (rows, cols) = grid.shape();

        file.add_dimension("ncatice", bounds.len())?;
        file.add_dimension("y", rows)?;
        file.add_dimension("x", cols)?;
        file.add_unlimited_dimension("time")?;

        file.add_attribute(
            "history",
            format!(
                "Created by {} {} on {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                Utc::now().to_rfc3339()
            ),
        )?;

        write_coordinates(&mut file, grid, grid_source)?;

        {
            let mut time = file.add_variable::<i32>("time", &["time"])?;
            time.put_attribute("standard_name", "time")?;
            time.put_attribute("calendar", "gregorian")?;
        }

        {
            let mut hiceb = file.add_variable::<f32>("hiceb", &["ncatice"])?;
            hiceb.put_attribute("units", "m")?;
            hiceb.put_attribute("long_name", "ice thickness category upper boundaries")?;
            #[allow(clippy::cast_possible_truncation)]
            let upper: Vec<f32> = bounds.upper().iter().map(|&b| b as f32).collect();
            hiceb.put_values(&upper, ..)?;
        }

        {
            let mut sitd = file.add_variable::<i32>("sitd", &["time", "ncatice", "y", "x"])?;
            sitd.put_attribute("_FillValue", 0_i32)?;
            sitd.put_attribute("missing_value", 0_i32)?;
            sitd.put_attribute("units", " ")?;
            sitd.put_attribute("long_name", "EM ice thickness count per category")?;
            sitd.put_attribute("coordinates", "time ncatice nav_lon nav_lat")?;
        }

        info!(path = %output_path.display(), rows, cols, categories = bounds.len(), "created SITD file");

        Ok(Self {
            file,
            time_index: 0,
            reference: None,
            shape: (bounds.len(), rows, cols),
        })
    }

    /// Number of time steps written so far
    #[must_use]
    pub const fn time_steps(&self) -> usize {
        self.time_index
    }

    /// Close the file, returning the number of time steps written
    ///
    /// # Errors
    ///
    /// Returns the NetCDF error if the final flush or close fails.
    pub fn finish(self) -> Result<usize> {
        let steps = self.time_index;
        self.file.close()?;
        debug!(time_steps = steps, "closed SITD file");
        Ok(steps)
    }
}

impl HistogramSink for SitdWriter {
    fn store(&mut self, month: &SealedMonth) -> Result<()> {
        let counts = month.counts();
        if counts.dim() != self.shape {
            return Err(EmSitdError::DimensionMismatch {
                what: "sealed month vs SITD file shape".to_string(),
                left: format!("{:?}", counts.dim()),
                right: format!("{:?}", self.shape),
            });
        }

        // the first observation of the first stored month fixes the time reference
        let reference = match self.reference {
            Some(r) => r,
            None => {
                let r = month.first_date();
                variable_mut(&mut self.file, "time")?
                    .put_attribute("units", format!("days since {}", r.format("%Y-%m-%d")))?;
                self.reference = Some(r);
                r
            }
        };

        let t = self.time_index;
        #[allow(clippy::cast_possible_truncation)]
        let days = (month.date() - reference).num_days() as i32;
        variable_mut(&mut self.file, "time")?.put_value(days, [t])?;

        let values: Vec<i32> = counts.iter().copied().collect();
        variable_mut(&mut self.file, "sitd")?.put_values(&values, (t, .., .., ..))?;
        self.file.sync()?;

        info!(
            time_step = t,
            month = %month.period(),
            max_count = month.max_count(),
            "stored time step"
        );
        self.time_index += 1;
        Ok(())
    }
}

/// Contents of a SITD file
#[derive(Debug, Clone)]
pub struct SitdDataset {
    /// Raw `time` values
    pub time: Vec<i32>,
    /// `units` attribute of `time`
    pub time_units: Option<String>,
    pub bounds: CategoryBounds,
    /// `(time, category, y, x)` counts
    pub counts: Array4<i32>,
    pub grid: Grid,
}

impl SitdDataset {
    /// Calendar date of every time step, when the units can be decoded
    #[must_use]
    pub fn dates(&self) -> Vec<Option<NaiveDate>> {
        self.time
            .iter()
            .map(|&t| {
                self.time_units
                    .as_deref()
                    .and_then(|u| decode_days_since(u, i64::from(t)))
            })
            .collect()
    }

    /// Sum of the counts over the given time steps, as `(category, y, x)`.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::ConfigError`] for an out-of-range time index.
    pub fn summed_counts(&self, time_indices: &[usize]) -> Result<Array3<f64>> {
        let (nt, nc, ny, nx) = self.counts.dim();
        let mut total = Array3::<f64>::zeros((nc, ny, nx));
        for &t in time_indices {
            if t >= nt {
                return Err(EmSitdError::ConfigError(format!(
                    "time index {t} out of range, file has {nt} steps"
                )));
            }
            total += &self.counts.index_axis(ndarray::Axis(0), t).mapv(f64::from);
        }
        Ok(total)
    }
}

/// Decode `days since YYYY-MM-DD[ ...]` units
#[must_use]
pub fn decode_days_since(units: &str, days: i64) -> Option<NaiveDate> {
    let date = units.trim().strip_prefix("days since")?.trim();
    let date = date.get(..10).unwrap_or(date);
    let reference = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    reference.checked_add_signed(chrono::Duration::days(days))
}

/// Read a SITD file written by [`SitdWriter`].
///
/// # Errors
///
/// Returns NetCDF, shape or boundary validation errors.
pub fn read_sitd(file: &File) -> Result<SitdDataset> {
    let time_var = variable(file, "time")?;
    let time = time_var.get_values::<i32, _>(..)?;
    let time_units = string_attribute(&time_var, "units");

    let upper = variable(file, "hiceb")?.get_values::<f64, _>(..)?;
    let bounds = CategoryBounds::new(upper)?;

    let sitd = variable(file, "sitd")?;
    let shape = shape_of(&sitd);
    let &[nt, nc, ny, nx] = shape.as_slice() else {
        return Err(EmSitdError::DimensionMismatch {
            what: "rank of 'sitd'".to_string(),
            left: shape.len().to_string(),
            right: "4".to_string(),
        });
    };
    let counts = if nt == 0 {
        Array4::zeros((0, nc, ny, nx))
    } else {
        Array4::from_shape_vec((nt, nc, ny, nx), sitd.get_values::<i32, _>(..)?)?
    };

    let grid = read_grid(file, COORDINATE_NAMES.0, COORDINATE_NAMES.1)?;

    Ok(SitdDataset {
        time,
        time_units,
        bounds,
        counts,
        grid,
    })
}

/// Read one time step of a model category field such as LIM3 `siconcat`,
/// shaped `(category, y, x)`. Fill values and non-finite values become NaN.
///
/// # Errors
///
/// Returns NetCDF errors, a dimension error if the variable is not 4-D, or
/// a configuration error for an out-of-range time index.
pub fn read_model_categories(file: &File, var_name: &str, time_index: usize) -> Result<Array3<f64>> {
    let var = variable(file, var_name)?;
    let shape = shape_of(&var);
    let &[nt, nc, ny, nx] = shape.as_slice() else {
        return Err(EmSitdError::DimensionMismatch {
            what: format!("rank of '{var_name}'"),
            left: shape.len().to_string(),
            right: "4".to_string(),
        });
    };
    if time_index >= nt {
        return Err(EmSitdError::ConfigError(format!(
            "time index {time_index} out of range, '{var_name}' has {nt} steps"
        )));
    }

    let fill = fill_value(&var);
    let values: Vec<f64> = var
        .get_values::<f64, _>((time_index, .., .., ..))?
        .into_iter()
        .map(|v| match fill {
            Some(f) if v == f => f64::NAN,
            _ if !v.is_finite() => f64::NAN,
            _ => v,
        })
        .collect();

    Ok(Array3::from_shape_vec((nc, ny, nx), values)?)
}

/// One `(y, x)` field of a map file
#[derive(Debug, Clone, Copy)]
pub struct MapLayer<'a> {
    pub name: &'a str,
    pub long_name: &'a str,
    /// `None` for dimensionless fields
    pub units: Option<&'a str>,
    pub data: ArrayView2<'a, f64>,
}

/// Write `(y, x)` maps with grid coordinates into one file. NaN cells are
/// stored as [`MAP_FILL_VALUE`].
///
/// # Errors
///
/// Returns a dimension error if a layer does not match the grid, and NetCDF
/// or I/O errors from writing.
pub fn write_maps(output_path: &Path, grid: &Grid, layers: &[MapLayer<'_>]) -> Result<()> {
    if let Some(bad) = layers.iter().find(|l| l.data.dim() != grid.shape()) {
        return Err(EmSitdError::DimensionMismatch {
            what: format!("'{}' vs grid shape", bad.name),
            left: format!("{:?}", bad.data.dim()),
            right: format!("{:?}", grid.shape()),
        });
    }

    remove_existing(output_path)?;
    let mut file = create(output_path)?;
    let (rows, cols) = grid.shape();
    file.add_dimension("y", rows)?;
    file.add_dimension("x", cols)?;
    write_coordinates(&mut file, grid, None)?;

    for layer in layers {
        let mut var = file.add_variable::<f32>(layer.name, &["y", "x"])?;
        var.put_attribute("_FillValue", MAP_FILL_VALUE)?;
        var.put_attribute("long_name", layer.long_name)?;
        if let Some(units) = layer.units {
            var.put_attribute("units", units)?;
        }
        var.put_attribute("coordinates", "nav_lon nav_lat")?;

        #[allow(clippy::cast_possible_truncation)]
        let values: Vec<f32> = layer
            .data
            .iter()
            .map(|&v| if v.is_finite() { v as f32 } else { MAP_FILL_VALUE })
            .collect();
        var.put_values(&values, ..)?;
    }

    file.add_attribute(
        "history",
        format!(
            "Created by {} on {}",
            env!("CARGO_PKG_NAME"),
            Utc::now().to_rfc3339()
        ),
    )?;
    info!(path = %output_path.display(), layers = layers.len(), "wrote maps");

    Ok(())
}

/// Read one layer written by [`write_maps`], fill values as NaN
///
/// # Errors
///
/// Returns NetCDF or shape errors.
pub fn read_map(file: &File, var_name: &str) -> Result<Array2<f64>> {
    let var = variable(file, var_name)?;
    let fill = fill_value(&var);
    let mut map = read_2d(file, var_name)?;
    map.mapv_inplace(|v| match fill {
        Some(f) if (v - f).abs() <= f.abs() * 1e-6 => f64::NAN,
        _ => v,
    });
    Ok(map)
}
