//! EM survey observations and their readers
//!
//! Two on-disk layouts are understood:
//!
//! - NetCDF track files with 1-D `Longitude`, `Latitude`, `Timestamp`
//!   (seconds since 1970-01-01 UTC) and `Hice` (m) variables
//! - delimited text with `lon lat timestamp thickness` columns, separated by
//!   commas, semicolons, tabs or whitespace; `#` starts a comment and a
//!   leading non-numeric header line is skipped

use crate::errors::{EmSitdError, Result};
use chrono::{DateTime, Datelike, Utc};
use netcdf::File;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// One EM thickness reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub lon: f64,
    pub lat: f64,
    pub time: DateTime<Utc>,
    /// Snow plus ice thickness (m); negative marks a missing reading
    pub thickness: f64,
}

impl Observation {
    /// Build an observation from a POSIX timestamp in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`EmSitdError::ConfigError`] if the timestamp is not
    /// representable.
    pub fn from_epoch_seconds(lon: f64, lat: f64, seconds: f64, thickness: f64) -> Result<Self> {
        Ok(Self {
            lon,
            lat,
            time: epoch_seconds_to_utc(seconds)?,
            thickness,
        })
    }
}

/// Convert fractional seconds since 1970-01-01 to a UTC timestamp
///
/// # Errors
///
/// Returns [`EmSitdError::ConfigError`] for non-finite or out-of-range input.
pub fn epoch_seconds_to_utc(seconds: f64) -> Result<DateTime<Utc>> {
    if !seconds.is_finite() {
        return Err(EmSitdError::ConfigError(format!(
            "timestamp {seconds} is not finite"
        )));
    }
    let whole = seconds.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    #[allow(clippy::cast_possible_truncation)]
    let secs = whole as i64;
    DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
        EmSitdError::ConfigError(format!("timestamp {seconds} is out of range"))
    })
}

/// Reader-side quality window: readings outside `(min, max]` are dropped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThicknessWindow {
    pub min_exclusive: f64,
    pub max_inclusive: f64,
}

impl ThicknessWindow {
    #[must_use]
    pub fn contains(&self, thickness: f64) -> bool {
        thickness > self.min_exclusive && thickness <= self.max_inclusive
    }
}

impl Default for ThicknessWindow {
    /// EM readings above 3 m are unreliable
    fn default() -> Self {
        Self {
            min_exclusive: 0.0,
            max_inclusive: 3.0,
        }
    }
}

/// Options applied while reading one observation file
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Drop readings outside this window, keep everything when `None`
    pub window: Option<ThicknessWindow>,
    /// Years added to every timestamp, for campaigns logged with a wrong year
    pub year_offset: i32,
}

/// Read observations from a NetCDF track or delimited text file.
///
/// The format is picked from the extension: `.nc`/`.nc4`/`.cdf` are NetCDF,
/// anything else is parsed as text.
///
/// # Errors
///
/// Returns I/O, NetCDF or parse errors from the underlying reader.
pub fn read_observations(path: &Path, options: ReadOptions) -> Result<Vec<Observation>> {
    let is_netcdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "nc" | "nc4" | "cdf"));

    let raw = if is_netcdf {
        let file = netcdf::open(path)?;
        read_netcdf_track(&file)?
    } else {
        let text = fs::read_to_string(path)?;
        parse_delimited(&text, &path.display().to_string())?
    };

    let total = raw.len();
    let kept = apply_options(raw, options)?;
    info!(
        path = %path.display(),
        read = total,
        kept = kept.len(),
        "loaded observations"
    );
    Ok(kept)
}

/// Filter by thickness window and shift years.
///
/// # Errors
///
/// Returns [`EmSitdError::ConfigError`] if the shifted date does not exist
/// (29 February moved into a non-leap year).
pub fn apply_options(raw: Vec<Observation>, options: ReadOptions) -> Result<Vec<Observation>> {
    raw.into_iter()
        .filter(|o| options.window.map_or(true, |w| w.contains(o.thickness)))
        .map(|mut o| {
            if options.year_offset != 0 {
                let year = o.time.year() + options.year_offset;
                o.time = o.time.with_year(year).ok_or_else(|| {
                    EmSitdError::ConfigError(format!(
                        "cannot shift {} to year {year}",
                        o.time.format("%Y-%m-%d")
                    ))
                })?;
            }
            Ok(o)
        })
        .collect()
}

fn read_track_variable(file: &File, name: &str) -> Result<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| EmSitdError::VariableNotFound {
            var: name.to_string(),
        })?;
    Ok(var.get_values::<f64, _>(..)?)
}

/// Read the `Longitude`/`Latitude`/`Timestamp`/`Hice` variables of a track file.
///
/// # Errors
///
/// Returns [`EmSitdError::VariableNotFound`] for a missing variable and
/// [`EmSitdError::DimensionMismatch`] if their lengths differ.
pub fn read_netcdf_track(file: &File) -> Result<Vec<Observation>> {
    let lon = read_track_variable(file, "Longitude")?;
    let lat = read_track_variable(file, "Latitude")?;
    let time = read_track_variable(file, "Timestamp")?;
    let hice = read_track_variable(file, "Hice")?;

    for (name, len) in [("Latitude", lat.len()), ("Timestamp", time.len()), ("Hice", hice.len())] {
        if len != lon.len() {
            return Err(EmSitdError::DimensionMismatch {
                what: format!("Longitude/{name} length"),
                left: lon.len().to_string(),
                right: len.to_string(),
            });
        }
    }

    debug!(records = lon.len(), "read NetCDF track");

    lon.iter()
        .zip(&lat)
        .zip(&time)
        .zip(&hice)
        .map(|(((&lon, &lat), &t), &h)| Observation::from_epoch_seconds(lon, lat, t, h))
        .collect()
}

/// Parse delimited `lon lat timestamp thickness` records.
///
/// # Errors
///
/// Returns [`EmSitdError::ParseError`] naming `source_name` and the 1-based
/// line of the first malformed record.
pub fn parse_delimited(text: &str, source_name: &str) -> Result<Vec<Observation>> {
    let mut out = Vec::new();
    let mut seen_data = false;

    for (i, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        let parse_error = |message: String| EmSitdError::ParseError {
            source_name: source_name.to_string(),
            line: i + 1,
            message,
        };

        let values: std::result::Result<Vec<f64>, _> =
            fields.iter().map(|f| f.parse::<f64>()).collect();
        let values = match values {
            Ok(v) => v,
            // a header comes before the first record and has no numeric field
            Err(_) if !seen_data && fields.iter().all(|f| f.parse::<f64>().is_err()) => {
                seen_data = true;
                continue;
            }
            Err(e) => return Err(parse_error(format!("{e} in '{line}'"))),
        };
        seen_data = true;

        if values.len() != 4 {
            return Err(parse_error(format!(
                "expected 4 columns (lon lat timestamp thickness), found {}",
                values.len()
            )));
        }

        out.push(
            Observation::from_epoch_seconds(values[0], values[1], values[2], values[3])
                .map_err(|e| parse_error(e.to_string()))?,
        );
    }

    Ok(out)
}

/// Split a batch into parallel longitude and latitude vectors
#[must_use]
pub fn coordinates(observations: &[Observation]) -> (Vec<f64>, Vec<f64>) {
    observations.iter().map(|o| (o.lon, o.lat)).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_mixed_delimiters_header_and_comments() {
        let text = "lon,lat,time,hice\n\
                    # first leg\n\
                    -6.5, -69.9, 1388880000, 1.25\n\
                    -6.4\t-69.8\t1388966400\t0.8 # trailing comment\n\
                    \n\
                    -6.3 -69.7 1389052800.5 -1\n";
        let obs = parse_delimited(text, "leg.csv").unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].time, Utc.with_ymd_and_hms(2014, 1, 5, 0, 0, 0).unwrap());
        assert_eq!(obs[1].lon, -6.4);
        assert_eq!(obs[2].thickness, -1.0);
        assert_eq!(obs[2].time.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn reports_line_of_bad_record() {
        let text = "1 2 3 4\n1 2 x 4\n";
        match parse_delimited(text, "bad.txt") {
            Err(EmSitdError::ParseError { line, source_name, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(source_name, "bad.txt");
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }
        assert!(parse_delimited("1 2 3\n", "short.txt").is_err());
    }

    #[test]
    fn malformed_first_record_is_not_a_header() {
        // one bad field among numbers is a broken record, not column names
        match parse_delimited("-6.5 -69.9 1388880000 1.2x\n-6.4 -69.8 1388966400 0.8\n", "leg.txt") {
            Err(EmSitdError::ParseError { line, .. }) => assert_eq!(line, 1),
            other => panic!("Expected ParseError, got {other:?}"),
        }
        let obs = parse_delimited("lon lat time hice\n-6.4 -69.8 1388966400 0.8\n", "leg.txt")
            .unwrap();
        assert_eq!(obs.len(), 1);
    }

    #[test]
    fn window_and_year_offset() {
        let raw = vec![
            Observation::from_epoch_seconds(0.0, -70.0, 1_380_000_000.0, 0.0).unwrap(),
            Observation::from_epoch_seconds(0.0, -70.0, 1_380_000_000.0, 1.0).unwrap(),
            Observation::from_epoch_seconds(0.0, -70.0, 1_380_000_000.0, 3.0).unwrap(),
            Observation::from_epoch_seconds(0.0, -70.0, 1_380_000_000.0, 3.5).unwrap(),
        ];
        let kept = apply_options(
            raw,
            ReadOptions {
                window: Some(ThicknessWindow::default()),
                year_offset: 1,
            },
        )
        .unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|o| o.time.year() == 2014));
    }

    #[test]
    fn coordinates_unzip_in_order() {
        let obs = vec![
            Observation::from_epoch_seconds(1.0, 2.0, 0.0, 0.5).unwrap(),
            Observation::from_epoch_seconds(3.0, 4.0, 0.0, 0.5).unwrap(),
        ];
        assert_eq!(coordinates(&obs), (vec![1.0, 3.0], vec![2.0, 4.0]));
    }
}
