//! End-to-end sampling and comparison runs on small synthetic files

use approx::assert_relative_eq;
use chrono::NaiveDate;
use em_sitd::{
    categories::CategoryBounds,
    compare::ComparisonTest,
    config::SamplingConfig,
    errors::{EmSitdError, Result},
    metadata::summarize_sitd,
    netcdf_io::{read_map, read_sitd},
    pipeline::{run_comparison, run_sampling, ComparisonSpec, SurveyInput},
};
use netcdf::{create, open};
use std::path::Path;
use tempfile::tempdir;

const JAN_05: f64 = 1_357_344_000.0;
const JAN_20_NOON: f64 = 1_358_683_200.0;
const FEB_03: f64 = 1_359_849_600.0;
const MAR_10_2012: f64 = 1_331_337_600.0;

/// 3 × 4 grid, southernmost row first as in ORCA grids
fn write_grid(path: &Path) -> Result<()> {
    let lats = [-70.0, -65.0, -50.0];
    let lon: Vec<f64> = (0..3).flat_map(|_| (0..4).map(f64::from)).collect();
    let lat: Vec<f64> = lats.iter().flat_map(|&l| [l; 4]).collect();

    let mut file = create(path)?;
    file.add_dimension("y", 3)?;
    file.add_dimension("x", 4)?;
    for (name, values, units) in [
        ("glamt", &lon, "degrees_east"),
        ("gphit", &lat, "degrees_north"),
    ] {
        let mut var = file.add_variable::<f64>(name, &["y", "x"])?;
        var.put_attribute("units", units)?;
        var.put_attribute("_FillValue", -999.0_f64)?;
        var.put_values(values, ..)?;
    }
    Ok(())
}

fn write_track(path: &Path, records: &[(f64, f64, f64, f64)]) -> Result<()> {
    let mut file = create(path)?;
    file.add_dimension("record", records.len())?;
    let columns: [(&str, fn(&(f64, f64, f64, f64)) -> f64); 4] = [
        ("Longitude", |r| r.0),
        ("Latitude", |r| r.1),
        ("Timestamp", |r| r.2),
        ("Hice", |r| r.3),
    ];
    for (name, column) in columns {
        let values: Vec<f64> = records.iter().map(column).collect();
        let mut var = file.add_variable::<f64>(name, &["record"])?;
        var.put_values(&values, ..)?;
    }
    Ok(())
}

fn test_config() -> Result<SamplingConfig> {
    Ok(SamplingConfig {
        lon_var: "glamt".to_string(),
        lat_var: "gphit".to_string(),
        ..SamplingConfig::default()
    }
    .with_boundaries(CategoryBounds::new(vec![0.5, 1.0, 99.0])?))
}

#[test]
fn test_sampling_writes_monthly_steps() -> Result<()> {
    let dir = tempdir()?;
    let grid_path = dir.path().join("coordinates.nc");
    let track_path = dir.path().join("survey13.nc");
    let output = dir.path().join("sitd.nc");
    write_grid(&grid_path)?;
    write_track(
        &track_path,
        &[
            (0.1, -70.0, JAN_05, 0.3),
            (1.0, -65.1, JAN_20_NOON, 0.7),
            // thicker than the default 3 m window
            (2.0, -65.0, JAN_20_NOON, 4.0),
            (3.0, -69.0, FEB_03, 2.0),
        ],
    )?;

    let report = run_sampling(
        &test_config()?,
        &grid_path,
        &[SurveyInput::new(&track_path)],
        &output,
    )?;

    // the row at 50°S lies north of the default -55 limit
    assert_eq!(report.grid_shape, (2, 4));
    assert_eq!(report.files, 1);
    assert_eq!(report.observations, 3);
    assert_eq!(report.counted, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.time_steps, 2);

    let dataset = read_sitd(&open(&output)?)?;
    assert_eq!(dataset.counts.dim(), (2, 3, 2, 4));
    assert_eq!(dataset.bounds.upper(), &[0.5, 1.0, 99.0]);
    // referenced to the first observation, tagged with each month's last one
    assert_eq!(dataset.time_units.as_deref(), Some("days since 2013-01-05"));
    assert_eq!(dataset.time, vec![15, 29]);
    assert_eq!(
        dataset.dates(),
        vec![
            NaiveDate::from_ymd_opt(2013, 1, 20),
            NaiveDate::from_ymd_opt(2013, 2, 3),
        ]
    );

    assert_eq!(dataset.counts[[0, 0, 0, 0]], 1);
    assert_eq!(dataset.counts[[0, 1, 1, 1]], 1);
    assert_eq!(dataset.counts[[1, 2, 0, 3]], 1);
    assert_eq!(dataset.counts.sum(), 3);

    // coordinates come from the cropped grid
    assert_eq!(dataset.grid.shape(), (2, 4));
    assert_relative_eq!(dataset.grid.lat()[[1, 0]], -65.0);

    let summaries = summarize_sitd(&dataset);
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].total, 2);
    assert_eq!(summaries[0].occupied_cells, 2);
    assert_eq!(summaries[0].per_category, vec![1, 1, 0]);
    assert_eq!(summaries[1].max_count, 1);

    Ok(())
}

#[test]
fn test_month_spans_files_and_year_offset() -> Result<()> {
    let dir = tempdir()?;
    let grid_path = dir.path().join("coordinates.nc");
    let first = dir.path().join("leg1.nc");
    let second = dir.path().join("leg2.csv");
    let output = dir.path().join("sitd.nc");
    write_grid(&grid_path)?;
    write_track(&first, &[(0.0, -70.0, JAN_05, 0.2)])?;
    // logged a year early, same cell and month as the NetCDF leg plus March
    std::fs::write(
        &second,
        format!(
            "lon,lat,time,hice\n0.0,-70.0,{},0.4\n2.0,-65.0,{},1.5\n",
            JAN_05 - 366.0 * 86_400.0,
            MAR_10_2012
        ),
    )?;

    let report = run_sampling(
        &test_config()?.with_lat_limit(None),
        &grid_path,
        &[
            SurveyInput::new(&first),
            SurveyInput::new(&second).with_year_offset(1),
        ],
        &output,
    )?;
    assert_eq!(report.grid_shape, (3, 4));
    assert_eq!(report.time_steps, 2);

    let dataset = read_sitd(&open(&output)?)?;
    assert_eq!(dataset.time_units.as_deref(), Some("days since 2013-01-05"));
    assert_eq!(dataset.counts[[0, 0, 0, 0]], 2);
    assert_eq!(dataset.counts[[1, 2, 1, 2]], 1);
    assert_eq!(
        dataset.dates()[1],
        NaiveDate::from_ymd_opt(2013, 3, 10)
    );
    Ok(())
}

#[test]
fn test_out_of_order_months_abort_the_run() -> Result<()> {
    let dir = tempdir()?;
    let grid_path = dir.path().join("coordinates.nc");
    let track_path = dir.path().join("survey.nc");
    write_grid(&grid_path)?;
    write_track(
        &track_path,
        &[(0.0, -70.0, FEB_03, 0.5), (0.0, -70.0, JAN_05, 0.5)],
    )?;

    let err = run_sampling(
        &test_config()?,
        &grid_path,
        &[SurveyInput::new(&track_path)],
        &dir.path().join("sitd.nc"),
    )
    .unwrap_err();
    assert!(matches!(err, EmSitdError::OutOfOrder { .. }), "{err}");
    Ok(())
}

#[test]
fn test_non_finite_position_aborts_the_run() -> Result<()> {
    let dir = tempdir()?;
    let grid_path = dir.path().join("coordinates.nc");
    let leg = dir.path().join("leg.csv");
    write_grid(&grid_path)?;
    std::fs::write(
        &leg,
        format!("0.0 -70.0 {JAN_05} 0.4\nnan -70.0 {JAN_05} 0.4\n"),
    )?;

    let err = run_sampling(
        &test_config()?,
        &grid_path,
        &[SurveyInput::new(&leg)],
        &dir.path().join("sitd.nc"),
    )
    .unwrap_err();
    assert!(
        matches!(err, EmSitdError::InvalidCoordinate { index: 1, .. }),
        "{err}"
    );
    Ok(())
}

#[test]
fn test_sampling_requires_inputs() {
    let dir = tempdir().expect("Failed to create temp dir");
    let err = run_sampling(
        &SamplingConfig::default(),
        &dir.path().join("grid.nc"),
        &[],
        &dir.path().join("sitd.nc"),
    )
    .unwrap_err();
    assert!(err.is_configuration());
}

/// Model categories matching the EM distribution in (0,0) and masked in (1,1)
fn write_model(path: &Path) -> Result<()> {
    let (nc, ny, nx) = (3, 2, 4);
    let mut values = vec![0.0_f32; nc * ny * nx];
    let at = |c: usize, y: usize, x: usize| c * ny * nx + y * nx + x;
    values[at(0, 0, 0)] = 0.8;
    values[at(0, 0, 3)] = 0.6;
    for c in 0..nc {
        values[at(c, 1, 1)] = 1.0e20;
    }

    let mut file = create(path)?;
    file.add_unlimited_dimension("time_counter")?;
    file.add_dimension("ncatice", nc)?;
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;
    let mut var =
        file.add_variable::<f32>("siconcat", &["time_counter", "ncatice", "y", "x"])?;
    var.put_attribute("_FillValue", 1.0e20_f32)?;
    var.put_values(&values, (0, .., .., ..))?;
    Ok(())
}

#[test]
fn test_comparison_writes_pvalue_map() -> Result<()> {
    let dir = tempdir()?;
    let grid_path = dir.path().join("coordinates.nc");
    let track_path = dir.path().join("survey.nc");
    let sitd_path = dir.path().join("sitd.nc");
    let model_path = dir.path().join("model.nc");
    let map_path = dir.path().join("pvalue.nc");
    write_grid(&grid_path)?;
    write_track(
        &track_path,
        &[
            (0.0, -70.0, JAN_05, 0.2),
            (1.0, -65.0, JAN_05, 0.7),
            (3.0, -70.0, FEB_03, 0.3),
        ],
    )?;
    run_sampling(
        &test_config()?,
        &grid_path,
        &[SurveyInput::new(&track_path)],
        &sitd_path,
    )?;
    write_model(&model_path)?;

    let spec = ComparisonSpec {
        observed_steps: vec![0, 1],
        ..ComparisonSpec::default()
    };
    let report = run_comparison(&sitd_path, &model_path, &spec, Some(&map_path))?;

    assert_eq!(report.p_values.dim(), (2, 4));
    // (1,1) is masked in the model, unobserved cells have no distribution
    assert_eq!(report.compared_cells, 2);
    assert_relative_eq!(report.p_values[[0, 0]], 1.0);
    assert_relative_eq!(report.p_values[[0, 3]], 1.0);
    assert!(report.p_values[[1, 1]].is_nan());
    assert!(report.p_values[[1, 0]].is_nan());

    let file = open(&map_path)?;
    let map = read_map(&file, "pvalue")?;
    assert_eq!(map.dim(), (2, 4));
    assert_relative_eq!(map[[0, 0]], 1.0);
    assert!(map[[1, 1]].is_nan());

    // all weight in the thinnest category, midpoint 0.25 m
    let em_mean = read_map(&file, "em_mean_thickness")?;
    assert_relative_eq!(em_mean[[0, 0]], 0.25);
    assert_relative_eq!(em_mean[[1, 1]], 0.75);
    assert!(em_mean[[0, 1]].is_nan());
    let model_mean = read_map(&file, "model_mean_thickness")?;
    assert_relative_eq!(model_mean[[0, 3]], 0.25);
    assert!(model_mean[[1, 1]].is_nan());
    assert_relative_eq!(report.observed_mean[[0, 3]], 0.25);

    let rank_sum = ComparisonSpec {
        test: ComparisonTest::MannWhitney,
        ..spec.clone()
    };
    let report = run_comparison(&sitd_path, &model_path, &rank_sum, None)?;
    assert_eq!(report.compared_cells, 2);
    assert_relative_eq!(report.p_values[[0, 0]], 1.0);
    assert!(report.p_values[[1, 1]].is_nan());

    let bad_step = ComparisonSpec {
        observed_steps: vec![5],
        ..ComparisonSpec::default()
    };
    assert!(run_comparison(&sitd_path, &model_path, &bad_step, None).is_err());
    Ok(())
}
