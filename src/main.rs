//! Entry point for the em-sitd application.
//! Handles CLI parsing and logging setup, then dispatches to sampling, comparison or inspection.

use clap::Parser;
use em_sitd::categories::CategoryBounds;
use em_sitd::config::SamplingConfig;
use em_sitd::metadata::{print_metadata, print_sitd_summary};
use em_sitd::netcdf_io::read_sitd;
use em_sitd::observations::ThicknessWindow;
use em_sitd::parallel::ParallelConfig;
use em_sitd::pipeline::{run_comparison, run_sampling, ComparisonSpec};
use tracing_subscriber::FmtSubscriber;

mod cli;

use cli::{Args, Command, CompareArgs, SampleArgs};

fn init_logging(verbose: u8) -> Result<(), Box<dyn std::error::Error>> {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Merge the JSON configuration (or defaults) with command-line overrides
fn sampling_config(args: &SampleArgs) -> Result<SamplingConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SamplingConfig::from_json_file(path)?,
        None => SamplingConfig::default(),
    };

    if let Some(upper) = &args.boundaries {
        config = config.with_boundaries(CategoryBounds::new(upper.clone())?);
    }
    if args.no_crop {
        config = config.with_lat_limit(None);
    } else if let Some(limit) = args.lat_limit {
        config = config.with_lat_limit(Some(limit));
    }
    if args.no_window {
        config = config.with_window(None);
    } else if let Some(max) = args.max_thickness {
        let window = config.window.unwrap_or_default();
        config = config.with_window(Some(ThicknessWindow {
            max_inclusive: max,
            ..window
        }));
    }

    Ok(config)
}

fn sample(args: &SampleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = sampling_config(args)?;
    println!(
        "⚡ Sampling {} survey file(s) onto {} with {} categories",
        args.inputs.len(),
        args.grid.display(),
        config.boundaries.len()
    );

    let report = run_sampling(&config, &args.grid, &args.inputs, &args.output)?;

    println!(
        "✅ Saved {} monthly time step(s) to {}",
        report.time_steps,
        args.output.display()
    );
    println!(
        "   Grid: {} × {}, observations: {}, counted: {}, skipped: {}",
        report.grid_shape.0, report.grid_shape.1, report.observations, report.counted, report.skipped
    );
    Ok(())
}

fn compare(args: &CompareArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = ComparisonSpec {
        observed_steps: args.steps.clone(),
        model_var: args.model_var.clone(),
        model_step: args.model_step,
        skip_last: !args.keep_last,
        test: args.test.into(),
        thickness_cap: args.thickness_cap,
    };

    let report = run_comparison(
        &args.observed,
        &args.model,
        &spec,
        args.output_netcdf.as_deref(),
    )?;

    println!(
        "✅ Compared {} cells with the {} test, {} differ at the 5% level",
        report.compared_cells, spec.test, report.significant_cells
    );
    if let Some(path) = &args.output_netcdf {
        println!("✅ Saved p-value and mean-thickness maps to {}", path.display());
    }
    Ok(())
}

fn inspect(path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let file = netcdf::open(path)?;
    println!("Successfully opened NetCDF file: {}", path.display());
    print_metadata(&file)?;
    print_sitd_summary(&read_sitd(&file)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();
    init_logging(args.verbose)?;

    ParallelConfig::new(args.threads).setup_global_pool()?;

    match &args.command {
        Command::Sample(sample_args) => sample(sample_args),
        Command::Compare(compare_args) => compare(compare_args),
        Command::Inspect { file } => inspect(file),
    }
}
