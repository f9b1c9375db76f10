//! Inspection of SITD files
//!
//! Prints the file layout and a per-time-step summary of the counts, the
//! quickest way to check what a sampling run produced.

use crate::errors::Result;
use crate::netcdf_io::SitdDataset;
use chrono::NaiveDate;
use ndarray::Axis;
use netcdf::{AttributeValue, File};

/// Summary of one stored time step
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStepSummary {
    pub index: usize,
    pub date: Option<NaiveDate>,
    /// Observations counted in the step
    pub total: i64,
    /// Largest single-cell count
    pub max_count: i32,
    /// Cells with at least one observation
    pub occupied_cells: usize,
    /// Observations per category
    pub per_category: Vec<i64>,
}

/// Summarise every time step of a SITD dataset
#[must_use]
pub fn summarize_sitd(dataset: &SitdDataset) -> Vec<TimeStepSummary> {
    let dates = dataset.dates();
    dataset
        .counts
        .outer_iter()
        .enumerate()
        .map(|(index, step)| {
            let per_category: Vec<i64> = step
                .outer_iter()
                .map(|cat| cat.iter().map(|&c| i64::from(c)).sum())
                .collect();
            let occupied_cells = step
                .sum_axis(Axis(0))
                .iter()
                .filter(|&&c| c > 0)
                .count();
            TimeStepSummary {
                index,
                date: dates.get(index).copied().flatten(),
                total: per_category.iter().sum(),
                max_count: step.iter().copied().max().unwrap_or(0),
                occupied_cells,
                per_category,
            }
        })
        .collect()
}

/// Prints global attributes and variables of a NetCDF file.
///
/// # Errors
///
/// Returns the NetCDF error if an attribute cannot be read.
pub fn print_metadata(file: &File) -> Result<()> {
    println!("\n===== Global Attributes =====");
    for attr in file.attributes() {
        match attr.value()? {
            AttributeValue::Str(s) => println!("- {}: {}", attr.name(), s),
            other => println!("- {}: {:?}", attr.name(), other),
        }
    }

    println!("\n===== Variables =====");
    for var in file.variables() {
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| {
                if d.is_unlimited() {
                    format!("{}[{}, unlimited]", d.name(), d.len())
                } else {
                    format!("{}[{}]", d.name(), d.len())
                }
            })
            .collect();
        println!("- {} ({})", var.name(), dims.join(", "));
    }

    Ok(())
}

/// Prints the category boundaries and the per-step summary of a SITD dataset.
pub fn print_sitd_summary(dataset: &SitdDataset) {
    let (nt, nc, ny, nx) = dataset.counts.dim();
    println!("\n Ice Thickness Distribution");
    println!("============================");
    println!(" Grid: {ny} × {nx}, categories: {nc}, time steps: {nt}");
    println!(
        " Category upper boundaries [m]: {}",
        dataset
            .bounds
            .upper()
            .iter()
            .map(|b| format!("{b:.3}"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let summaries = summarize_sitd(dataset);
    if summaries.is_empty() {
        println!("\n   (No time steps stored)");
        return;
    }

    println!();
    for s in &summaries {
        let date = s
            .date
            .map_or_else(|| "unknown date".to_string(), |d| d.format("%Y-%m-%d").to_string());
        println!(
            "   [{}] {}: {} observations in {} cells, max {} per cell, per category {:?}",
            s.index, date, s.total, s.occupied_cells, s.max_count, s.per_category
        );
    }
}
