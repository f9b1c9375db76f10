//! Monthly category histograms
//!
//! [`MonthlyAccumulator`] counts observations per `(category, row, col)` for
//! the calendar month currently being filled. When an observation from a later
//! month arrives, the open month is sealed and handed back to the caller as a
//! [`SealedMonth`]; the last month is only emitted by
//! [`MonthlyAccumulator::finalize`]. Months are compared by `(year, month)`,
//! so gaps in the record are fine but observations must arrive in
//! non-decreasing time order.

use crate::categories::CategoryBounds;
use crate::errors::{EmSitdError, Result};
use crate::grid::GridIndex;
use crate::observations::Observation;
use chrono::{Datelike, NaiveDate};
use ndarray::{Array3, ArrayView3};
use std::fmt;
use tracing::info;

/// Calendar month key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    #[must_use]
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A finished month of counts
#[derive(Debug, Clone, PartialEq)]
pub struct SealedMonth {
    period: MonthKey,
    first_date: NaiveDate,
    date: NaiveDate,
    counts: Array3<i32>,
    observations: usize,
}

impl SealedMonth {
    /// Month the counts belong to
    #[must_use]
    pub const fn period(&self) -> MonthKey {
        self.period
    }

    /// Date of the first observation counted
    #[must_use]
    pub const fn first_date(&self) -> NaiveDate {
        self.first_date
    }

    /// Date of the last observation counted; used as the time tag on output
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// `(category, row, col)` counts
    #[must_use]
    pub fn counts(&self) -> ArrayView3<'_, i32> {
        self.counts.view()
    }

    #[must_use]
    pub fn into_counts(self) -> Array3<i32> {
        self.counts
    }

    /// Number of observations counted in the month
    #[must_use]
    pub const fn total(&self) -> usize {
        self.observations
    }

    /// Largest single-cell count
    #[must_use]
    pub fn max_count(&self) -> i32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Debug)]
struct OpenMonth {
    period: MonthKey,
    first_date: NaiveDate,
    date: NaiveDate,
    counts: Array3<i32>,
    observations: usize,
}

impl OpenMonth {
    fn seal(self) -> SealedMonth {
        info!(
            month = %self.period,
            observations = self.observations,
            max_count = self.counts.iter().copied().max().unwrap_or(0),
            "sealed month"
        );
        SealedMonth {
            period: self.period,
            first_date: self.first_date,
            date: self.date,
            counts: self.counts,
            observations: self.observations,
        }
    }
}

/// Outcome of binning one observation
#[derive(Debug, Clone, PartialEq)]
pub enum BinOutcome {
    /// Counted into the open month
    Counted,
    /// Negative thickness, ignored
    Skipped,
    /// Counted into a new month; the previous month was sealed
    Sealed(SealedMonth),
}

/// Per-run accumulator of monthly `(category, row, col)` counts
#[derive(Debug)]
pub struct MonthlyAccumulator {
    bounds: CategoryBounds,
    shape: (usize, usize, usize),
    open: Option<OpenMonth>,
    skipped: usize,
}

impl MonthlyAccumulator {
    /// New accumulator for a grid of `(rows, cols)` cells
    #[must_use]
    pub fn new(bounds: CategoryBounds, grid_shape: (usize, usize)) -> Self {
        let shape = (bounds.len(), grid_shape.0, grid_shape.1);
        Self {
            bounds,
            shape,
            open: None,
            skipped: 0,
        }
    }

    #[must_use]
    pub fn bounds(&self) -> &CategoryBounds {
        &self.bounds
    }

    /// `(categories, rows, cols)`
    #[must_use]
    pub const fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// Month being filled, if any
    #[must_use]
    pub fn current_period(&self) -> Option<MonthKey> {
        self.open.as_ref().map(|m| m.period)
    }

    /// Counts of the month being filled
    #[must_use]
    pub fn current_counts(&self) -> Option<ArrayView3<'_, i32>> {
        self.open.as_ref().map(|m| m.counts.view())
    }

    /// Negative-thickness observations ignored so far
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Bin one observation that was matched to `index`.
    ///
    /// # Errors
    ///
    /// - [`EmSitdError::OutOfRange`] if the thickness exceeds every boundary
    /// - [`EmSitdError::OutOfOrder`] if the observation's month precedes the
    ///   open month
    /// - [`EmSitdError::DimensionMismatch`] if `index` lies outside the grid
    pub fn accumulate(&mut self, obs: &Observation, index: GridIndex) -> Result<BinOutcome> {
        let Some(category) = self.bounds.category_of(obs.thickness)? else {
            self.skipped += 1;
            return Ok(BinOutcome::Skipped);
        };

        let (_, rows, cols) = self.shape;
        if index.row >= rows || index.col >= cols {
            return Err(EmSitdError::DimensionMismatch {
                what: "grid index outside histogram".to_string(),
                left: format!("({}, {})", index.row, index.col),
                right: format!("({rows}, {cols})"),
            });
        }

        let date = obs.time.date_naive();
        let period = MonthKey::of(&date);

        let sealed = match self.open.take() {
            Some(open) if open.period == period => {
                self.open = Some(open);
                None
            }
            Some(open) if period < open.period => {
                let current = open.period;
                self.open = Some(open);
                return Err(EmSitdError::OutOfOrder {
                    current: current.to_string(),
                    got: period.to_string(),
                });
            }
            previous => {
                self.open = Some(OpenMonth {
                    period,
                    first_date: date,
                    date,
                    counts: Array3::zeros(self.shape),
                    observations: 0,
                });
                previous.map(OpenMonth::seal)
            }
        };

        if let Some(open) = self.open.as_mut() {
            open.counts[[category, index.row, index.col]] += 1;
            open.observations += 1;
            open.first_date = open.first_date.min(date);
            open.date = open.date.max(date);
        }

        Ok(sealed.map_or(BinOutcome::Counted, BinOutcome::Sealed))
    }

    /// Bin a matched batch, storing every month sealed along the way.
    ///
    /// The month still open at the end stays open so that the next batch can
    /// continue it.
    ///
    /// # Errors
    ///
    /// Fails on the first binning or sink error; see [`Self::accumulate`].
    pub fn accumulate_batch<S: HistogramSink + ?Sized>(
        &mut self,
        observations: &[Observation],
        indices: &[GridIndex],
        sink: &mut S,
    ) -> Result<BatchStats> {
        if observations.len() != indices.len() {
            return Err(EmSitdError::DimensionMismatch {
                what: "observations/grid indices".to_string(),
                left: observations.len().to_string(),
                right: indices.len().to_string(),
            });
        }

        let mut stats = BatchStats::default();
        for (obs, &index) in observations.iter().zip(indices) {
            match self.accumulate(obs, index)? {
                BinOutcome::Counted => stats.counted += 1,
                BinOutcome::Skipped => stats.skipped += 1,
                BinOutcome::Sealed(month) => {
                    stats.counted += 1;
                    stats.sealed += 1;
                    sink.store(&month)?;
                }
            }
        }
        Ok(stats)
    }

    /// Seal and return the month still open, if any
    #[must_use]
    pub fn finalize(self) -> Option<SealedMonth> {
        self.open.map(OpenMonth::seal)
    }
}

/// Counters for one [`MonthlyAccumulator::accumulate_batch`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub counted: usize,
    pub skipped: usize,
    pub sealed: usize,
}

/// Destination for sealed months
pub trait HistogramSink {
    /// Persist one sealed month. Called once per month, in time order.
    ///
    /// # Errors
    ///
    /// Implementations return their storage errors.
    fn store(&mut self, month: &SealedMonth) -> Result<()>;
}

impl HistogramSink for Vec<SealedMonth> {
    fn store(&mut self, month: &SealedMonth) -> Result<()> {
        self.push(month.clone());
        Ok(())
    }
}

/// Bin a complete matched batch and flush the final month.
///
/// # Errors
///
/// See [`MonthlyAccumulator::accumulate_batch`].
pub fn bin_series<S: HistogramSink + ?Sized>(
    observations: &[Observation],
    indices: &[GridIndex],
    bounds: &CategoryBounds,
    grid_shape: (usize, usize),
    sink: &mut S,
) -> Result<BatchStats> {
    let mut acc = MonthlyAccumulator::new(bounds.clone(), grid_shape);
    let mut stats = acc.accumulate_batch(observations, indices, sink)?;
    if let Some(last) = acc.finalize() {
        sink.store(&last)?;
        stats.sealed += 1;
    }
    Ok(stats)
}
