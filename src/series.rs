//! # Price Series
//!
//! $$
//! P \in \mathbb{R}^{T \times N},\qquad t_1 < t_2 < \dots < t_T
//! $$
//!
//! Date-aligned close-price history for a fixed instrument universe, and the
//! portfolio value series derived from it.

use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::PortfolioError;
use crate::error::Result;

/// Adjusted close history: one strictly increasing date index shared by all
/// instruments, one matrix row per date and one column per instrument.
///
/// The shared index makes date alignment structural; gap filling is the
/// data provider's responsibility, never this type's.
#[derive(Clone, Debug)]
pub struct PriceSeries {
  dates: Vec<NaiveDate>,
  symbols: Vec<String>,
  closes: Array2<f64>,
}

impl PriceSeries {
  /// Build a validated series from a row-per-date, column-per-instrument
  /// close matrix.
  pub fn new(dates: Vec<NaiveDate>, symbols: Vec<String>, closes: Array2<f64>) -> Result<Self> {
    if closes.nrows() != dates.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: dates.len(),
        actual: closes.nrows(),
      });
    }
    if closes.ncols() != symbols.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: symbols.len(),
        actual: closes.ncols(),
      });
    }
    if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
      return Err(PortfolioError::invalid_price_data(format!(
        "date index is not strictly increasing at {}",
        pair[1]
      )));
    }

    Ok(Self {
      dates,
      symbols,
      closes,
    })
  }

  /// Number of instruments (matrix columns).
  pub fn n_instruments(&self) -> usize {
    self.symbols.len()
  }

  /// Number of trading dates (matrix rows).
  pub fn n_dates(&self) -> usize {
    self.dates.len()
  }

  /// Shared date index.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Instrument identifiers in column order.
  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  /// Full close matrix.
  pub fn closes(&self) -> &Array2<f64> {
    &self.closes
  }

  /// Close column of a single instrument.
  pub fn instrument(&self, idx: usize) -> ArrayView1<'_, f64> {
    self.closes.column(idx)
  }
}

/// Daily portfolio net value, one entry per date of the originating price
/// series. Purely derived; never mutated after construction.
#[derive(Clone, Debug)]
pub struct PortfolioValueSeries {
  dates: Vec<NaiveDate>,
  values: Array1<f64>,
}

impl PortfolioValueSeries {
  /// Pair a date index with its value path.
  pub fn new(dates: Vec<NaiveDate>, values: Array1<f64>) -> Result<Self> {
    if dates.len() != values.len() {
      return Err(PortfolioError::DimensionMismatch {
        expected: dates.len(),
        actual: values.len(),
      });
    }

    Ok(Self { dates, values })
  }

  /// Date index.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Value path.
  pub fn values(&self) -> &Array1<f64> {
    &self.values
  }

  /// Number of observations.
  pub fn len(&self) -> usize {
    self.values.len()
  }

  /// True when the series holds no observations.
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}
