//! # Price Providers
//!
//! $$
//! (\text{symbols}, [t_0, t_1]) \mapsto P \in \mathbb{R}^{T \times N}
//! $$
//!
//! Collaborator contract for loading dense, date-aligned close histories.
//! Providers own the gap policy: the series they hand out is forward-filled,
//! so the evaluator and optimizer never see missing observations.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use ndarray::Array2;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::series::PriceSeries;

/// Inclusive date window for a price request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

impl DateRange {
  /// Validated inclusive range.
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if end < start {
      return Err(PortfolioError::invalid_price_data(format!(
        "date range ends ({end}) before it starts ({start})"
      )));
    }
    Ok(Self { start, end })
  }

  /// Whether `date` falls inside the window.
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }
}

/// Source of dense, date-aligned close histories.
pub trait PriceDataProvider {
  /// Closes for `symbols` within `range`, aligned on one shared date index.
  fn prices(&self, symbols: &[&str], range: &DateRange) -> Result<PriceSeries>;
}

/// In-memory quote store keyed by symbol and date.
///
/// Serves the union of in-range quote dates across the requested symbols and
/// forward-fills from the most recent earlier quote, so instruments quoted on
/// different calendars still align.
#[derive(Clone, Debug, Default)]
pub struct MemoryPriceProvider {
  quotes: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl MemoryPriceProvider {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record one close.
  pub fn insert(&mut self, symbol: &str, date: NaiveDate, close: f64) {
    self
      .quotes
      .entry(symbol.to_string())
      .or_default()
      .insert(date, close);
  }

  /// Record a batch of closes for one symbol.
  pub fn insert_series<I>(&mut self, symbol: &str, closes: I)
  where
    I: IntoIterator<Item = (NaiveDate, f64)>,
  {
    let entry = self.quotes.entry(symbol.to_string()).or_default();
    for (date, close) in closes {
      entry.insert(date, close);
    }
  }

  /// Symbols currently stored.
  pub fn symbols(&self) -> Vec<String> {
    self.quotes.keys().cloned().collect()
  }

  /// Earliest and latest quote date over all stored symbols.
  pub fn full_range(&self) -> Result<DateRange> {
    let mut dates = self
      .quotes
      .values()
      .flat_map(|quotes| quotes.keys().copied());
    let first = dates.next().ok_or(PortfolioError::InsufficientData {
      required: 1,
      available: 0,
    })?;
    let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
    DateRange::new(min, max)
  }
}

impl PriceDataProvider for MemoryPriceProvider {
  fn prices(&self, symbols: &[&str], range: &DateRange) -> Result<PriceSeries> {
    if symbols.is_empty() {
      return Err(PortfolioError::EmptyPortfolio);
    }

    let mut dates = BTreeSet::new();
    for &symbol in symbols {
      let quotes = self
        .quotes
        .get(symbol)
        .ok_or_else(|| PortfolioError::invalid_price_data(format!("unknown symbol {symbol}")))?;
      dates.extend(
        quotes
          .range(range.start..=range.end)
          .map(|(&date, _)| date),
      );
    }
    if dates.is_empty() {
      return Err(PortfolioError::InsufficientData {
        required: 1,
        available: 0,
      });
    }

    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let mut closes = Array2::zeros((dates.len(), symbols.len()));
    for (j, &symbol) in symbols.iter().enumerate() {
      let quotes = &self.quotes[symbol];
      for (i, &date) in dates.iter().enumerate() {
        // forward fill: most recent quote at or before this date
        match quotes.range(..=date).next_back() {
          Some((_, &close)) => closes[[i, j]] = close,
          None => {
            return Err(PortfolioError::invalid_price_data(format!(
              "{symbol} has no quote at or before {date}"
            )));
          }
        }
      }
    }

    PriceSeries::new(
      dates,
      symbols.iter().map(|s| s.to_string()).collect(),
      closes,
    )
  }
}

/// CSV-backed provider.
///
/// Expects a `date,SYM1,SYM2,...` header and `%Y-%m-%d` dates; empty fields
/// are gaps and get forward-filled on request. The whole file is parsed per
/// call, which is plenty for one-shot analyses.
#[derive(Clone, Debug)]
pub struct CsvPriceProvider {
  path: PathBuf,
}

impl CsvPriceProvider {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Column symbols declared by the file header.
  pub fn symbols(&self) -> Result<Vec<String>> {
    let (_, symbols) = self.load()?;
    Ok(symbols)
  }

  /// Earliest and latest quote date in the file.
  pub fn full_range(&self) -> Result<DateRange> {
    let (provider, _) = self.load()?;
    provider.full_range()
  }

  fn load(&self) -> Result<(MemoryPriceProvider, Vec<String>)> {
    let text = fs::read_to_string(&self.path).map_err(|err| {
      PortfolioError::invalid_price_data(format!("{}: {err}", self.path.display()))
    })?;

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines
      .next()
      .ok_or_else(|| PortfolioError::invalid_price_data(format!(
        "{} is empty",
        self.path.display()
      )))?;

    let symbols: Vec<String> = header
      .split(',')
      .skip(1)
      .map(|field| field.trim().to_string())
      .collect();
    if symbols.is_empty() {
      return Err(PortfolioError::invalid_price_data(format!(
        "{} declares no symbol columns",
        self.path.display()
      )));
    }

    let mut provider = MemoryPriceProvider::new();
    for line in lines {
      let mut fields = line.split(',').map(str::trim);
      let date_field = fields.next().unwrap_or_default();
      let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d").map_err(|err| {
        PortfolioError::invalid_price_data(format!("bad date {date_field:?}: {err}"))
      })?;

      for symbol in &symbols {
        let Some(field) = fields.next() else {
          return Err(PortfolioError::invalid_price_data(format!(
            "row {date} is missing a column for {symbol}"
          )));
        };
        if field.is_empty() {
          continue;
        }
        let close: f64 = field.parse().map_err(|err| {
          PortfolioError::invalid_price_data(format!("bad close {field:?} for {symbol}: {err}"))
        })?;
        provider.insert(symbol, date, close);
      }
    }

    Ok((provider, symbols))
  }
}

impl PriceDataProvider for CsvPriceProvider {
  fn prices(&self, symbols: &[&str], range: &DateRange) -> Result<PriceSeries> {
    let (provider, _) = self.load()?;
    provider.prices(symbols, range)
  }
}
