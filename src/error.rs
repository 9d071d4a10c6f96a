//! # Errors
//!
//! $$
//! \text{failure} \mapsto \text{typed, recoverable condition}
//! $$
//!
//! All failure modes of evaluation and optimization. Every condition is
//! recoverable and surfaced to the caller; nothing here aborts the process.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Failure conditions raised by evaluation, optimization and providers.
#[derive(Error, Debug)]
pub enum PortfolioError {
  /// A vector length does not match the instrument universe.
  #[error("dimension mismatch: expected {expected}, got {actual}")]
  DimensionMismatch { expected: usize, actual: usize },

  /// Price data cannot be interpreted (zero or non-finite first close,
  /// unknown symbol, malformed file).
  #[error("invalid price data: {message}")]
  InvalidPriceData { message: String },

  /// Too few observations to compute the requested quantity.
  #[error("insufficient data: need at least {required} points, got {available}")]
  InsufficientData { required: usize, available: usize },

  /// Daily return volatility is zero or undefined, so the Sharpe ratio
  /// does not exist. Always an error, never a NaN or infinity sentinel.
  #[error("daily return volatility is zero; Sharpe ratio is undefined")]
  DegenerateVolatility,

  /// An optimization was requested over zero instruments.
  #[error("no instruments supplied")]
  EmptyPortfolio,

  /// The solver errored out or produced no usable iterate.
  #[error("optimization did not converge: {message}")]
  DidNotConverge { message: String },
}

impl PortfolioError {
  pub(crate) fn invalid_price_data(message: impl Into<String>) -> Self {
    Self::InvalidPriceData {
      message: message.into(),
    }
  }
}
