use std::env;
use std::error::Error;

use prettytable::row;
use prettytable::Table;
use sharpe_rs::AllocationEngine;
use sharpe_rs::CsvPriceProvider;
use sharpe_rs::OptimizerConfig;
use sharpe_rs::PriceDataProvider;

fn main() -> Result<(), Box<dyn Error>> {
  let mut args = env::args().skip(1);
  let path = args.next().unwrap_or_else(|| "./data/prices.csv".to_string());
  let requested: Vec<String> = args.collect();

  let provider = CsvPriceProvider::new(&path);
  let symbols = if requested.is_empty() {
    provider.symbols()?
  } else {
    requested
  };
  let symbol_refs: Vec<&str> = symbols.iter().map(String::as_str).collect();

  let range = provider.full_range()?;
  let prices = provider.prices(&symbol_refs, &range)?;

  let engine = AllocationEngine::new(OptimizerConfig::default());
  let result = engine.optimize(&prices)?;

  let equal = vec![1.0 / symbols.len() as f64; symbols.len()];
  let equal_stats = engine.evaluate(&prices, &equal)?;

  println!(
    "Window: {} .. {} ({} trading days, {} instruments)",
    range.start,
    range.end,
    prices.n_dates(),
    symbols.len()
  );

  let mut weights = Table::new();
  weights.add_row(row!["Symbol", "Optimal weight"]);
  for (symbol, w) in symbols.iter().zip(&result.weights) {
    weights.add_row(row![symbol, format!("{w:.4}")]);
  }
  weights.printstd();

  let mut stats = Table::new();
  stats.add_row(row!["", "Optimal", "Equal weight"]);
  stats.add_row(row![
    "Sharpe ratio",
    format!("{:.4}", result.stats.sharpe),
    format!("{:.4}", equal_stats.sharpe)
  ]);
  stats.add_row(row![
    "Cumulative return",
    format!("{:.4}", result.stats.cumulative_return),
    format!("{:.4}", equal_stats.cumulative_return)
  ]);
  stats.add_row(row![
    "Avg daily return",
    format!("{:.6}", result.stats.mean_daily_return),
    format!("{:.6}", equal_stats.mean_daily_return)
  ]);
  stats.add_row(row![
    "Volatility (daily)",
    format!("{:.6}", result.stats.daily_volatility),
    format!("{:.6}", equal_stats.daily_volatility)
  ]);
  stats.printstd();

  println!(
    "Solver: {} iterations, {} objective evaluations",
    result.iterations, result.evaluations
  );
  if !result.converged {
    println!("warning: solver stopped at the iteration cap; result is the best iterate found");
  }

  Ok(())
}
