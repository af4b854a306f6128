//! Distribution summaries for histogram and timer metrics.
//!
//! Librato accepts pre-aggregated "complex" measurements (count, sum, min,
//! max, sum of squares) so raw samples never leave the process. The sum and
//! the sum of squares are reconstructed from the count, mean and standard
//! deviation the registry already keeps.

use clap::ValueEnum;

use crate::registry::DistributionView;

/// Aggregate statistics of one distribution metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub sum_squares: f64,
}

/// What to report as sum of squares when the reconstruction is not finite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SumSquaresFallback {
    /// Report `(mean * count)^2`.
    #[default]
    SquaredSum,
    /// Report `0.0`.
    Zero,
}

pub fn summarize<V>(view: &V, fallback: SumSquaresFallback) -> Summary
where
    V: DistributionView + ?Sized,
{
    let count = view.count();
    let mean = view.mean();
    Summary {
        count,
        sum: mean * count as f64,
        min: view.min(),
        max: view.max(),
        sum_squares: sum_squares(count, mean, view.std_dev(), fallback),
    }
}

/// Rapid-calculation identity: `(n·σ)² + (Σx)² / n`, with `Σx = mean·n`.
///
/// Always returns a finite number.
pub fn sum_squares(count: u64, mean: f64, std_dev: f64, fallback: SumSquaresFallback) -> f64 {
    let n = count as f64;
    let sum = mean * n;
    let squared_sum = sum.powi(2);
    let candidate = (n * std_dev).powi(2) + squared_sum / n;
    if candidate.is_finite() {
        return candidate;
    }

    let fallback = match fallback {
        SumSquaresFallback::SquaredSum => squared_sum,
        SumSquaresFallback::Zero => 0.0,
    };
    if fallback.is_finite() {
        fallback
    } else {
        0.0
    }
}
