//! Summary statistics over per-image angular errors, plus a running average.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("cannot summarize an empty error list")]
    Empty,
    #[error("error at index {index} is not a finite non-negative angle: {value}")]
    Invalid { index: usize, value: f32 },
}

/// The six numbers reported for illuminant estimation benchmarks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    pub mean: f64,
    pub median: f64,
    pub trimean: f64,
    pub best25: f64,
    pub worst25: f64,
    pub pct95: f64,
}

impl ErrorStats {
    pub fn from_errors(errors: &[f32]) -> Result<Self, StatsError> {
        if errors.is_empty() {
            return Err(StatsError::Empty);
        }
        if let Some((index, &value)) = errors
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
        {
            return Err(StatsError::Invalid { index, value });
        }

        let mut sorted: Vec<f64> = errors.iter().map(|&e| e as f64).collect();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let q1 = percentile(&sorted, 0.25);
        let median = percentile(&sorted, 0.5);
        let q3 = percentile(&sorted, 0.75);
        let best_len = (n / 4).max(1);
        let worst_start = (3 * n / 4).min(n - 1);

        Ok(Self {
            mean: mean(&sorted),
            median,
            trimean: 0.25 * (q1 + 2.0 * median + q3),
            best25: mean(&sorted[..best_len]),
            worst25: mean(&sorted[worst_start..]),
            pct95: percentile(&sorted, 0.95),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Linear interpolation at position `p * (n - 1)` of a sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Running average of a scalar, weighted by sample count.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageMeter {
    sum: f64,
    count: usize,
    last: f64,
}

impl AverageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as the mean over `n` samples.
    pub fn update(&mut self, value: f64, n: usize) {
        self.last = value;
        self.sum += value * n as f64;
        self.count += n;
    }

    /// Average so far; 0 before the first update.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
