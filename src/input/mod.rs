//! # Model inputs
//!
//! Defines a light-weight container for stratified audit counts: one sample
//! size and one observed misstatement count per stratum.
//!
//! # Examples
//!
//! ```
//! use stratified_audit_models::StratifiedCounts;
//!
//! let counts = StratifiedCounts::new(vec![100, 50, 80], vec![10, 5, 12]);
//! assert!(counts.validate().is_ok());
//! assert_eq!(counts.n_strata(), 3);
//! ```
//!
//! ```
//! use stratified_audit_models::StratifiedCounts;
//!
//! let counts = StratifiedCounts::new(vec![100, 50], vec![10]);
//! assert!(counts.validate().is_err());
//! ```

use num_traits::ToPrimitive;
use thiserror::Error;

/// Errors returned when validating stratified counts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("at least one stratum is required")]
    NoStrata,
    #[error("sample sizes ({sizes}) and misstatement counts ({counts}) must have equal length")]
    LengthMismatch { sizes: usize, counts: usize },
}

/// Per-stratum sample sizes `n_i` and observed misstatement counts `k_i`.
///
/// `k_i <= n_i` is expected but deliberately not checked here: the models
/// leave that to the likelihood, which assigns zero probability to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedCounts {
    pub sample_sizes: Vec<u64>,
    pub misstatements: Vec<u64>,
}

impl StratifiedCounts {
    #[must_use]
    pub const fn new(sample_sizes: Vec<u64>, misstatements: Vec<u64>) -> Self {
        Self {
            sample_sizes,
            misstatements,
        }
    }

    /// Build counts from `(n_i, k_i)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(u64, u64)]) -> Self {
        let (sample_sizes, misstatements) = pairs.iter().copied().unzip();
        Self {
            sample_sizes,
            misstatements,
        }
    }

    #[must_use]
    pub const fn n_strata(&self) -> usize {
        self.sample_sizes.len()
    }

    /// Iterate over `(n_i, k_i)` pairs in stratum order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.sample_sizes
            .iter()
            .copied()
            .zip(self.misstatements.iter().copied())
    }

    #[must_use]
    pub fn total_sample_size(&self) -> u64 {
        self.sample_sizes.iter().sum()
    }

    #[must_use]
    pub fn total_misstatements(&self) -> u64 {
        self.misstatements.iter().sum()
    }

    /// Smoothed pooled misstatement rate `(sum k + 0.5) / (sum n + 1)`.
    #[must_use]
    pub fn pooled_rate(&self) -> f64 {
        smoothed_rate(self.total_misstatements(), self.total_sample_size())
    }

    /// Smoothed per-stratum rates `(k_i + 0.5) / (n_i + 1)`.
    #[must_use]
    pub fn stratum_rates(&self) -> Vec<f64> {
        self.iter().map(|(n, k)| smoothed_rate(k, n)).collect()
    }

    /// Validate that at least one stratum exists and the vectors line up.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if the counts are malformed.
    pub const fn validate(&self) -> Result<(), InputError> {
        if self.sample_sizes.len() != self.misstatements.len() {
            return Err(InputError::LengthMismatch {
                sizes: self.sample_sizes.len(),
                counts: self.misstatements.len(),
            });
        }
        if self.sample_sizes.is_empty() {
            return Err(InputError::NoStrata);
        }
        Ok(())
    }
}

fn smoothed_rate(successes: u64, trials: u64) -> f64 {
    (u64_to_f64(successes) + 0.5) / (u64_to_f64(trials) + 1.0)
}

pub(crate) fn u64_to_f64(value: u64) -> f64 {
    value.to_f64().unwrap_or(f64::INFINITY)
}
