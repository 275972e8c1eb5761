//! MCMC convergence diagnostics.

use super::InferenceError;
use super::posterior::{ParameterVector, PosteriorSamples};
use super::usize_to_f64;

/// Multi-chain split-R-hat and effective-sample-size summary.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceSummary {
    /// Number of chains included.
    pub chain_count: usize,
    /// Draws per chain used after truncation to equal even length.
    pub draws_per_chain_used: usize,
    /// Scalar parameter names, aligned with the vectors below.
    pub parameter_names: Vec<String>,
    /// Split-R-hat per scalar parameter.
    pub split_rhat: Vec<f64>,
    /// Effective sample size per scalar parameter, summed over chains.
    pub effective_sample_size: Vec<f64>,
    /// Maximum split-R-hat across all tracked scalar parameters.
    pub max_split_rhat: Option<f64>,
}

impl ConvergenceSummary {
    /// Split-R-hat for a named parameter, e.g. `"phi"` or `"theta_s[2]"`.
    #[must_use]
    pub fn split_rhat_for(&self, name: &str) -> Option<f64> {
        self.parameter_names
            .iter()
            .position(|candidate| candidate == name)
            .and_then(|index| self.split_rhat.get(index).copied())
    }

    /// Whether every split-R-hat is at or below `threshold`.
    #[must_use]
    pub fn is_converged(&self, threshold: f64) -> bool {
        self.max_split_rhat
            .is_some_and(|max_rhat| max_rhat <= threshold)
    }
}

/// Lag-`k` autocorrelation for a scalar chain.
#[must_use]
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    if series.is_empty() || lag >= series.len() {
        return 0.0;
    }

    let n = series.len() - lag;
    let mean = series.iter().sum::<f64>() / usize_to_f64(series.len());

    let denominator = series
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>();
    if denominator <= 0.0 {
        return 0.0;
    }

    let numerator = (0..n)
        .map(|idx| (series[idx] - mean) * (series[idx + lag] - mean))
        .sum::<f64>();

    numerator / denominator
}

/// Heuristic effective sample size using positive autocorrelation truncation.
#[must_use]
pub fn effective_sample_size(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return usize_to_f64(n);
    }

    let mut rho_sum = 0.0;
    for lag in 1..n {
        let rho = autocorrelation(series, lag);
        if rho <= 0.0 {
            break;
        }
        rho_sum += rho;
    }

    usize_to_f64(n) / (2.0f64.mul_add(rho_sum, 1.0)).max(1.0)
}

/// Summarize split-R-hat and ESS for every scalar parameter across chains.
///
/// Requires at least two chains; all chains are truncated to the same
/// minimum even draw count, which must be at least four.
///
/// # Errors
///
/// Returns `InferenceError` if chain counts/draw lengths are insufficient or
/// dimensions mismatch.
pub fn summarize_convergence<D: ParameterVector>(
    chains: &[PosteriorSamples<D>],
) -> Result<ConvergenceSummary, InferenceError> {
    if chains.len() < 2 {
        return Err(InferenceError::InvalidChainCount {
            min: 2,
            found: chains.len(),
        });
    }

    let min_draws = chains.iter().map(PosteriorSamples::len).min().unwrap_or(0);
    let draws_per_chain_used = min_draws - (min_draws % 2);
    if draws_per_chain_used < 4 {
        return Err(InferenceError::InsufficientChainDraws {
            minimum: 4,
            found: draws_per_chain_used,
        });
    }

    let parameter_names = chains
        .first()
        .and_then(|chain| chain.draws.first())
        .map(ParameterVector::parameter_names)
        .unwrap_or_default();
    let dimension = parameter_names.len();

    // series[chain][parameter][draw]
    let mut series = Vec::with_capacity(chains.len());
    for chain in chains {
        let mut chain_series = vec![Vec::with_capacity(draws_per_chain_used); dimension];
        for draw in chain.draws.iter().take(draws_per_chain_used) {
            let values = draw.parameter_values();
            if values.len() != dimension {
                return Err(InferenceError::InconsistentPosteriorDimensions);
            }
            for (parameter, value) in values.into_iter().enumerate() {
                chain_series[parameter].push(value);
            }
        }
        series.push(chain_series);
    }

    let half = draws_per_chain_used / 2;
    let mut split_rhat = Vec::with_capacity(dimension);
    let mut effective = Vec::with_capacity(dimension);
    for parameter in 0..dimension {
        let split_chains = series
            .iter()
            .flat_map(|chain_series| {
                let values = &chain_series[parameter];
                [values[..half].to_vec(), values[half..].to_vec()]
            })
            .collect::<Vec<_>>();
        split_rhat.push(split_rhat_scalar(&split_chains)?);
        effective.push(
            series
                .iter()
                .map(|chain_series| effective_sample_size(&chain_series[parameter]))
                .sum(),
        );
    }

    let max_split_rhat = split_rhat.iter().copied().max_by(f64::total_cmp);

    Ok(ConvergenceSummary {
        chain_count: chains.len(),
        draws_per_chain_used,
        parameter_names,
        split_rhat,
        effective_sample_size: effective,
        max_split_rhat,
    })
}

fn split_rhat_scalar(chains: &[Vec<f64>]) -> Result<f64, InferenceError> {
    if chains.len() < 2 {
        return Err(InferenceError::InvalidChainCount {
            min: 2,
            found: chains.len(),
        });
    }

    let n = chains.first().map_or(0, Vec::len);
    if n < 2 {
        return Err(InferenceError::InsufficientChainDraws {
            minimum: 2,
            found: n,
        });
    }
    if chains.iter().any(|chain| chain.len() != n) {
        return Err(InferenceError::InconsistentPosteriorDimensions);
    }

    let chain_means = chains
        .iter()
        .map(|chain| chain.iter().sum::<f64>() / usize_to_f64(n))
        .collect::<Vec<_>>();
    let chain_vars = chains
        .iter()
        .zip(chain_means.iter())
        .map(|(chain, mean)| sample_variance(chain, *mean))
        .collect::<Vec<_>>();

    let m = chains.len();
    let mean_of_means = chain_means.iter().sum::<f64>() / usize_to_f64(m);
    let between = usize_to_f64(n)
        * chain_means
            .iter()
            .map(|mean| {
                let centered = *mean - mean_of_means;
                centered * centered
            })
            .sum::<f64>()
        / usize_to_f64(m - 1);
    let within = chain_vars.iter().sum::<f64>() / usize_to_f64(m);

    if !(within.is_finite() && within > 0.0 && between.is_finite()) {
        return Ok(1.0);
    }

    let n_f64 = usize_to_f64(n);
    let var_plus = ((n_f64 - 1.0) / n_f64).mul_add(within, between / n_f64);
    if !var_plus.is_finite() || var_plus <= 0.0 {
        return Ok(1.0);
    }

    Ok((var_plus / within).sqrt().max(1.0))
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values
        .iter()
        .map(|value| {
            let centered = *value - mean;
            centered * centered
        })
        .sum::<f64>()
        / usize_to_f64(values.len() - 1)
}
